//! Shared pieces of the barrage demos. Run them against the mock service:
//!
//! ```sh
//! cargo run -p mock-service &
//! cargo run -p demos --example rps -- --url http://127.0.0.1:3000/delay/ms/10
//! ```
use barrage::prelude::*;
use barrage_loki::{LokiClient, LokiConfig};
use clap::Parser;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version = "0.1")]
pub struct DemoArgs {
    /// Target URL every call requests.
    #[arg(short, long, default_value = "http://127.0.0.1:3000/delay/ms/10")]
    pub url: String,

    /// Initial load: requests per second or instances.
    #[arg(short, long, default_value_t = 10)]
    pub start: i64,

    /// Load added every `--every` seconds.
    #[arg(short, long, default_value_t = 0)]
    pub increase: i64,

    #[arg(long, default_value_t = 5)]
    pub every: u64,

    /// Upper bound of the load.
    #[arg(short, long, default_value_t = 100)]
    pub limit: i64,

    /// Run length in seconds.
    #[arg(short, long, default_value_t = 30)]
    pub duration: u64,

    /// Push results to this Loki instance.
    #[arg(long)]
    pub loki_url: Option<String>,
}

impl DemoArgs {
    pub fn schedule(&self, kind: ScheduleKind) -> Schedule {
        let schedule = match kind {
            ScheduleKind::Rps => Schedule::rps(self.start),
            ScheduleKind::Instances => Schedule::instances(self.start),
        };
        schedule.escalate(self.increase, Duration::from_secs(self.every), self.limit)
    }

    pub fn config(&self, kind: ScheduleKind) -> anyhow::Result<GeneratorConfig> {
        let mut config = GeneratorConfig::new(self.schedule(kind))
            .test_name("demo")
            .duration(Duration::from_secs(self.duration));
        if let Some(url) = &self.loki_url {
            let mut loki = LokiConfig::from_env();
            loki.url = url.clone();
            config = config.sink(Arc::new(LokiClient::new(loki)?));
        }
        Ok(config)
    }
}

pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("barrage=info,barrage_loki=info,demos=info")),
        )
        .init();
}

/// Issues one GET per call.
#[derive(Clone)]
pub struct HttpGun {
    client: Client,
    url: String,
}

impl HttpGun {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    pub async fn get(&self) -> CallResult {
        match self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|res| res.error_for_status())
        {
            Ok(res) => CallResult::ok(res.status().as_u16()),
            Err(err) => CallResult::error(err.to_string()),
        }
    }
}

impl Gun for HttpGun {
    fn call(&self, _generator: &Generator) -> CallFuture {
        let gun = self.clone();
        Box::pin(async move { gun.get().await })
    }
}
