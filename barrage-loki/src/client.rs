use crate::{LokiConfig, LokiError};
use async_channel::{bounded, Receiver, Sender, TrySendError};
use barrage_core::{Labels, Sink, SinkError, StopFuture};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};
use url::Url;

const PUSH_PATH: &str = "loki/api/v1/push";
const TENANT_HEADER: &str = "X-Scope-OrgID";

struct Entry {
    labels: Labels,
    ts: OffsetDateTime,
    line: String,
}

/// A [`Sink`] pushing entries to Loki.
///
/// Entries are queued by `handle` and shipped by a background task, grouped into one stream per
/// label set. A batch is pushed once it holds `batch_size` bytes of lines or once `batch_wait`
/// elapsed, whichever comes first.
pub struct LokiClient {
    tx: Sender<Entry>,
    errors: Arc<Mutex<Vec<String>>>,
    max_errors: i64,
    max_line_size: usize,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct Pusher {
    http: reqwest::Client,
    url: Url,
    token: String,
    basic_auth: Option<(String, String)>,
    tenant_id: String,
    headers: BTreeMap<String, String>,
    timeout: Duration,
    errors: Arc<Mutex<Vec<String>>>,
}

#[derive(Serialize)]
struct PushRequest<'a> {
    streams: Vec<Stream<'a>>,
}

#[derive(Serialize)]
struct Stream<'a> {
    stream: &'a Labels,
    values: &'a [(String, String)],
}

#[derive(Default)]
struct Batch {
    streams: BTreeMap<Labels, Vec<(String, String)>>,
    bytes: usize,
}

impl Batch {
    fn push(&mut self, entry: Entry) {
        self.bytes += entry.line.len();
        let ts = entry.ts.unix_timestamp_nanos().to_string();
        self.streams
            .entry(entry.labels)
            .or_default()
            .push((ts, entry.line));
    }

    fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    fn len(&self) -> usize {
        self.streams.values().map(Vec::len).sum()
    }
}

impl LokiClient {
    pub fn new(config: LokiConfig) -> Result<Self, LokiError> {
        let handle = Handle::try_current().map_err(|_| LokiError::NoRuntime)?;
        let url = push_url(&config.url)?;
        if config.max_errors < -1 {
            return Err(LokiError::MaxErrors);
        }
        if config.batch_wait.is_zero() {
            return Err(LokiError::ZeroDuration("batch_wait"));
        }
        if config.timeout.is_zero() {
            return Err(LokiError::ZeroDuration("timeout"));
        }
        let basic_auth = match config.basic_auth.as_str() {
            "" => None,
            login_password => match login_password.split(':').collect::<Vec<_>>()[..] {
                [login, password] => Some((login.to_string(), password.to_string())),
                _ => return Err(LokiError::BasicAuth),
            },
        };
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()?;

        let errors = Arc::new(Mutex::new(vec![]));
        let pusher = Pusher {
            http,
            url,
            token: config.token,
            basic_auth,
            tenant_id: config.tenant_id,
            headers: config.headers,
            timeout: config.timeout,
            errors: errors.clone(),
        };

        let (tx, rx) = bounded(config.queue_capacity.max(1));
        let worker = handle.spawn(
            batch_task(rx, pusher, config.batch_wait, config.batch_size).in_current_span(),
        );
        info!(
            url = %config.url,
            batch_wait = %humantime::format_duration(config.batch_wait),
            "Loki client started"
        );

        Ok(Self {
            tx,
            errors,
            max_errors: config.max_errors,
            max_line_size: config.max_line_size,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Push errors seen so far.
    pub fn errors(&self) -> Vec<String> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Sink for LokiClient {
    fn handle(&self, labels: &Labels, ts: OffsetDateTime, line: String) -> Result<(), SinkError> {
        {
            let errors = self.errors.lock()?;
            if self.max_errors != -1 && errors.len() as i64 > self.max_errors {
                return Err(SinkError::Rejected(format!(
                    "can't send data to Loki, errors: {errors:?}"
                )));
            }
        }
        if line.len() > self.max_line_size {
            warn!(len = line.len(), "Line exceeds max line size, dropping");
            return Ok(());
        }
        trace!(?labels, %ts, "Sending data to Loki");
        match self.tx.try_send(Entry {
            labels: labels.clone(),
            ts,
            line,
        }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SinkError::QueueFull),
            Err(TrySendError::Closed(_)) => Err(SinkError::Closed),
        }
    }

    fn stop(&self) -> StopFuture<'_> {
        Box::pin(async move {
            self.tx.close();
            let worker = self
                .worker
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(worker) = worker {
                if let Err(err) = worker.await {
                    error!("Loki batch task failed: {err}");
                }
            }
            info!("Loki client stopped");
        })
    }
}

fn push_url(base: &str) -> Result<Url, LokiError> {
    let url = Url::parse(base)?;
    if url.path().trim_end_matches('/').ends_with(PUSH_PATH) {
        return Ok(url);
    }
    let mut url = url;
    if !url.path().ends_with('/') {
        url.set_path(&format!("{}/", url.path()));
    }
    Ok(url.join(PUSH_PATH)?)
}

async fn batch_task(rx: Receiver<Entry>, pusher: Pusher, batch_wait: Duration, batch_size: usize) {
    let mut batch = Batch::default();
    let mut ticker = interval_at(Instant::now() + batch_wait, batch_wait);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            entry = rx.recv() => match entry {
                Ok(entry) => {
                    batch.push(entry);
                    if batch.bytes >= batch_size {
                        pusher.push(std::mem::take(&mut batch)).await;
                    }
                }
                Err(_) => break,
            },
            _ = ticker.tick() => {
                if !batch.is_empty() {
                    pusher.push(std::mem::take(&mut batch)).await;
                }
            }
        }
    }
    if !batch.is_empty() {
        pusher.push(batch).await;
    }
    debug!("Loki batch task exited");
}

impl Pusher {
    #[instrument(name = "loki_push", skip_all, fields(entries = batch.len()))]
    async fn push(&self, batch: Batch) {
        let streams = batch
            .streams
            .iter()
            .map(|(labels, values)| Stream {
                stream: labels,
                values,
            })
            .collect();
        let body = PushRequest { streams };

        let mut req = self
            .http
            .post(self.url.clone())
            .timeout(self.timeout)
            .json(&body);
        if let Some((login, password)) = &self.basic_auth {
            req = req.basic_auth(login, Some(password));
        }
        if !self.token.is_empty() {
            req = req.bearer_auth(&self.token);
        }
        if !self.tenant_id.is_empty() {
            req = req.header(TENANT_HEADER, &self.tenant_id);
        }
        for (name, value) in &self.headers {
            req = req.header(name, value);
        }

        match req.send().await.and_then(|res| res.error_for_status()) {
            Ok(_) => debug!("Pushed batch to Loki"),
            Err(err) => {
                error!(status = ?err.status(), "Loki error: {err}");
                self.errors
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(err.to_string());
            }
        }
    }
}
