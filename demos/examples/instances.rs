use barrage::prelude::*;
use clap::Parser;
use demos::{init_logging, DemoArgs, HttpGun};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::Semaphore;
use tracing::info;

/// A virtual user hitting the target in a loop, pausing between requests.
struct VirtualUser {
    gun: HttpGun,
    think_time: Duration,
    stops: Arc<Semaphore>,
}

impl Instance for VirtualUser {
    fn run(&self, generator: &Generator) {
        let g = generator.clone();
        let gun = self.gun.clone();
        let think_time = self.think_time;
        let stops = self.stops.clone();
        generator.spawn_worker(async move {
            loop {
                let started = OffsetDateTime::now_utc();
                let res = gun.get().await;
                g.submit(CallResult {
                    started_at: Some(started),
                    ..res
                })
                .await;
                tokio::select! {
                    _ = g.responses_cancelled() => break,
                    permit = stops.acquire() => {
                        if let Ok(permit) = permit {
                            permit.forget();
                        }
                        info!("Virtual user stopped");
                        break;
                    }
                    _ = tokio::time::sleep(think_time) => {}
                }
            }
        });
    }

    fn stop(&self, _generator: &Generator) {
        self.stops.add_permits(1);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = DemoArgs::parse();

    let generator = Generator::new(
        args.config(ScheduleKind::Instances)?
            .name("instances-demo")
            .instance(VirtualUser {
                gun: HttpGun::new(&args.url),
                think_time: Duration::from_millis(100),
                stops: Arc::new(Semaphore::new(0)),
            }),
    )?;
    generator.run()?;

    tokio::select! {
        _ = generator.wait() => {}
        _ = tokio::signal::ctrl_c() => {
            generator.stop().await;
        }
    }
    println!("{:#?}", generator.stats().snapshot());
    Ok(())
}
