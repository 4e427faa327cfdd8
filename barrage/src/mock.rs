//! Mock load implementations
//!
//! Used by the test suites and handy for trying out schedules without a real target.
use crate::gun::{CallFuture, Gun, Instance};
use crate::Generator;
use async_channel::{unbounded, Receiver, Sender};
use barrage_core::CallResult;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use time::OffsetDateTime;

const SUCCESS_DATA: &str = "successCallData";
const FAILED_DATA: &str = "failedCallData";
const ERROR: &str = "error";

#[derive(Debug, Clone, Default)]
pub struct MockGunConfig {
    /// How long each call takes.
    pub call_sleep: Duration,
    /// Percentage (0-100) of calls that fail. Failures are spread evenly, not randomly.
    pub fail_ratio: u8,
}

/// A gun that sleeps and then succeeds or fails.
#[derive(Debug)]
pub struct MockGun {
    config: MockGunConfig,
    calls: AtomicU64,
}

impl MockGun {
    pub fn new(config: MockGunConfig) -> Self {
        Self {
            config,
            calls: AtomicU64::new(0),
        }
    }
}

impl Gun for MockGun {
    fn call(&self, _generator: &Generator) -> CallFuture {
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        let fail = should_fail(n, self.config.fail_ratio);
        let call_sleep = self.config.call_sleep;
        Box::pin(async move {
            tokio::time::sleep(call_sleep).await;
            mock_result(fail)
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockInstanceConfig {
    /// Pause between two results of one worker.
    pub call_sleep: Duration,
    /// Percentage (0-100) of results that fail.
    pub fail_ratio: u8,
}

/// An instance whose workers produce a result every `call_sleep`.
///
/// Each `stop` makes exactly one running worker exit.
#[derive(Debug)]
pub struct MockInstance {
    config: MockInstanceConfig,
    calls: std::sync::Arc<AtomicU64>,
    stop_tx: Sender<()>,
    stop_rx: Receiver<()>,
}

impl MockInstance {
    pub fn new(config: MockInstanceConfig) -> Self {
        let (stop_tx, stop_rx) = unbounded();
        Self {
            config,
            calls: Default::default(),
            stop_tx,
            stop_rx,
        }
    }
}

impl Instance for MockInstance {
    fn run(&self, generator: &Generator) {
        let g = generator.clone();
        let stop = self.stop_rx.clone();
        let calls = self.calls.clone();
        let config = self.config.clone();
        generator.spawn_worker(async move {
            loop {
                let started_at = OffsetDateTime::now_utc();
                tokio::select! {
                    _ = g.responses_cancelled() => break,
                    _ = stop.recv() => break,
                    _ = tokio::time::sleep(config.call_sleep) => {}
                }
                if g.is_paused() {
                    continue;
                }
                let n = calls.fetch_add(1, Ordering::Relaxed);
                let res = CallResult {
                    started_at: Some(started_at),
                    ..mock_result(should_fail(n, config.fail_ratio))
                };
                g.submit(res).await;
            }
        });
    }

    fn stop(&self, _generator: &Generator) {
        let _ = self.stop_tx.try_send(());
    }
}

fn should_fail(n: u64, fail_ratio: u8) -> bool {
    n % 100 < u64::from(fail_ratio.min(100))
}

fn mock_result(fail: bool) -> CallResult {
    if fail {
        CallResult::error(ERROR).with_data(FAILED_DATA)
    } else {
        CallResult::ok(SUCCESS_DATA)
    }
}
