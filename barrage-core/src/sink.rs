use crate::{
    CallResult, Labels, SinkError, StatsSnapshot, DATA_TYPE_LABEL, DATA_TYPE_RESPONSES,
    DATA_TYPE_STATS,
};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use time::OffsetDateTime;

pub type StopFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Destination for per-call results and periodic stats snapshots.
///
/// `handle` is called from the generator's delivery tasks and must not block for long; a
/// network-backed sink is expected to queue the entry and ship it on its own schedule. `stop`
/// is awaited once, after the last entry was handed over, and should flush whatever is still
/// buffered.
pub trait Sink: Send + Sync + 'static {
    fn handle(&self, labels: &Labels, ts: OffsetDateTime, line: String) -> Result<(), SinkError>;

    fn stop(&self) -> StopFuture<'_>;
}

/// JSON-encodes `value` and hands it to `sink`.
pub fn handle_struct<S, T>(
    sink: &S,
    labels: &Labels,
    ts: OffsetDateTime,
    value: &T,
) -> Result<(), SinkError>
where
    S: Sink + ?Sized,
    T: Serialize + ?Sized,
{
    let line = serde_json::to_string(value)?;
    sink.handle(labels, ts, line)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SinkEntry {
    pub labels: Labels,
    pub ts: OffsetDateTime,
    pub line: String,
}

/// In-memory sink recording every entry it receives, in order.
#[derive(Debug, Default)]
pub struct MockSink {
    entries: Mutex<Vec<SinkEntry>>,
    stopped: AtomicBool,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<SinkEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Entries carrying the given `test_data_type` label.
    pub fn entries_of(&self, data_type: &str) -> Vec<SinkEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.labels.get(DATA_TYPE_LABEL).map(String::as_str) == Some(data_type))
            .collect()
    }

    pub fn responses(&self) -> Result<Vec<CallResult>, SinkError> {
        self.entries_of(DATA_TYPE_RESPONSES)
            .iter()
            .map(|e| Ok(serde_json::from_str(&e.line)?))
            .collect()
    }

    pub fn stats(&self) -> Result<Vec<StatsSnapshot>, SinkError> {
        self.entries_of(DATA_TYPE_STATS)
            .iter()
            .map(|e| Ok(serde_json::from_str(&e.line)?))
            .collect()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl Sink for MockSink {
    fn handle(&self, labels: &Labels, ts: OffsetDateTime, line: String) -> Result<(), SinkError> {
        if self.is_stopped() {
            return Err(SinkError::Closed);
        }
        self.entries.lock()?.push(SinkEntry {
            labels: labels.clone(),
            ts,
            line,
        });
        Ok(())
    }

    fn stop(&self) -> StopFuture<'_> {
        Box::pin(async move {
            self.stopped.store(true, Ordering::Release);
        })
    }
}
