use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

/// Live counters of a running generator.
///
/// Every field is an independent atomic; there is no lock spanning them. A reader can observe
/// e.g. `success` from one instant and `failed` from a slightly later one. Use
/// [`GeneratorStats::snapshot`] to get a plain copy, keeping in mind that it is built with
/// field-by-field loads and is therefore not linearizable as a whole either.
#[derive(Debug, Default)]
pub struct GeneratorStats {
    pub current_rps: AtomicI64,
    pub current_instances: AtomicI64,
    pub current_segment: AtomicI64,
    pub run_paused: AtomicBool,
    pub run_stopped: AtomicBool,
    pub run_failed: AtomicBool,
    pub success: AtomicU64,
    pub failed: AtomicU64,
    pub call_timeout: AtomicU64,
    pub sink_dropped: AtomicU64,
}

impl GeneratorStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            current_rps: self.current_rps.load(Ordering::Relaxed),
            current_instances: self.current_instances.load(Ordering::Relaxed),
            current_segment: self.current_segment.load(Ordering::Relaxed),
            run_paused: self.run_paused.load(Ordering::Relaxed),
            run_stopped: self.run_stopped.load(Ordering::Relaxed),
            run_failed: self.run_failed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            success: self.success.load(Ordering::Relaxed),
            call_timeout: self.call_timeout.load(Ordering::Relaxed),
            sink_dropped: self.sink_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`GeneratorStats`]; also the payload of `stats` sink entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub current_rps: i64,
    pub current_instances: i64,
    pub current_segment: i64,
    pub run_paused: bool,
    pub run_stopped: bool,
    pub run_failed: bool,
    pub failed: u64,
    pub success: u64,
    #[serde(rename = "callTimeout")]
    pub call_timeout: u64,
    pub sink_dropped: u64,
}

impl StatsSnapshot {
    /// Number of results accounted so far.
    pub fn total(&self) -> u64 {
        self.success + self.failed + self.call_timeout
    }
}
