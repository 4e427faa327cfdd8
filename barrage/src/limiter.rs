use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, trace};

/// Permits that may pile up while the dispatch loop runs late.
const SLACK: NonZeroU32 = match NonZeroU32::new(10) {
    Some(v) => v,
    None => panic!("slack must be non-zero"),
};

const PREFILL: NonZeroU32 = match NonZeroU32::new(SLACK.get() - 1) {
    Some(v) => v,
    None => panic!("slack must be greater than one"),
};

/// Builds a limiter admitting `rps` permits per `unit`, evenly spaced.
///
/// The burst capacity is consumed up front so a fresh limiter hands out a single permit
/// immediately and then paces. The remaining capacity only absorbs lateness of the consumer,
/// which keeps the long-run rate from drifting below the target.
pub(crate) fn rate_limiter(rps: i64, unit: Duration) -> DefaultDirectRateLimiter {
    let rps = u32::try_from(rps.max(1)).unwrap_or(u32::MAX);
    let rps = NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN);

    let quota = match Quota::with_period(unit / rps.get()) {
        Some(quota) => quota.allow_burst(SLACK),
        None => Quota::per_second(rps),
    };
    trace!("New rate limiter: {rps} per {}", humantime::format_duration(unit));

    let limiter = RateLimiter::direct(quota);
    if !matches!(limiter.check_n(PREFILL), Ok(Ok(()))) {
        debug!("Unable to prefill rate limiter");
    }
    limiter
}
