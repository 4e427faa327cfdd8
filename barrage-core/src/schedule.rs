//! Load schedules
//!
//! A [`Schedule`] describes how load intensity (requests per unit of time, or the number of
//! running instances) changes over the course of a run. There are two flavors:
//!
//! - **Escalating**: start at `start_from` and add `increase` every `stage_interval` until the
//!   next value would exceed `limit`, then freeze.
//! - **Segmented**: walk an ordered list of [`Segment`]s built with [`plain`], [`line`],
//!   [`combine`] and [`combine_and_repeat`].
use crate::{ScheduleError, INSTANCES_SCHEDULE, RPS_SCHEDULE};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Which load model a schedule drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScheduleKind {
    /// Escalates the admission rate of the rate limiter feeding a `Gun`.
    Rps,
    /// Escalates the number of concurrently running `Instance` workers.
    Instances,
}

impl ScheduleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleKind::Rps => RPS_SCHEDULE,
            ScheduleKind::Instances => INSTANCES_SCHEDULE,
        }
    }
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleKind {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            RPS_SCHEDULE => Ok(ScheduleKind::Rps),
            INSTANCES_SCHEDULE => Ok(ScheduleKind::Instances),
            other => Err(ScheduleError::InvalidScheduleType(other.to_string())),
        }
    }
}

impl TryFrom<String> for ScheduleKind {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScheduleKind> for String {
    fn from(kind: ScheduleKind) -> Self {
        kind.as_str().to_string()
    }
}

/// One stage descriptor of a segmented schedule.
///
/// During the `i`-th of `steps` steps the intensity is `from + i * increase` (never below 1),
/// each step lasting `step_duration`. A segment with neither steps nor a step duration sets
/// `from` and hands over to the next segment immediately.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub from: i64,
    #[serde(default)]
    pub increase: i64,
    #[serde(default)]
    pub steps: i64,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default)]
    pub step_duration: Duration,
}

impl Segment {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.from <= 0 {
            return Err(ScheduleError::InvalidStartFrom);
        }
        if self.steps < 0
            || (self.steps != 0 && self.step_duration.is_zero())
            || (!self.step_duration.is_zero() && self.steps == 0)
        {
            return Err(ScheduleError::InvalidSteps);
        }
        self.duration().ok_or(ScheduleError::DurationOverflow)?;
        Ok(())
    }

    /// Intensity held during step `step` of this segment.
    pub fn intensity_at(&self, step: i64) -> i64 {
        (self.from + step * self.increase).max(1)
    }

    /// `steps * step_duration`, or `None` if that does not fit a [`Duration`].
    pub fn duration(&self) -> Option<Duration> {
        let steps = u128::try_from(self.steps).ok()?;
        let nanos = self.step_duration.as_nanos().checked_mul(steps)?;
        Some(Duration::new(
            u64::try_from(nanos / NANOS_PER_SEC).ok()?,
            (nanos % NANOS_PER_SEC) as u32,
        ))
    }
}

/// Hold `from` for `duration`.
pub fn plain(from: i64, duration: Duration) -> Vec<Segment> {
    vec![Segment {
        from,
        increase: 0,
        steps: 1,
        step_duration: duration,
    }]
}

/// Move from `from` to `to` one unit at a time, spending an equal share of `duration` on
/// every value in between (both ends included).
pub fn line(from: i64, to: i64, duration: Duration) -> Vec<Segment> {
    if from == to {
        return plain(from, duration);
    }
    let steps = (to - from).abs() + 1;
    vec![Segment {
        from,
        increase: (to - from).signum(),
        steps,
        step_duration: Duration::from_nanos(
            u64::try_from(duration.as_nanos() / steps.unsigned_abs() as u128).unwrap_or(u64::MAX),
        ),
    }]
}

/// Run the given segment groups one after the other.
pub fn combine<I>(parts: I) -> Vec<Segment>
where
    I: IntoIterator<Item = Vec<Segment>>,
{
    parts.into_iter().flatten().collect()
}

/// Run the given segment groups one after the other, `times` times over.
pub fn combine_and_repeat<I>(times: usize, parts: I) -> Vec<Segment>
where
    I: IntoIterator<Item = Vec<Segment>>,
{
    let once = combine(parts);
    let mut segments = Vec::with_capacity(once.len() * times);
    for _ in 0..times {
        segments.extend_from_slice(&once);
    }
    segments
}

/// Declarative description of how load intensity changes over time.
///
/// Immutable once handed to a generator. See the module docs for the two flavors.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub kind: ScheduleKind,
    pub start_from: i64,
    #[serde(default)]
    pub increase: i64,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default)]
    pub stage_interval: Duration,
    /// Inclusive upper bound for escalation.
    #[serde(default)]
    pub limit: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<Segment>,
}

impl Schedule {
    /// A constant-rate schedule.
    pub fn rps(start_from: i64) -> Self {
        Self::constant(ScheduleKind::Rps, start_from)
    }

    /// A constant instance-count schedule.
    pub fn instances(start_from: i64) -> Self {
        Self::constant(ScheduleKind::Instances, start_from)
    }

    fn constant(kind: ScheduleKind, start_from: i64) -> Self {
        Self {
            kind,
            start_from,
            increase: 0,
            stage_interval: Duration::ZERO,
            limit: start_from,
            segments: vec![],
        }
    }

    /// Add `increase` every `stage_interval` for as long as the result stays within `limit`.
    ///
    /// # Example
    /// ```
    /// use barrage_core::Schedule;
    /// use std::time::Duration;
    ///
    /// // 1, 2, 3, ... 10 instances, one more every second.
    /// let schedule = Schedule::instances(1).escalate(1, Duration::from_secs(1), 10);
    /// assert_eq!(schedule.next_intensity(9), Some(10));
    /// assert_eq!(schedule.next_intensity(10), None);
    /// ```
    pub fn escalate(mut self, increase: i64, stage_interval: Duration, limit: i64) -> Self {
        self.increase = increase;
        self.stage_interval = stage_interval;
        self.limit = limit;
        self
    }

    /// A schedule walking `segments` in order.
    pub fn segmented(kind: ScheduleKind, segments: Vec<Segment>) -> Result<Self, ScheduleError> {
        let first = segments.first().ok_or(ScheduleError::NoSegments)?;
        Ok(Self {
            kind,
            start_from: first.from,
            increase: 0,
            stage_interval: Duration::ZERO,
            limit: 0,
            segments,
        })
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.start_from <= 0 {
            return Err(ScheduleError::InvalidStartFrom);
        }
        for segment in &self.segments {
            segment.validate()?;
        }
        if self.is_segmented() && self.total_duration().is_none() {
            return Err(ScheduleError::DurationOverflow);
        }
        Ok(())
    }

    pub fn is_segmented(&self) -> bool {
        !self.segments.is_empty()
    }

    /// The value intensity escalates to after `current`, or `None` once escalation is over.
    pub fn next_intensity(&self, current: i64) -> Option<i64> {
        if self.increase == 0 || self.stage_interval.is_zero() {
            return None;
        }
        let next = current.checked_add(self.increase)?;
        if next > self.limit || next <= 0 {
            None
        } else {
            Some(next)
        }
    }

    /// Total length of a segmented schedule. Escalating schedules have no natural end, and a
    /// sum that overflows has none either.
    pub fn total_duration(&self) -> Option<Duration> {
        if !self.is_segmented() {
            return None;
        }
        self.segments
            .iter()
            .try_fold(Duration::ZERO, |total, segment| total.checked_add(segment.duration()?))
    }
}
