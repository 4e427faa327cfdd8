use crate::{GeneratorError, Gun, Instance, LoadImpl};
use barrage_core::{
    validate_labels, Labels, Schedule, ScheduleKind, Sink, DEFAULT_CALL_RESULT_BUF_LEN,
    DEFAULT_CALL_TIMEOUT, DEFAULT_GENERATOR_NAME, DEFAULT_RATE_LIMIT_UNIT,
    DEFAULT_SINK_QUEUE_CAPACITY, DEFAULT_STATS_POLL_INTERVAL,
};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::Span;

/// Everything a [`Generator`](crate::Generator) needs to run.
///
/// Build one with [`GeneratorConfig::new`] and the chained setters:
///
/// ```
/// use barrage::prelude::*;
/// use barrage::mock::{MockGun, MockGunConfig};
/// use std::time::Duration;
///
/// let config = GeneratorConfig::new(Schedule::rps(10))
///     .name("checkout")
///     .label("branch", "main")
///     .duration(Duration::from_secs(30))
///     .gun(MockGun::new(MockGunConfig::default()));
/// assert!(Generator::new(config).is_ok());
/// ```
///
/// Zero-valued intervals and capacities are replaced with their defaults when the generator is
/// built.
#[derive(Clone)]
pub struct GeneratorConfig {
    pub name: String,
    pub test_name: String,
    pub labels: Labels,
    pub sink: Option<Arc<dyn Sink>>,
    pub schedule: Schedule,
    /// How long the run lasts; `None` runs until stopped. Segmented schedules default to the
    /// sum of their segments.
    pub duration: Option<Duration>,
    pub stats_poll_interval: Duration,
    pub call_timeout: Duration,
    pub rate_limit_unit: Duration,
    pub sink_queue_capacity: usize,
    pub call_result_buf_len: usize,
    /// Stop the run on the first failed or timed out result.
    pub fail_on_error: bool,
    pub load: Option<LoadImpl>,
    /// Parent span of everything the generator logs.
    pub span: Option<Span>,
    pub shared_data: Option<Arc<dyn Any + Send + Sync>>,
}

impl GeneratorConfig {
    pub fn new(schedule: Schedule) -> Self {
        Self {
            name: DEFAULT_GENERATOR_NAME.to_string(),
            test_name: String::new(),
            labels: Labels::new(),
            sink: None,
            schedule,
            duration: None,
            stats_poll_interval: DEFAULT_STATS_POLL_INTERVAL,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            rate_limit_unit: DEFAULT_RATE_LIMIT_UNIT,
            sink_queue_capacity: DEFAULT_SINK_QUEUE_CAPACITY,
            call_result_buf_len: DEFAULT_CALL_RESULT_BUF_LEN,
            fail_on_error: false,
            load: None,
            span: None,
            shared_data: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn test_name(mut self, test_name: impl Into<String>) -> Self {
        self.test_name = test_name.into();
        self
    }

    pub fn label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }

    pub fn labels(mut self, labels: Labels) -> Self {
        self.labels.extend(labels);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn stats_poll_interval(mut self, interval: Duration) -> Self {
        self.stats_poll_interval = interval;
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn rate_limit_unit(mut self, unit: Duration) -> Self {
        self.rate_limit_unit = unit;
        self
    }

    pub fn sink_queue_capacity(mut self, capacity: usize) -> Self {
        self.sink_queue_capacity = capacity;
        self
    }

    pub fn call_result_buf_len(mut self, len: usize) -> Self {
        self.call_result_buf_len = len;
        self
    }

    pub fn fail_on_error(mut self, fail_on_error: bool) -> Self {
        self.fail_on_error = fail_on_error;
        self
    }

    pub fn gun(mut self, gun: impl Gun) -> Self {
        self.load = Some(LoadImpl::gun(gun));
        self
    }

    pub fn instance(mut self, instance: impl Instance) -> Self {
        self.load = Some(LoadImpl::instance(instance));
        self
    }

    pub fn load(mut self, load: LoadImpl) -> Self {
        self.load = Some(load);
        self
    }

    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn shared_data<T: Any + Send + Sync>(mut self, data: T) -> Self {
        self.shared_data = Some(Arc::new(data));
        self
    }

    pub(crate) fn validate(&self) -> Result<(), GeneratorError> {
        self.schedule.validate()?;
        match (&self.load, self.schedule.kind) {
            (None, _) => return Err(GeneratorError::NoImplementation),
            (Some(LoadImpl::Instance(_)), ScheduleKind::Rps) => return Err(GeneratorError::NoGun),
            (Some(LoadImpl::Gun(_)), ScheduleKind::Instances) => {
                return Err(GeneratorError::NoInstance)
            }
            _ => {}
        }
        validate_labels(&self.labels).map_err(GeneratorError::InvalidLabels)
    }

    pub(crate) fn apply_defaults(&mut self) {
        if self.name.is_empty() {
            self.name = DEFAULT_GENERATOR_NAME.to_string();
        }
        if self.stats_poll_interval.is_zero() {
            self.stats_poll_interval = DEFAULT_STATS_POLL_INTERVAL;
        }
        if self.call_timeout.is_zero() {
            self.call_timeout = DEFAULT_CALL_TIMEOUT;
        }
        if self.rate_limit_unit.is_zero() {
            self.rate_limit_unit = DEFAULT_RATE_LIMIT_UNIT;
        }
        if self.sink_queue_capacity == 0 {
            self.sink_queue_capacity = DEFAULT_SINK_QUEUE_CAPACITY;
        }
        if self.call_result_buf_len == 0 {
            self.call_result_buf_len = DEFAULT_CALL_RESULT_BUF_LEN;
        }
        if self.duration.is_none() {
            self.duration = self.schedule.total_duration();
        }
    }
}

impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("name", &self.name)
            .field("test_name", &self.test_name)
            .field("labels", &self.labels)
            .field("sink", &self.sink.is_some())
            .field("schedule", &self.schedule)
            .field("duration", &self.duration)
            .field("stats_poll_interval", &self.stats_poll_interval)
            .field("call_timeout", &self.call_timeout)
            .field("rate_limit_unit", &self.rate_limit_unit)
            .field("fail_on_error", &self.fail_on_error)
            .field("load", &self.load)
            .finish_non_exhaustive()
    }
}
