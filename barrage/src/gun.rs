//! Load implementations
//!
//! A generator drives exactly one of two kinds of target:
//!
//! - a [`Gun`], fired once per permit of the rate limiter (`rps_schedule`), or
//! - an [`Instance`], a long-lived worker whose population follows the schedule
//!   (`instance_schedule`).
use crate::Generator;
use barrage_core::{CallResult, ScheduleKind};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type CallFuture = Pin<Box<dyn Future<Output = CallResult> + Send>>;

/// A single request/response call, fired at the scheduled rate.
///
/// `call` is invoked concurrently from many tasks and must not block. The returned future is
/// raced against the generator's `call_timeout`; if it loses, it is detached and its result is
/// discarded.
///
/// Any `Fn(&Generator) -> impl Future<Output = CallResult>` is a `Gun`.
///
/// # Example
/// ```
/// use barrage::prelude::*;
///
/// struct Ping;
///
/// impl Gun for Ping {
///     fn call(&self, _generator: &Generator) -> CallFuture {
///         Box::pin(async { CallResult::ok("pong") })
///     }
/// }
/// ```
pub trait Gun: Send + Sync + 'static {
    fn call(&self, generator: &Generator) -> CallFuture;
}

impl<F, Fut> Gun for F
where
    F: Fn(&Generator) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallResult> + Send + 'static,
{
    fn call(&self, generator: &Generator) -> CallFuture {
        Box::pin(self(generator))
    }
}

/// A long-lived worker producing a stream of results.
///
/// `run` is called once per unit of added load and should start one worker with
/// [`Generator::spawn_worker`]. The worker reports through [`Generator::submit`] and exits once
/// [`Generator::responses_cancelled`] fires. `stop` is called once per unit of removed load and
/// should make exactly one worker exit.
///
/// Results must carry `started_at`; the generator stamps `finished_at` and `duration`.
pub trait Instance: Send + Sync + 'static {
    fn run(&self, generator: &Generator);

    fn stop(&self, generator: &Generator);
}

/// The load implementation of a generator.
#[derive(Clone)]
pub enum LoadImpl {
    Gun(Arc<dyn Gun>),
    Instance(Arc<dyn Instance>),
}

impl LoadImpl {
    pub fn gun(gun: impl Gun) -> Self {
        LoadImpl::Gun(Arc::new(gun))
    }

    pub fn instance(instance: impl Instance) -> Self {
        LoadImpl::Instance(Arc::new(instance))
    }

    /// The schedule kind this implementation can be driven by.
    pub fn kind(&self) -> ScheduleKind {
        match self {
            LoadImpl::Gun(_) => ScheduleKind::Rps,
            LoadImpl::Instance(_) => ScheduleKind::Instances,
        }
    }
}

impl fmt::Debug for LoadImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadImpl::Gun(_) => f.write_str("LoadImpl::Gun"),
            LoadImpl::Instance(_) => f.write_str("LoadImpl::Instance"),
        }
    }
}
