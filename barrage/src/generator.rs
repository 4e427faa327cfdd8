//! The load generator
use crate::collector::ResponseData;
use crate::config::GeneratorConfig;
use crate::error::GeneratorError;
use crate::gun::{Gun, LoadImpl};
use crate::limiter::rate_limiter;
use crate::telemetry::Telemetry;
use arc_swap::ArcSwap;
use barrage_core::{
    CallResult, GeneratorStats, Schedule, ScheduleKind, GENERATOR_NAME_LABEL, TEST_NAME_LABEL,
};
use governor::DefaultDirectRateLimiter;
use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tokio_util::task::TaskTracker;
#[allow(unused)]
use tracing::{debug, error, info, info_span, trace, warn, Instrument, Span};

/// A cancellation token and the tasks it governs.
#[derive(Default)]
struct Scope {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl Scope {
    async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

struct Inner {
    config: GeneratorConfig,
    load: LoadImpl,
    span: Span,
    stats: GeneratorStats,
    data: Arc<ResponseData>,
    errors: Mutex<Vec<String>>,
    limiter: Arc<ArcSwap<DefaultDirectRateLimiter>>,
    telemetry: Option<Telemetry>,
    results_tx: mpsc::Sender<CallResult>,
    results_rx: Mutex<Option<mpsc::Receiver<CallResult>>>,
    collector: Mutex<Option<JoinHandle<()>>>,
    /// Whole run. Cancelled at the deadline, on `stop()` or on the first error with
    /// `fail_on_error`.
    responses: Scope,
    /// Result draining and sink delivery. Cancelled only after `responses` drained.
    data_scope: Scope,
    started: AtomicBool,
    finalized: OnceCell<()>,
}

/// Handle to a load generator.
///
/// Cheap to clone; every clone drives the same run.
///
/// # Example
/// ```no_run
/// use barrage::prelude::*;
/// use barrage::mock::{MockGun, MockGunConfig};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), GeneratorError> {
///     let generator = Generator::new(
///         GeneratorConfig::new(Schedule::rps(100))
///             .duration(Duration::from_secs(10))
///             .gun(MockGun::new(MockGunConfig::default())),
///     )?;
///     generator.run()?;
///     let (data, failed) = generator.wait().await;
///     println!("{} ok, failed: {failed}", data.ok_len());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Generator {
    inner: Arc<Inner>,
}

impl Generator {
    /// Validates `config` and prepares a generator. Nothing runs until [`Generator::run`].
    pub fn new(mut config: GeneratorConfig) -> Result<Self, GeneratorError> {
        config.validate()?;
        config.apply_defaults();
        let load = config
            .load
            .clone()
            .ok_or(GeneratorError::NoImplementation)?;

        let span = match &config.span {
            Some(parent) => info_span!(
                parent: parent,
                "generator",
                name = %config.name,
                test = %config.test_name
            ),
            None => info_span!("generator", name = %config.name, test = %config.test_name),
        };

        let mut labels = config.labels.clone();
        labels.insert(GENERATOR_NAME_LABEL.to_string(), config.name.clone());
        if !config.test_name.is_empty() {
            labels.insert(TEST_NAME_LABEL.to_string(), config.test_name.clone());
        }
        let telemetry = config
            .sink
            .clone()
            .map(|sink| Telemetry::new(sink, &labels, config.sink_queue_capacity));

        let limiter = rate_limiter(config.schedule.start_from, config.rate_limit_unit);
        let (results_tx, results_rx) = mpsc::channel(config.call_result_buf_len);

        Ok(Self {
            inner: Arc::new(Inner {
                load,
                span,
                stats: GeneratorStats::default(),
                data: Arc::new(ResponseData::default()),
                errors: Mutex::new(vec![]),
                limiter: Arc::new(ArcSwap::from_pointee(limiter)),
                telemetry,
                results_tx,
                results_rx: Mutex::new(Some(results_rx)),
                collector: Mutex::new(None),
                responses: Scope::default(),
                data_scope: Scope::default(),
                started: AtomicBool::new(false),
                finalized: OnceCell::new(),
                config,
            }),
        })
    }

    /// Starts the run and returns immediately.
    ///
    /// Must be called from within a tokio runtime, and only once.
    pub fn run(&self) -> Result<(), GeneratorError> {
        Handle::try_current().map_err(|_| GeneratorError::NoRuntime)?;
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return Err(GeneratorError::AlreadyRunning);
        }

        let config = &self.inner.config;
        let _enter = self.inner.span.enter();
        info!(
            schedule = %config.schedule.kind,
            start_from = config.schedule.start_from,
            duration = %config
                .duration
                .map(|d| humantime::format_duration(d).to_string())
                .unwrap_or_else(|| "until stopped".to_string()),
            "Load generator started"
        );

        if let Some(duration) = config.duration {
            self.spawn_responses(self.clone().deadline(duration));
        }
        self.spawn_responses(self.clone().print_stats());
        if self.inner.telemetry.is_some() {
            self.spawn_data(self.clone().forward_responses());
            self.spawn_data(self.clone().push_stats());
        }

        self.set_intensity(config.schedule.start_from);
        match &self.inner.load {
            LoadImpl::Gun(gun) => {
                self.spawn_responses(self.clone().dispatch(gun.clone()));
            }
            LoadImpl::Instance(_) => {
                let rx = self
                    .inner
                    .results_rx
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                if let Some(rx) = rx {
                    let handle = self.spawn_data(self.clone().collect_results(rx));
                    *self
                        .inner
                        .collector
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner) = Some(handle);
                }
            }
        }
        self.spawn_responses(self.clone().run_schedule());

        Ok(())
    }

    /// Stops the run and waits for it to drain. Calling it more than once is harmless.
    pub async fn stop(&self) -> (Arc<ResponseData>, bool) {
        if !self.inner.stats.run_stopped.swap(true, Ordering::AcqRel) {
            info!(parent: &self.inner.span, "Stopping load generator");
        }
        self.inner.responses.token.cancel();
        self.wait().await
    }

    /// Waits for the run to end, every in-flight call to settle and the sink to flush.
    ///
    /// Returns the collected data and whether any call failed or timed out.
    ///
    /// Before [`Generator::run`] this returns right away and leaves the generator runnable.
    pub async fn wait(&self) -> (Arc<ResponseData>, bool) {
        if !self.inner.started.load(Ordering::Acquire) {
            warn!(parent: &self.inner.span, "wait() called before run()");
            return (
                self.inner.data.clone(),
                self.inner.stats.run_failed.load(Ordering::Acquire),
            );
        }
        info!(parent: &self.inner.span, "Waiting for all responses to finish");
        self.inner.responses.wait().await;
        self.inner
            .finalized
            .get_or_init(|| self.finalize().instrument(self.inner.span.clone()))
            .await;
        (
            self.inner.data.clone(),
            self.inner.stats.run_failed.load(Ordering::Acquire),
        )
    }

    async fn finalize(&self) {
        if let Some(telemetry) = &self.inner.telemetry {
            telemetry.push_stats(&self.inner.stats.snapshot());
        }
        self.inner.data_scope.token.cancel();

        let collector = self
            .inner
            .collector
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(collector) = collector {
            if let Err(err) = collector.await {
                error!("Results collector failed: {err}");
            }
        }

        if let Some(telemetry) = &self.inner.telemetry {
            telemetry.close();
        }
        self.inner.data_scope.wait().await;
        if let Some(telemetry) = &self.inner.telemetry {
            telemetry.stop_sink().await;
        }

        let stats = self.inner.stats.snapshot();
        info!(
            success = stats.success,
            failed = stats.failed,
            call_timeout = stats.call_timeout,
            "Load generator finished"
        );
    }

    /// Keeps the schedule running but stops firing calls.
    pub fn pause(&self) {
        self.inner.stats.run_paused.store(true, Ordering::Release);
        info!(parent: &self.inner.span, "Load generator paused");
    }

    pub fn resume(&self) {
        self.inner.stats.run_paused.store(false, Ordering::Release);
        info!(parent: &self.inner.span, "Load generator resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.inner.stats.run_paused.load(Ordering::Acquire)
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn schedule(&self) -> &Schedule {
        &self.inner.config.schedule
    }

    pub fn stats(&self) -> &GeneratorStats {
        &self.inner.stats
    }

    pub fn data(&self) -> Arc<ResponseData> {
        self.inner.data.clone()
    }

    /// Error strings of every failed or timed out result, in the order they were accounted.
    pub fn errors(&self) -> Vec<String> {
        self.inner
            .errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The value passed to [`GeneratorConfig::shared_data`], if it is a `T`.
    pub fn shared_data<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner.config.shared_data.clone()?.downcast::<T>().ok()
    }

    /// Spawns an instance worker. The run does not end until every worker returned.
    pub fn spawn_worker<F>(&self, worker: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn_responses(worker)
    }

    /// Hands a result produced by an instance worker over for accounting.
    ///
    /// Gun calls are accounted from their return value, so results submitted under the gun
    /// model are dropped.
    pub async fn submit(&self, res: CallResult) {
        match &self.inner.load {
            LoadImpl::Instance(_) => {
                if self.inner.results_tx.send(res).await.is_err() {
                    warn!(parent: &self.inner.span, "Results channel closed, dropping result");
                }
            }
            LoadImpl::Gun(_) => {
                warn!(parent: &self.inner.span, "submit() is for instances, ignoring gun result");
            }
        }
    }

    /// Resolves once the run is over and workers should return.
    pub fn responses_cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.inner.responses.token.cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.responses.token.is_cancelled()
    }

    fn spawn_responses<F>(&self, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner
            .responses
            .tracker
            .spawn(fut.instrument(self.inner.span.clone()))
    }

    fn spawn_data<F>(&self, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner
            .data_scope
            .tracker
            .spawn(fut.instrument(self.inner.span.clone()))
    }

    async fn deadline(self, duration: Duration) {
        let token = &self.inner.responses.token;
        tokio::select! {
            _ = tokio::time::sleep(duration) => {
                info!("Run duration of {} elapsed", humantime::format_duration(duration));
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    }

    async fn dispatch(self, gun: Arc<dyn Gun>) {
        let token = self.inner.responses.token.clone();
        loop {
            let limiter = self.inner.limiter.load_full();
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = limiter.until_ready() => {
                    if !self.is_paused() {
                        self.paced_call(&gun);
                    }
                }
            }
        }
        info!("RPS generator stopped");
    }

    fn paced_call(&self, gun: &Arc<dyn Gun>) {
        let start = Instant::now();
        let started_at = OffsetDateTime::now_utc();
        let call = tokio::spawn(gun.call(self).in_current_span());

        let generator = self.clone();
        let call_timeout = self.inner.config.call_timeout;
        self.inner.responses.tracker.spawn(
            async move {
                let mut res = match tokio::time::timeout(call_timeout, call).await {
                    Ok(Ok(res)) => res,
                    Ok(Err(err)) => CallResult::error(format!("gun call panicked: {err}")),
                    // Dropping the handle detaches the call
                    Err(_) => CallResult::timed_out(),
                };
                res.started_at.get_or_insert(started_at);
                res.finished_at = Some(OffsetDateTime::now_utc());
                res.duration = start.elapsed();
                generator.handle_call_result(res);
            }
            .in_current_span(),
        );
    }

    async fn collect_results(self, mut rx: mpsc::Receiver<CallResult>) {
        let token = self.inner.data_scope.token.clone();
        loop {
            tokio::select! {
                biased;
                Some(res) = rx.recv() => self.account_instance_result(res),
                _ = token.cancelled() => break,
            }
        }
        while let Ok(res) = rx.try_recv() {
            self.account_instance_result(res);
        }
        info!("Collect data exited");
    }

    fn account_instance_result(&self, mut res: CallResult) {
        let now = OffsetDateTime::now_utc();
        res.finished_at = Some(now);
        match res.started_at {
            Some(started_at) => res.duration = (now - started_at).unsigned_abs(),
            None => error!("started_at is not set in the instance implementation"),
        }
        self.handle_call_result(res);
    }

    /// Accounts one result. Every result of a run passes through here exactly once.
    pub(crate) fn handle_call_result(&self, res: CallResult) {
        let inner = &self.inner;
        if let Some(telemetry) = &inner.telemetry {
            telemetry.enqueue(&res, &inner.stats);
        }

        #[cfg(feature = "metrics")]
        {
            let outcome = if res.is_ok() {
                "success"
            } else if res.timeout {
                "timeout"
            } else {
                "failed"
            };
            metrics::counter!(
                "barrage_calls_total",
                "generator" => inner.config.name.clone(),
                "outcome" => outcome
            )
            .increment(1);
            metrics::histogram!("barrage_call_duration_seconds", "generator" => inner.config.name.clone())
                .record(res.duration.as_secs_f64());
        }

        if res.is_ok() {
            inner.stats.success.fetch_add(1, Ordering::Relaxed);
            inner.data.record(res);
            return;
        }

        inner.stats.run_failed.store(true, Ordering::Release);
        if res.timeout {
            inner.stats.call_timeout.fetch_add(1, Ordering::Relaxed);
            debug!("Call timed out after {}", humantime::format_duration(res.duration));
        } else {
            inner.stats.failed.fetch_add(1, Ordering::Relaxed);
            error!(err = %res.error, "load generator request failed");
        }
        inner
            .errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(res.error.clone());
        inner.data.record(res);

        if inner.config.fail_on_error && !inner.responses.token.is_cancelled() {
            warn!("Stopping on first error");
            inner.responses.token.cancel();
        }
    }

    async fn print_stats(self) {
        let period = self.inner.config.stats_poll_interval;
        let token = self.inner.responses.token.clone();
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let stats = self.inner.stats.snapshot();
                    info!(
                        success = stats.success,
                        failed = stats.failed,
                        call_timeout = stats.call_timeout,
                        rps = stats.current_rps,
                        instances = stats.current_instances,
                        "Load stats"
                    );
                }
            }
        }
        info!("Stats loop exited");
    }

    async fn forward_responses(self) {
        if let Some(telemetry) = &self.inner.telemetry {
            telemetry.forward_responses().await;
        }
    }

    async fn push_stats(self) {
        let Some(telemetry) = &self.inner.telemetry else {
            return;
        };
        let period = self.inner.config.stats_poll_interval;
        let token = self.inner.data_scope.token.clone();
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => telemetry.push_stats(&self.inner.stats.snapshot()),
            }
        }
        debug!("Sink stats loop exited");
    }

    /// Sleeps for `duration` unless the run ends first. Returns `false` if it did.
    async fn sleep_or_cancel(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.inner.responses.token.cancelled() => false,
        }
    }

    async fn run_schedule(self) {
        let schedule = self.inner.config.schedule.clone();
        if schedule.is_segmented() {
            self.run_segments(&schedule).await;
        } else {
            self.run_escalation(&schedule).await;
        }
        info!("Scheduler exited");
    }

    async fn run_escalation(&self, schedule: &Schedule) {
        let mut current = schedule.start_from;
        loop {
            let Some(next) = schedule.next_intensity(current) else {
                debug!(current, "Schedule reached its limit");
                return;
            };
            if !self.sleep_or_cancel(schedule.stage_interval).await {
                return;
            }
            self.set_intensity(next);
            current = next;
        }
    }

    async fn run_segments(&self, schedule: &Schedule) {
        for (idx, segment) in schedule.segments.iter().enumerate() {
            self.inner
                .stats
                .current_segment
                .store(idx as i64, Ordering::Relaxed);
            for step in 0..segment.steps.max(1) {
                self.set_intensity(segment.intensity_at(step));
                debug!(segment = idx, step, "Scheduler step");
                if step < segment.steps && !self.sleep_or_cancel(segment.step_duration).await {
                    return;
                }
            }
        }
        info!("Finished all schedule segments");
    }

    /// Moves the load to `target` requests per unit or running instances.
    fn set_intensity(&self, target: i64) {
        let target = target.max(1);
        let stats = &self.inner.stats;
        match (&self.inner.load, self.inner.config.schedule.kind) {
            (LoadImpl::Gun(_), ScheduleKind::Rps) => {
                let current = stats.current_rps.swap(target, Ordering::AcqRel);
                if current != target && current != 0 {
                    self.inner.limiter.store(Arc::new(rate_limiter(
                        target,
                        self.inner.config.rate_limit_unit,
                    )));
                    info!(rps = target, "RPS changed");
                }
            }
            (LoadImpl::Instance(instance), ScheduleKind::Instances) => {
                let current = stats.current_instances.load(Ordering::Acquire);
                if target > current {
                    for _ in current..target {
                        instance.run(self);
                    }
                } else {
                    for _ in target..current {
                        instance.stop(self);
                    }
                }
                stats.current_instances.store(target, Ordering::Release);
                if current != target {
                    info!(instances = target, "Instances changed");
                }
            }
            _ => error!("Load implementation does not match the schedule"),
        }
    }
}
