//! Delivery of results and stats to a [`Sink`]
use async_channel::{bounded, Receiver, Sender, TrySendError};
use barrage_core::{
    handle_struct, CallResult, GeneratorStats, Labels, Sink, StatsSnapshot, DATA_TYPE_LABEL,
    DATA_TYPE_RESPONSES, DATA_TYPE_STATS,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use time::OffsetDateTime;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

pub(crate) struct Telemetry {
    sink: Arc<dyn Sink>,
    tx: Sender<CallResult>,
    rx: Receiver<CallResult>,
    responses_labels: Labels,
    stats_labels: Labels,
}

impl Telemetry {
    pub fn new(sink: Arc<dyn Sink>, labels: &Labels, capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            sink,
            tx,
            rx,
            responses_labels: with_data_type(labels, DATA_TYPE_RESPONSES),
            stats_labels: with_data_type(labels, DATA_TYPE_STATS),
        }
    }

    /// Queues a result without waiting. A full queue drops the result.
    pub fn enqueue(&self, res: &CallResult, stats: &GeneratorStats) {
        match self.tx.try_send(res.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = stats.sink_dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(dropped, "Sink queue is full, dropping result");
            }
            Err(TrySendError::Closed(_)) => {
                stats.sink_dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Sink queue is closed, dropping result");
            }
        }
    }

    /// Pushes queued results until the queue is closed and empty.
    pub async fn forward_responses(&self) {
        while let Ok(mut res) = self.rx.recv().await {
            let ts = res.finished_at.unwrap_or_else(OffsetDateTime::now_utc);
            res.started_at = None;
            res.finished_at = None;
            if let Err(err) = handle_struct(self.sink.as_ref(), &self.responses_labels, ts, &res)
            {
                error!("Failed to push response to sink: {err}");
            }
        }
        debug!("Sink responses loop exited");
    }

    pub fn push_stats(&self, snapshot: &StatsSnapshot) {
        trace!(?snapshot, "Pushing stats");
        if let Err(err) = handle_struct(
            self.sink.as_ref(),
            &self.stats_labels,
            OffsetDateTime::now_utc(),
            snapshot,
        ) {
            error!("Failed to push stats to sink: {err}");
        }
    }

    /// No more results will be queued after this.
    pub fn close(&self) {
        self.tx.close();
    }

    pub async fn stop_sink(&self) {
        self.sink.stop().await;
    }
}

fn with_data_type(labels: &Labels, data_type: &str) -> Labels {
    let mut labels = labels.clone();
    labels.insert(DATA_TYPE_LABEL.to_string(), data_type.to_string());
    labels
}
