// Progress observation stream: read-only events emitted toward an external
// UI. Delivery is advisory; a slow or dropped observer never blocks the
// engine.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::trace;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// One segment reached `done`.
    SegmentCompleted {
        partition_id: usize,
        completed: usize,
        total_segments: usize,
        cumulative_bytes: u64,
        /// `None` until throughput is defined.
        eta_seconds: Option<f64>,
        /// Projected artifact size once enough samples exist.
        estimated_total_bytes: Option<u64>,
    },
    /// A stall was detected and every outstanding fetch was aborted.
    StallRevived { revive_count: u64 },
    /// Terminal: the artifact was assembled.
    Finished {
        artifact_size: u64,
        elapsed_seconds: f64,
    },
    /// Terminal: the job failed.
    Failed { reason: String },
}

/// Non-blocking sender wrapper. Events are dropped when the observer lags
/// or has gone away.
#[derive(Clone)]
pub struct ProgressSink {
    tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressSink {
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx
            && let Err(e) = tx.try_send(event)
        {
            trace!(error = %e, "progress event dropped");
        }
    }
}
