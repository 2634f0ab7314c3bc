// Stall detection: a heartbeat that samples the job's cumulative byte
// counter and forces a revival when nothing moved while work is
// outstanding.

use crate::config::StallConfig;
use crate::job::JobState;
use crate::progress::{ProgressEvent, ProgressSink};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Run the heartbeat until `shutdown` fires.
///
/// Each tick compares cumulative bytes against the previous sample. A
/// paused job, an idle job, or any byte growth just refreshes the snapshot.
/// Unchanged bytes with outstanding fetches is a stall: every in-flight
/// handle is aborted at no retry-budget cost, exactly once per tick.
pub async fn run_heartbeat(
    job: Arc<JobState>,
    cfg: StallConfig,
    sink: ProgressSink,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(cfg.heartbeat_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of `interval` fires immediately; consume it so the
    // first real comparison happens a full interval in.
    interval.tick().await;

    let mut last_bytes = job.cumulative_bytes();
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!("heartbeat stopped");
                return;
            }
            _ = interval.tick() => {}
        }

        let bytes = job.cumulative_bytes();
        let outstanding = job.outstanding_fetches();

        if job.is_paused() || outstanding == 0 || bytes > last_bytes {
            last_bytes = bytes;
            continue;
        }

        warn!(
            bytes,
            outstanding,
            "no bytes received since last heartbeat, forcing revival"
        );
        job.force_revive(cfg.revive_grace).await;
        sink.emit(ProgressEvent::StallRevived {
            revive_count: job.revive_count(),
        });
        info!(revive_count = job.revive_count(), "stall revival complete");
        last_bytes = job.cumulative_bytes();
    }
}
