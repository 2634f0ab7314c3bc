// Partitioned download scheduler: contiguous index ranges, one worker per
// partition, join-complete. No reordering and no work stealing after
// assignment; a bounded, predictable concurrency footprint is preferred
// over perfect load balancing.

use crate::config::{FetcherConfig, SchedulerConfig};
use crate::fetcher::{SegmentDownloader, download_with_retries};
use crate::job::JobState;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::segment::{Segment, SegmentOutcome, SegmentState};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info};

/// Split `[0, total)` into at most `workers` contiguous ranges of size
/// `ceil(total / workers)`. Ranges are disjoint, ordered, and cover the
/// full index space exactly once; the last may be shorter, and short jobs
/// produce fewer (never empty) ranges.
pub fn partition_ranges(total: usize, workers: usize) -> Vec<Range<usize>> {
    if total == 0 || workers == 0 {
        return Vec::new();
    }
    let size = total.div_ceil(workers);
    (0..total)
        .step_by(size)
        .map(|start| start..(start + size).min(total))
        .collect()
}

/// Run every partition to completion and return one terminal outcome per
/// segment, merged back into ascending index order. Returns only once all
/// partitions have exhausted their ranges (success or permanent failure).
pub async fn run_partitions(
    job: Arc<JobState>,
    downloader: Arc<dyn SegmentDownloader>,
    segments: Arc<Vec<Segment>>,
    scheduler_cfg: &SchedulerConfig,
    fetcher_cfg: &FetcherConfig,
    sink: &ProgressSink,
) -> Vec<SegmentOutcome> {
    let ranges = partition_ranges(segments.len(), scheduler_cfg.worker_count);
    info!(
        segments = segments.len(),
        partitions = ranges.len(),
        "starting partitioned download"
    );

    let mut workers = FuturesUnordered::new();
    for (partition_id, range) in ranges.into_iter().enumerate() {
        workers.push(run_partition(
            partition_id,
            range,
            Arc::clone(&job),
            Arc::clone(&downloader),
            Arc::clone(&segments),
            fetcher_cfg.clone(),
            sink.clone(),
        ));
    }

    let mut outcomes = Vec::with_capacity(segments.len());
    while let Some(mut partition_outcomes) = workers.next().await {
        outcomes.append(&mut partition_outcomes);
    }
    // Completion order across partitions is unconstrained; index order is
    // restored here and nowhere depends on wall-clock finish order.
    outcomes.sort_by_key(|o| o.index);
    outcomes
}

/// One worker: drives every index of its contiguous range to a terminal
/// state, in order. Segment state is owned by this worker alone.
async fn run_partition(
    partition_id: usize,
    range: Range<usize>,
    job: Arc<JobState>,
    downloader: Arc<dyn SegmentDownloader>,
    segments: Arc<Vec<Segment>>,
    fetcher_cfg: FetcherConfig,
    sink: ProgressSink,
) -> Vec<SegmentOutcome> {
    debug!(partition_id, start = range.start, end = range.end, "partition worker started");
    let mut outcomes = Vec::with_capacity(range.len());

    for index in range {
        let segment = &segments[index];
        let mut state = SegmentState::Pending;

        // The retry loop may abort and reissue attempts many times; the
        // segment stays in-flight for all of them and makes exactly one
        // terminal transition.
        state.advance(SegmentState::InFlight);
        let data = download_with_retries(&job, downloader.as_ref(), segment, &fetcher_cfg).await;
        match data {
            Some(bytes) => {
                let completed = job.record_success(bytes.len() as u64);
                sink.emit(ProgressEvent::SegmentCompleted {
                    partition_id,
                    completed,
                    total_segments: job.total_segments(),
                    cumulative_bytes: job.cumulative_bytes(),
                    eta_seconds: job.eta_seconds(),
                    estimated_total_bytes: job.estimated_total_bytes(),
                });
                state.advance(SegmentState::Done { data: bytes });
            }
            None => state.advance(SegmentState::Failed),
        }

        outcomes.push(SegmentOutcome { index, state });
    }

    debug!(partition_id, "partition worker finished");
    outcomes
}
