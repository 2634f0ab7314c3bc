// Final assembly: ordered concatenation of every segment that produced
// bytes. Runs once, after every partition has exhausted its range.

use crate::error::DownloadError;
use crate::segment::SegmentOutcome;
use bytes::{Bytes, BytesMut};
use tracing::{info, warn};

/// Concatenate bytes-bearing outcomes in ascending index order. Failed
/// segments contribute nothing: they leave a gap in the stream but never
/// disturb the ordering of the rest. Fails only when no segment survived.
pub fn assemble(outcomes: &[SegmentOutcome]) -> Result<Bytes, DownloadError> {
    let mut sorted: Vec<&SegmentOutcome> = outcomes.iter().collect();
    sorted.sort_by_key(|o| o.index);

    let survivors: Vec<&Bytes> = sorted.iter().filter_map(|o| o.data()).collect();
    if survivors.is_empty() {
        return Err(DownloadError::AllSegmentsFailed {
            total: outcomes.len(),
        });
    }

    let dropped = outcomes.len() - survivors.len();
    if dropped > 0 {
        warn!(dropped, total = outcomes.len(), "assembling with gaps");
    }

    let total_size: usize = survivors.iter().map(|b| b.len()).sum();
    let mut artifact = BytesMut::with_capacity(total_size);
    for bytes in survivors {
        artifact.extend_from_slice(bytes);
    }

    info!(size = artifact.len(), segments = outcomes.len() - dropped, "artifact assembled");
    Ok(artifact.freeze())
}
