// Segment fetching: one bounded, abortable HTTP attempt per call, plus the
// per-segment retry loop with linear backoff and revival crediting.

use crate::config::FetcherConfig;
use crate::error::DownloadError;
use crate::job::JobState;
use crate::segment::Segment;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

/// Raw download of a single segment, abortable through the job's handle
/// registry. Abstracted so the scheduler and coordinator can be exercised
/// without a network.
#[async_trait]
pub trait SegmentDownloader: Send + Sync {
    async fn fetch(&self, url: &Url, token: &CancellationToken) -> Result<Bytes, DownloadError>;
}

pub struct HttpSegmentFetcher {
    client: Client,
    attempt_timeout: Duration,
    referer: String,
}

impl HttpSegmentFetcher {
    pub fn new(client: Client, attempt_timeout: Duration, referer: String) -> Self {
        Self {
            client,
            attempt_timeout,
            referer,
        }
    }
}

fn map_transport_error(e: reqwest::Error) -> DownloadError {
    if e.is_timeout() {
        DownloadError::timeout(format!("segment attempt deadline exceeded: {e}"))
    } else {
        DownloadError::from(e)
    }
}

#[async_trait]
impl SegmentDownloader for HttpSegmentFetcher {
    async fn fetch(&self, url: &Url, token: &CancellationToken) -> Result<Bytes, DownloadError> {
        let request = async {
            let response = self
                .client
                .get(url.clone())
                .header(reqwest::header::REFERER, &self.referer)
                // Total deadline: connect through last body byte.
                .timeout(self.attempt_timeout)
                .send()
                .await
                .map_err(map_transport_error)?;

            let status = response.status();
            if !status.is_success() {
                return Err(DownloadError::http_status(
                    status,
                    url.as_str(),
                    "segment fetch",
                ));
            }
            response.bytes().await.map_err(map_transport_error)
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(DownloadError::Cancelled),
            result = request => result,
        }
    }
}

/// Drive one segment to a terminal state.
///
/// Loops up to `max_attempts`, blocking on pause before each attempt
/// (without consuming one). An abort that lands while the job-wide revive
/// flag is set is credited back: the flag at classification time always
/// wins, even if the per-attempt timeout raced the abort. Every other
/// failure consumes an attempt and waits `attempt x backoff_base` before
/// the next try. Returns `Some(bytes)` on success, `None` when the attempt
/// budget is exhausted and the segment is permanently failed.
pub async fn download_with_retries(
    job: &JobState,
    downloader: &dyn SegmentDownloader,
    segment: &Segment,
    cfg: &FetcherConfig,
) -> Option<Bytes> {
    let mut attempts: u32 = 0;

    while attempts < cfg.max_attempts {
        job.wait_if_paused().await;

        let (handle, token) = job.register_fetch();
        let result = downloader.fetch(&segment.url, &token).await;
        job.deregister_fetch(handle);

        match result {
            Ok(bytes) => {
                trace!(index = segment.index, size = bytes.len(), "segment downloaded");
                return Some(bytes);
            }
            Err(DownloadError::Cancelled) if job.is_reviving() => {
                // Operator-triggered abort: free retry.
                debug!(index = segment.index, "attempt aborted by revival, not charged");
            }
            // An abort that races the revive grace window still charges the
            // attempt, like any transient failure.
            Err(e) if e.is_retryable() || matches!(e, DownloadError::Cancelled) => {
                attempts += 1;
                if attempts >= cfg.max_attempts {
                    warn!(
                        index = segment.index,
                        attempts,
                        error = %e,
                        "segment permanently failed"
                    );
                    return None;
                }
                debug!(
                    index = segment.index,
                    attempt = attempts,
                    max = cfg.max_attempts,
                    error = %e,
                    "segment attempt failed, will retry"
                );
            }
            Err(e) => {
                warn!(index = segment.index, error = %e, "segment failed with non-retryable error");
                return None;
            }
        }

        if attempts > 0 {
            tokio::time::sleep(cfg.backoff_base * attempts).await;
        }
    }

    None
}
