// Shared per-acquisition state. One `JobState` is created when acquisition
// starts, shared by every partition worker, the stall detector and the
// control surface, and dropped once the assembler produces a terminal
// result.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct JobState {
    total_segments: AtomicUsize,
    cumulative_bytes: AtomicU64,
    completed: AtomicUsize,
    revive_count: AtomicU64,
    /// Set while a forced revival is in progress (plus a grace window), so
    /// abort errors landing in worker loops classify as manual.
    manual_revive: AtomicBool,
    paused: watch::Sender<bool>,
    /// Every in-flight fetch registers a cancellation handle here; the stall
    /// detector drains and aborts them all indiscriminately.
    in_flight: Mutex<HashMap<u64, CancellationToken>>,
    next_handle: AtomicU64,
    started_at: Instant,
    first_success: Mutex<Option<Instant>>,
}

impl JobState {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            total_segments: AtomicUsize::new(0),
            cumulative_bytes: AtomicU64::new(0),
            completed: AtomicUsize::new(0),
            revive_count: AtomicU64::new(0),
            manual_revive: AtomicBool::new(false),
            paused,
            in_flight: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(0),
            started_at: Instant::now(),
            first_success: Mutex::new(None),
        }
    }

    pub fn set_total_segments(&self, total: usize) {
        self.total_segments.store(total, Ordering::Relaxed);
    }

    pub fn total_segments(&self) -> usize {
        self.total_segments.load(Ordering::Relaxed)
    }

    pub fn cumulative_bytes(&self) -> u64 {
        self.cumulative_bytes.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn revive_count(&self) -> u64 {
        self.revive_count.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    // --- pause / resume ---

    pub fn pause(&self) {
        if !self.paused.send_replace(true) {
            info!("job paused");
        }
    }

    pub fn resume(&self) {
        if self.paused.send_replace(false) {
            info!("job resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Block until the job is unpaused. Workers call this before issuing an
    /// attempt; an attempt already in flight is never interrupted by pause.
    pub async fn wait_if_paused(&self) {
        let mut rx = self.paused.subscribe();
        while *rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    // --- in-flight handle registry ---

    pub fn register_fetch(&self) -> (u64, CancellationToken) {
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        self.in_flight.lock().insert(id, token.clone());
        (id, token)
    }

    pub fn deregister_fetch(&self, id: u64) {
        self.in_flight.lock().remove(&id);
    }

    pub fn outstanding_fetches(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn is_reviving(&self) -> bool {
        self.manual_revive.load(Ordering::SeqCst)
    }

    // --- accounting ---

    /// Record one segment completion. Returns the new cross-partition
    /// completed count.
    pub fn record_success(&self, bytes: u64) -> usize {
        self.cumulative_bytes.fetch_add(bytes, Ordering::Relaxed);
        self.first_success.lock().get_or_insert_with(Instant::now);
        self.completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Remaining-time estimate in seconds. Undefined (`None`) before the
    /// first completed segment or while throughput is zero.
    pub fn eta_seconds(&self) -> Option<f64> {
        let completed = self.completed() as f64;
        if completed == 0.0 {
            return None;
        }
        let elapsed = self.first_success.lock().as_ref()?.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }
        let throughput = completed / elapsed;
        if throughput <= 0.0 {
            return None;
        }
        let remaining = self.total_segments() as f64 - completed;
        Some(remaining / throughput)
    }

    /// Projected artifact size from the running average chunk size. Only
    /// reported once enough segments completed for the average to mean
    /// something.
    pub fn estimated_total_bytes(&self) -> Option<u64> {
        const MIN_SAMPLES: usize = 5;
        let completed = self.completed();
        if completed < MIN_SAMPLES {
            return None;
        }
        let avg = self.cumulative_bytes() / completed as u64;
        Some(avg * self.total_segments() as u64)
    }

    // --- revival ---

    /// Break a stall: abort every outstanding fetch, holding the
    /// manual-revive flag through a grace window so the resulting abort
    /// errors are classified as manual (free retries) even when they land
    /// after this call returns.
    pub async fn force_revive(&self, grace: Duration) {
        self.manual_revive.store(true, Ordering::SeqCst);
        self.revive_count.fetch_add(1, Ordering::Relaxed);

        let drained: Vec<CancellationToken> = {
            let mut in_flight = self.in_flight.lock();
            in_flight.drain().map(|(_, token)| token).collect()
        };
        info!(aborted = drained.len(), "forced revival: aborting outstanding fetches");
        for token in drained {
            token.cancel();
        }

        tokio::time::sleep(grace).await;
        self.manual_revive.store(false, Ordering::SeqCst);
        debug!("revive grace window closed");
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn pause_blocks_until_resume() {
        let job = Arc::new(JobState::new());
        job.pause();
        assert!(job.is_paused());

        let waiter = {
            let job = Arc::clone(&job);
            tokio::spawn(async move {
                job.wait_if_paused().await;
            })
        };
        // Still paused: the waiter must not have finished yet.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        job.resume();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter released after resume")
            .unwrap();
    }

    #[tokio::test]
    async fn wait_if_paused_returns_immediately_when_running() {
        let job = JobState::new();
        tokio::time::timeout(Duration::from_millis(50), job.wait_if_paused())
            .await
            .expect("no wait while unpaused");
    }

    #[tokio::test]
    async fn force_revive_aborts_outstanding_and_clears_registry() {
        let job = JobState::new();
        let (_, a) = job.register_fetch();
        let (_, b) = job.register_fetch();
        assert_eq!(job.outstanding_fetches(), 2);

        let revive = job.force_revive(Duration::from_millis(10));
        tokio::pin!(revive);
        // The flag must be observable while the grace window is open.
        tokio::select! {
            biased;
            _ = &mut revive => panic!("grace window ended too early"),
            _ = tokio::time::sleep(Duration::from_millis(1)) => {
                assert!(job.is_reviving());
                assert!(a.is_cancelled());
                assert!(b.is_cancelled());
                assert_eq!(job.outstanding_fetches(), 0);
            }
        }
        revive.await;
        assert!(!job.is_reviving());
        assert_eq!(job.revive_count(), 1);
    }

    #[tokio::test]
    async fn eta_is_unknown_before_first_completion() {
        let job = JobState::new();
        job.set_total_segments(10);
        assert_eq!(job.eta_seconds(), None);
    }

    #[tokio::test]
    async fn eta_is_defined_after_completions() {
        let job = JobState::new();
        job.set_total_segments(10);
        job.record_success(1000);
        tokio::time::sleep(Duration::from_millis(20)).await;
        job.record_success(1000);
        let eta = job.eta_seconds().expect("eta defined after completions");
        assert!(eta >= 0.0);
    }

    #[test]
    fn estimated_size_needs_enough_samples() {
        let job = JobState::new();
        job.set_total_segments(20);
        for _ in 0..4 {
            job.record_success(1_000);
        }
        assert_eq!(job.estimated_total_bytes(), None);
        job.record_success(1_000);
        assert_eq!(job.estimated_total_bytes(), Some(20_000));
    }
}
