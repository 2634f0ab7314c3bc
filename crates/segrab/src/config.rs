use std::time::Duration;

// --- Playlist Configuration ---

/// How a variant is picked when a master playlist lists several qualities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VariantSelectionPolicy {
    /// Select the variant with the highest bandwidth.
    #[default]
    HighestBandwidth,
    /// An explicit caller choice by label. Always wins over auto-selection.
    Label(String),
}

#[derive(Debug, Clone)]
pub struct PlaylistConfig {
    pub manifest_fetch_timeout: Duration,
    pub variant_selection_policy: VariantSelectionPolicy,
    /// Lines ending in one of these suffixes are decoy entries inserted to
    /// defeat naive scrapers, not media segments. Heuristic, so configurable.
    pub decoy_suffixes: Vec<String>,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            manifest_fetch_timeout: Duration::from_secs(15),
            variant_selection_policy: VariantSelectionPolicy::default(),
            decoy_suffixes: ["html", "css", "js", "png", "jpg", "ico"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

// --- Scheduler Configuration ---

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of contiguous partitions, one worker each. Bounded and fixed
    /// for the life of the job; a slow partition is never rebalanced.
    pub worker_count: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { worker_count: 6 }
    }
}

// --- Fetcher Configuration ---

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Total per-attempt deadline, covering connect through last body byte.
    pub attempt_timeout: Duration,
    /// Maximum attempts per segment before it is marked permanently failed.
    pub max_attempts: u32,
    /// Base for linear backoff: attempt `n` waits `n * backoff_base`.
    pub backoff_base: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(30),
            max_attempts: 10,
            backoff_base: Duration::from_secs(1),
        }
    }
}

// --- Stall Detection Configuration ---

#[derive(Debug, Clone)]
pub struct StallConfig {
    /// Interval between heartbeat samples of the cumulative byte counter.
    pub heartbeat_interval: Duration,
    /// How long the manual-revive flag stays set after a forced abort, so
    /// in-flight abort errors are still classified as manual when they land.
    pub revive_grace: Duration,
}

impl Default for StallConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(15),
            revive_grace: Duration::from_millis(500),
        }
    }
}

// --- Origin Override Configuration ---

#[derive(Debug, Clone)]
pub struct OverrideConfig {
    /// Referer used when the caller does not supply one.
    pub default_referer: String,
    /// Wait after an acknowledged override before issuing requests, to let
    /// the disguise take effect.
    pub settle_delay: Duration,
}

impl Default for OverrideConfig {
    fn default() -> Self {
        Self {
            default_referer: "https://google.com".to_string(),
            settle_delay: Duration::from_millis(500),
        }
    }
}

// --- Top-Level Configuration ---

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub playlist: PlaylistConfig,
    pub scheduler: SchedulerConfig,
    pub fetcher: FetcherConfig,
    pub stall: StallConfig,
    pub override_: OverrideConfig,
}
