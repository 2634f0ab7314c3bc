// Segmented-stream acquisition engine: resolves an HLS-style manifest down
// to its media segments, downloads them over fixed contiguous partitions
// with retry and stall revival, and assembles the result in index order.

mod assembler;
pub mod config;
mod coordinator;
pub mod error;
mod fetcher;
mod job;
mod origin;
pub mod playlist;
mod progress;
mod scheduler;
mod segment;
mod stall;

// Re-exports for easier access
pub use config::{
    EngineConfig, FetcherConfig, OverrideConfig, PlaylistConfig, SchedulerConfig, StallConfig,
    VariantSelectionPolicy,
};
pub use coordinator::{DownloadOutcome, DownloadRequest, JobControl, StreamCoordinator};
pub use error::DownloadError;
pub use fetcher::{HttpSegmentFetcher, SegmentDownloader};
pub use origin::{NoopOriginOverride, OriginOverride};
pub use playlist::{HttpManifestSource, Manifest, ManifestKind, ManifestSource, Variant};
pub use progress::ProgressEvent;
pub use segment::{Segment, SegmentOutcome, SegmentState};
