// End-to-end acquisition wiring: manifest resolution, variant selection,
// origin-override arrangement, partitioned download with stall detection,
// and final assembly.

use crate::assembler::assemble;
use crate::config::{EngineConfig, VariantSelectionPolicy};
use crate::error::DownloadError;
use crate::fetcher::{HttpSegmentFetcher, SegmentDownloader};
use crate::job::JobState;
use crate::origin::{NoopOriginOverride, OriginOverride};
use crate::playlist::{
    HttpManifestSource, Manifest, ManifestKind, ManifestSource, Variant, select_variant,
    sorted_for_display,
};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::scheduler::run_partitions;
use crate::stall::run_heartbeat;
use bytes::Bytes;
use rustls::{ClientConfig, crypto::ring};
use rustls_platform_verifier::BuilderVerifierExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub manifest_url: Url,
    /// Referring page the requests should appear to come from. Defaults to
    /// the configured neutral referer.
    pub referer: Option<String>,
    pub display_name: Option<String>,
}

impl DownloadRequest {
    pub fn new(manifest_url: Url) -> Self {
        Self {
            manifest_url,
            referer: None,
            display_name: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    /// The assembled stream, held in memory; storage is the caller's job.
    pub artifact: Bytes,
    pub size: u64,
    pub elapsed: Duration,
    pub completed: usize,
    pub failed: usize,
}

/// Operator control surface for a running job. Cheap to clone, usable from
/// any task.
#[derive(Clone)]
pub struct JobControl {
    job: Arc<JobState>,
    sink: ProgressSink,
    revive_grace: Duration,
}

impl JobControl {
    pub fn pause(&self) {
        self.job.pause();
    }

    pub fn resume(&self) {
        self.job.resume();
    }

    /// Identical effect to an automatic stall revival, operator-triggered.
    pub async fn force_revive(&self) {
        self.job.force_revive(self.revive_grace).await;
        self.sink.emit(ProgressEvent::StallRevived {
            revive_count: self.job.revive_count(),
        });
    }

    pub fn is_paused(&self) -> bool {
        self.job.is_paused()
    }
}

pub struct StreamCoordinator {
    config: EngineConfig,
    manifest_source: Option<Arc<dyn ManifestSource>>,
    downloader: Option<Arc<dyn SegmentDownloader>>,
    origin_override: Arc<dyn OriginOverride>,
    job: Arc<JobState>,
    sink: ProgressSink,
    events_rx: Option<mpsc::Receiver<ProgressEvent>>,
}

impl StreamCoordinator {
    pub fn new(config: EngineConfig) -> Self {
        let (sink, events_rx) = ProgressSink::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            manifest_source: None,
            downloader: None,
            origin_override: Arc::new(NoopOriginOverride),
            job: Arc::new(JobState::new()),
            sink,
            events_rx: Some(events_rx),
        }
    }

    pub fn with_manifest_source(mut self, source: Arc<dyn ManifestSource>) -> Self {
        self.manifest_source = Some(source);
        self
    }

    pub fn with_segment_downloader(mut self, downloader: Arc<dyn SegmentDownloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    pub fn with_origin_override(mut self, origin_override: Arc<dyn OriginOverride>) -> Self {
        self.origin_override = origin_override;
        self
    }

    /// Take the progress observation stream. Can be taken once; events
    /// emitted with no live receiver are dropped.
    pub fn events(&mut self) -> Option<mpsc::Receiver<ProgressEvent>> {
        self.events_rx.take()
    }

    pub fn control(&self) -> JobControl {
        JobControl {
            job: Arc::clone(&self.job),
            sink: self.sink.clone(),
            revive_grace: self.config.stall.revive_grace,
        }
    }

    /// Fetch a manifest and surface its deduplicated variant set, sorted
    /// for display, so a caller can make an explicit quality choice before
    /// starting acquisition. Empty for media playlists.
    pub async fn resolve_variants(
        &self,
        manifest_url: &Url,
        referer: Option<&str>,
    ) -> Result<Vec<Variant>, DownloadError> {
        let referer = referer
            .unwrap_or(&self.config.override_.default_referer)
            .to_string();
        self.arrange_override(manifest_url, &referer).await?;
        let source = self.manifest_source()?;
        let text = source.fetch_manifest(manifest_url, &referer).await?;
        let manifest = Manifest::new(text, manifest_url.clone());
        Ok(match manifest.kind {
            ManifestKind::Master => sorted_for_display(&manifest.variants()),
            ManifestKind::Media => Vec::new(),
        })
    }

    /// Run the full acquisition to a terminal result. Emits a terminal
    /// progress event either way.
    ///
    /// Consumes the coordinator: job state (counters, revive history, ETA
    /// baseline) lives exactly as long as one acquisition. Take `events()`
    /// and `control()` before calling.
    pub async fn run(self, request: DownloadRequest) -> Result<DownloadOutcome, DownloadError> {
        let referer = request
            .referer
            .clone()
            .unwrap_or_else(|| self.config.override_.default_referer.clone());
        info!(
            url = %request.manifest_url,
            name = request.display_name.as_deref().unwrap_or("stream"),
            "starting stream acquisition"
        );

        let result = self.acquire(&request.manifest_url, &referer).await;
        match &result {
            Ok(outcome) => {
                self.sink.emit(ProgressEvent::Finished {
                    artifact_size: outcome.size,
                    elapsed_seconds: outcome.elapsed.as_secs_f64(),
                });
                info!(
                    size = outcome.size,
                    completed = outcome.completed,
                    failed = outcome.failed,
                    elapsed_secs = outcome.elapsed.as_secs_f64(),
                    "acquisition finished"
                );
            }
            Err(e) => {
                self.sink.emit(ProgressEvent::Failed {
                    reason: e.to_string(),
                });
                warn!(error = %e, "acquisition failed");
            }
        }
        result
    }

    async fn acquire(
        &self,
        manifest_url: &Url,
        referer: &str,
    ) -> Result<DownloadOutcome, DownloadError> {
        self.arrange_override(manifest_url, referer).await?;

        let source = self.manifest_source()?;
        let text = source.fetch_manifest(manifest_url, referer).await?;
        let manifest = Manifest::new(text, manifest_url.clone());

        let media = self.resolve_media(manifest, source.as_ref(), referer).await?;
        let segments = media.segments(&self.config.playlist.decoy_suffixes)?;
        info!(segments = segments.len(), "media playlist resolved");
        self.job.set_total_segments(segments.len());

        // Media segments are frequently served from a different host than
        // the manifest; the override must cover that origin too.
        if segments[0].url.origin() != manifest_url.origin() {
            self.arrange_override(&segments[0].url, referer).await?;
        }

        let downloader = self.segment_downloader(referer)?;
        let heartbeat_shutdown = CancellationToken::new();
        let heartbeat = tokio::spawn(run_heartbeat(
            Arc::clone(&self.job),
            self.config.stall.clone(),
            self.sink.clone(),
            heartbeat_shutdown.clone(),
        ));

        let outcomes = run_partitions(
            Arc::clone(&self.job),
            downloader,
            Arc::new(segments),
            &self.config.scheduler,
            &self.config.fetcher,
            &self.sink,
        )
        .await;

        heartbeat_shutdown.cancel();
        let _ = heartbeat.await;

        let artifact = assemble(&outcomes)?;
        let completed = outcomes.iter().filter(|o| o.data().is_some()).count();
        Ok(DownloadOutcome {
            size: artifact.len() as u64,
            artifact,
            elapsed: self.job.elapsed(),
            completed,
            failed: outcomes.len() - completed,
        })
    }

    /// Resolve a master playlist down to the media playlist to acquire.
    /// A master with no parseable variant lines is treated as a media
    /// playlist directly.
    async fn resolve_media(
        &self,
        manifest: Manifest,
        source: &dyn ManifestSource,
        referer: &str,
    ) -> Result<Manifest, DownloadError> {
        if manifest.kind != ManifestKind::Master {
            return Ok(manifest);
        }

        let variants = manifest.variants();
        if variants.is_empty() {
            warn!("master marker present but no variants parsed, treating as media playlist");
            return Ok(manifest);
        }

        let policy = &self.config.playlist.variant_selection_policy;
        let Some(variant) = select_variant(policy, &variants) else {
            let VariantSelectionPolicy::Label(label) = policy else {
                return Err(DownloadError::internal("auto-selection over non-empty variants"));
            };
            return Err(DownloadError::VariantNotFound {
                label: label.clone(),
            });
        };
        info!(
            label = %variant.label,
            bandwidth = variant.bandwidth,
            url = %variant.url,
            "variant selected"
        );

        let text = source.fetch_manifest(&variant.url, referer).await?;
        Ok(Manifest::new(text, variant.url.clone()))
    }

    async fn arrange_override(&self, target: &Url, referer: &str) -> Result<(), DownloadError> {
        self.origin_override.arrange(target, referer).await?;
        // Give the acknowledged override time to take effect before any
        // request hits the origin.
        tokio::time::sleep(self.config.override_.settle_delay).await;
        Ok(())
    }

    fn manifest_source(&self) -> Result<Arc<dyn ManifestSource>, DownloadError> {
        if let Some(source) = &self.manifest_source {
            return Ok(Arc::clone(source));
        }
        Ok(Arc::new(HttpManifestSource::new(
            http_client()?,
            self.config.playlist.manifest_fetch_timeout,
        )))
    }

    fn segment_downloader(
        &self,
        referer: &str,
    ) -> Result<Arc<dyn SegmentDownloader>, DownloadError> {
        if let Some(downloader) = &self.downloader {
            return Ok(Arc::clone(downloader));
        }
        let client = http_client()?;
        Ok(Arc::new(HttpSegmentFetcher::new(
            client,
            self.config.fetcher.attempt_timeout,
            referer.to_string(),
        )))
    }
}

fn http_client() -> Result<reqwest::Client, DownloadError> {
    let provider = Arc::new(ring::default_provider());
    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| DownloadError::internal(format!("tls protocol setup: {e}")))?
        .with_platform_verifier()
        .map_err(|e| DownloadError::internal(format!("tls verifier setup: {e}")))?
        .with_no_client_auth();
    reqwest::Client::builder()
        .use_preconfigured_tls(tls_config)
        .build()
        .map_err(DownloadError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FetcherConfig, OverrideConfig, StallConfig};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use reqwest::StatusCode;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Serves manifests out of a url -> body map.
    struct MapManifestSource {
        manifests: HashMap<String, String>,
    }

    impl MapManifestSource {
        fn new(entries: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                manifests: entries
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.to_string()))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl ManifestSource for MapManifestSource {
        async fn fetch_manifest(&self, url: &Url, _referer: &str) -> Result<String, DownloadError> {
            self.manifests
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| {
                    DownloadError::http_status(StatusCode::NOT_FOUND, url.as_str(), "manifest")
                })
        }
    }

    /// Resolves `/segN.ts` paths to a single payload byte of value N; urls
    /// in the deny set always fail with a retryable status error.
    struct IndexPayloadDownloader {
        deny: Vec<usize>,
        calls: AtomicU32,
    }

    impl IndexPayloadDownloader {
        fn new(deny: &[usize]) -> Arc<Self> {
            Arc::new(Self {
                deny: deny.to_vec(),
                calls: AtomicU32::new(0),
            })
        }

        fn index_of(url: &Url) -> usize {
            let name = url.path_segments().and_then(|mut s| s.next_back()).unwrap();
            name.trim_start_matches("seg")
                .trim_end_matches(".ts")
                .parse()
                .unwrap()
        }
    }

    #[async_trait]
    impl SegmentDownloader for IndexPayloadDownloader {
        async fn fetch(
            &self,
            url: &Url,
            _token: &CancellationToken,
        ) -> Result<Bytes, DownloadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let index = Self::index_of(url);
            if self.deny.contains(&index) {
                return Err(DownloadError::http_status(
                    StatusCode::BAD_GATEWAY,
                    url.as_str(),
                    "segment",
                ));
            }
            Ok(Bytes::from(vec![index as u8]))
        }
    }

    /// Records every url the override was arranged for.
    struct RecordingOverride {
        arranged: Mutex<Vec<String>>,
    }

    impl RecordingOverride {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                arranged: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl OriginOverride for RecordingOverride {
        async fn arrange(&self, target: &Url, _referer: &str) -> Result<(), DownloadError> {
            self.arranged.lock().push(target.as_str().to_string());
            Ok(())
        }
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            fetcher: FetcherConfig {
                attempt_timeout: Duration::from_secs(5),
                max_attempts: 3,
                backoff_base: Duration::from_millis(1),
            },
            stall: StallConfig {
                heartbeat_interval: Duration::from_secs(60),
                revive_grace: Duration::from_millis(1),
            },
            override_: OverrideConfig {
                default_referer: "https://google.com".to_string(),
                settle_delay: Duration::from_millis(1),
            },
            ..EngineConfig::default()
        }
    }

    fn media_playlist(host: &str, count: usize) -> String {
        let mut text = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
        for i in 0..count {
            text.push_str("#EXTINF:4.0,\n");
            text.push_str(&format!("https://{host}/media/seg{i}.ts\n"));
        }
        text.push_str("#EXT-X-ENDLIST\n");
        text
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn media_playlist_assembles_in_index_order() {
        let manifest_url = "https://cdn.example.com/live/index.m3u8";
        let source = MapManifestSource::new(&[(manifest_url, &media_playlist("cdn.example.com", 20))]);
        let downloader = IndexPayloadDownloader::new(&[]);
        let mut coordinator = StreamCoordinator::new(fast_config())
            .with_manifest_source(source)
            .with_segment_downloader(downloader.clone());
        let mut events = coordinator.events().unwrap();

        let outcome = coordinator
            .run(DownloadRequest::new(url(manifest_url)))
            .await
            .unwrap();

        assert_eq!(outcome.completed, 20);
        assert_eq!(outcome.failed, 0);
        let expected: Vec<u8> = (0..20).collect();
        assert_eq!(outcome.artifact.as_ref(), expected.as_slice());
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 20);

        let mut saw_finished = false;
        while let Ok(event) = events.try_recv() {
            if let ProgressEvent::Finished { artifact_size, .. } = event {
                assert_eq!(artifact_size, 20);
                saw_finished = true;
            }
        }
        assert!(saw_finished);
    }

    #[tokio::test]
    async fn each_acquisition_starts_with_fresh_job_state() {
        let first_url = "https://cdn.example.com/live/first.m3u8";
        let second_url = "https://cdn.example.com/live/second.m3u8";
        let source = MapManifestSource::new(&[
            (first_url, &media_playlist("cdn.example.com", 20)),
            (second_url, &media_playlist("cdn.example.com", 4)),
        ]);

        let coordinator = StreamCoordinator::new(fast_config())
            .with_manifest_source(Arc::clone(&source) as Arc<dyn ManifestSource>)
            .with_segment_downloader(IndexPayloadDownloader::new(&[]));
        coordinator
            .run(DownloadRequest::new(url(first_url)))
            .await
            .unwrap();

        let mut coordinator = StreamCoordinator::new(fast_config())
            .with_manifest_source(source)
            .with_segment_downloader(IndexPayloadDownloader::new(&[]));
        let mut events = coordinator.events().unwrap();
        let outcome = coordinator
            .run(DownloadRequest::new(url(second_url)))
            .await
            .unwrap();

        // Nothing carried over from the 20-segment run: counters, byte
        // totals and the artifact reflect this acquisition alone.
        assert_eq!(outcome.completed, 4);
        assert_eq!(outcome.size, 4);
        while let Ok(event) = events.try_recv() {
            if let ProgressEvent::SegmentCompleted {
                completed,
                total_segments,
                cumulative_bytes,
                ..
            } = event
            {
                assert!(completed <= 4);
                assert_eq!(total_segments, 4);
                assert!(cumulative_bytes <= 4);
            }
        }
    }

    #[tokio::test]
    async fn master_playlist_resolves_highest_bandwidth_variant() {
        let master_url = "https://cdn.example.com/live/master.m3u8";
        let master = "#EXTM3U\n\
            #EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n\
            https://cdn.example.com/live/low.m3u8\n\
            #EXT-X-STREAM-INF:BANDWIDTH=3000000,RESOLUTION=1920x1080\n\
            https://cdn.example.com/live/high.m3u8\n";
        let source = MapManifestSource::new(&[
            (master_url, master),
            (
                "https://cdn.example.com/live/high.m3u8",
                &media_playlist("cdn.example.com", 4),
            ),
        ]);
        let downloader = IndexPayloadDownloader::new(&[]);
        let coordinator = StreamCoordinator::new(fast_config())
            .with_manifest_source(source)
            .with_segment_downloader(downloader);

        let outcome = coordinator
            .run(DownloadRequest::new(url(master_url)))
            .await
            .unwrap();

        assert_eq!(outcome.completed, 4);
        assert_eq!(outcome.artifact.as_ref(), &[0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn explicit_label_overrides_bandwidth_selection() {
        let master_url = "https://cdn.example.com/live/master.m3u8";
        let master = "#EXTM3U\n\
            #EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n\
            https://cdn.example.com/live/low.m3u8\n\
            #EXT-X-STREAM-INF:BANDWIDTH=3000000,RESOLUTION=1920x1080\n\
            https://cdn.example.com/live/high.m3u8\n";
        let source = MapManifestSource::new(&[
            (master_url, master),
            (
                "https://cdn.example.com/live/low.m3u8",
                &media_playlist("cdn.example.com", 2),
            ),
        ]);
        let mut config = fast_config();
        config.playlist.variant_selection_policy =
            VariantSelectionPolicy::Label("640x360".to_string());
        let coordinator = StreamCoordinator::new(config)
            .with_manifest_source(source)
            .with_segment_downloader(IndexPayloadDownloader::new(&[]));

        let outcome = coordinator
            .run(DownloadRequest::new(url(master_url)))
            .await
            .unwrap();
        assert_eq!(outcome.completed, 2);
    }

    #[tokio::test]
    async fn unknown_label_is_an_error() {
        let master_url = "https://cdn.example.com/live/master.m3u8";
        let master = "#EXTM3U\n\
            #EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n\
            https://cdn.example.com/live/low.m3u8\n";
        let source = MapManifestSource::new(&[(master_url, master)]);
        let mut config = fast_config();
        config.playlist.variant_selection_policy =
            VariantSelectionPolicy::Label("4k".to_string());
        let coordinator = StreamCoordinator::new(config)
            .with_manifest_source(source)
            .with_segment_downloader(IndexPayloadDownloader::new(&[]));

        let err = coordinator
            .run(DownloadRequest::new(url(master_url)))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::VariantNotFound { label } if label == "4k"));
    }

    #[tokio::test]
    async fn encrypted_stream_fails_before_any_segment_fetch() {
        let manifest_url = "https://cdn.example.com/live/index.m3u8";
        let manifest = "#EXTM3U\n\
            #EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"\n\
            #EXTINF:4.0,\n\
            https://cdn.example.com/media/seg0.ts\n";
        let source = MapManifestSource::new(&[(manifest_url, manifest)]);
        let downloader = IndexPayloadDownloader::new(&[]);
        let coordinator = StreamCoordinator::new(fast_config())
            .with_manifest_source(source)
            .with_segment_downloader(downloader.clone());

        let err = coordinator
            .run(DownloadRequest::new(url(manifest_url)))
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::EncryptedStream { .. }));
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn permanently_failed_segment_does_not_sink_the_job() {
        let manifest_url = "https://cdn.example.com/live/index.m3u8";
        let source = MapManifestSource::new(&[(manifest_url, &media_playlist("cdn.example.com", 8))]);
        let downloader = IndexPayloadDownloader::new(&[3]);
        let coordinator = StreamCoordinator::new(fast_config())
            .with_manifest_source(source)
            .with_segment_downloader(downloader.clone());

        let outcome = coordinator
            .run(DownloadRequest::new(url(manifest_url)))
            .await
            .unwrap();

        assert_eq!(outcome.completed, 7);
        assert_eq!(outcome.failed, 1);
        // Segment 3 exhausted its attempt budget and is simply absent.
        assert_eq!(outcome.artifact.as_ref(), &[0, 1, 2, 4, 5, 6, 7]);
        // 7 successes plus 3 attempts on the denied segment.
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn fails_when_every_segment_fails() {
        let manifest_url = "https://cdn.example.com/live/index.m3u8";
        let source = MapManifestSource::new(&[(manifest_url, &media_playlist("cdn.example.com", 3))]);
        let mut coordinator = StreamCoordinator::new(fast_config())
            .with_manifest_source(source)
            .with_segment_downloader(IndexPayloadDownloader::new(&[0, 1, 2]));
        let mut events = coordinator.events().unwrap();

        let err = coordinator
            .run(DownloadRequest::new(url(manifest_url)))
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::AllSegmentsFailed { total: 3 }));
        let mut saw_failed = false;
        while let Ok(event) = events.try_recv() {
            saw_failed |= matches!(event, ProgressEvent::Failed { .. });
        }
        assert!(saw_failed);
    }

    #[tokio::test]
    async fn override_covers_segment_origin_when_it_differs() {
        let manifest_url = "https://playlist.example.com/live/index.m3u8";
        let source = MapManifestSource::new(&[(
            manifest_url,
            &media_playlist("media.example.net", 2),
        )]);
        let origin_override = RecordingOverride::new();
        let coordinator = StreamCoordinator::new(fast_config())
            .with_manifest_source(source)
            .with_segment_downloader(IndexPayloadDownloader::new(&[]))
            .with_origin_override(origin_override.clone());

        coordinator
            .run(DownloadRequest::new(url(manifest_url)))
            .await
            .unwrap();

        let arranged = origin_override.arranged.lock().clone();
        assert_eq!(
            arranged,
            vec![
                manifest_url.to_string(),
                "https://media.example.net/media/seg0.ts".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn same_origin_segments_arrange_the_override_once() {
        let manifest_url = "https://cdn.example.com/live/index.m3u8";
        let source = MapManifestSource::new(&[(manifest_url, &media_playlist("cdn.example.com", 2))]);
        let origin_override = RecordingOverride::new();
        let coordinator = StreamCoordinator::new(fast_config())
            .with_manifest_source(source)
            .with_segment_downloader(IndexPayloadDownloader::new(&[]))
            .with_origin_override(origin_override.clone());

        coordinator
            .run(DownloadRequest::new(url(manifest_url)))
            .await
            .unwrap();

        assert_eq!(origin_override.arranged.lock().len(), 1);
    }

    #[tokio::test]
    async fn resolve_variants_lists_master_qualities_sorted() {
        let master_url = "https://cdn.example.com/live/master.m3u8";
        let master = "#EXTM3U\n\
            #EXT-X-STREAM-INF:BANDWIDTH=800000\n\
            https://cdn.example.com/live/low.m3u8\n\
            #EXT-X-STREAM-INF:BANDWIDTH=3000000\n\
            https://cdn.example.com/live/high.m3u8\n";
        let source = MapManifestSource::new(&[(master_url, master)]);
        let coordinator = StreamCoordinator::new(fast_config()).with_manifest_source(source);

        let variants = coordinator
            .resolve_variants(&url(master_url), None)
            .await
            .unwrap();
        let labels: Vec<&str> = variants.iter().map(|v| v.label.as_str()).collect();
        assert_eq!(labels, vec!["3000000", "800000"]);
    }
}
