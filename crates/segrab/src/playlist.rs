// Manifest resolution: playlist fetching, master/media classification,
// variant extraction and media segment listing.

use crate::config::VariantSelectionPolicy;
use crate::error::DownloadError;
use crate::segment::Segment;
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

const MASTER_MARKER: &str = "#EXT-X-STREAM-INF";
const KEY_MARKER: &str = "#EXT-X-KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    /// Lists quality variants, each pointing at its own media playlist.
    Master,
    /// Lists the ordered segment URIs for one quality.
    Media,
}

/// A fetched playlist. Immutable once parsed.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub text: String,
    pub base: Url,
    pub kind: ManifestKind,
    pub fetched_at: Instant,
}

impl Manifest {
    pub fn new(text: String, base: Url) -> Self {
        let kind = if text.contains(MASTER_MARKER) {
            ManifestKind::Master
        } else {
            ManifestKind::Media
        };
        Self {
            text,
            base,
            kind,
            fetched_at: Instant::now(),
        }
    }

    pub fn variants(&self) -> Vec<Variant> {
        parse_master(&self.text, &self.base)
    }

    pub fn segments(&self, decoy_suffixes: &[String]) -> Result<Vec<Segment>, DownloadError> {
        parse_media(&self.text, &self.base, decoy_suffixes)
    }
}

/// One quality variant of a master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// Resolution when declared, otherwise the bandwidth digits.
    pub label: String,
    pub url: Url,
    pub bandwidth: u64,
}

/// Extract quality variants from a master playlist.
///
/// For each `#EXT-X-STREAM-INF` line the variant URI is the next non-blank,
/// non-comment line, scanning forward rather than requiring strict
/// adjacency: some origins interleave blank lines or extra attribute
/// comments between the tag and its URI. Variants with a duplicate label
/// collapse to the first occurrence, preserving master order.
pub fn parse_master(text: &str, base: &Url) -> Vec<Variant> {
    let lines: Vec<&str> = text.lines().collect();
    let mut variants: Vec<Variant> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let line = line.trim();
        if !line.starts_with(MASTER_MARKER) {
            continue;
        }

        let bandwidth = attribute_value(line, "BANDWIDTH=")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        let resolution = attribute_value(line, "RESOLUTION=");
        let label = resolution.unwrap_or_else(|| bandwidth.to_string());

        let Some(uri) = lines[i + 1..]
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty() && !l.starts_with('#'))
        else {
            continue;
        };

        let url = match resolve(base, uri) {
            Some(url) => url,
            None => {
                warn!(uri, "skipping variant with unresolvable URI");
                continue;
            }
        };

        if variants.iter().any(|v| v.label == label) {
            debug!(label, "dropping variant with duplicate label");
            continue;
        }
        variants.push(Variant {
            label,
            url,
            bandwidth,
        });
    }

    variants
}

/// Value of `key` up to the next comma, unquoted. Attribute lists in stream
/// tags are comma-separated `NAME=value` pairs. The key must start its
/// attribute: `BANDWIDTH=` inside `AVERAGE-BANDWIDTH=` does not count.
fn attribute_value(line: &str, key: &str) -> Option<String> {
    let mut from = 0;
    while let Some(offset) = line[from..].find(key) {
        let start = from + offset;
        from = start + key.len();
        if start > 0 && !matches!(line.as_bytes()[start - 1], b':' | b',') {
            continue;
        }
        let rest = &line[from..];
        let end = rest.find(',').unwrap_or(rest.len());
        let value = rest[..end].trim().trim_matches('"');
        return if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        };
    }
    None
}

/// Variants sorted descending by numeric quality, for presenting a choice
/// to a caller. Falls back to master order when any label is non-numeric.
pub fn sorted_for_display(variants: &[Variant]) -> Vec<Variant> {
    let mut sorted = variants.to_vec();
    if sorted.iter().all(|v| v.label.parse::<u64>().is_ok()) {
        sorted.sort_by_key(|v| std::cmp::Reverse(v.label.parse::<u64>().unwrap_or(0)));
    }
    sorted
}

/// Pick a variant per policy. An explicit label choice always wins over
/// auto-selection; auto picks the highest declared bandwidth.
pub fn select_variant<'a>(
    policy: &VariantSelectionPolicy,
    variants: &'a [Variant],
) -> Option<&'a Variant> {
    match policy {
        VariantSelectionPolicy::Label(label) => variants.iter().find(|v| &v.label == label),
        VariantSelectionPolicy::HighestBandwidth => variants.iter().max_by_key(|v| v.bandwidth),
    }
}

/// Extract the ordered segment list from a media playlist.
///
/// Encryption is detected first and is a hard failure: an `#EXT-X-KEY`
/// manifest is never fetched segment by segment. Blank and comment lines
/// are skipped, decoy entries (markup/script/image suffixes inserted to
/// defeat naive scrapers) are rejected, and every surviving line resolves
/// against the manifest URL, preserving line order as index order.
pub fn parse_media(
    text: &str,
    base: &Url,
    decoy_suffixes: &[String],
) -> Result<Vec<Segment>, DownloadError> {
    if text.contains(KEY_MARKER) {
        return Err(DownloadError::EncryptedStream {
            url: base.to_string(),
        });
    }

    let mut segments = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if is_decoy(line, decoy_suffixes) {
            debug!(line, "rejecting decoy playlist entry");
            continue;
        }
        match resolve(base, line) {
            Some(url) => segments.push(Segment {
                index: segments.len(),
                url,
            }),
            None => warn!(line, "skipping unresolvable segment URI"),
        }
    }

    if segments.is_empty() {
        return Err(DownloadError::EmptyManifest {
            url: base.to_string(),
        });
    }
    Ok(segments)
}

fn is_decoy(line: &str, suffixes: &[String]) -> bool {
    let lower = line.to_ascii_lowercase();
    suffixes
        .iter()
        .any(|s| lower.ends_with(&format!(".{}", s.to_ascii_lowercase())))
}

fn resolve(base: &Url, uri: &str) -> Option<Url> {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        Url::parse(uri).ok()
    } else {
        base.join(uri).ok()
    }
}

/// Source of raw playlist text. Abstracted so tests can serve manifests
/// from memory.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn fetch_manifest(&self, url: &Url, referer: &str) -> Result<String, DownloadError>;
}

pub struct HttpManifestSource {
    client: Client,
    timeout: Duration,
}

impl HttpManifestSource {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl ManifestSource for HttpManifestSource {
    async fn fetch_manifest(&self, url: &Url, referer: &str) -> Result<String, DownloadError> {
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::REFERER, referer)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(
                status,
                url.as_str(),
                "manifest fetch",
            ));
        }
        Ok(response.text().await?)
    }
}
