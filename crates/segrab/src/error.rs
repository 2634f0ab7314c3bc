use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// An in-flight fetch was aborted by a stall revival (automatic or
    /// operator-triggered). Never fatal; the affected attempt is free.
    #[error("fetch aborted by revival")]
    Cancelled,

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("request failed with HTTP {status} during {operation} for {url}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        operation: &'static str,
    },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("attempt timed out: {reason}")]
    Timeout { reason: String },

    #[error("stream is encrypted (`#EXT-X-KEY`): {url}")]
    EncryptedStream { url: String },

    #[error("no media segments found in playlist {url}")]
    EmptyManifest { url: String },

    #[error("no variant labeled `{label}` in master playlist")]
    VariantNotFound { label: String },

    #[error("all {total} segments failed permanently")]
    AllSegmentsFailed { total: usize },

    #[error("origin override failed: {reason}")]
    OriginOverride { reason: String },

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl DownloadError {
    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn http_status(
        status: StatusCode,
        url: impl Into<String>,
        operation: &'static str,
    ) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
            operation,
        }
    }

    pub fn timeout(reason: impl Into<String>) -> Self {
        Self::Timeout {
            reason: reason.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Whether a segment attempt that failed with this error may be retried
    /// against the segment's attempt budget. `Cancelled` is handled separately
    /// by the fetch loop (retried without charging an attempt).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Cancelled => false,
            Self::InvalidUrl { .. }
            | Self::EncryptedStream { .. }
            | Self::EmptyManifest { .. }
            | Self::VariantNotFound { .. }
            | Self::AllSegmentsFailed { .. }
            | Self::OriginOverride { .. }
            | Self::Internal { .. } => false,
            // Any HTTP status counts as a transient segment failure: origins
            // that need the referer disguise often answer 403 until the
            // override settles.
            Self::HttpStatus { .. } | Self::Network { .. } | Self::Timeout { .. } => true,
        }
    }
}
