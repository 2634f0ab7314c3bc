// Origin-override collaborator interface. The engine never disguises
// headers itself; it asks an external capability to make requests toward a
// target origin carry the declared referer (and drop the caller's own
// origin marker), then waits for the override to settle.

use crate::error::DownloadError;
use async_trait::async_trait;
use tracing::debug;
use url::Url;

/// Arrange that subsequent requests to `target`'s origin appear to come
/// from `referer`. The call is acknowledged; callers wait a settle delay
/// after it returns before issuing requests.
#[async_trait]
pub trait OriginOverride: Send + Sync {
    async fn arrange(&self, target: &Url, referer: &str) -> Result<(), DownloadError>;
}

/// Default collaborator for environments with no header-disguise
/// capability: acknowledges immediately and changes nothing.
pub struct NoopOriginOverride;

#[async_trait]
impl OriginOverride for NoopOriginOverride {
    async fn arrange(&self, target: &Url, referer: &str) -> Result<(), DownloadError> {
        debug!(origin = %target.origin().ascii_serialization(), referer, "no origin override available");
        Ok(())
    }
}
