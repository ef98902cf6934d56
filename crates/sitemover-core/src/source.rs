//! Source-system content fetch seam.

use async_trait::async_trait;

use crate::content::ContentStream;
use crate::error::SourceResult;

/// Fetches the bytes behind a descriptor's access URL.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Open a byte stream for `access_url`.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails or the source answers with an error status.
    async fn fetch(&self, access_url: &str) -> SourceResult<ContentStream>;
}
