use async_trait::async_trait;

use crate::error::Error;

/// Supplies credentials for Helix requests.
///
/// Callers run `ensure_valid` before every request and then decorate the
/// request builder with `apply_auth`.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Refreshes the underlying token if it is missing or about to expire.
    async fn ensure_valid(&self) -> Result<(), Error>;

    /// Adds `Authorization: Bearer ...` and `Client-Id` headers.
    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder;
}
