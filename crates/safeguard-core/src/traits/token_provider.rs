//! Token provider trait.

use async_trait::async_trait;

use crate::types::ProviderScope;
use crate::{AccessToken, Credential, Result};

/// Exchanges a credential for an access token.
///
/// Providers do not cache; every call performs the exchange.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Resolve the scope a credential authenticates with.
    ///
    /// Credentials without a named provider use the default scope for their
    /// kind; a named provider is looked up on the appliance.
    async fn resolve_scope(&self, credential: &Credential) -> Result<ProviderScope>;

    /// Authenticate and return a fresh token.
    ///
    /// When `scope` is `None` it is resolved with
    /// [`TokenProvider::resolve_scope`] first.
    async fn authenticate(
        &self,
        credential: &Credential,
        scope: Option<&ProviderScope>,
    ) -> Result<AccessToken>;
}
