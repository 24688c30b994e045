//! Authenticated session trait.

use async_trait::async_trait;

use crate::types::ApplianceAddress;
use crate::{AccessToken, Result};

/// A session holding the current access token for one identity.
///
/// Implementations keep the token behind a short, synchronous swap so that a
/// reader concurrent with [`Session::refresh_access_token`] sees either the
/// old or the new token, never a mix.
#[async_trait]
pub trait Session: Send + Sync {
    /// Returns the appliance this session authenticates against.
    fn appliance(&self) -> &ApplianceAddress;

    /// Returns a copy of the last obtained token without network I/O.
    ///
    /// `None` if the session never authenticated or has been disposed.
    fn access_token(&self) -> Option<AccessToken>;

    /// Whole seconds of token lifetime left, clamped at zero.
    ///
    /// Zero means the token must be refreshed before use.
    fn access_token_lifetime_remaining(&self) -> u64;

    /// Obtain a new token with the stored credential and swap it in.
    async fn refresh_access_token(&self) -> Result<()>;

    /// Duplicate this session into an independent one.
    ///
    /// The copy owns its own credential material and token; disposing either
    /// one leaves the other untouched.
    fn try_clone(&self) -> Result<Self>
    where
        Self: Sized;

    /// Wipe the credential and token. Safe to call more than once.
    fn dispose(&self);

    /// Returns true once [`Session::dispose`] has been called.
    fn is_disposed(&self) -> bool;
}
