//! Session factories.

use std::sync::Arc;

use tracing::instrument;

use safeguard_core::{ApplianceAddress, Credential, Result};

use crate::management::ManagementSession;
use crate::options::ConnectOptions;
use crate::provider::RstsTokenProvider;
use crate::session::AuthenticationSession;

/// Authenticate `credential` against `appliance` and return a live session.
///
/// # Example
///
/// ```no_run
/// use safeguard_core::{ApplianceAddress, Credential, SecretMaterial, Session};
/// use safeguard_rsts::{ConnectOptions, connect};
///
/// # async fn run() -> safeguard_core::Result<()> {
/// let appliance = ApplianceAddress::new("sg.example.com")?;
/// let credential = Credential::password("admin", SecretMaterial::from("secret"))?;
/// let session = connect(appliance, credential, ConnectOptions::default()).await?;
/// println!("{}s left", session.access_token_lifetime_remaining());
/// # Ok(())
/// # }
/// ```
#[instrument(skip(credential, options), fields(kind = credential.kind()))]
pub async fn connect(
    appliance: ApplianceAddress,
    credential: Credential,
    options: ConnectOptions,
) -> Result<AuthenticationSession> {
    let provider = Arc::new(RstsTokenProvider::new(appliance.clone(), options)?);
    AuthenticationSession::authenticate(appliance, provider, credential).await
}

/// Open an anonymous session for the management service.
pub fn connect_management(appliance: ApplianceAddress) -> ManagementSession {
    ManagementSession::new(appliance)
}
