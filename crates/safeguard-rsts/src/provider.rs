//! Token provider backed by the appliance token service.

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use safeguard_core::error::{AuthError, InvalidInputError};
use safeguard_core::traits::TokenProvider;
use safeguard_core::types::{CERTIFICATE_PROVIDER_ID, LOCAL_PROVIDER_ID, ProviderScope};
use safeguard_core::{AccessToken, ApplianceAddress, Credential, Error, Result};

use crate::certificates::client_certificate;
use crate::client::RstsClient;
use crate::endpoints::TokenRequest;
use crate::options::ConnectOptions;

/// Exchanges credentials for access tokens over HTTPS.
///
/// Certificate credentials use the `client_credentials` grant with the
/// certificate presented on the TLS connection. Password credentials use the
/// `password` grant.
#[derive(Debug, Clone)]
pub struct RstsTokenProvider {
    client: RstsClient,
}

impl RstsTokenProvider {
    /// Create a provider for the given appliance.
    pub fn new(appliance: ApplianceAddress, options: ConnectOptions) -> Result<Self> {
        Ok(Self {
            client: RstsClient::new(appliance, options)?,
        })
    }

    /// Returns the appliance this provider authenticates against.
    pub fn appliance(&self) -> &ApplianceAddress {
        self.client.appliance()
    }

    /// Look up `name` among the appliance's identity providers.
    ///
    /// Any failure to obtain a usable provider list (other than the network
    /// being unreachable) reads as "no such provider".
    #[instrument(skip(self))]
    async fn lookup_scope(&self, name: &str) -> Result<ProviderScope> {
        let providers = match self.client.lookup_providers().await {
            Ok(providers) => providers,
            Err(e @ Error::Transport(_)) => return Err(e),
            Err(e) => {
                warn!(error = %e, "Identity provider lookup failed");
                Vec::new()
            }
        };

        match providers.iter().find(|p| p.matches(name)) {
            Some(provider) => {
                debug!(id = %provider.id, "Resolved identity provider");
                Ok(ProviderScope::for_provider_id(&provider.id))
            }
            None => Err(AuthError::UnknownProvider {
                provider: name.to_string(),
                available: providers.into_iter().map(|p| p.id).collect(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl TokenProvider for RstsTokenProvider {
    async fn resolve_scope(&self, credential: &Credential) -> Result<ProviderScope> {
        let Some(name) = credential.provider() else {
            return Ok(credential.default_scope());
        };

        let builtin = if credential.is_certificate() {
            CERTIFICATE_PROVIDER_ID
        } else {
            LOCAL_PROVIDER_ID
        };
        if name.eq_ignore_ascii_case(builtin) {
            return Ok(credential.default_scope());
        }

        self.lookup_scope(name).await
    }

    #[instrument(skip(self, credential), fields(kind = credential.kind()))]
    async fn authenticate(
        &self,
        credential: &Credential,
        scope: Option<&ProviderScope>,
    ) -> Result<AccessToken> {
        let resolved;
        let scope = match scope {
            Some(scope) => scope,
            None => {
                resolved = self.resolve_scope(credential).await?;
                &resolved
            }
        };

        info!(scope = %scope, "Authenticating");

        match credential {
            Credential::Password {
                username, password, ..
            } => {
                let password =
                    password
                        .expose_str()
                        .ok_or_else(|| InvalidInputError::Credential {
                            reason: "password is not valid UTF-8".to_string(),
                        })?;
                let request = TokenRequest::Password {
                    username,
                    password,
                    scope: scope.as_str(),
                };
                self.client.request_token(None, &request).await
            }
            Credential::Thumbprint { .. } | Credential::CertificateData { .. } => {
                let store = self.client.options().certificate_store.as_deref();
                let http = match client_certificate(credential, store)? {
                    Some(certificate) => Some(self.client.with_identity(&certificate)?),
                    None => None,
                };
                let request = TokenRequest::ClientCredentials {
                    scope: scope.as_str(),
                };
                self.client.request_token(http.as_ref(), &request).await
            }
        }
    }
}
