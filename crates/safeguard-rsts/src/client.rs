//! HTTP client for the appliance token service.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::{debug, instrument, trace};

use safeguard_core::error::{AuthError, ProtocolError, RejectedError, TransportError};
use safeguard_core::{AccessToken, ApplianceAddress, Error, Result};

use crate::certificates::ClientCertificate;
use crate::endpoints::{
    ErrorResponse, IdentityProvider, ProvidersResponse, TokenRequest, TokenResponse,
};
use crate::options::ConnectOptions;

/// Form body of the provider lookup request.
const PROVIDER_LOOKUP_BODY: &str = "RelayState=";

/// HTTP client bound to one appliance.
#[derive(Debug, Clone)]
pub struct RstsClient {
    client: reqwest::Client,
    appliance: ApplianceAddress,
    options: ConnectOptions,
}

impl RstsClient {
    /// Create a client for the given appliance.
    pub fn new(appliance: ApplianceAddress, options: ConnectOptions) -> Result<Self> {
        let client = Self::builder(&options)
            .build()
            .map_err(|e| TransportError::Tls {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            appliance,
            options,
        })
    }

    /// Returns the appliance this client talks to.
    pub fn appliance(&self) -> &ApplianceAddress {
        &self.appliance
    }

    /// Returns the options this client was built with.
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// An HTTP client presenting `certificate` on the TLS connection.
    ///
    /// Plain-HTTP appliances (a local mock) cannot carry a client certificate,
    /// so the shared client is returned unchanged for them.
    pub(crate) fn with_identity(&self, certificate: &ClientCertificate) -> Result<reqwest::Client> {
        if !self.appliance.is_secure() {
            trace!("Plain HTTP appliance, not attaching client certificate");
            return Ok(self.client.clone());
        }

        let password = certificate
            .password
            .expose_str()
            .ok_or_else(|| AuthError::Certificate {
                message: "certificate password is not valid UTF-8".to_string(),
            })?;

        let identity = reqwest::Identity::from_pkcs12_der(certificate.der.expose(), password)
            .map_err(|e| AuthError::Certificate {
                message: e.to_string(),
            })?;

        Self::builder(&self.options)
            .identity(identity)
            .build()
            .map_err(|e| {
                AuthError::Certificate {
                    message: e.to_string(),
                }
                .into()
            })
    }

    /// Exchange a grant for an access token.
    #[instrument(skip(self, http, request), fields(appliance = %self.appliance))]
    pub(crate) async fn request_token(
        &self,
        http: Option<&reqwest::Client>,
        request: &TokenRequest<'_>,
    ) -> Result<AccessToken> {
        let url = self.appliance.token_url();
        debug!(%url, "Requesting access token");
        trace!(?request, "token request");

        let response = http
            .unwrap_or(&self.client)
            .post(&url)
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let body = self.read_success(response).await?;
        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| ProtocolError::MalformedResponse {
                message: format!("token response is not valid JSON: {}", e),
            })?;

        let token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProtocolError::MalformedResponse {
                message: "token response has no access_token".to_string(),
            })?;

        let lifetime = parsed
            .expires_in
            .map(std::time::Duration::from_secs)
            .unwrap_or(self.options.default_token_lifetime);

        debug!(lifetime_secs = lifetime.as_secs(), "Access token issued");
        Ok(AccessToken::new(token, lifetime))
    }

    /// Fetch the identity providers configured on the appliance.
    #[instrument(skip(self), fields(appliance = %self.appliance))]
    pub async fn lookup_providers(&self) -> Result<Vec<IdentityProvider>> {
        let url = self.appliance.provider_lookup_url();
        debug!("Looking up identity providers");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .body(PROVIDER_LOOKUP_BODY)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let body = self.read_success(response).await?;
        let parsed: ProvidersResponse =
            serde_json::from_str(&body).map_err(|e| ProtocolError::MalformedResponse {
                message: format!("provider list is not valid JSON: {}", e),
            })?;

        trace!(count = parsed.providers.len(), "Identity providers found");
        Ok(parsed.providers)
    }

    fn builder(options: &ConnectOptions) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .user_agent(concat!("safeguard-rsts/", env!("CARGO_PKG_VERSION")))
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.ignore_ssl)
    }

    /// Read the body of a success response, or turn a failure into a
    /// rejection carrying the appliance's error code and message.
    async fn read_success(&self, response: reqwest::Response) -> Result<String> {
        let status = response.status();
        trace!(status = %status, "Token service response");

        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if status.is_success() {
            return Ok(body);
        }

        let error = serde_json::from_str::<ErrorResponse>(&body).unwrap_or_default();
        let code = error.code;
        let message = error.into_message();
        debug!(status = status.as_u16(), ?code, "Token service rejected request");

        Err(AuthError::Rejected(RejectedError::new(status.as_u16(), code, message)).into())
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            TransportError::Timeout {
                duration_ms: self.options.timeout.as_millis() as u64,
            }
            .into()
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
            .into()
        } else {
            TransportError::Http {
                message: err.to_string(),
            }
            .into()
        }
    }
}
