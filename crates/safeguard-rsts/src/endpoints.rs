//! Token endpoint request/response types.

use serde::{Deserialize, Serialize};

/// Grant sent to the token endpoint.
#[derive(Serialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
pub(crate) enum TokenRequest<'a> {
    /// Certificate authentication; the client certificate is presented on the
    /// TLS connection.
    ClientCredentials { scope: &'a str },

    /// Username and password authentication.
    Password {
        username: &'a str,
        password: &'a str,
        scope: &'a str,
    },
}

// The password never reaches Debug output.
impl std::fmt::Debug for TokenRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenRequest::ClientCredentials { scope } => f
                .debug_struct("ClientCredentials")
                .field("scope", scope)
                .finish(),
            TokenRequest::Password {
                username, scope, ..
            } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .field("scope", scope)
                .finish(),
        }
    }
}

/// Successful token endpoint response.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Error body returned by the appliance.
///
/// The token service uses OAuth-style `error`/`error_description`; the core
/// service uses `Code`/`Message`. Both shapes are accepted.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default, alias = "Code")]
    pub code: Option<i64>,
    #[serde(default, alias = "Message")]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl ErrorResponse {
    /// The most specific message available.
    pub fn into_message(self) -> Option<String> {
        self.message.or(self.error_description).or(self.error)
    }
}

/// Identity provider lookup response.
#[derive(Debug, Deserialize)]
pub(crate) struct ProvidersResponse {
    #[serde(rename = "Providers", default)]
    pub providers: Vec<IdentityProvider>,
}

/// An identity provider configured on the appliance.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityProvider {
    /// Provider id, the suffix of its scope.
    #[serde(rename = "Id")]
    pub id: String,
    /// Human readable provider name.
    #[serde(rename = "DisplayName", default)]
    pub display_name: Option<String>,
}

impl IdentityProvider {
    /// Returns true if `name` matches the id or display name, ignoring case.
    pub fn matches(&self, name: &str) -> bool {
        self.id.eq_ignore_ascii_case(name)
            || self
                .display_name
                .as_deref()
                .is_some_and(|d| d.eq_ignore_ascii_case(name))
    }
}
