//! Appliance address type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{Error, InvalidInputError};

/// Path of the OAuth token endpoint.
const TOKEN_PATH: &str = "RSTS/oauth2/token";

/// Path and query of the identity provider lookup.
const PROVIDER_LOOKUP_PATH: &str = "RSTS/UserLogin/LoginController?response_type=token&redirect_uri=urn:InstalledApplication&loginRequestStep=1";

/// Path of the event hub.
const EVENT_PATH: &str = "service/event/signalr";

/// A validated appliance address.
///
/// Accepts a bare network address (`sg.example.com`, `10.5.32.1:8443`), which
/// is served over HTTPS, or a full URL. Plain HTTP is only allowed for
/// localhost so tests can point at a local mock.
///
/// # Example
///
/// ```
/// use safeguard_core::ApplianceAddress;
///
/// let appliance = ApplianceAddress::new("sg.example.com").unwrap();
/// assert_eq!(appliance.token_url(), "https://sg.example.com/RSTS/oauth2/token");
/// assert_eq!(
///     appliance.event_url(),
///     "wss://sg.example.com/service/event/signalr"
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ApplianceAddress(Url);

impl ApplianceAddress {
    /// Create a new appliance address, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not a valid host or URL.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref().trim();
        if s.is_empty() {
            return Err(InvalidInputError::Address {
                value: s.to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        let candidate = if s.contains("://") {
            s.to_string()
        } else {
            format!("https://{}", s)
        };

        let mut url = Url::parse(&candidate).map_err(|e| InvalidInputError::Address {
            value: s.to_string(),
            reason: e.to_string(),
        })?;

        Self::validate(&url, s)?;

        url.set_query(None);
        url.set_fragment(None);
        if url.path() == "/" {
            url.set_path("");
        }

        Ok(Self(url))
    }

    /// Returns the URL of an appliance-relative path.
    pub fn url_for(&self, path: &str) -> String {
        let base = self.0.as_str().trim_end_matches('/');
        format!("{}/{}", base, path.trim_start_matches('/'))
    }

    /// Returns the OAuth token endpoint URL.
    pub fn token_url(&self) -> String {
        self.url_for(TOKEN_PATH)
    }

    /// Returns the identity provider lookup URL.
    pub fn provider_lookup_url(&self) -> String {
        self.url_for(PROVIDER_LOOKUP_PATH)
    }

    /// Returns the websocket URL of the event hub.
    pub fn event_url(&self) -> String {
        let http = self.url_for(EVENT_PATH);
        if let Some(rest) = http.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = http.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            http
        }
    }

    /// Returns the base URL as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the host string.
    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }

    /// Returns true if the address uses TLS.
    pub fn is_secure(&self) -> bool {
        self.0.scheme() == "https"
    }

    fn validate(url: &Url, original: &str) -> Result<(), Error> {
        if url.cannot_be_a_base() {
            return Err(InvalidInputError::Address {
                value: original.to_string(),
                reason: "must be an absolute address".to_string(),
            }
            .into());
        }

        let is_localhost = url
            .host_str()
            .is_some_and(|h| h == "localhost" || h == "127.0.0.1" || h == "[::1]");

        let scheme = url.scheme();
        if scheme != "https" && !(scheme == "http" && is_localhost) {
            return Err(InvalidInputError::Address {
                value: original.to_string(),
                reason: "must use HTTPS (HTTP allowed only for localhost)".to_string(),
            }
            .into());
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(InvalidInputError::Address {
                value: original.to_string(),
                reason: "must have a host".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

impl fmt::Display for ApplianceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_str().trim_end_matches('/'))
    }
}

impl FromStr for ApplianceAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for ApplianceAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for ApplianceAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ApplianceAddress::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_defaults_to_https() {
        let appliance = ApplianceAddress::new("sg.example.com").unwrap();
        assert_eq!(appliance.host(), Some("sg.example.com"));
        assert!(appliance.is_secure());
    }

    #[test]
    fn host_with_port() {
        let appliance = ApplianceAddress::new("10.5.32.1:8443").unwrap();
        assert_eq!(
            appliance.token_url(),
            "https://10.5.32.1:8443/RSTS/oauth2/token"
        );
    }

    #[test]
    fn valid_localhost_http() {
        let appliance = ApplianceAddress::new("http://127.0.0.1:4321").unwrap();
        assert_eq!(appliance.token_url(), "http://127.0.0.1:4321/RSTS/oauth2/token");
        assert_eq!(
            appliance.event_url(),
            "ws://127.0.0.1:4321/service/event/signalr"
        );
    }

    #[test]
    fn normalizes_trailing_slash() {
        let appliance = ApplianceAddress::new("https://sg.example.com/").unwrap();
        assert_eq!(
            appliance.token_url(),
            "https://sg.example.com/RSTS/oauth2/token"
        );
        assert_eq!(appliance.to_string(), "https://sg.example.com");
    }

    #[test]
    fn provider_lookup_keeps_query() {
        let appliance = ApplianceAddress::new("sg.example.com").unwrap();
        assert!(
            appliance
                .provider_lookup_url()
                .ends_with("LoginController?response_type=token&redirect_uri=urn:InstalledApplication&loginRequestStep=1")
        );
    }

    #[test]
    fn invalid_http_non_localhost() {
        assert!(ApplianceAddress::new("http://sg.example.com").is_err());
    }

    #[test]
    fn invalid_empty() {
        assert!(ApplianceAddress::new("  ").is_err());
    }

    #[test]
    fn roundtrips_through_serde() {
        let appliance = ApplianceAddress::new("sg.example.com").unwrap();
        let json = serde_json::to_string(&appliance).unwrap();
        let back: ApplianceAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, appliance);
    }
}
