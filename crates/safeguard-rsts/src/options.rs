//! Connection options.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::certificates::{CertificateStore, DirectoryCertificateStore};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Token lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Options for talking to the appliance token service.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use safeguard_rsts::ConnectOptions;
///
/// let options = ConnectOptions::default()
///     .with_timeout(Duration::from_secs(10))
///     .with_ignore_ssl(true);
/// assert!(options.ignore_ssl);
/// ```
#[derive(Clone)]
pub struct ConnectOptions {
    /// Skip TLS certificate validation of the appliance.
    pub ignore_ssl: bool,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Lifetime used when the token response carries none.
    pub default_token_lifetime: Duration,
    /// Where thumbprint credentials are looked up.
    pub certificate_store: Option<Arc<dyn CertificateStore>>,
}

impl ConnectOptions {
    /// Skip TLS certificate validation.
    pub fn with_ignore_ssl(mut self, ignore_ssl: bool) -> Self {
        self.ignore_ssl = ignore_ssl;
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the fallback token lifetime.
    pub fn with_default_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.default_token_lifetime = lifetime;
        self
    }

    /// Resolve thumbprints with the given store.
    pub fn with_certificate_store(mut self, store: Arc<dyn CertificateStore>) -> Self {
        self.certificate_store = Some(store);
        self
    }

    /// Resolve thumbprints to `{dir}/{THUMBPRINT}.pfx` files.
    pub fn with_certificate_directory(self, dir: impl Into<PathBuf>) -> Self {
        self.with_certificate_store(Arc::new(DirectoryCertificateStore::new(dir)))
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            ignore_ssl: false,
            timeout: DEFAULT_TIMEOUT,
            default_token_lifetime: DEFAULT_TOKEN_LIFETIME,
            certificate_store: None,
        }
    }
}

impl std::fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("ignore_ssl", &self.ignore_ssl)
            .field("timeout", &self.timeout)
            .field("default_token_lifetime", &self.default_token_lifetime)
            .field("certificate_store", &self.certificate_store.is_some())
            .finish()
    }
}
