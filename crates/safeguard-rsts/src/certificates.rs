//! Client certificate lookup.
//!
//! Thumbprint credentials name a certificate that lives somewhere else. A
//! [`CertificateStore`] turns the thumbprint into PKCS#12 bytes that can be
//! presented on the TLS connection.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use safeguard_core::error::AuthError;
use safeguard_core::{Credential, Result, SecretMaterial};

/// File extensions tried, in order, by [`DirectoryCertificateStore`].
const CERTIFICATE_EXTENSIONS: &[&str] = &["pfx", "p12"];

/// PKCS#12 client certificate material.
#[derive(Clone)]
pub struct ClientCertificate {
    /// DER-encoded PKCS#12 archive.
    pub der: SecretMaterial,
    /// Password protecting the archive.
    pub password: SecretMaterial,
}

impl fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("der", &format!("[{} bytes]", self.der.len()))
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Resolves certificate thumbprints to certificate material.
pub trait CertificateStore: Send + Sync {
    /// Find the certificate with the given (uppercase hex) thumbprint.
    fn find(&self, thumbprint: &str) -> Result<ClientCertificate>;
}

/// Certificate store backed by a directory of `{THUMBPRINT}.pfx` files.
///
/// The archives are expected to carry an empty password.
#[derive(Debug, Clone)]
pub struct DirectoryCertificateStore {
    dir: PathBuf,
}

impl DirectoryCertificateStore {
    /// Create a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory searched.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl CertificateStore for DirectoryCertificateStore {
    fn find(&self, thumbprint: &str) -> Result<ClientCertificate> {
        for ext in CERTIFICATE_EXTENSIONS {
            let path = self.dir.join(format!("{}.{}", thumbprint, ext));
            match std::fs::read(&path) {
                Ok(der) => {
                    debug!(path = %path.display(), "Loaded client certificate");
                    return Ok(ClientCertificate {
                        der: SecretMaterial::from_bytes(der),
                        password: SecretMaterial::empty(),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(AuthError::Certificate {
                        message: format!("unable to read {}: {}", path.display(), e),
                    }
                    .into());
                }
            }
        }

        Err(AuthError::Certificate {
            message: format!(
                "no certificate with thumbprint {} in {}",
                thumbprint,
                self.dir.display()
            ),
        }
        .into())
    }
}

/// Certificate material a credential presents, if any.
pub(crate) fn client_certificate(
    credential: &Credential,
    store: Option<&dyn CertificateStore>,
) -> Result<Option<ClientCertificate>> {
    match credential {
        Credential::Password { .. } => Ok(None),
        Credential::CertificateData { data, password, .. } => Ok(Some(ClientCertificate {
            der: data.clone(),
            password: password.clone(),
        })),
        Credential::Thumbprint { thumbprint, .. } => {
            let store = store.ok_or_else(|| AuthError::Certificate {
                message: format!(
                    "no certificate store configured to resolve thumbprint {}",
                    thumbprint
                ),
            })?;
            store.find(thumbprint).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_store_finds_pfx_and_p12() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ABC123.p12"), [1u8, 2, 3]).unwrap();

        let store = DirectoryCertificateStore::new(dir.path());
        let cert = store.find("ABC123").unwrap();

        assert_eq!(cert.der.expose(), &[1, 2, 3]);
        assert!(cert.password.is_empty());
    }

    #[test]
    fn directory_store_reports_missing_thumbprint() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryCertificateStore::new(dir.path());

        let err = store.find("DEADBEEF").unwrap_err();
        assert!(err.to_string().contains("DEADBEEF"));
        assert!(!err.is_transient());
    }

    #[test]
    fn thumbprint_without_store_is_a_certificate_error() {
        let cred = Credential::thumbprint("ABC123").unwrap();
        let err = client_certificate(&cred, None).unwrap_err();
        assert!(err.to_string().contains("no certificate store"));
    }

    #[test]
    fn password_credential_presents_no_certificate() {
        let cred = Credential::password("admin", SecretMaterial::from("pw")).unwrap();
        assert!(client_certificate(&cred, None).unwrap().is_none());
    }

    #[test]
    fn debug_hides_certificate_bytes() {
        let cert = ClientCertificate {
            der: SecretMaterial::from_bytes(vec![9; 4]),
            password: SecretMaterial::from("pw"),
        };
        let debug = format!("{:?}", cert);
        assert!(debug.contains("[4 bytes]"));
        assert!(!debug.contains("pw\""));
    }
}
