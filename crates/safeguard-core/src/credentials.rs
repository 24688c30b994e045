//! Login credentials.

use std::fmt;
use std::path::Path;

use crate::error::InvalidInputError;
use crate::types::ProviderScope;
use crate::{Result, SecretMaterial};

/// Credentials used to authenticate against the appliance.
///
/// Certificate files and in-memory certificate bytes produce the same value:
/// [`Credential::certificate_file`] only reads the file.
///
/// # Security
///
/// Secret fields are never exposed in Debug output and are wiped when the
/// credential is dropped.
///
/// # Example
///
/// ```
/// use safeguard_core::Credential;
///
/// let cred = Credential::thumbprint("ABC123").unwrap().with_provider("ldap");
/// assert_eq!(cred.provider(), Some("ldap"));
/// ```
#[derive(Clone)]
pub enum Credential {
    /// A client certificate located by thumbprint in a certificate store.
    Thumbprint {
        thumbprint: String,
        provider: Option<String>,
    },

    /// A PKCS#12 client certificate and its password.
    CertificateData {
        data: SecretMaterial,
        password: SecretMaterial,
        provider: Option<String>,
    },

    /// A username and password.
    Password {
        username: String,
        password: SecretMaterial,
        provider: Option<String>,
    },
}

impl Credential {
    /// Certificate located by thumbprint.
    pub fn thumbprint(thumbprint: impl Into<String>) -> Result<Self> {
        let thumbprint: String = thumbprint.into();
        let normalized: String = thumbprint
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();

        if normalized.is_empty() {
            return Err(InvalidInputError::Credential {
                reason: "certificate thumbprint is empty".to_string(),
            }
            .into());
        }

        if !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InvalidInputError::Credential {
                reason: format!("certificate thumbprint '{}' is not hexadecimal", thumbprint),
            }
            .into());
        }

        Ok(Credential::Thumbprint {
            thumbprint: normalized,
            provider: None,
        })
    }

    /// PKCS#12 certificate read from a file.
    pub fn certificate_file(path: impl AsRef<Path>, password: SecretMaterial) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| InvalidInputError::Credential {
            reason: format!("unable to read certificate file {}: {}", path.display(), e),
        })?;

        Self::certificate_data(data, password)
    }

    /// PKCS#12 certificate from raw bytes.
    pub fn certificate_data(data: impl Into<Vec<u8>>, password: SecretMaterial) -> Result<Self> {
        let data = SecretMaterial::from_bytes(data.into());
        if data.is_empty() {
            return Err(InvalidInputError::Credential {
                reason: "certificate data is empty".to_string(),
            }
            .into());
        }

        Ok(Credential::CertificateData {
            data,
            password,
            provider: None,
        })
    }

    /// Username and password.
    pub fn password(username: impl Into<String>, password: SecretMaterial) -> Result<Self> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(InvalidInputError::Credential {
                reason: "username is empty".to_string(),
            }
            .into());
        }

        Ok(Credential::Password {
            username,
            password,
            provider: None,
        })
    }

    /// Authenticate through a named identity provider instead of the default.
    pub fn with_provider(mut self, name: impl Into<String>) -> Self {
        let name = Some(name.into()).filter(|n| !n.trim().is_empty());
        match &mut self {
            Credential::Thumbprint { provider, .. }
            | Credential::CertificateData { provider, .. }
            | Credential::Password { provider, .. } => *provider = name,
        }
        self
    }

    /// The identity provider name, if one was given.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Credential::Thumbprint { provider, .. }
            | Credential::CertificateData { provider, .. }
            | Credential::Password { provider, .. } => provider.as_deref(),
        }
    }

    /// Returns true for the certificate-based variants.
    pub fn is_certificate(&self) -> bool {
        !matches!(self, Credential::Password { .. })
    }

    /// Scope used when no identity provider is named.
    pub fn default_scope(&self) -> ProviderScope {
        if self.is_certificate() {
            ProviderScope::certificate()
        } else {
            ProviderScope::local()
        }
    }

    /// Short name of the variant, safe to log.
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Thumbprint { .. } => "thumbprint",
            Credential::CertificateData { .. } => "certificate",
            Credential::Password { .. } => "password",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Thumbprint {
                thumbprint,
                provider,
            } => f
                .debug_struct("Thumbprint")
                .field("thumbprint", thumbprint)
                .field("provider", provider)
                .finish(),
            Credential::CertificateData { provider, .. } => f
                .debug_struct("CertificateData")
                .field("data", &"[REDACTED]")
                .field("password", &"[REDACTED]")
                .field("provider", provider)
                .finish(),
            Credential::Password {
                username, provider, ..
            } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .field("provider", provider)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hidden_in_debug() {
        let cred = Credential::password("admin", SecretMaterial::from("secret123")).unwrap();
        let debug = format!("{:?}", cred);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("secret123"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn thumbprint_is_normalized() {
        let cred = Credential::thumbprint("ab c1 23").unwrap();
        match cred {
            Credential::Thumbprint { thumbprint, .. } => assert_eq!(thumbprint, "ABC123"),
            other => panic!("unexpected credential {:?}", other),
        }
    }

    #[test]
    fn thumbprint_rejects_garbage() {
        assert!(Credential::thumbprint("").is_err());
        assert!(Credential::thumbprint("not-hex!").is_err());
    }

    #[test]
    fn file_and_data_produce_the_same_variant() {
        let dir = std::env::temp_dir().join(format!("safeguard-cred-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("client.pfx");
        std::fs::write(&path, [0x30, 0x82, 0x01]).unwrap();

        let from_file = Credential::certificate_file(&path, SecretMaterial::from("pw")).unwrap();
        let from_data =
            Credential::certificate_data(vec![0x30, 0x82, 0x01], SecretMaterial::from("pw"))
                .unwrap();

        match (&from_file, &from_data) {
            (
                Credential::CertificateData { data: a, .. },
                Credential::CertificateData { data: b, .. },
            ) => assert_eq!(a.expose(), b.expose()),
            _ => panic!("expected certificate data"),
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_certificate_file_is_invalid_input() {
        let err = Credential::certificate_file("/nonexistent/client.pfx", SecretMaterial::empty())
            .unwrap_err();
        assert!(err.to_string().contains("unable to read certificate file"));
    }

    #[test]
    fn default_scope_depends_on_kind() {
        let cert = Credential::thumbprint("ABC123").unwrap();
        let user = Credential::password("admin", SecretMaterial::from("pw")).unwrap();
        assert_eq!(
            cert.default_scope().as_str(),
            "rsts:sts:primaryproviderid:certificate"
        );
        assert_eq!(user.default_scope().as_str(), "rsts:sts:primaryproviderid:local");
    }

    #[test]
    fn blank_provider_is_ignored() {
        let cred = Credential::password("admin", SecretMaterial::from("pw"))
            .unwrap()
            .with_provider("  ");
        assert_eq!(cred.provider(), None);
        assert!(!cred.is_certificate());
    }
}
