//! Subcommand implementations.

pub mod listen;
pub mod token;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use tracing::debug;

use safeguard_core::{ApplianceAddress, Credential, SecretMaterial};
use safeguard_rsts::{AuthenticationSession, ConnectOptions, connect};

use crate::cli::ConnectionArgs;
use crate::prompt;

impl ConnectionArgs {
    pub fn appliance(&self) -> Result<ApplianceAddress> {
        ApplianceAddress::new(&self.appliance).context("Invalid appliance address")
    }

    pub fn connect_options(&self) -> ConnectOptions {
        let options = ConnectOptions::default().with_ignore_ssl(self.ignore_ssl);
        match &self.cert_store {
            Some(dir) => options.with_certificate_directory(dir),
            None => options,
        }
    }

    /// Build the credential selected by the flags, asking for a password
    /// when one is needed.
    pub fn credential(&self) -> Result<Credential> {
        let credential = if let Some(thumbprint) = &self.thumbprint {
            Credential::thumbprint(thumbprint).context("Invalid thumbprint")?
        } else if let Some(path) = &self.cert_file {
            let password = self.password("Certificate password")?;
            Credential::certificate_file(path, password).context("Failed to load certificate")?
        } else if let Some(username) = &self.username {
            let password = self.password(&format!("Password for {}", username))?;
            Credential::password(username, password).context("Invalid username")?
        } else {
            bail!("No credential given. Use --thumbprint, --cert-file or --username.");
        };

        let credential = match &self.provider {
            Some(provider) => credential.with_provider(provider),
            None => credential,
        };
        debug!(kind = credential.kind(), provider = ?credential.provider(), "Built credential");
        Ok(credential)
    }

    fn password(&self, label: &str) -> Result<SecretMaterial> {
        if self.read_password {
            prompt::from_stdin()
        } else {
            prompt::masked(label)
        }
    }

    /// Authenticate against the appliance.
    pub async fn connect(&self) -> Result<AuthenticationSession> {
        let appliance = self.appliance()?;
        let credential = self.credential()?;

        eprintln!(
            "{}",
            format!("Authenticating to {}...", appliance).dimmed()
        );

        connect(appliance, credential, self.connect_options())
            .await
            .context("Failed to authenticate")
    }
}
