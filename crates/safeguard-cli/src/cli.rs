//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::commands::listen::ListenArgs;
use crate::commands::token::TokenArgs;

/// Safeguard appliance token and event tool.
#[derive(Parser, Debug)]
#[command(name = "safeguard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate and report the access token lifetime
    Token(TokenArgs),

    /// Authenticate and print appliance events as they arrive
    Listen(ListenArgs),
}

/// How to reach and authenticate against the appliance.
///
/// Exactly one of `--thumbprint`, `--cert-file` or `--username` selects the
/// credential.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Appliance network address or URL
    #[arg(short, long, env = "SAFEGUARD_APPLIANCE")]
    pub appliance: String,

    /// Identity provider name (defaults to certificate or local)
    #[arg(long, env = "SAFEGUARD_PROVIDER")]
    pub provider: Option<String>,

    /// Username for password authentication
    #[arg(short, long, env = "SAFEGUARD_USERNAME", conflicts_with_all = ["thumbprint", "cert_file"])]
    pub username: Option<String>,

    /// Client certificate thumbprint, resolved in --cert-store
    #[arg(short, long, env = "SAFEGUARD_THUMBPRINT", conflicts_with = "cert_file")]
    pub thumbprint: Option<String>,

    /// PKCS#12 client certificate file
    #[arg(long, env = "SAFEGUARD_CERT_FILE")]
    pub cert_file: Option<PathBuf>,

    /// Directory of {THUMBPRINT}.pfx certificates
    #[arg(long, env = "SAFEGUARD_CERT_STORE")]
    pub cert_store: Option<PathBuf>,

    /// Read the password from stdin instead of prompting
    #[arg(short = 'p', long)]
    pub read_password: bool,

    /// Do not validate the appliance TLS certificate
    #[arg(long)]
    pub ignore_ssl: bool,
}
