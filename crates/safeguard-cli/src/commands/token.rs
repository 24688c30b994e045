//! Token command implementation.

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Local};
use clap::Args;
use serde::Serialize;

use safeguard_core::Session;

use crate::cli::ConnectionArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct TokenArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Print the access token itself
    #[arg(long)]
    pub show_token: bool,

    /// Refresh once after authenticating
    #[arg(long)]
    pub refresh: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct TokenSummary<'a> {
    appliance: &'a str,
    lifetime_remaining: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
}

pub async fn run(args: TokenArgs) -> Result<()> {
    let session = args.connection.connect().await?;

    if args.refresh {
        session
            .refresh_access_token()
            .await
            .context("Failed to refresh access token")?;
    }

    let token = session.access_token().context("Session holds no token")?;
    let remaining = session.access_token_lifetime_remaining();

    if args.json {
        output::json(&TokenSummary {
            appliance: session.appliance().as_str(),
            lifetime_remaining: remaining,
            access_token: args.show_token.then(|| token.as_str()),
        })?;
    } else {
        output::success("Authenticated");
        println!();
        output::field("Appliance", session.appliance().as_str());
        output::field("Lifetime", &output::duration(remaining));
        let expires = Local::now() + ChronoDuration::seconds(remaining as i64);
        output::field("Expires", &expires.format("%Y-%m-%d %H:%M:%S").to_string());
        if args.show_token {
            output::field("Token", token.as_str());
        }
    }

    session.dispose();
    Ok(())
}
