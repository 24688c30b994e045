//! Output formatting helpers.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use serde::Serialize;

use safeguard_events::ListenerState;

/// Print a success message.
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print an error message.
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a labeled field.
pub fn field(label: &str, value: &str) {
    println!("{}: {}", label.dimmed(), value);
}

/// Print a value as compact JSON.
pub fn json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    println!("{}", json);
    Ok(())
}

/// An event as printed by `listen --json`.
#[derive(Debug, Serialize)]
pub struct EventRecord<'a> {
    pub received_at: DateTime<Utc>,
    pub name: &'a str,
    pub body: &'a str,
}

impl<'a> EventRecord<'a> {
    pub fn now(name: &'a str, body: &'a str) -> Self {
        Self {
            received_at: Utc::now(),
            name,
            body,
        }
    }
}

/// Print a received event, either as a JSON line or a colored summary.
pub fn event(name: &str, body: &str, as_json: bool) -> Result<()> {
    if as_json {
        return json(&EventRecord::now(name, body));
    }
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        name.cyan().bold(),
        body
    );
    Ok(())
}

/// Print a listener state transition to stderr.
pub fn state(state: ListenerState) {
    let label = state.to_string();
    let label = match state {
        ListenerState::Connected => label.green(),
        ListenerState::Connecting => label.normal(),
        ListenerState::RetryScheduled => label.yellow(),
        ListenerState::Disconnected => label.dimmed(),
        ListenerState::PermanentlyFailed => label.red(),
    };
    eprintln!("{} {} {}", timestamp().dimmed(), "STATE".blue(), label);
}

/// Format a number of seconds as `1h 02m 03s`.
pub fn duration(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {:02}m {:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}
