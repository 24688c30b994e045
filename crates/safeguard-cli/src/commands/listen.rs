//! Listen command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;
use tokio::sync::watch;

use safeguard_core::{
    DisconnectNotifier, DisconnectReason, EventChannel, EventSubscriptions, EventTransport,
    HandlerResult, Session,
};
use safeguard_events::{
    Backoff, ListenerOptions, ListenerState, PersistentEventListener, SignalrTransport,
};

use crate::cli::ConnectionArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Event names to print (all events when omitted)
    pub events: Vec<String>,

    /// Use a single connection and exit when it drops
    #[arg(long)]
    pub once: bool,

    /// Seconds to wait between reconnect attempts
    #[arg(long, default_value_t = 5)]
    pub retry_delay: u64,

    /// Double the retry delay after each failed attempt, up to this many seconds
    #[arg(long)]
    pub max_retry_delay: Option<u64>,

    /// Do not print listener state changes
    #[arg(short, long)]
    pub quiet: bool,

    /// Output events as JSON lines
    #[arg(long)]
    pub json: bool,
}

impl ListenArgs {
    fn listener_options(&self) -> ListenerOptions {
        let initial = Duration::from_secs(self.retry_delay);
        let backoff = match self.max_retry_delay {
            Some(max) => Backoff::Exponential {
                initial,
                max: Duration::from_secs(max),
            },
            None => Backoff::Fixed(initial),
        };
        ListenerOptions::default()
            .with_backoff(backoff)
            .with_ignore_ssl(self.connection.ignore_ssl)
    }
}

fn print_event(json: bool) -> impl Fn(&str, &str) -> HandlerResult + Send + Sync + 'static {
    move |name: &str, body: &str| Ok(output::event(name, body, json)?)
}

pub async fn run(args: ListenArgs) -> Result<()> {
    let session = args.connection.connect().await?;

    eprintln!("{}", "Press Ctrl+C to stop.".dimmed());
    eprintln!();

    if args.once {
        listen_once(session, &args).await
    } else {
        listen_persistent(session, &args).await
    }
}

async fn listen_once<S: Session>(session: S, args: &ListenArgs) -> Result<()> {
    let subscriptions = Arc::new(EventSubscriptions::new());
    if args.events.is_empty() {
        subscriptions.register_all(print_event(args.json));
    } else {
        for name in &args.events {
            subscriptions.register(name, print_event(args.json));
        }
    }

    let token = session.access_token().context("Session holds no token")?;
    let transport = SignalrTransport::for_session(&session, args.listener_options());
    let (notifier, signal) = DisconnectNotifier::channel();
    let mut channel = transport
        .open(&token, subscriptions, notifier)
        .await
        .context("Failed to open event channel")?;

    if !args.quiet {
        output::state(ListenerState::Connected);
    }

    let wait = signal.wait();
    tokio::pin!(wait);

    let ended = tokio::select! {
        reason = &mut wait => Some(reason),
        _ = tokio::signal::ctrl_c() => None,
    };

    let reason = match ended {
        Some(reason) => reason,
        None => {
            channel.close().await;
            wait.await
        }
    };
    channel.close().await;
    session.dispose();

    match reason {
        DisconnectReason::Graceful => Ok(()),
        DisconnectReason::Permanent(message) => {
            bail!("Appliance closed the event channel: {}", message)
        }
        other => {
            output::error(&format!("Disconnected: {}", other));
            Ok(())
        }
    }
}

async fn listen_persistent<S: Session + 'static>(session: S, args: &ListenArgs) -> Result<()> {
    let listener = PersistentEventListener::signalr(session, args.listener_options());

    if args.events.is_empty() {
        listener.register_all_events_handler(print_event(args.json));
    } else {
        for name in &args.events {
            listener.register_event_handler(name, print_event(args.json));
        }
    }

    let (state_tx, mut state_rx) = watch::channel(listener.state());
    let quiet = args.quiet;
    listener.set_state_callback(move |state| {
        if !quiet {
            output::state(state);
        }
        state_tx.send_replace(state);
    });

    if let Err(e) = listener.start().await {
        listener.dispose().await;
        return Err(e).context("Failed to start event listener");
    }

    let failed = tokio::select! {
        result = state_rx.wait_for(|s| *s == ListenerState::PermanentlyFailed) => result.is_ok(),
        _ = tokio::signal::ctrl_c() => false,
    };

    listener.dispose().await;

    if failed {
        bail!("Event listener failed permanently");
    }
    Ok(())
}
