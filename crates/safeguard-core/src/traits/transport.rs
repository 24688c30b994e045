//! Event transport traits.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::events::EventSubscriptions;
use crate::{AccessToken, Result};

/// Why an event channel stopped delivering events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The channel was closed locally.
    Graceful,

    /// The connection failed (network loss, protocol violation).
    TransportError(String),

    /// The server closed the connection and will accept a new one.
    ServerInitiated(Option<String>),

    /// The server closed the connection and will not accept reconnection.
    Permanent(String),
}

impl DisconnectReason {
    /// Returns true if a new connection must not be attempted.
    pub fn is_permanent(&self) -> bool {
        matches!(self, DisconnectReason::Permanent(_))
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Graceful => write!(f, "closed"),
            DisconnectReason::TransportError(message) => write!(f, "transport error: {}", message),
            DisconnectReason::ServerInitiated(Some(message)) => {
                write!(f, "closed by server: {}", message)
            }
            DisconnectReason::ServerInitiated(None) => write!(f, "closed by server"),
            DisconnectReason::Permanent(message) => {
                write!(f, "permanently closed by server: {}", message)
            }
        }
    }
}

/// One-shot disconnect notification handed to a channel when it opens.
///
/// Consuming `self` in [`DisconnectNotifier::notify`] makes "exactly once"
/// a property of the type.
#[derive(Debug)]
pub struct DisconnectNotifier {
    tx: oneshot::Sender<DisconnectReason>,
}

impl DisconnectNotifier {
    /// Create a notifier and the signal it completes.
    pub fn channel() -> (DisconnectNotifier, DisconnectSignal) {
        let (tx, rx) = oneshot::channel();
        (DisconnectNotifier { tx }, DisconnectSignal { rx })
    }

    /// Report the disconnect.
    pub fn notify(self, reason: DisconnectReason) {
        // The owner may already have stopped listening.
        let _ = self.tx.send(reason);
    }
}

/// Completes when the channel it was paired with disconnects.
#[derive(Debug)]
pub struct DisconnectSignal {
    rx: oneshot::Receiver<DisconnectReason>,
}

impl DisconnectSignal {
    /// Wait for the disconnect reason.
    ///
    /// A channel dropped without notifying counts as a transport error.
    pub async fn wait(self) -> DisconnectReason {
        self.rx.await.unwrap_or_else(|_| {
            DisconnectReason::TransportError("channel dropped without notifying".to_string())
        })
    }
}

/// Opens event channels. One transport produces any number of channels, each
/// used for exactly one connection.
#[async_trait]
pub trait EventTransport: Send + Sync + 'static {
    /// The channel type produced by [`EventTransport::open`].
    type Channel: EventChannel;

    /// Connect, authenticate the handshake with `token` and begin dispatching
    /// events to `subscriptions`.
    ///
    /// On success the channel owns `on_disconnect` and must notify it exactly
    /// once. On failure the notifier is dropped unused.
    async fn open(
        &self,
        token: &AccessToken,
        subscriptions: Arc<EventSubscriptions>,
        on_disconnect: DisconnectNotifier,
    ) -> Result<Self::Channel>;
}

/// A live connection created by an [`EventTransport`].
#[async_trait]
pub trait EventChannel: Send + 'static {
    /// Tear the connection down. Safe to call after a failure and more than
    /// once; reports [`DisconnectReason::Graceful`] if nothing was reported yet.
    async fn close(&mut self);
}
