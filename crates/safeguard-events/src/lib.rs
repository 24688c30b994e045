//! safeguard-events - Appliance event delivery.
//!
//! [`SignalrTransport`] opens one websocket connection to the appliance
//! event hub per [`SignalrChannel`]. [`PersistentEventListener`] strings
//! channels together so that a subscription survives token expiry and
//! network loss.

mod listener;
mod options;
mod protocol;
mod signalr;

pub use listener::{ListenerState, PersistentEventListener, StateCallback};
pub use options::{
    Backoff, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_RETRY_DELAY,
    DEFAULT_SERVER_TIMEOUT, ListenerOptions,
};
pub use signalr::{SignalrChannel, SignalrTransport};
