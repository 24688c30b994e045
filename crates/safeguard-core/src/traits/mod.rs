//! Core traits for authentication and event transport behavior.

mod session;
mod token_provider;
mod transport;

pub use session::Session;
pub use token_provider::TokenProvider;
pub use transport::{DisconnectNotifier, DisconnectReason, DisconnectSignal, EventChannel, EventTransport};
