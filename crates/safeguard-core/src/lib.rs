//! safeguard-core - Core types and traits for the Safeguard access layer.
//!
//! This crate holds everything that does not touch the network: credentials
//! and secret material, access tokens, the appliance address, the unified
//! error type, event subscriptions, and the traits that the token provider,
//! sessions and event transports implement.

pub mod credentials;
pub mod error;
pub mod events;
pub mod secret;
pub mod tokens;
pub mod traits;
pub mod types;

pub use credentials::Credential;
pub use error::Error;
pub use events::{DispatchOutcome, Event, EventHandler, EventSubscriptions, HandlerResult};
pub use secret::{SecretBuilder, SecretMaterial};
pub use tokens::AccessToken;
pub use traits::{
    DisconnectNotifier, DisconnectReason, DisconnectSignal, EventChannel, EventTransport, Session,
    TokenProvider,
};
pub use types::{ApplianceAddress, ProviderScope};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
