//! Core value types.
//!
//! These types enforce their invariants at construction time.

mod appliance;
mod scope;

pub use appliance::ApplianceAddress;
pub use scope::{CERTIFICATE_PROVIDER_ID, LOCAL_PROVIDER_ID, ProviderScope};
