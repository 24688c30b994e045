//! safeguard-rsts - Token provider and sessions backed by the appliance
//! token service (`/RSTS`).

mod certificates;
mod client;
mod connect;
mod endpoints;
mod management;
mod options;
mod provider;
mod session;

pub use certificates::{CertificateStore, ClientCertificate, DirectoryCertificateStore};
pub use client::RstsClient;
pub use connect::{connect, connect_management};
pub use endpoints::IdentityProvider;
pub use management::ManagementSession;
pub use options::{ConnectOptions, DEFAULT_TIMEOUT, DEFAULT_TOKEN_LIFETIME};
pub use provider::RstsTokenProvider;
pub use session::AuthenticationSession;
