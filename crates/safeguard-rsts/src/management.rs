//! Anonymous session for the appliance management service.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use safeguard_core::error::AuthError;
use safeguard_core::traits::Session;
use safeguard_core::{AccessToken, ApplianceAddress, Result};

/// Session for the management service, which needs no token.
///
/// It never holds a credential: the token is always absent, the remaining
/// lifetime is always zero, and it can be neither refreshed nor cloned.
#[derive(Debug)]
pub struct ManagementSession {
    appliance: ApplianceAddress,
    disposed: AtomicBool,
}

impl ManagementSession {
    /// Create a management session for the given appliance.
    pub fn new(appliance: ApplianceAddress) -> Self {
        Self {
            appliance,
            disposed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Session for ManagementSession {
    fn appliance(&self) -> &ApplianceAddress {
        &self.appliance
    }

    fn access_token(&self) -> Option<AccessToken> {
        None
    }

    fn access_token_lifetime_remaining(&self) -> u64 {
        0
    }

    async fn refresh_access_token(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(AuthError::SessionDisposed.into());
        }
        Err(AuthError::Unsupported {
            operation: "refresh_access_token".to_string(),
        }
        .into())
    }

    fn try_clone(&self) -> Result<Self> {
        Err(AuthError::NotCloneable.into())
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}
