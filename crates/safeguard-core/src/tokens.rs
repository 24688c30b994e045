//! Access token type.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use zeroize::Zeroizing;

/// A bearer access token with a monotonic expiry.
///
/// Expiry is tracked against [`tokio::time::Instant`], so it only ever counts
/// down and is unaffected by wall-clock changes.
///
/// # Security
///
/// - Never logged or displayed in Debug output
/// - The token text is zeroed on drop
/// - Clones are deep copies; two holders never share one buffer
#[derive(Clone)]
pub struct AccessToken {
    value: Zeroizing<String>,
    expires_at: Instant,
}

impl AccessToken {
    /// Create a token valid for `lifetime` from now.
    pub fn new(token: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            value: Zeroizing::new(token.into()),
            expires_at: Instant::now() + lifetime,
        }
    }

    /// Returns the token value for use in authorization headers.
    ///
    /// # Security
    ///
    /// Use only when constructing authorization headers or handshakes.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Returns true if the token text is empty.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Time left before the token expires, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Whole seconds left before the token expires, clamped at zero.
    pub fn lifetime_remaining_secs(&self) -> u64 {
        self.remaining().as_secs()
    }

    /// Returns true once no lifetime remains.
    pub fn is_expired(&self) -> bool {
        self.lifetime_remaining_secs() == 0
    }
}

// Hide token value in Debug output
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("remaining_secs", &self.lifetime_remaining_secs())
            .finish()
    }
}
