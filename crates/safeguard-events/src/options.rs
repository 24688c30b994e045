//! Listener and channel options.

use std::time::Duration;

/// Delay used between reconnect attempts unless configured otherwise.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Interval between keepalive pings on a live channel.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Time allowed for connecting and completing the protocol handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// A live channel with nothing received for this long is considered lost.
pub const DEFAULT_SERVER_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay strategy between reconnect attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backoff {
    /// The same delay before every attempt.
    Fixed(Duration),
    /// `initial * 2^(attempt - 1)`, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential { initial, max } => {
                let shift = attempt.saturating_sub(1).min(31);
                initial.saturating_mul(1u32 << shift).min(*max)
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Fixed(DEFAULT_RETRY_DELAY)
    }
}

/// Options for event channels and the persistent listener.
#[derive(Debug, Clone)]
pub struct ListenerOptions {
    /// Delay strategy between reconnect attempts.
    pub backoff: Backoff,
    /// Interval between keepalive pings.
    pub keepalive_interval: Duration,
    /// Time allowed for connect plus handshake.
    pub handshake_timeout: Duration,
    /// Silence after which a live channel is dropped. The hub pings more
    /// often than this, so only a dead connection reaches it.
    pub server_timeout: Duration,
    /// Skip TLS certificate validation of the appliance.
    pub ignore_ssl: bool,
}

impl ListenerOptions {
    /// Set the reconnect delay strategy.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the keepalive interval.
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Set the connect and handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set how long a live channel may go without receiving anything.
    pub fn with_server_timeout(mut self, timeout: Duration) -> Self {
        self.server_timeout = timeout;
        self
    }

    /// Skip TLS certificate validation.
    pub fn with_ignore_ssl(mut self, ignore_ssl: bool) -> Self {
        self.ignore_ssl = ignore_ssl;
        self
    }
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            backoff: Backoff::default(),
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            server_timeout: DEFAULT_SERVER_TIMEOUT,
            ignore_ssl: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_fixed_five_seconds() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(1), Duration::from_secs(5));
        assert_eq!(backoff.delay(50), Duration::from_secs(5));
    }

    #[test]
    fn exponential_doubles_and_caps() {
        let backoff = Backoff::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(10),
        };
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(2), Duration::from_secs(2));
        assert_eq!(backoff.delay(4), Duration::from_secs(8));
        assert_eq!(backoff.delay(5), Duration::from_secs(10));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn server_timeout_defaults_and_overrides() {
        let options = ListenerOptions::default();
        assert_eq!(options.server_timeout, Duration::from_secs(30));

        let options = options.with_server_timeout(Duration::from_secs(90));
        assert_eq!(options.server_timeout, Duration::from_secs(90));
    }
}
