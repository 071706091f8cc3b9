//! Timing configuration for connections.
//!
//! Centralizes the heartbeat cadence, the pong deadline, the reconnect
//! interval, and the dial timeout. The defaults match the upstream
//! service's expectations; [`TwitchPubSubTimeouts::fast`] exists for tests
//! against a local mock server.

use std::time::Duration;

/// Timing configuration for PubSub connections.
///
/// # Examples
///
/// ```rust
/// use twitch_pubsub::TwitchPubSubTimeouts;
/// use std::time::Duration;
///
/// // Production defaults (recommended)
/// let timeouts = TwitchPubSubTimeouts::default();
///
/// // Custom cadence
/// let timeouts = TwitchPubSubTimeouts::builder()
///     .ping_interval(Duration::from_secs(120))
///     .reconnect_interval(Duration::from_secs(2))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct TwitchPubSubTimeouts {
    /// Timeout for establishing a connection (TCP + TLS + WS handshake).
    /// Default: 10 seconds. Zero disables the dial timeout.
    pub connection_timeout: Duration,

    /// Interval between outbound `PING` frames on a live connection.
    /// Default: 4 minutes.
    pub ping_interval: Duration,

    /// Maximum time to wait for the `PONG` after a `PING` was sent.
    /// A missed deadline is indistinguishable from a dead socket and tears
    /// the connection down for reconnect. Default: 9 seconds.
    pub pong_deadline: Duration,

    /// Delay before re-dialing after a connection is lost.
    /// Default: 5 seconds.
    pub reconnect_interval: Duration,
}

impl Default for TwitchPubSubTimeouts {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(4 * 60),
            pong_deadline: Duration::from_secs(9),
            reconnect_interval: Duration::from_secs(5),
        }
    }
}

impl TwitchPubSubTimeouts {
    /// Create a builder starting from the defaults.
    pub fn builder() -> TwitchPubSubTimeoutsBuilder {
        TwitchPubSubTimeoutsBuilder {
            timeouts: Self::default(),
        }
    }

    /// Aggressive settings for tests against a local server: sub-second
    /// heartbeat, immediate reconnect.
    pub fn fast() -> Self {
        Self {
            connection_timeout: Duration::from_secs(1),
            ping_interval: Duration::from_millis(200),
            pong_deadline: Duration::from_millis(100),
            reconnect_interval: Duration::from_millis(50),
        }
    }

    /// Whether a duration value means "no timeout".
    pub fn is_no_timeout(d: Duration) -> bool {
        d.is_zero()
    }
}

/// Builder for [`TwitchPubSubTimeouts`].
pub struct TwitchPubSubTimeoutsBuilder {
    timeouts: TwitchPubSubTimeouts,
}

impl TwitchPubSubTimeoutsBuilder {
    /// Set the dial timeout. Zero disables it.
    pub fn connection_timeout(mut self, d: Duration) -> Self {
        self.timeouts.connection_timeout = d;
        self
    }

    /// Set the heartbeat ping interval.
    pub fn ping_interval(mut self, d: Duration) -> Self {
        self.timeouts.ping_interval = d;
        self
    }

    /// Set the pong deadline armed after each ping.
    pub fn pong_deadline(mut self, d: Duration) -> Self {
        self.timeouts.pong_deadline = d;
        self
    }

    /// Set the delay before re-dialing a lost connection.
    pub fn reconnect_interval(mut self, d: Duration) -> Self {
        self.timeouts.reconnect_interval = d;
        self
    }

    /// Finalize the configuration.
    pub fn build(self) -> TwitchPubSubTimeouts {
        self.timeouts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let t = TwitchPubSubTimeouts::default();
        assert_eq!(t.ping_interval, Duration::from_secs(240));
        assert_eq!(t.pong_deadline, Duration::from_secs(9));
        assert_eq!(t.reconnect_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_builder_overrides() {
        let t = TwitchPubSubTimeouts::builder()
            .ping_interval(Duration::from_secs(1))
            .pong_deadline(Duration::from_millis(500))
            .build();
        assert_eq!(t.ping_interval, Duration::from_secs(1));
        assert_eq!(t.pong_deadline, Duration::from_millis(500));
        // untouched fields keep their defaults
        assert_eq!(t.reconnect_interval, Duration::from_secs(5));
    }
}
