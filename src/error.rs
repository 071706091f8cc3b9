//! Error types for twitch-pubsub client operations.
//!
//! Covers wire-level failures (envelope and payload parsing), subscription
//! routing problems, and transport errors.

use std::fmt;

/// Result type alias using [`TwitchPubSubError`]
pub type Result<T> = std::result::Result<T, TwitchPubSubError>;

/// Errors that can occur during twitch-pubsub operations.
///
/// Inbound parse errors (`MalformedMessage`, `MalformedInnerPayload`,
/// `MalformedTopic`, `NoParserAvailable`) are logged and the offending frame
/// dropped; they never terminate a connection. Transport errors tear the
/// connection down and trigger the automatic reconnect.
#[derive(Debug)]
pub enum TwitchPubSubError {
    /// A command was issued against a connection whose background task is
    /// no longer running.
    NotConnected,

    /// Returned from [`TwitchPubSubClient::start`](crate::TwitchPubSubClient::start)
    /// after [`disconnect`](crate::TwitchPubSubClient::disconnect) was called.
    DisconnectedByUser,

    /// The outer frame envelope did not parse as JSON.
    MalformedMessage(String),

    /// A topic parser rejected the inner JSON payload.
    MalformedInnerPayload(String),

    /// A topic string did not match the expected part count for its prefix.
    MalformedTopic(String),

    /// No parser is registered for the topic prefix.
    NoParserAvailable(String),

    /// An event parsed but no user callback is registered for its kind.
    /// Non-fatal; the dispatcher logs and drops the event.
    MissingCallback(&'static str),

    /// WebSocket connection or protocol errors
    WebSocketError(String),

    /// JSON serialization/deserialization errors
    SerializationError(String),

    /// Dial or handshake timeout
    TimeoutError(String),

    /// Invalid configuration (bad host, client misuse)
    ConfigurationError(String),
}

impl fmt::Display for TwitchPubSubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "Not connected"),
            Self::DisconnectedByUser => write!(f, "Disconnected by user"),
            Self::MalformedMessage(msg) => write!(f, "Malformed message: {}", msg),
            Self::MalformedInnerPayload(msg) => write!(f, "Malformed inner payload: {}", msg),
            Self::MalformedTopic(topic) => write!(f, "Malformed topic: {}", topic),
            Self::NoParserAvailable(prefix) => {
                write!(f, "No parser available for topic prefix: {}", prefix)
            },
            Self::MissingCallback(kind) => {
                write!(f, "No callback registered for {} events", kind)
            },
            Self::WebSocketError(msg) => write!(f, "WebSocket error: {}", msg),
            Self::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Self::TimeoutError(msg) => write!(f, "Timeout: {}", msg),
            Self::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for TwitchPubSubError {}

impl From<serde_json::Error> for TwitchPubSubError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TwitchPubSubError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocketError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TwitchPubSubError::NoParserAvailable("weird-prefix".to_string());
        assert_eq!(
            err.to_string(),
            "No parser available for topic prefix: weird-prefix"
        );

        let err = TwitchPubSubError::MalformedTopic("whispers".to_string());
        assert_eq!(err.to_string(), "Malformed topic: whispers");

        let err = TwitchPubSubError::DisconnectedByUser;
        assert_eq!(err.to_string(), "Disconnected by user");
    }
}
