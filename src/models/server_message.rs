use serde::Deserialize;

/// Frames received from the server.
///
/// Types this client does not recognize (e.g. `RECONNECT` advisories)
/// deserialize to [`Unknown`](ServerMessage::Unknown) and are dropped by
/// the connection without tearing anything down.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Heartbeat reply to a `PING` we sent.
    #[serde(rename = "PONG")]
    Pong,

    /// Reply to a `LISTEN` frame, correlated by nonce. An empty `error`
    /// string means the subscription was accepted.
    #[serde(rename = "RESPONSE")]
    Response {
        #[serde(default)]
        nonce: String,
        #[serde(default)]
        error: String,
    },

    /// An event pushed on a subscribed topic.
    #[serde(rename = "MESSAGE")]
    Message { data: MessageData },

    #[serde(other)]
    Unknown,
}

/// Payload of a `MESSAGE` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageData {
    /// The topic the event was published on.
    pub topic: String,
    /// The inner event, delivered as a string-escaped JSON document.
    /// Serde's string decode already unescapes it; the bytes of this field
    /// are the inner JSON.
    pub message: String,
}
