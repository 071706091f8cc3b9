use serde::Serialize;

/// Frames sent from client to server.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Subscribe to a topic. The `nonce` correlates the server's later
    /// `RESPONSE`; this client always sets it.
    #[serde(rename = "LISTEN")]
    Listen {
        nonce: String,
        data: ListenData,
    },

    /// Application-level heartbeat. The server answers with `PONG`.
    #[serde(rename = "PING")]
    Ping,
}

/// Payload of a `LISTEN` frame. The protocol accepts a topic list but this
/// client sends one topic per frame so each subscription gets its own
/// nonce-correlated response.
#[derive(Debug, Clone, Serialize)]
pub struct ListenData {
    pub topics: Vec<String>,
    pub auth_token: String,
}

impl ClientMessage {
    /// Build a single-topic `LISTEN` frame.
    pub fn listen(nonce: String, topic: String, auth_token: String) -> Self {
        Self::Listen {
            nonce,
            data: ListenData {
                topics: vec![topic],
                auth_token,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_frame_shape() {
        let msg = ClientMessage::listen(
            "1".to_string(),
            "whispers.123".to_string(),
            "oauth-token".to_string(),
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "LISTEN",
                "nonce": "1",
                "data": {
                    "topics": ["whispers.123"],
                    "auth_token": "oauth-token",
                },
            })
        );
    }

    #[test]
    fn test_ping_frame_shape() {
        let json = serde_json::to_string(&ClientMessage::Ping).unwrap();
        assert_eq!(json, r#"{"type":"PING"}"#);
    }
}
