//! In-process mock PubSub server for integration tests.
//!
//! Speaks just enough of the wire protocol to drive the client: it records
//! every `LISTEN` with the connection it arrived on, answers `PING` with
//! `PONG` (unless configured not to), replies to `LISTEN` with a
//! `RESPONSE` echoing the nonce, and lets tests push `MESSAGE` frames.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;

/// Scripted behaviors for a [`MockServer`].
#[derive(Debug, Clone, Default)]
pub struct MockServerConfig {
    /// Swallow `PING` frames instead of answering `PONG`.
    pub drop_pings: bool,
    /// Respond to every `LISTEN` with this error code instead of success.
    pub listen_error: Option<String>,
    /// Push a `MESSAGE` with this inner payload on the listened topic
    /// before sending the `RESPONSE`.
    pub message_before_response: Option<String>,
    /// Close the connection right after responding to its first `LISTEN`.
    pub close_on_listen: bool,
}

/// A `LISTEN` frame as observed on the wire.
#[derive(Debug, Clone)]
pub struct ListenRecord {
    /// Index of the accepted connection the frame arrived on.
    pub connection: usize,
    pub topic: String,
    pub nonce: String,
}

struct ServerState {
    config: MockServerConfig,
    connections_accepted: AtomicUsize,
    listens: Mutex<Vec<ListenRecord>>,
    senders: Mutex<Vec<mpsc::UnboundedSender<Message>>>,
}

pub struct MockServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl MockServer {
    pub async fn start(config: MockServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(ServerState {
            config,
            connections_accepted: AtomicUsize::new(0),
            listens: Mutex::new(Vec::new()),
            senders: Mutex::new(Vec::new()),
        });

        let accept_state = state.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let idx = accept_state.connections_accepted.fetch_add(1, Ordering::SeqCst);
                let conn_state = accept_state.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(idx, stream, conn_state).await;
                });
            }
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Number of WebSocket connections accepted so far (dial count).
    pub fn connections_accepted(&self) -> usize {
        self.state.connections_accepted.load(Ordering::SeqCst)
    }

    /// Every `LISTEN` frame observed so far, in arrival order.
    pub fn listens(&self) -> Vec<ListenRecord> {
        self.state.listens.lock().unwrap().clone()
    }

    /// Push a `MESSAGE` frame for `topic` to every live connection.
    pub fn broadcast_message(&self, topic: &str, inner_payload: &str) {
        let frame = message_frame(topic, inner_payload);
        for sender in self.state.senders.lock().unwrap().iter() {
            let _ = sender.send(frame.clone());
        }
    }

    /// Poll `cond` until it holds or `timeout` elapses.
    pub async fn wait_until(&self, timeout: Duration, mut cond: impl FnMut(&Self) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if cond(self) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cond(self)
    }
}

fn message_frame(topic: &str, inner_payload: &str) -> Message {
    let frame = serde_json::json!({
        "type": "MESSAGE",
        "data": { "topic": topic, "message": inner_payload },
    });
    Message::text(frame.to_string())
}

async fn handle_connection(idx: usize, stream: TcpStream, state: Arc<ServerState>) {
    let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let (mut sink, mut ws_stream) = ws.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    state.senders.lock().unwrap().push(tx.clone());

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() || closing {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_stream.next().await {
        let Message::Text(text) = msg else { continue };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
            continue;
        };

        match value["type"].as_str() {
            Some("PING") => {
                if !state.config.drop_pings {
                    let _ = tx.send(Message::text(r#"{"type":"PONG"}"#));
                }
            },
            Some("LISTEN") => {
                let nonce = value["nonce"].as_str().unwrap_or_default().to_string();
                let topic = value["data"]["topics"][0]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                state.listens.lock().unwrap().push(ListenRecord {
                    connection: idx,
                    topic: topic.clone(),
                    nonce: nonce.clone(),
                });

                if let Some(inner) = &state.config.message_before_response {
                    let _ = tx.send(message_frame(&topic, inner));
                }

                let error = state.config.listen_error.clone().unwrap_or_default();
                let response = serde_json::json!({
                    "type": "RESPONSE",
                    "nonce": nonce,
                    "error": error,
                });
                let _ = tx.send(Message::text(response.to_string()));

                if state.config.close_on_listen {
                    let _ = tx.send(Message::Close(None));
                }
            },
            _ => {},
        }
    }

    writer.abort();
}

/// Inner payload of a bits MESSAGE, as the upstream ships it.
pub const BITS_INNER_PAYLOAD: &str = r#"{"data":{"user_name":"bbaper","channel_name":"pajlada","user_id":"165495734","channel_id":"11148817","time":"2023-06-17T15:39:51.276888655Z","chat_message":"Cheer1 one free bit sir","bits_used":1,"total_bits_used":5,"context":"cheer","badge_entitlement":null},"version":"1.0","message_type":"bits_event","message_id":"540ee281-2f64-5463-ae85-ca79a6126037"}"#;
