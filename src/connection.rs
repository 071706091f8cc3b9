//! One WebSocket session to the PubSub edge.
//!
//! Each connection runs a single background task that owns the socket, the
//! topics placed on this shard, the nonce counter, and the heartbeat state.
//! The task multiplexes four sources in one select: inbound frames, the
//! ping ticker, the one-shot pong deadline, and the command channel.
//!
//! Lifecycle: the first dial happens as soon as the task starts. Any
//! transport error or missed pong deadline tears the socket down and
//! re-dials after `reconnect_interval`; the topic list survives and every
//! held topic is re-sent with a fresh nonce once the socket is live again.
//! Only a `Shutdown` command ends the task.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant as TokioInstant;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message, MaybeTlsStream};

use crate::error::{Result, TwitchPubSubError};
use crate::event_handlers::{ConnectionError, DisconnectReason, EventHandlers};
use crate::events::{ParserRegistry, TopicEvent};
use crate::models::{ClientMessage, ServerMessage};
use crate::timeouts::TwitchPubSubTimeouts;
use crate::topic::Topic;

pub(crate) type WebSocketStream =
    tokio_tungstenite::WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Capacity of the per-connection command channel. Commands are the only
/// writes a connection performs besides its own pings, so this bound plays
/// the writer-queue role.
const COMMAND_CHANNEL_CAPACITY: usize = 100;

/// A sleep target far enough away to be effectively "never".
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// A parsed event travelling from a connection to the client dispatcher.
#[derive(Debug)]
pub(crate) struct SharedMessage {
    pub(crate) topic: String,
    pub(crate) event: TopicEvent,
}

pub(crate) type MessageBusSender = mpsc::Sender<SharedMessage>;

enum ConnCmd {
    /// Subscribe this connection to a topic. Queued on the topic list if
    /// the socket is down; the next successful dial sends it.
    Listen { topic: Topic },
    /// Close the socket, skip reconnection, end the task.
    Shutdown,
}

/// Per-connection subscription state for one topic.
struct TopicState {
    topic: Topic,
    /// Nonce of the most recent LISTEN for this topic. Set when the frame
    /// is sent; a topic holding a nonce is claimed by this connection.
    nonce: Option<String>,
    /// Flips true on the RESPONSE echoing the nonce.
    confirmed: bool,
}

/// Public handle to a connection's background task.
pub(crate) struct Connection {
    cmd_tx: mpsc::Sender<ConnCmd>,
    /// Placement-side topic count, bumped by the manager when it assigns a
    /// topic here so that first-fit sees the claim immediately. Sticky:
    /// topics never migrate off a connection.
    topics_placed: Arc<AtomicUsize>,
    connected: Arc<AtomicBool>,
    _task: JoinHandle<()>,
}

impl Connection {
    /// Spawn the background task; the first dial starts immediately.
    pub(crate) fn spawn(
        host: String,
        bus: MessageBusSender,
        registry: Arc<ParserRegistry>,
        timeouts: TwitchPubSubTimeouts,
        event_handlers: EventHandlers,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));

        let task = ConnectionTask {
            host,
            bus,
            registry,
            timeouts,
            event_handlers,
            connected: connected.clone(),
            topics: Vec::new(),
            nonce_counter: 0,
            ping_time: TokioInstant::now(),
            last_pong: None,
        };
        let handle = tokio::spawn(task.run(cmd_rx));

        Self {
            cmd_tx,
            topics_placed: Arc::new(AtomicUsize::new(0)),
            connected,
            _task: handle,
        }
    }

    /// Number of topics the manager has placed on this connection.
    pub(crate) fn topics_placed(&self) -> usize {
        self.topics_placed.load(Ordering::SeqCst)
    }

    /// Record a placement before the Listen command is sent.
    pub(crate) fn claim_topic_slot(&self) {
        self.topics_placed.fetch_add(1, Ordering::SeqCst);
    }

    /// Whether the socket is currently live.
    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Subscribe this connection to a topic.
    pub(crate) async fn listen(&self, topic: Topic) -> Result<()> {
        self.cmd_tx
            .send(ConnCmd::Listen { topic })
            .await
            .map_err(|_| TwitchPubSubError::NotConnected)
    }

    /// Close the socket without reconnecting and end the task. Safe to
    /// call in any state, any number of times.
    pub(crate) async fn shutdown(&self) {
        let _ = self.cmd_tx.send(ConnCmd::Shutdown).await;
    }
}

/// Heartbeat health window: the last PONG must have arrived at or after
/// the PING that armed the deadline, and within the deadline window.
fn pong_within_deadline(
    last_pong: Option<TokioInstant>,
    ping_time: TokioInstant,
    deadline: Duration,
) -> bool {
    match last_pong {
        Some(pong) => pong >= ping_time && pong.duration_since(ping_time) < deadline,
        None => false,
    }
}

/// State owned by a connection's background task.
struct ConnectionTask {
    host: String,
    bus: MessageBusSender,
    registry: Arc<ParserRegistry>,
    timeouts: TwitchPubSubTimeouts,
    event_handlers: EventHandlers,
    connected: Arc<AtomicBool>,
    topics: Vec<TopicState>,
    /// Strictly increasing for the lifetime of the connection, across
    /// reconnects. Nonces are never reused.
    nonce_counter: u64,
    /// When the most recent PING was sent.
    ping_time: TokioInstant,
    /// When the most recent PONG arrived. Only ever advances.
    last_pong: Option<TokioInstant>,
}

impl ConnectionTask {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<ConnCmd>) {
        let mut ws_stream: Option<WebSocketStream> = None;
        let mut shutdown_requested = false;
        // First dial is immediate; every later one waits out the interval.
        let mut reconnect_delay = Duration::ZERO;

        let mut awaiting_pong = false;
        let mut ping_deadline = TokioInstant::now() + FAR_FUTURE;
        let mut pong_deadline = TokioInstant::now() + FAR_FUTURE;

        loop {
            if shutdown_requested {
                if let Some(mut ws) = ws_stream.take() {
                    let _ = ws.close(None).await;
                }
                let was_connected = self.connected.swap(false, Ordering::SeqCst);
                if was_connected {
                    self.event_handlers
                        .emit_disconnect(DisconnectReason::new("Client disconnected"));
                }
                return;
            }

            if let Some(ws) = ws_stream.as_mut() {
                let ping_sleep = tokio::time::sleep_until(ping_deadline);
                tokio::pin!(ping_sleep);
                let pong_sleep = tokio::time::sleep_until(pong_deadline);
                tokio::pin!(pong_sleep);

                tokio::select! {
                    biased;

                    // Pong deadline: fired `pong_deadline` after a PING went
                    // out. A stale or absent PONG means the socket is dead.
                    _ = &mut pong_sleep, if awaiting_pong => {
                        awaiting_pong = false;
                        if !pong_within_deadline(self.last_pong, self.ping_time, self.timeouts.pong_deadline) {
                            log::warn!(
                                "[twitch-pubsub] no PONG within {:?}, will try to reconnect",
                                self.timeouts.pong_deadline,
                            );
                            self.event_handlers.emit_disconnect(DisconnectReason::new(format!(
                                "Pong deadline ({:?}) missed",
                                self.timeouts.pong_deadline,
                            )));
                            self.connected.store(false, Ordering::SeqCst);
                            ws_stream = None;
                            reconnect_delay = self.timeouts.reconnect_interval;
                            continue;
                        }
                    }

                    // Heartbeat ping
                    _ = &mut ping_sleep => {
                        match self.send_frame(ws, &ClientMessage::Ping).await {
                            Ok(()) => {
                                self.ping_time = TokioInstant::now();
                                awaiting_pong = true;
                                pong_deadline = self.ping_time + self.timeouts.pong_deadline;
                                ping_deadline = self.ping_time + self.timeouts.ping_interval;
                            },
                            Err(e) => {
                                log::warn!("[twitch-pubsub] error sending ping: {}", e);
                                self.event_handlers.emit_disconnect(
                                    DisconnectReason::new(format!("Ping failed: {}", e)),
                                );
                                self.connected.store(false, Ordering::SeqCst);
                                awaiting_pong = false;
                                ws_stream = None;
                                reconnect_delay = self.timeouts.reconnect_interval;
                                continue;
                            },
                        }
                    }

                    cmd = cmd_rx.recv() => match cmd {
                        Some(ConnCmd::Listen { topic }) => {
                            self.topics.push(TopicState { topic, nonce: None, confirmed: false });
                            let idx = self.topics.len() - 1;
                            if let Err(e) = self.send_listen(ws, idx).await {
                                // The topic stays on the list; the reconnect
                                // path re-sends it.
                                log::warn!("[twitch-pubsub] error sending LISTEN: {}", e);
                                self.event_handlers.emit_disconnect(
                                    DisconnectReason::new(format!("LISTEN failed: {}", e)),
                                );
                                self.connected.store(false, Ordering::SeqCst);
                                awaiting_pong = false;
                                ws_stream = None;
                                reconnect_delay = self.timeouts.reconnect_interval;
                                continue;
                            }
                        },
                        Some(ConnCmd::Shutdown) | None => {
                            shutdown_requested = true;
                        },
                    },

                    frame = ws.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            self.event_handlers.emit_receive(&text);
                            if let Err(e) = self.handle_text_frame(&text).await {
                                // Parse errors never terminate a connection
                                log::warn!("[twitch-pubsub] dropping frame: {}", e);
                            }
                        },
                        Some(Ok(Message::Close(frame))) => {
                            let reason = match frame {
                                Some(f) => DisconnectReason::with_code(f.reason.to_string(), f.code.into()),
                                None => DisconnectReason::new("Server closed connection"),
                            };
                            self.event_handlers.emit_disconnect(reason);
                            self.connected.store(false, Ordering::SeqCst);
                            awaiting_pong = false;
                            ws_stream = None;
                            reconnect_delay = self.timeouts.reconnect_interval;
                            continue;
                        },
                        Some(Ok(_)) => {
                            // Binary and control frames are not part of the
                            // protocol; dropped.
                        },
                        Some(Err(e)) => {
                            let msg = e.to_string();
                            self.event_handlers.emit_error(ConnectionError::new(&msg, true));
                            self.event_handlers.emit_disconnect(
                                DisconnectReason::new(format!("WebSocket error: {}", msg)),
                            );
                            self.connected.store(false, Ordering::SeqCst);
                            awaiting_pong = false;
                            ws_stream = None;
                            reconnect_delay = self.timeouts.reconnect_interval;
                            continue;
                        },
                        None => {
                            self.event_handlers.emit_disconnect(
                                DisconnectReason::new("WebSocket stream ended"),
                            );
                            self.connected.store(false, Ordering::SeqCst);
                            awaiting_pong = false;
                            ws_stream = None;
                            reconnect_delay = self.timeouts.reconnect_interval;
                            continue;
                        },
                    },
                }
            } else {
                // Socket down: wait out the reconnect delay, still
                // absorbing commands so Listen and Shutdown are never lost.
                let sleep = tokio::time::sleep(reconnect_delay);
                tokio::pin!(sleep);
                loop {
                    tokio::select! {
                        biased;
                        cmd = cmd_rx.recv() => match cmd {
                            Some(ConnCmd::Listen { topic }) => {
                                self.topics.push(TopicState { topic, nonce: None, confirmed: false });
                            },
                            Some(ConnCmd::Shutdown) | None => {
                                shutdown_requested = true;
                                break;
                            },
                        },
                        _ = &mut sleep => break,
                    }
                }
                if shutdown_requested {
                    continue;
                }

                match self.dial().await {
                    Ok(mut ws) => {
                        log::info!("[twitch-pubsub] connected to {}", self.host);
                        self.connected.store(true, Ordering::SeqCst);
                        match self.resubscribe_all(&mut ws).await {
                            Ok(()) => {
                                self.event_handlers.emit_connect();
                                awaiting_pong = false;
                                ping_deadline = TokioInstant::now() + self.timeouts.ping_interval;
                                pong_deadline = TokioInstant::now() + FAR_FUTURE;
                                ws_stream = Some(ws);
                            },
                            Err(e) => {
                                log::warn!("[twitch-pubsub] resubscribe failed: {}", e);
                                self.connected.store(false, Ordering::SeqCst);
                                reconnect_delay = self.timeouts.reconnect_interval;
                            },
                        }
                    },
                    Err(e) => {
                        log::warn!(
                            "[twitch-pubsub] {}; retrying in {:?}",
                            e,
                            self.timeouts.reconnect_interval,
                        );
                        self.event_handlers.emit_error(ConnectionError::new(e.to_string(), true));
                        reconnect_delay = self.timeouts.reconnect_interval;
                    },
                }
            }
        }
    }

    async fn dial(&self) -> Result<WebSocketStream> {
        log::debug!("[twitch-pubsub] dialing {}", self.host);
        let connect_result =
            if !TwitchPubSubTimeouts::is_no_timeout(self.timeouts.connection_timeout) {
                match tokio::time::timeout(
                    self.timeouts.connection_timeout,
                    connect_async(self.host.as_str()),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        return Err(TwitchPubSubError::TimeoutError(format!(
                            "Dial timeout ({:?})",
                            self.timeouts.connection_timeout,
                        )));
                    },
                }
            } else {
                connect_async(self.host.as_str()).await
            };

        let (stream, _response) = connect_result
            .map_err(|e| TwitchPubSubError::WebSocketError(format!("Dial failed: {}", e)))?;
        Ok(stream)
    }

    fn next_nonce(&mut self) -> String {
        self.nonce_counter += 1;
        self.nonce_counter.to_string()
    }

    /// Send a LISTEN for the topic at `idx`, claiming it with a fresh nonce.
    async fn send_listen(&mut self, ws: &mut WebSocketStream, idx: usize) -> Result<()> {
        let nonce = self.next_nonce();
        let state = &mut self.topics[idx];
        state.nonce = Some(nonce.clone());
        state.confirmed = false;
        let frame = ClientMessage::listen(
            nonce,
            state.topic.name().to_string(),
            state.topic.auth_token().to_string(),
        );
        self.send_frame(ws, &frame).await
    }

    /// Re-send LISTEN for every held topic after a successful dial.
    async fn resubscribe_all(&mut self, ws: &mut WebSocketStream) -> Result<()> {
        if !self.topics.is_empty() {
            log::info!(
                "[twitch-pubsub] subscribing to {} topic(s)",
                self.topics.len(),
            );
        }
        for idx in 0..self.topics.len() {
            self.send_listen(ws, idx).await?;
        }
        Ok(())
    }

    async fn send_frame(&self, ws: &mut WebSocketStream, msg: &ClientMessage) -> Result<()> {
        let payload = serde_json::to_string(msg)?;
        self.event_handlers.emit_send(&payload);
        ws.send(Message::Text(payload.into())).await?;
        Ok(())
    }

    async fn handle_text_frame(&mut self, text: &str) -> Result<()> {
        let msg: ServerMessage = serde_json::from_str(text)
            .map_err(|e| TwitchPubSubError::MalformedMessage(e.to_string()))?;

        match msg {
            ServerMessage::Pong => {
                self.last_pong = Some(TokioInstant::now());
            },
            ServerMessage::Response { nonce, error } => {
                self.handle_response(&nonce, &error);
            },
            ServerMessage::Message { data } => {
                let event = self
                    .registry
                    .parse_inner_message(&data.topic, data.message.as_bytes())?;
                // Bounded bus: blocks when the dispatcher falls behind,
                // which stalls this read loop. A parsed event is never
                // dropped for lack of space.
                if self
                    .bus
                    .send(SharedMessage { topic: data.topic, event })
                    .await
                    .is_err()
                {
                    log::debug!("[twitch-pubsub] message bus closed, event dropped");
                }
            },
            ServerMessage::Unknown => {},
        }
        Ok(())
    }

    /// Correlate a RESPONSE to the LISTEN that carried its nonce.
    ///
    /// A subscription that the server rejected is still marked confirmed:
    /// the failure is recorded for the operator and not retried.
    fn handle_response(&mut self, nonce: &str, error: &str) {
        let state = match self
            .topics
            .iter_mut()
            .find(|t| t.nonce.as_deref() == Some(nonce))
        {
            Some(state) => state,
            None => {
                log::debug!("[twitch-pubsub] RESPONSE with unknown nonce {:?}", nonce);
                return;
            },
        };

        if !error.is_empty() {
            log::error!(
                "[twitch-pubsub] error subscribing to {}: {}",
                state.topic.hash(),
                error,
            );
        }
        state.confirmed = true;
    }
}
