//! The user-facing client.
//!
//! A [`TwitchPubSubClient`] owns the message bus, the quit signal, the
//! per-event callback table, and the topic and connection managers.
//! Connections hand parsed events to the bus; [`start`](TwitchPubSubClient::start)
//! runs the single dispatcher loop that routes each event to the callback
//! for its kind, keyed by the channel or user ID embedded in the topic.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};

use crate::connection::SharedMessage;
use crate::connection_manager::ConnectionManager;
use crate::error::{Result, TwitchPubSubError};
use crate::event_handlers::EventHandlers;
use crate::events::automod_queue::{
    self, automod_queue_topic, AutoModQueueEvent,
};
use crate::events::bits::{self, bits_event_topic, BitsEvent};
use crate::events::chat_moderator_actions::{
    self, chat_moderator_actions_topic, ChatModeratorAction,
};
use crate::events::points::{self, points_event_topic, PointsEvent};
use crate::events::subscribe::{self, subscribe_event_topic, SubscribeEvent};
use crate::events::whispers::{self, whisper_event_topic, WhisperEvent};
use crate::events::{ParserRegistry, TopicEvent};
use crate::timeouts::TwitchPubSubTimeouts;
use crate::topic::{Topic, TopicManager};

/// The production PubSub edge.
pub const TWITCH_PUBSUB_HOST: &str = "wss://pubsub-edge.twitch.tv";

/// Capacity of the bus carrying parsed events from connections to the
/// dispatcher. When full, connections block on send, which stalls their
/// socket reads: backpressure instead of loss.
const MESSAGE_BUS_CAPACITY: usize = 50;

type EventCallback<E> = Arc<dyn Fn(String, E) + Send + Sync>;

/// One callback slot per event kind. Installed before
/// [`TwitchPubSubClient::start`] and frozen during delivery.
#[derive(Default)]
struct Callbacks {
    on_chat_moderator_action: Option<EventCallback<ChatModeratorAction>>,
    on_bits_event: Option<EventCallback<BitsEvent>>,
    on_points_event: Option<EventCallback<PointsEvent>>,
    on_subscribe_event: Option<EventCallback<SubscribeEvent>>,
    on_automod_queue_event: Option<EventCallback<AutoModQueueEvent>>,
    on_whisper_event: Option<EventCallback<WhisperEvent>>,
}

/// Invoke one callback slot. A missing callback is logged and the event
/// dropped; a panicking callback is caught and never takes the dispatcher
/// down.
fn invoke<E>(
    callback: &Option<EventCallback<E>>,
    kind: &'static str,
    scoping_id: String,
    event: E,
) {
    let cb = match callback {
        Some(cb) => cb.clone(),
        None => {
            log::debug!("[twitch-pubsub] {}", TwitchPubSubError::MissingCallback(kind));
            return;
        },
    };

    if catch_unwind(AssertUnwindSafe(move || cb(scoping_id, event))).is_err() {
        log::error!("[twitch-pubsub] {} callback panicked", kind);
    }
}

/// Twitch PubSub client.
///
/// Use [`TwitchPubSubClient::builder`] to construct instances, register the
/// callbacks you need, subscribe with [`listen`](TwitchPubSubClient::listen)
/// or the typed helpers, then drive delivery with
/// [`start`](TwitchPubSubClient::start).
///
/// # Examples
///
/// ```rust,no_run
/// use twitch_pubsub::TwitchPubSubClient;
///
/// # async fn example() -> twitch_pubsub::Result<()> {
/// let mut client = TwitchPubSubClient::builder().build()?;
/// client.on_bits_event(|channel_id, event| {
///     println!("{} cheered {} bits in {}", event.user_name, event.bits_used, channel_id);
/// });
///
/// client.listen_bits_event("11148817", "oauth-token").await;
/// client.start().await // blocks until disconnect()
/// # }
/// ```
pub struct TwitchPubSubClient {
    connection_manager: ConnectionManager,
    topic_manager: TopicManager,
    callbacks: Callbacks,
    bus_rx: Mutex<Option<mpsc::Receiver<SharedMessage>>>,
    quit_tx: watch::Sender<bool>,
}

impl std::fmt::Debug for TwitchPubSubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitchPubSubClient").finish_non_exhaustive()
    }
}

impl TwitchPubSubClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> TwitchPubSubClientBuilder {
        TwitchPubSubClientBuilder::new()
    }

    /// Max number of simultaneous connections (default 10).
    pub fn set_connection_limit(&self, limit: usize) {
        self.connection_manager.set_connection_limit(limit);
    }

    /// Max number of topics per connection (default 50).
    pub fn set_topic_limit(&self, limit: usize) {
        self.connection_manager.set_topic_limit(limit);
    }

    /// Whether any connection currently has a live socket.
    pub fn is_connected(&self) -> bool {
        self.connection_manager.is_connected()
    }

    // ── Callback registration ───────────────────────────────────────────

    /// Attach the callback for moderation actions. Receives the channel ID
    /// from the topic and the parsed event.
    pub fn on_chat_moderator_action(
        &mut self,
        f: impl Fn(String, ChatModeratorAction) + Send + Sync + 'static,
    ) {
        self.callbacks.on_chat_moderator_action = Some(Arc::new(f));
    }

    /// Attach the callback for bits events.
    pub fn on_bits_event(&mut self, f: impl Fn(String, BitsEvent) + Send + Sync + 'static) {
        self.callbacks.on_bits_event = Some(Arc::new(f));
    }

    /// Attach the callback for channel points redemptions.
    pub fn on_points_event(&mut self, f: impl Fn(String, PointsEvent) + Send + Sync + 'static) {
        self.callbacks.on_points_event = Some(Arc::new(f));
    }

    /// Attach the callback for subscription events.
    pub fn on_subscribe_event(
        &mut self,
        f: impl Fn(String, SubscribeEvent) + Send + Sync + 'static,
    ) {
        self.callbacks.on_subscribe_event = Some(Arc::new(f));
    }

    /// Attach the callback for AutoMod queue events.
    pub fn on_automod_queue_event(
        &mut self,
        f: impl Fn(String, AutoModQueueEvent) + Send + Sync + 'static,
    ) {
        self.callbacks.on_automod_queue_event = Some(Arc::new(f));
    }

    /// Attach the callback for whispers. Receives the listening user's ID
    /// from the topic and the parsed event.
    pub fn on_whisper_event(&mut self, f: impl Fn(String, WhisperEvent) + Send + Sync + 'static) {
        self.callbacks.on_whisper_event = Some(Arc::new(f));
    }

    // ── Subscribing ─────────────────────────────────────────────────────

    /// Subscribe to a topic with the credential authorizing it.
    ///
    /// Idempotent by `(topic, credential)`: repeated calls with identical
    /// arguments result in exactly one `LISTEN` frame. With both the
    /// connection and topic limits saturated the topic is dropped with a
    /// logged error.
    pub async fn listen(&self, topic_name: impl Into<String>, auth_token: impl Into<String>) {
        let topic = Topic::new(topic_name, auth_token);
        if !self.topic_manager.add(&topic) {
            log::debug!("[twitch-pubsub] already listening to {}", topic.hash());
            return;
        }
        self.connection_manager.refresh_topic(topic).await;
    }

    /// Listen to the `chat_moderator_actions` topic.
    /// Required scope on `auth_token`: `channel:moderate`.
    pub async fn listen_chat_moderator_actions(
        &self,
        user_id: &str,
        channel_id: &str,
        auth_token: &str,
    ) {
        self.listen(chat_moderator_actions_topic(user_id, channel_id), auth_token)
            .await;
    }

    /// Listen to the `channel-bits-events-v1` topic.
    /// Required scope on `auth_token`: `bits:read`.
    pub async fn listen_bits_event(&self, channel_id: &str, auth_token: &str) {
        self.listen(bits_event_topic(channel_id), auth_token).await;
    }

    /// Listen to the `channel-points-channel-v1` topic.
    /// Required scope on `auth_token`: `channel:read:redemptions`.
    pub async fn listen_points_event(&self, channel_id: &str, auth_token: &str) {
        self.listen(points_event_topic(channel_id), auth_token).await;
    }

    /// Listen to the `channel-subscribe-events-v1` topic.
    /// Required scope on `auth_token`: `channel:read:subscriptions`.
    pub async fn listen_subscribe_event(&self, channel_id: &str, auth_token: &str) {
        self.listen(subscribe_event_topic(channel_id), auth_token).await;
    }

    /// Listen to the `automod-queue` topic.
    /// Required scope on `auth_token`: `channel:moderate`.
    pub async fn listen_automod_queue(&self, mod_id: &str, channel_id: &str, auth_token: &str) {
        self.listen(automod_queue_topic(mod_id, channel_id), auth_token)
            .await;
    }

    /// Listen to the `whispers` topic.
    /// Required scope on `auth_token`: `whispers:read`.
    pub async fn listen_whispers(&self, user_id: &str, auth_token: &str) {
        self.listen(whisper_event_topic(user_id), auth_token).await;
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Run the dispatcher until [`disconnect`](TwitchPubSubClient::disconnect)
    /// is called, then return [`TwitchPubSubError::DisconnectedByUser`].
    ///
    /// Events that arrived before `start` sit in the bounded bus and are
    /// delivered first. Calling `start` a second time is a configuration
    /// error.
    pub async fn start(&self) -> Result<()> {
        let mut bus_rx = self.bus_rx.lock().unwrap().take().ok_or_else(|| {
            TwitchPubSubError::ConfigurationError("start may only be called once".to_string())
        })?;

        let mut quit_rx = self.quit_tx.subscribe();
        if *quit_rx.borrow() {
            return Err(TwitchPubSubError::DisconnectedByUser);
        }

        loop {
            tokio::select! {
                biased;

                _ = quit_rx.changed() => {
                    return Err(TwitchPubSubError::DisconnectedByUser);
                }

                msg = bus_rx.recv() => match msg {
                    Some(msg) => self.dispatch(msg),
                    // The manager holds a bus sender for the client's
                    // lifetime, so this only happens during teardown.
                    None => return Err(TwitchPubSubError::DisconnectedByUser),
                },
            }
        }
    }

    /// Close every connection and end the dispatcher. Idempotent and safe
    /// to call from any state, including before `start` and mid-dial.
    pub async fn disconnect(&self) {
        self.quit_tx.send_replace(true);
        self.connection_manager.shutdown().await;
    }

    /// Route one bus message to the callback for its event kind, keyed by
    /// the scoping identifier at that kind's position in the topic.
    fn dispatch(&self, msg: SharedMessage) {
        let SharedMessage { topic, event } = msg;
        match event {
            TopicEvent::ChatModeratorAction(event) => {
                match chat_moderator_actions::parse_channel_id_from_moderation_topic(&topic) {
                    Ok(channel_id) => invoke(
                        &self.callbacks.on_chat_moderator_action,
                        "chat_moderator_actions",
                        channel_id,
                        event,
                    ),
                    Err(e) => log::warn!("[twitch-pubsub] {}", e),
                }
            },
            TopicEvent::Bits(event) => match bits::parse_channel_id_from_bits_topic(&topic) {
                Ok(channel_id) => invoke(&self.callbacks.on_bits_event, "bits", channel_id, event),
                Err(e) => log::warn!("[twitch-pubsub] {}", e),
            },
            TopicEvent::Points(event) => match points::parse_channel_id_from_points_topic(&topic) {
                Ok(channel_id) => {
                    invoke(&self.callbacks.on_points_event, "points", channel_id, event)
                },
                Err(e) => log::warn!("[twitch-pubsub] {}", e),
            },
            TopicEvent::Subscribe(event) => {
                match subscribe::parse_channel_id_from_subscribe_topic(&topic) {
                    Ok(channel_id) => invoke(
                        &self.callbacks.on_subscribe_event,
                        "subscribe",
                        channel_id,
                        event,
                    ),
                    Err(e) => log::warn!("[twitch-pubsub] {}", e),
                }
            },
            TopicEvent::AutoModQueue(event) => {
                match automod_queue::parse_channel_id_from_automod_queue_topic(&topic) {
                    Ok(channel_id) => invoke(
                        &self.callbacks.on_automod_queue_event,
                        "automod-queue",
                        channel_id,
                        event,
                    ),
                    Err(e) => log::warn!("[twitch-pubsub] {}", e),
                }
            },
            TopicEvent::Whisper(event) => {
                match whispers::parse_user_id_from_whisper_topic(&topic) {
                    Ok(user_id) => {
                        invoke(&self.callbacks.on_whisper_event, "whispers", user_id, event)
                    },
                    Err(e) => log::warn!("[twitch-pubsub] {}", e),
                }
            },
        }
    }
}

/// Builder for [`TwitchPubSubClient`] instances.
pub struct TwitchPubSubClientBuilder {
    host: String,
    timeouts: TwitchPubSubTimeouts,
    event_handlers: EventHandlers,
    registry: ParserRegistry,
    connection_limit: Option<usize>,
    topic_limit: Option<usize>,
}

impl TwitchPubSubClientBuilder {
    fn new() -> Self {
        Self {
            host: TWITCH_PUBSUB_HOST.to_string(),
            timeouts: TwitchPubSubTimeouts::default(),
            event_handlers: EventHandlers::default(),
            registry: ParserRegistry::with_default_parsers(),
            connection_limit: None,
            topic_limit: None,
        }
    }

    /// Override the PubSub host (`ws://` or `wss://`). Defaults to
    /// [`TWITCH_PUBSUB_HOST`]; mainly useful against a test server.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the heartbeat and reconnect timing.
    pub fn timeouts(mut self, timeouts: TwitchPubSubTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Register connection lifecycle hooks.
    pub fn event_handlers(mut self, handlers: EventHandlers) -> Self {
        self.event_handlers = handlers;
        self
    }

    /// Replace the parser registry. The registry is frozen at build time;
    /// extend it with additional prefixes before passing it in.
    pub fn parser_registry(mut self, registry: ParserRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Max number of simultaneous connections (default 10).
    pub fn connection_limit(mut self, limit: usize) -> Self {
        self.connection_limit = Some(limit);
        self
    }

    /// Max number of topics per connection (default 50).
    pub fn topic_limit(mut self, limit: usize) -> Self {
        self.topic_limit = Some(limit);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<TwitchPubSubClient> {
        if !self.host.starts_with("ws://") && !self.host.starts_with("wss://") {
            return Err(TwitchPubSubError::ConfigurationError(format!(
                "host must be a ws:// or wss:// URL, got {:?}",
                self.host,
            )));
        }

        let (bus_tx, bus_rx) = mpsc::channel(MESSAGE_BUS_CAPACITY);
        let (quit_tx, _quit_rx) = watch::channel(false);

        let connection_manager = ConnectionManager::new(
            self.host,
            bus_tx,
            Arc::new(self.registry),
            self.timeouts,
            self.event_handlers,
        );
        if let Some(limit) = self.connection_limit {
            connection_manager.set_connection_limit(limit);
        }
        if let Some(limit) = self.topic_limit {
            connection_manager.set_topic_limit(limit);
        }

        Ok(TwitchPubSubClient {
            connection_manager,
            topic_manager: TopicManager::new(),
            callbacks: Callbacks::default(),
            bus_rx: Mutex::new(Some(bus_rx)),
            quit_tx,
        })
    }
}
