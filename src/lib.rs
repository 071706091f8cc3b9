//! Twitch PubSub client with transparent topic sharding.
//!
//! The upstream service caps simultaneous topic subscriptions per WebSocket
//! connection, so this client spreads subscriptions across up to
//! `connection_limit` connections and keeps each one healthy: an
//! application-level PING/PONG heartbeat detects dead sockets faster than
//! TCP will, and lost connections re-dial and re-subscribe their own topics
//! automatically.
//!
//! ```rust,no_run
//! use twitch_pubsub::TwitchPubSubClient;
//!
//! # async fn example() -> twitch_pubsub::Result<()> {
//! let mut client = TwitchPubSubClient::builder().build()?;
//!
//! client.on_chat_moderator_action(|channel_id, action| {
//!     println!(
//!         "{} performed {} in channel {}",
//!         action.created_by, action.moderation_action, channel_id,
//!     );
//! });
//!
//! client
//!     .listen_chat_moderator_actions("117166826", "11148817", "oauth-token")
//!     .await;
//!
//! // Blocks until client.disconnect() is called elsewhere
//! client.start().await
//! # }
//! ```

mod client;
mod connection;
mod connection_manager;
mod error;
mod event_handlers;
pub mod events;
mod models;
mod timeouts;
mod topic;

pub use client::{TwitchPubSubClient, TwitchPubSubClientBuilder, TWITCH_PUBSUB_HOST};
pub use error::{Result, TwitchPubSubError};
pub use event_handlers::{
    ConnectionError, DisconnectReason, EventHandlers, OnConnectCallback, OnDisconnectCallback,
    OnErrorCallback, OnReceiveCallback, OnSendCallback,
};
pub use events::{ParserRegistry, TopicEvent, TopicParser};
pub use models::{ClientMessage, ListenData, MessageData, ServerMessage};
pub use timeouts::{TwitchPubSubTimeouts, TwitchPubSubTimeoutsBuilder};
pub use topic::{Topic, TopicHash};

pub use events::automod_queue::{
    automod_queue_topic, parse_channel_id_from_automod_queue_topic, AutoModFragment,
    AutoModMessage, AutoModMessageContent, AutoModQueueEvent, AutoModSender,
    ContentClassification, FragmentAutoMod,
};
pub use events::bits::{
    bits_event_topic, parse_channel_id_from_bits_topic, BadgeEntitlement, BitsEvent,
};
pub use events::chat_moderator_actions::{
    chat_moderator_actions_topic, parse_channel_id_from_moderation_topic, ChatModeratorAction,
};
pub use events::points::{
    parse_channel_id_from_points_topic, points_event_topic, GlobalCooldown, MaxPerStream,
    MaxPerUserPerStream, PointsEvent, PointsReward, PointsUser,
};
pub use events::subscribe::{
    parse_channel_id_from_subscribe_topic, subscribe_event_topic, Emote, SubMessage,
    SubscribeEvent,
};
pub use events::whispers::{
    parse_user_id_from_whisper_topic, whisper_event_topic, WhisperBadge, WhisperEvent,
    WhisperRecipient, WhisperTags,
};
