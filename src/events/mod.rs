//! Typed topic events and the prefix-to-parser registry.
//!
//! Every inbound `MESSAGE` frame names a topic; the part of the topic
//! before the first `.` selects a parser, and the parser converts the
//! inner payload bytes into one [`TopicEvent`] variant. Adding a new event
//! kind means adding a parser and registering its prefix; the connection
//! and manager layers never change.

pub mod automod_queue;
pub mod bits;
pub mod chat_moderator_actions;
pub mod points;
pub mod subscribe;
pub mod whispers;

use std::collections::HashMap;

use crate::error::{Result, TwitchPubSubError};

/// A parsed event from any subscribed topic.
///
/// The dispatcher matches on the variant to pick the user callback and the
/// positional rule for the topic's scoping identifier.
#[derive(Debug, Clone)]
pub enum TopicEvent {
    ChatModeratorAction(chat_moderator_actions::ChatModeratorAction),
    Bits(bits::BitsEvent),
    Points(points::PointsEvent),
    Subscribe(subscribe::SubscribeEvent),
    AutoModQueue(automod_queue::AutoModQueueEvent),
    Whisper(whispers::WhisperEvent),
}

/// Converts the inner payload of a `MESSAGE` frame into a typed event.
///
/// Implementations own the vendor-specific payload wrapping (some events
/// arrive inside `{"data": …}`, some flat, whispers inside
/// `{"data_object": …}`). Parse failures must be reported as
/// [`TwitchPubSubError::MalformedInnerPayload`].
pub trait TopicParser: Send + Sync {
    /// `topic` is the full topic string the event arrived on; the core
    /// parsers do not need it, but a parser may use it when the payload
    /// layout varies by topic parameter.
    fn parse(&self, topic: &str, payload: &[u8]) -> Result<TopicEvent>;
}

/// Everything before the first `.`, or the whole string when there is none.
pub(crate) fn topic_prefix(topic: &str) -> &str {
    match topic.find('.') {
        Some(idx) => &topic[..idx],
        None => topic,
    }
}

/// Mapping from topic prefix to parser.
///
/// Built once, before the client starts, and frozen afterwards: the
/// client wraps it in an `Arc` at build time, so there is no runtime
/// registration and nothing to race.
///
/// # Example
///
/// ```rust
/// use twitch_pubsub::ParserRegistry;
///
/// // The six core prefixes:
/// let registry = ParserRegistry::with_default_parsers();
/// ```
pub struct ParserRegistry {
    parsers: HashMap<String, Box<dyn TopicParser>>,
}

impl ParserRegistry {
    /// An empty registry. Useful only when replacing the core parser set.
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// A registry with every core prefix registered.
    pub fn with_default_parsers() -> Self {
        let mut registry = Self::new();
        registry.register(
            chat_moderator_actions::CHAT_MODERATOR_ACTIONS_TOPIC_PREFIX,
            Box::new(chat_moderator_actions::ChatModeratorActionParser),
        );
        registry.register(bits::BITS_EVENT_TOPIC_PREFIX, Box::new(bits::BitsEventParser));
        registry.register(
            points::POINTS_EVENT_TOPIC_PREFIX,
            Box::new(points::PointsEventParser),
        );
        registry.register(
            subscribe::SUBSCRIBE_EVENT_TOPIC_PREFIX,
            Box::new(subscribe::SubscribeEventParser),
        );
        registry.register(
            automod_queue::AUTOMOD_QUEUE_TOPIC_PREFIX,
            Box::new(automod_queue::AutoModQueueEventParser),
        );
        registry.register(
            whispers::WHISPER_EVENT_TOPIC_PREFIX,
            Box::new(whispers::WhisperEventParser),
        );
        registry
    }

    /// Install a parser for a topic prefix.
    ///
    /// # Panics
    ///
    /// Panics if the prefix already has a parser. Registering twice is a
    /// programmer error, not a runtime condition.
    pub fn register(&mut self, prefix: impl Into<String>, parser: Box<dyn TopicParser>) {
        let prefix = prefix.into();
        if self.parsers.contains_key(&prefix) {
            panic!("parser already registered for topic prefix {:?}", prefix);
        }
        self.parsers.insert(prefix, parser);
    }

    fn lookup(&self, prefix: &str) -> Option<&dyn TopicParser> {
        self.parsers.get(prefix).map(|p| p.as_ref())
    }

    /// Resolve the topic's prefix to a parser and delegate to it.
    pub fn parse_inner_message(&self, topic: &str, payload: &[u8]) -> Result<TopicEvent> {
        let prefix = topic_prefix(topic);
        let parser = self
            .lookup(prefix)
            .ok_or_else(|| TwitchPubSubError::NoParserAvailable(prefix.to_string()))?;
        parser.parse(topic, payload)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_default_parsers()
    }
}
