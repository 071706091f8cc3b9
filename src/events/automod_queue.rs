//! AutoMod queue events: messages held for moderator review, and their
//! later approval or denial.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{TopicEvent, TopicParser};
use crate::error::{Result, TwitchPubSubError};

pub(crate) const AUTOMOD_QUEUE_TOPIC_PREFIX: &str = "automod-queue";

/// An incoming AutoMod queue action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AutoModQueueEvent {
    pub message: AutoModMessage,
    #[serde(default)]
    pub content_classification: ContentClassification,
    /// `PENDING`, `ALLOWED`, `DENIED` or `EXPIRED`.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub reason_code: String,
    /// The moderator who resolved the message, empty while pending.
    #[serde(default)]
    pub resolver_id: String,
    #[serde(default)]
    pub resolver_login: String,
}

/// The held chat message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AutoModMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub content: AutoModMessageContent,
    #[serde(default)]
    pub sender: AutoModSender,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AutoModMessageContent {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub fragments: Vec<AutoModFragment>,
}

/// A span of the message text, flagged or not.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AutoModFragment {
    #[serde(default)]
    pub text: String,
    /// Per-category confidence levels for the flagged span.
    #[serde(default)]
    pub automod: Option<FragmentAutoMod>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct FragmentAutoMod {
    #[serde(default)]
    pub topics: HashMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AutoModSender {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub chat_color: String,
}

/// Why AutoMod held the message.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ContentClassification {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub level: i64,
}

pub(crate) struct AutoModQueueEventParser;

impl TopicParser for AutoModQueueEventParser {
    fn parse(&self, _topic: &str, payload: &[u8]) -> Result<TopicEvent> {
        #[derive(Deserialize)]
        struct Outer {
            data: AutoModQueueEvent,
        }

        let outer: Outer = serde_json::from_slice(payload).map_err(|e| {
            TwitchPubSubError::MalformedInnerPayload(format!("automod-queue event: {}", e))
        })?;
        Ok(TopicEvent::AutoModQueue(outer.data))
    }
}

/// Returns a properly formatted AutoMod queue topic string with the given
/// moderator and channel ID arguments.
pub fn automod_queue_topic(mod_id: &str, channel_id: &str) -> String {
    format!("{}.{}.{}", AUTOMOD_QUEUE_TOPIC_PREFIX, mod_id, channel_id)
}

/// Parses the channel ID out of an AutoMod queue topic.
/// Topic format: `automod-queue.MODID.CHANNELID`
pub fn parse_channel_id_from_automod_queue_topic(topic: &str) -> Result<String> {
    let parts: Vec<&str> = topic.split('.').collect();
    if parts.len() != 3 {
        return Err(TwitchPubSubError::MalformedTopic(topic.to_string()));
    }
    Ok(parts[2].to_string())
}
