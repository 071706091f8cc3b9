//! Bits (cheer) events.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{TopicEvent, TopicParser};
use crate::error::{Result, TwitchPubSubError};

pub(crate) const BITS_EVENT_TOPIC_PREFIX: &str = "channel-bits-events-v1";

/// An incoming cheer on a channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BitsEvent {
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub channel_name: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub channel_id: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub chat_message: String,
    #[serde(default)]
    pub bits_used: i64,
    /// Lifetime total for this user in this channel.
    #[serde(default)]
    pub total_bits_used: i64,
    #[serde(default)]
    pub context: String,
    /// Present only when the cheer unlocked a new bits badge.
    #[serde(default)]
    pub badge_entitlement: Option<BadgeEntitlement>,
}

/// Bits badge unlocked by a cheer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BadgeEntitlement {
    #[serde(default)]
    pub new_version: i64,
    #[serde(default)]
    pub previous_version: i64,
}

pub(crate) struct BitsEventParser;

impl TopicParser for BitsEventParser {
    fn parse(&self, _topic: &str, payload: &[u8]) -> Result<TopicEvent> {
        #[derive(Deserialize)]
        struct Outer {
            data: BitsEvent,
        }

        let outer: Outer = serde_json::from_slice(payload).map_err(|e| {
            TwitchPubSubError::MalformedInnerPayload(format!("bits event: {}", e))
        })?;
        Ok(TopicEvent::Bits(outer.data))
    }
}

/// Returns a properly formatted bits event topic string with the given
/// channel ID argument.
pub fn bits_event_topic(channel_id: &str) -> String {
    format!("{}.{}", BITS_EVENT_TOPIC_PREFIX, channel_id)
}

/// Parses the channel ID out of a bits event topic.
/// Topic format: `channel-bits-events-v1.CHANNELID`
pub fn parse_channel_id_from_bits_topic(topic: &str) -> Result<String> {
    let parts: Vec<&str> = topic.split('.').collect();
    if parts.len() != 2 {
        return Err(TwitchPubSubError::MalformedTopic(topic.to_string()));
    }
    Ok(parts[1].to_string())
}
