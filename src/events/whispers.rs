//! Whisper (direct message) events.

use serde::Deserialize;
use serde_json::Value;

use super::{TopicEvent, TopicParser};
use crate::error::{Result, TwitchPubSubError};

pub(crate) const WHISPER_EVENT_TOPIC_PREFIX: &str = "whispers";

/// An incoming whisper for the listening user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WhisperEvent {
    #[serde(default)]
    pub message_id: String,
    /// Sequence number within the thread.
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub body: String,
    /// Unix timestamp in seconds.
    #[serde(default)]
    pub sent_ts: i64,
    #[serde(default)]
    pub from_id: i64,
    #[serde(default)]
    pub tags: WhisperTags,
    #[serde(default)]
    pub recipient: WhisperRecipient,
    #[serde(default)]
    pub nonce: String,
}

/// Sender display metadata.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct WhisperTags {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub emotes: Option<Vec<Value>>,
    #[serde(default)]
    pub badges: Vec<WhisperBadge>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WhisperBadge {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct WhisperRecipient {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub color: String,
}

pub(crate) struct WhisperEventParser;

impl TopicParser for WhisperEventParser {
    fn parse(&self, _topic: &str, payload: &[u8]) -> Result<TopicEvent> {
        // Whispers carry their event twice: `data` as an escaped string and
        // `data_object` as plain JSON. Only the object form is used.
        #[derive(Deserialize)]
        struct Outer {
            data_object: WhisperEvent,
        }

        let outer: Outer = serde_json::from_slice(payload).map_err(|e| {
            TwitchPubSubError::MalformedInnerPayload(format!("whisper event: {}", e))
        })?;
        Ok(TopicEvent::Whisper(outer.data_object))
    }
}

/// Returns a properly formatted whisper topic string with the given user ID
/// argument.
pub fn whisper_event_topic(user_id: &str) -> String {
    format!("{}.{}", WHISPER_EVENT_TOPIC_PREFIX, user_id)
}

/// Parses the user ID out of a whisper topic.
/// Topic format: `whispers.USERID`
pub fn parse_user_id_from_whisper_topic(topic: &str) -> Result<String> {
    let parts: Vec<&str> = topic.split('.').collect();
    if parts.len() != 2 {
        return Err(TwitchPubSubError::MalformedTopic(topic.to_string()));
    }
    Ok(parts[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHISPER_PAYLOAD: &str = r##"{"type":"whisper_received","data":"{\"message_id\":\"a1b2c3\"}","data_object":{"message_id":"a1b2c3","id":42,"thread_id":"117166826_165495734","body":"hi there","sent_ts":1687082533,"from_id":165495734,"tags":{"login":"bbaper","display_name":"bbaper","color":"#FF69B4","emotes":[],"badges":[{"id":"glhf-pledge","version":"1"}]},"recipient":{"id":117166826,"username":"randers","display_name":"randers","color":""},"nonce":"abc123"}}"##;

    #[test]
    fn test_parse_whisper() {
        let event = match WhisperEventParser
            .parse("whispers.117166826", WHISPER_PAYLOAD.as_bytes())
            .unwrap()
        {
            TopicEvent::Whisper(event) => event,
            other => panic!("expected whisper event, got {:?}", other),
        };

        assert_eq!(event.message_id, "a1b2c3");
        assert_eq!(event.id, 42);
        assert_eq!(event.thread_id, "117166826_165495734");
        assert_eq!(event.body, "hi there");
        assert_eq!(event.from_id, 165495734);
        assert_eq!(event.tags.login, "bbaper");
        assert_eq!(event.tags.badges.len(), 1);
        assert_eq!(event.tags.badges[0].id, "glhf-pledge");
        assert_eq!(event.recipient.username, "randers");
        assert_eq!(event.nonce, "abc123");
    }

    #[test]
    fn test_topic_round_trip() {
        let topic = whisper_event_topic("117166826");
        assert_eq!(topic, "whispers.117166826");
        assert_eq!(parse_user_id_from_whisper_topic(&topic).unwrap(), "117166826");
    }

    #[test]
    fn test_malformed_topic() {
        assert!(matches!(
            parse_user_id_from_whisper_topic("whispers").unwrap_err(),
            TwitchPubSubError::MalformedTopic(_)
        ));
        assert!(matches!(
            parse_user_id_from_whisper_topic("whispers.123.456").unwrap_err(),
            TwitchPubSubError::MalformedTopic(_)
        ));
    }
}
