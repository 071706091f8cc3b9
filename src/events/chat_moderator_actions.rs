//! Moderation actions: bans, unbans, timeouts, message deletions, chat-mode
//! changes, AutoMod level changes, mod grants.

use serde::Deserialize;

use super::{TopicEvent, TopicParser};
use crate::error::{Result, TwitchPubSubError};

pub(crate) const CHAT_MODERATOR_ACTIONS_TOPIC_PREFIX: &str = "chat_moderator_actions";

/// An incoming moderation action on a channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatModeratorAction {
    #[serde(rename = "type", default)]
    pub action_type: String,
    #[serde(default)]
    pub moderation_action: String,
    /// Action arguments, e.g. `[target, duration, reason]` for a timeout.
    #[serde(rename = "args", default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub created_by_user_id: String,
    #[serde(default)]
    pub msg_id: String,
    #[serde(default)]
    pub target_user_id: String,
}

pub(crate) struct ChatModeratorActionParser;

impl TopicParser for ChatModeratorActionParser {
    fn parse(&self, _topic: &str, payload: &[u8]) -> Result<TopicEvent> {
        #[derive(Deserialize)]
        struct Outer {
            data: ChatModeratorAction,
        }

        let outer: Outer = serde_json::from_slice(payload).map_err(|e| {
            TwitchPubSubError::MalformedInnerPayload(format!("chat_moderator_actions: {}", e))
        })?;
        Ok(TopicEvent::ChatModeratorAction(outer.data))
    }
}

/// Returns a properly formatted moderation action topic string with the
/// given user and channel ID arguments.
pub fn chat_moderator_actions_topic(user_id: &str, channel_id: &str) -> String {
    format!("{}.{}.{}", CHAT_MODERATOR_ACTIONS_TOPIC_PREFIX, user_id, channel_id)
}

/// Parses the channel ID out of a moderation action topic.
/// Topic format: `chat_moderator_actions.USERID.CHANNELID`
pub fn parse_channel_id_from_moderation_topic(topic: &str) -> Result<String> {
    let parts: Vec<&str> = topic.split('.').collect();
    if parts.len() != 3 {
        return Err(TwitchPubSubError::MalformedTopic(topic.to_string()));
    }
    Ok(parts[2].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Captured timeout action
    const TIMEOUT_PAYLOAD: &str = r#"{"type":"moderation_action","data":{"type":"chat_login_moderation","moderation_action":"timeout","args":["weeb123456","5","reason here"],"created_by":"pajlada","created_by_user_id":"11148817","created_at":"2021-12-18T15:39:38.525054579Z","msg_id":"","target_user_id":"163915749","target_user_login":"","from_automod":false}}"#;

    const BAN_PAYLOAD: &str = r#"{"type":"moderation_action","data":{"type":"chat_login_moderation","moderation_action":"ban","args":["weeb123456","reason xd"],"created_by":"pajlada","created_by_user_id":"11148817","created_at":"2021-12-18T15:45:43.448962982Z","msg_id":"","target_user_id":"163915749","target_user_login":"","from_automod":false}}"#;

    fn parse(payload: &str) -> ChatModeratorAction {
        match ChatModeratorActionParser
            .parse("chat_moderator_actions.117166826.11148817", payload.as_bytes())
            .unwrap()
        {
            TopicEvent::ChatModeratorAction(event) => event,
            other => panic!("expected moderation action, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_timeout() {
        let event = parse(TIMEOUT_PAYLOAD);
        assert_eq!(event.moderation_action, "timeout");
        assert_eq!(event.arguments, vec!["weeb123456", "5", "reason here"]);
        assert_eq!(event.created_by, "pajlada");
        assert_eq!(event.created_by_user_id, "11148817");
        assert_eq!(event.target_user_id, "163915749");
    }

    #[test]
    fn test_parse_ban() {
        let event = parse(BAN_PAYLOAD);
        assert_eq!(event.moderation_action, "ban");
        assert_eq!(event.arguments, vec!["weeb123456", "reason xd"]);
    }

    #[test]
    fn test_topic_round_trip() {
        let topic = chat_moderator_actions_topic("123", "456");
        assert_eq!(topic, "chat_moderator_actions.123.456");
        assert_eq!(parse_channel_id_from_moderation_topic(&topic).unwrap(), "456");
    }

    #[test]
    fn test_malformed_topic() {
        assert!(matches!(
            parse_channel_id_from_moderation_topic("chat_moderator_actions.123").unwrap_err(),
            TwitchPubSubError::MalformedTopic(_)
        ));
    }
}
