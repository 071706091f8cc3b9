//! Channel points redemption events.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{TopicEvent, TopicParser};
use crate::error::{Result, TwitchPubSubError};

pub(crate) const POINTS_EVENT_TOPIC_PREFIX: &str = "channel-points-channel-v1";

/// An incoming channel points redemption.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PointsEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user: PointsUser,
    #[serde(default)]
    pub channel_id: String,
    pub redeemed_at: DateTime<Utc>,
    #[serde(default)]
    pub reward: PointsReward,
    /// Text the viewer attached, for rewards that ask for input.
    #[serde(default)]
    pub user_input: Option<String>,
    #[serde(default)]
    pub status: String,
}

/// The redeeming viewer.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PointsUser {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub display_name: String,
}

/// The redeemed reward as configured by the broadcaster.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PointsReward {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub cost: i64,
    #[serde(default)]
    pub is_user_input_required: bool,
    #[serde(default)]
    pub is_sub_only: bool,
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub is_in_stock: bool,
    #[serde(default)]
    pub max_per_stream: MaxPerStream,
    #[serde(default)]
    pub max_per_user_per_stream: MaxPerUserPerStream,
    #[serde(default)]
    pub global_cooldown: GlobalCooldown,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MaxPerStream {
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub max_per_stream: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MaxPerUserPerStream {
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub max_per_user_per_stream: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct GlobalCooldown {
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub global_cooldown_seconds: i64,
}

pub(crate) struct PointsEventParser;

impl TopicParser for PointsEventParser {
    fn parse(&self, _topic: &str, payload: &[u8]) -> Result<TopicEvent> {
        // Redemptions arrive one level deeper than the other wrapped events
        #[derive(Deserialize)]
        struct Outer {
            data: OuterData,
        }

        #[derive(Deserialize)]
        struct OuterData {
            redemption: PointsEvent,
        }

        let outer: Outer = serde_json::from_slice(payload).map_err(|e| {
            TwitchPubSubError::MalformedInnerPayload(format!("points event: {}", e))
        })?;
        Ok(TopicEvent::Points(outer.data.redemption))
    }
}

/// Returns a properly formatted points event topic string with the given
/// channel ID argument.
pub fn points_event_topic(channel_id: &str) -> String {
    format!("{}.{}", POINTS_EVENT_TOPIC_PREFIX, channel_id)
}

/// Parses the channel ID out of a points event topic.
/// Topic format: `channel-points-channel-v1.CHANNELID`
pub fn parse_channel_id_from_points_topic(topic: &str) -> Result<String> {
    let parts: Vec<&str> = topic.split('.').collect();
    if parts.len() != 2 {
        return Err(TwitchPubSubError::MalformedTopic(topic.to_string()));
    }
    Ok(parts[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REDEMPTION_PAYLOAD: &str = r#"{"type":"reward-redeemed","data":{"timestamp":"2023-06-18T10:02:44.124384331Z","redemption":{"id":"9c708a48-0d32-4e79-b9f0-8f5fb1a07e11","user":{"id":"165495734","login":"bbaper","display_name":"bbaper"},"channel_id":"11148817","redeemed_at":"2023-06-18T10:02:44.124384331Z","reward":{"id":"e96c35e2-8b4c-4d50-9e2c-441e83f51f3a","title":"vip me","prompt":"gives you vip","cost":50000,"is_user_input_required":false,"is_sub_only":false,"is_enabled":true,"is_paused":false,"is_in_stock":true,"max_per_stream":{"is_enabled":false,"max_per_stream":0},"max_per_user_per_stream":{"is_enabled":false,"max_per_user_per_stream":0},"global_cooldown":{"is_enabled":false,"global_cooldown_seconds":0}},"status":"UNFULFILLED"}}}"#;

    #[test]
    fn test_parse_redemption() {
        let event = match PointsEventParser
            .parse("channel-points-channel-v1.11148817", REDEMPTION_PAYLOAD.as_bytes())
            .unwrap()
        {
            TopicEvent::Points(event) => event,
            other => panic!("expected points event, got {:?}", other),
        };

        assert_eq!(event.id, "9c708a48-0d32-4e79-b9f0-8f5fb1a07e11");
        assert_eq!(event.user.login, "bbaper");
        assert_eq!(event.channel_id, "11148817");
        assert_eq!(event.reward.title, "vip me");
        assert_eq!(event.reward.cost, 50000);
        assert!(!event.reward.is_sub_only);
        assert_eq!(event.status, "UNFULFILLED");
        assert_eq!(event.user_input, None);
    }

    #[test]
    fn test_topic_round_trip() {
        let topic = points_event_topic("11148817");
        assert_eq!(topic, "channel-points-channel-v1.11148817");
        assert_eq!(parse_channel_id_from_points_topic(&topic).unwrap(), "11148817");
    }

    #[test]
    fn test_malformed_topic() {
        assert!(matches!(
            parse_channel_id_from_points_topic("channel-points-channel-v1").unwrap_err(),
            TwitchPubSubError::MalformedTopic(_)
        ));
    }
}
