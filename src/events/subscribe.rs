//! Channel subscription events: subs, resubs, and gift subs.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{TopicEvent, TopicParser};
use crate::error::{Result, TwitchPubSubError};

pub(crate) const SUBSCRIBE_EVENT_TOPIC_PREFIX: &str = "channel-subscribe-events-v1";

/// An incoming subscription event.
///
/// Unlike the other event kinds, the inner payload is flat, with no
/// `{"data": …}` wrapper.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscribeEvent {
    /// The channel that was subscribed or subgifted to.
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub channel_name: String,

    /// The subscribing or gifting user. Empty for anonymous gifts.
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub display_name: String,

    /// The receiving user for gift subscriptions.
    #[serde(default)]
    pub recipient_id: String,
    #[serde(default)]
    pub recipient_user_name: String,
    #[serde(default)]
    pub recipient_display_name: String,

    pub time: DateTime<Utc>,

    /// Subscription plan ID: `Prime`, `1000`, `2000` or `3000`.
    #[serde(default)]
    pub sub_plan: String,
    #[serde(default)]
    pub sub_plan_name: String,

    /// Cumulative tenure months in the channel.
    #[serde(default)]
    pub cumulative_months: i64,
    /// Most recent contiguous tenure streak.
    #[serde(default)]
    pub streak_months: i64,

    /// `sub`, `resub`, `subgift` or `anonsubgift`.
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub is_gift: bool,

    #[serde(default)]
    pub sub_message: SubMessage,
}

/// The resub share message, if any.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SubMessage {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub emotes: Option<Vec<Emote>>,
}

/// An emote range inside a share message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Emote {
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub end: i64,
    #[serde(default)]
    pub id: String,
}

pub(crate) struct SubscribeEventParser;

impl TopicParser for SubscribeEventParser {
    fn parse(&self, _topic: &str, payload: &[u8]) -> Result<TopicEvent> {
        let event: SubscribeEvent = serde_json::from_slice(payload).map_err(|e| {
            TwitchPubSubError::MalformedInnerPayload(format!("subscribe event: {}", e))
        })?;
        Ok(TopicEvent::Subscribe(event))
    }
}

/// Returns a properly formatted subscription event topic string with the
/// given channel ID argument.
pub fn subscribe_event_topic(channel_id: &str) -> String {
    format!("{}.{}", SUBSCRIBE_EVENT_TOPIC_PREFIX, channel_id)
}

/// Parses the channel ID out of a subscription event topic.
/// Topic format: `channel-subscribe-events-v1.CHANNELID`
pub fn parse_channel_id_from_subscribe_topic(topic: &str) -> Result<String> {
    let parts: Vec<&str> = topic.split('.').collect();
    if parts.len() != 2 {
        return Err(TwitchPubSubError::MalformedTopic(topic.to_string()));
    }
    Ok(parts[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // Prime resubscription with no emotes and no message
    const PRIME_RESUB_PAYLOAD: &str = r#"{"benefit_end_month":0,"user_name":"randers","display_name":"randers","channel_name":"pajlada","user_id":"40286300","channel_id":"11148817","time":"2023-06-11T10:44:06.975336457Z","sub_message":{"message":"","emotes":null},"sub_plan":"Prime","sub_plan_name":"look at those shitty emotes, rip $5 LUL","months":0,"cumulative_months":54,"context":"resub","is_gift":false,"multi_month_duration":0}"#;

    const RESUB_WITH_MESSAGE_PAYLOAD: &str = r#"{"benefit_end_month":0,"user_name":"supersaintnick","display_name":"SuperSaintNick","channel_name":"pajlada","user_id":"123747906","channel_id":"11148817","time":"2023-06-11T11:39:00.678953302Z","sub_message":{"message":"pajaCheese","emotes":null},"sub_plan":"Prime","sub_plan_name":"look at those shitty emotes, rip $5 LUL","months":0,"cumulative_months":2,"context":"resub","is_gift":false,"multi_month_duration":0}"#;

    fn parse(payload: &str) -> SubscribeEvent {
        match SubscribeEventParser
            .parse("channel-subscribe-events-v1.11148817", payload.as_bytes())
            .unwrap()
        {
            TopicEvent::Subscribe(event) => event,
            other => panic!("expected subscribe event, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_prime_resub() {
        let event = parse(PRIME_RESUB_PAYLOAD);
        assert_eq!(event.channel_id, "11148817");
        assert_eq!(event.channel_name, "pajlada");
        assert_eq!(event.user_id, "40286300");
        assert_eq!(event.user_name, "randers");
        assert_eq!(event.display_name, "randers");
        assert_eq!(event.recipient_id, "");
        assert_eq!(
            event.time,
            Utc.with_ymd_and_hms(2023, 6, 11, 10, 44, 6).unwrap()
                + chrono::Duration::nanoseconds(975336457)
        );
        assert_eq!(event.sub_plan, "Prime");
        assert_eq!(event.cumulative_months, 54);
        assert_eq!(event.streak_months, 0);
        assert_eq!(event.context, "resub");
        assert!(!event.is_gift);
        assert_eq!(event.sub_message.message, "");
        assert_eq!(event.sub_message.emotes, None);
    }

    #[test]
    fn test_parse_resub_with_message() {
        let event = parse(RESUB_WITH_MESSAGE_PAYLOAD);
        assert_eq!(event.user_name, "supersaintnick");
        assert_eq!(event.display_name, "SuperSaintNick");
        assert_eq!(event.cumulative_months, 2);
        assert_eq!(event.sub_message.message, "pajaCheese");
    }

    #[test]
    fn test_topic_round_trip() {
        let topic = subscribe_event_topic("11148817");
        assert_eq!(topic, "channel-subscribe-events-v1.11148817");
        assert_eq!(parse_channel_id_from_subscribe_topic(&topic).unwrap(), "11148817");
    }

    #[test]
    fn test_malformed_topic() {
        assert!(matches!(
            parse_channel_id_from_subscribe_topic("channel-subscribe-events-v1").unwrap_err(),
            TwitchPubSubError::MalformedTopic(_)
        ));
    }
}
