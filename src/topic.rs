//! Topic descriptors and the deduplicating topic set.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// Stable fingerprint of a topic: name and credential joined with a
/// separator neither value contains. Injective over the pair, so equality
/// of hashes is equality of topics. This is a map key, not a secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicHash(String);

impl fmt::Display for TopicHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A PubSub topic: the dot-separated stream name plus the OAuth token
/// authorizing the subscription.
///
/// Two topics are equal iff their [`hash`](Topic::hash)es are equal. The
/// per-connection subscription state (nonce, confirmation) lives with the
/// owning connection, not here.
#[derive(Debug, Clone)]
pub struct Topic {
    name: String,
    auth_token: String,
}

impl Topic {
    pub(crate) fn new(name: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            auth_token: auth_token.into(),
        }
    }

    /// The dot-separated topic name, e.g. `channel-bits-events-v1.11148817`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn auth_token(&self) -> &str {
        &self.auth_token
    }

    /// Fingerprint over `(name, auth_token)`.
    pub fn hash(&self) -> TopicHash {
        TopicHash(format!("{}:{}", self.name, self.auth_token))
    }
}

/// Deduplicating set of every topic the client has ever listened to,
/// keyed by topic hash. This is the sole dedup point: a topic that was
/// added before is never placed on a second connection.
pub(crate) struct TopicManager {
    topics: Mutex<HashMap<TopicHash, Topic>>,
}

impl TopicManager {
    pub(crate) fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Insert the topic if absent. Returns `false` if an equal topic is
    /// already tracked.
    pub(crate) fn add(&self, topic: &Topic) -> bool {
        let mut topics = self.topics.lock().unwrap();
        let hash = topic.hash();
        if topics.contains_key(&hash) {
            return false;
        }
        topics.insert(hash, topic.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_injective_over_the_pair() {
        let a = Topic::new("whispers.123", "tok");
        let b = Topic::new("whispers.123", "tok");
        let c = Topic::new("whispers.123", "other-tok");
        let d = Topic::new("whispers.124", "tok");

        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
        assert_ne!(a.hash(), d.hash());
    }

    #[test]
    fn test_manager_dedups_by_hash() {
        let manager = TopicManager::new();
        let topic = Topic::new("channel-bits-events-v1.11148817", "tok");

        assert!(manager.add(&topic));
        assert!(!manager.add(&topic));
        assert!(!manager.add(&Topic::new("channel-bits-events-v1.11148817", "tok")));

        // Same name, different credential is a distinct topic
        assert!(manager.add(&Topic::new("channel-bits-events-v1.11148817", "tok2")));
    }
}
