//! Sharding of topics across connections.
//!
//! The upstream caps topics per connection, so the manager spreads
//! subscriptions over up to `connection_limit` connections with greedy
//! first-fit placement. Placement is sticky: a topic never migrates once
//! assigned; a failed connection re-subscribes its own topics when it
//! comes back.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::connection::{Connection, MessageBusSender};
use crate::event_handlers::EventHandlers;
use crate::events::ParserRegistry;
use crate::timeouts::TwitchPubSubTimeouts;
use crate::topic::Topic;

/// Max number of simultaneous connections.
pub(crate) const DEFAULT_CONNECTION_LIMIT: usize = 10;

/// Max number of topics per connection.
pub(crate) const DEFAULT_TOPIC_LIMIT: usize = 50;

pub(crate) struct ConnectionManager {
    host: String,
    connections: Mutex<Vec<Arc<Connection>>>,
    connection_limit: AtomicUsize,
    topic_limit: AtomicUsize,
    bus: MessageBusSender,
    registry: Arc<ParserRegistry>,
    timeouts: TwitchPubSubTimeouts,
    event_handlers: EventHandlers,
}

impl ConnectionManager {
    pub(crate) fn new(
        host: String,
        bus: MessageBusSender,
        registry: Arc<ParserRegistry>,
        timeouts: TwitchPubSubTimeouts,
        event_handlers: EventHandlers,
    ) -> Self {
        Self {
            host,
            connections: Mutex::new(Vec::new()),
            connection_limit: AtomicUsize::new(DEFAULT_CONNECTION_LIMIT),
            topic_limit: AtomicUsize::new(DEFAULT_TOPIC_LIMIT),
            bus,
            registry,
            timeouts,
            event_handlers,
        }
    }

    pub(crate) fn set_connection_limit(&self, limit: usize) {
        self.connection_limit.store(limit, Ordering::SeqCst);
    }

    pub(crate) fn set_topic_limit(&self, limit: usize) {
        self.topic_limit.store(limit, Ordering::SeqCst);
    }

    /// Place a topic on a connection: first existing connection with a free
    /// slot, else a new connection if the connection cap allows one. With
    /// both limits saturated the topic is dropped with a logged error.
    pub(crate) async fn refresh_topic(&self, topic: Topic) {
        let topic_limit = self.topic_limit.load(Ordering::SeqCst);
        let connection_limit = self.connection_limit.load(Ordering::SeqCst);

        // Pick or create the connection under the lock, send after.
        let connection = {
            let mut connections = self.connections.lock().unwrap();
            if let Some(conn) = connections
                .iter()
                .find(|c| c.topics_placed() < topic_limit)
            {
                conn.claim_topic_slot();
                conn.clone()
            } else if connections.len() < connection_limit {
                let conn = Arc::new(Connection::spawn(
                    self.host.clone(),
                    self.bus.clone(),
                    self.registry.clone(),
                    self.timeouts.clone(),
                    self.event_handlers.clone(),
                ));
                conn.claim_topic_slot();
                connections.push(conn.clone());
                conn
            } else {
                log::error!(
                    "[twitch-pubsub] connection and topic limit reached, dropping topic {}",
                    topic.hash(),
                );
                return;
            }
        };

        if let Err(e) = connection.listen(topic).await {
            log::error!("[twitch-pubsub] failed to hand topic to connection: {}", e);
        }
    }

    /// Whether any connection currently has a live socket.
    pub(crate) fn is_connected(&self) -> bool {
        self.connections
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.is_connected())
    }

    /// Gracefully close every connection. Each one clears its reconnect
    /// flag before closing its socket, so nothing comes back.
    pub(crate) async fn shutdown(&self) {
        let connections: Vec<Arc<Connection>> = self.connections.lock().unwrap().clone();
        for connection in connections {
            connection.shutdown().await;
        }
    }

    #[cfg(test)]
    fn placement_counts(&self) -> Vec<usize> {
        self.connections
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.topics_placed())
            .collect()
    }
}
