use std::collections::HashSet;

use tracing::{debug, info};

use super::actor::TopicRegistryHandle;
use super::messages::Publication;
use super::types::{ConnectionId, OutboundMessage, PeerHandle, TopicName};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closed,
}

/// One client session.
///
/// Owned by the session task, so its subscribed set and state need no
/// locking. Every registry change made on its behalf goes through the
/// shared [`TopicRegistryHandle`].
pub struct Connection {
    peer: PeerHandle,
    state: ConnectionState,
    topics: HashSet<TopicName>,
    registry: TopicRegistryHandle,
}

impl Connection {
    pub fn new(peer: PeerHandle, registry: TopicRegistryHandle) -> Self {
        Self {
            peer,
            state: ConnectionState::Open,
            topics: HashSet::new(),
            registry,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.peer.id()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.topics.contains(topic)
    }

    pub fn subscription_count(&self) -> usize {
        self.topics.len()
    }

    pub async fn subscribe(&mut self, topics: Vec<TopicName>) {
        if self.is_closed() || topics.is_empty() {
            return;
        }
        self.topics.extend(topics.iter().cloned());
        self.registry.join(topics, self.peer.clone()).await;
    }

    /// Leaving a topic that was never joined is fine.
    pub async fn unsubscribe(&mut self, topics: Vec<TopicName>) {
        if self.is_closed() || topics.is_empty() {
            return;
        }
        for topic in &topics {
            self.topics.remove(topic);
        }
        self.registry.leave(topics, self.id()).await;
    }

    /// Fan out to the topic's subscribers; returns how many were addressed.
    pub async fn publish(&self, publication: Publication) -> usize {
        if self.is_closed() {
            return 0;
        }
        self.registry.publish(publication).await
    }

    /// Deliver a frame to this connection only. A dead queue closes it.
    pub async fn send(&mut self, msg: OutboundMessage) {
        if self.is_closed() {
            return;
        }
        if !self.peer.send(msg) {
            debug!(conn = %self.id(), "send failed, closing");
            self.close().await;
        }
    }

    /// Leave every held topic and become terminal. Only the first call does
    /// anything; returns whether this call performed the teardown.
    pub async fn close(&mut self) -> bool {
        if self.is_closed() {
            return false;
        }
        self.state = ConnectionState::Closed;

        let held: Vec<TopicName> = self.topics.drain().collect();
        info!(conn = %self.id(), topics = held.len(), "connection closed");
        self.registry.leave_all(held, self.id()).await;
        true
    }
}
