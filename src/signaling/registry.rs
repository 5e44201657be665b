//! Topic membership bookkeeping.
//!
//! Membership is kept on both sides: topic -> subscribers and
//! connection -> topics. A topic with no subscribers is never retained.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use super::messages::Publication;
use super::types::{ConnectionId, OutboundMessage, PeerHandle, TopicName};

#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: HashMap<TopicName, HashMap<ConnectionId, PeerHandle>>,
    memberships: HashMap<ConnectionId, HashSet<TopicName>>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `peer` to `topic`, creating the topic if needed. Joining twice is a no-op.
    pub fn join(&mut self, topic: &TopicName, peer: &PeerHandle) {
        let subscribers = self.topics.entry(topic.clone()).or_default();
        if subscribers.contains_key(&peer.id()) {
            return;
        }
        subscribers.insert(peer.id(), peer.clone());
        self.memberships
            .entry(peer.id())
            .or_default()
            .insert(topic.clone());
        debug!(conn = %peer.id(), topic = %topic, "joined topic");
    }

    /// Remove `id` from `topic`, dropping the topic once it is empty.
    pub fn leave(&mut self, topic: &str, id: ConnectionId) {
        if let Some(subscribers) = self.topics.get_mut(topic) {
            if subscribers.remove(&id).is_some() {
                debug!(conn = %id, topic = %topic, "left topic");
            }
            if subscribers.is_empty() {
                self.topics.remove(topic);
                debug!(topic = %topic, "topic removed (empty)");
            }
        }

        if let Some(held) = self.memberships.get_mut(&id) {
            held.remove(topic);
            if held.is_empty() {
                self.memberships.remove(&id);
            }
        }
    }

    pub fn leave_all<'a>(&mut self, id: ConnectionId, topics: impl IntoIterator<Item = &'a TopicName>) {
        for topic in topics {
            self.leave(topic.as_str(), id);
        }
    }

    /// Remove `id` from every topic it holds, using the registry's own index.
    pub fn purge(&mut self, id: ConnectionId) {
        let Some(held) = self.memberships.remove(&id) else {
            return;
        };
        for topic in &held {
            self.leave(topic.as_str(), id);
        }
    }

    /// Snapshot of the current subscribers of `topic`, empty if it does not exist.
    pub fn subscribers_of(&self, topic: &str) -> Vec<ConnectionId> {
        self.topics
            .get(topic)
            .map(|subscribers| subscribers.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn topics_of(&self, id: ConnectionId) -> Vec<TopicName> {
        self.memberships
            .get(&id)
            .map(|held| held.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains_topic(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Deliver `publication` to every current subscriber of its topic.
    ///
    /// The message carries the subscriber count taken before delivery. A
    /// subscriber whose queue is gone is purged; the rest still get the frame.
    /// Returns the number of subscribers the message was addressed to.
    pub fn publish(&mut self, publication: &Publication) -> usize {
        let Some(subscribers) = self.topics.get(publication.topic.as_str()) else {
            return 0;
        };
        let clients = subscribers.len();

        let msg = match publication.encode(clients) {
            Ok(json) => OutboundMessage::from(json),
            Err(e) => {
                warn!(topic = %publication.topic, "failed to encode publish: {}", e);
                return 0;
            }
        };

        let dead: Vec<ConnectionId> = subscribers
            .values()
            .filter(|peer| !peer.send(msg.clone()))
            .map(PeerHandle::id)
            .collect();

        for id in dead {
            debug!(conn = %id, topic = %publication.topic, "delivery failed, dropping subscriber");
            self.purge(id);
        }

        clients
    }
}
