use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::messages::Publication;
use super::registry::TopicRegistry;
use super::types::{ConnectionId, PeerHandle, TopicName};

const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Commands sent to the topic registry actor
pub(crate) enum RegistryCommand {
    Join {
        topics: Vec<TopicName>,
        peer: PeerHandle,
    },
    Leave {
        topics: Vec<TopicName>,
        conn: ConnectionId,
    },
    LeaveAll {
        topics: Vec<TopicName>,
        conn: ConnectionId,
    },
    Publish {
        publication: Publication,
        reply: oneshot::Sender<usize>,
    },
    SubscribersOf {
        topic: TopicName,
        reply: oneshot::Sender<Vec<ConnectionId>>,
    },
}

pub(crate) async fn topic_registry_actor(mut rx: mpsc::Receiver<RegistryCommand>) {
    let mut registry = TopicRegistry::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            RegistryCommand::Join { topics, peer } => {
                for topic in &topics {
                    registry.join(topic, &peer);
                }
            }

            RegistryCommand::Leave { topics, conn } => {
                for topic in &topics {
                    registry.leave(topic.as_str(), conn);
                }
            }

            RegistryCommand::LeaveAll { topics, conn } => {
                registry.leave_all(conn, &topics);
                // anything a failed fan-out did not already purge
                registry.purge(conn);
                debug!(conn = %conn, topics = registry.topic_count(), "connection left all topics");
            }

            RegistryCommand::Publish { publication, reply } => {
                let clients = registry.publish(&publication);
                let _ = reply.send(clients);
            }

            RegistryCommand::SubscribersOf { topic, reply } => {
                let _ = reply.send(registry.subscribers_of(topic.as_str()));
            }
        }
    }

    info!("Topic registry stopped");
}

/// Handle to communicate with the topic registry actor
#[derive(Clone)]
pub struct TopicRegistryHandle {
    pub(crate) tx: mpsc::Sender<RegistryCommand>,
}

impl TopicRegistryHandle {
    /// Spawn the registry actor on the current runtime
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel::<RegistryCommand>(COMMAND_QUEUE_CAPACITY);
        tokio::spawn(topic_registry_actor(rx));
        Self { tx }
    }

    async fn submit(&self, cmd: RegistryCommand) {
        if self.tx.send(cmd).await.is_err() {
            warn!("Topic registry is gone, command dropped");
        }
    }

    /// Subscribe `peer` to every topic in `topics`
    pub async fn join(&self, topics: Vec<TopicName>, peer: PeerHandle) {
        if topics.is_empty() {
            return;
        }
        self.submit(RegistryCommand::Join { topics, peer }).await;
    }

    /// Unsubscribe `conn` from every topic in `topics`
    pub async fn leave(&self, topics: Vec<TopicName>, conn: ConnectionId) {
        if topics.is_empty() {
            return;
        }
        self.submit(RegistryCommand::Leave { topics, conn }).await;
    }

    /// Teardown: remove `conn` from everything it holds
    pub async fn leave_all(&self, topics: Vec<TopicName>, conn: ConnectionId) {
        self.submit(RegistryCommand::LeaveAll { topics, conn }).await;
    }

    /// Fan out to the topic's subscribers, returning how many were addressed
    pub async fn publish(&self, publication: Publication) -> usize {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(RegistryCommand::Publish {
            publication,
            reply: reply_tx,
        })
        .await;
        reply_rx.await.unwrap_or(0)
    }

    pub async fn subscribers_of(&self, topic: TopicName) -> Vec<ConnectionId> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(RegistryCommand::SubscribersOf {
            topic,
            reply: reply_tx,
        })
        .await;
        reply_rx.await.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signaling::types::OutboundMessage;
    use serde_json::Map;

    fn peer() -> (PeerHandle, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PeerHandle::new(ConnectionId::generate(), tx), rx)
    }

    #[tokio::test]
    async fn commands_apply_in_order() {
        let registry = TopicRegistryHandle::spawn();
        let (a, mut rx_a) = peer();
        let lobby = TopicName::from("lobby");

        registry.join(vec![lobby.clone()], a.clone()).await;
        assert_eq!(registry.subscribers_of(lobby.clone()).await, vec![a.id()]);

        let publication = Publication::new(lobby.clone(), Map::new());
        assert_eq!(registry.publish(publication).await, 1);
        assert!(rx_a.try_recv().is_ok());

        registry.leave(vec![lobby.clone()], a.id()).await;
        assert!(registry.subscribers_of(lobby).await.is_empty());
    }

    #[tokio::test]
    async fn leave_all_clears_memberships() {
        let registry = TopicRegistryHandle::spawn();
        let (a, _rx_a) = peer();
        let x = TopicName::from("x");
        let y = TopicName::from("y");

        registry.join(vec![x.clone(), y.clone()], a.clone()).await;
        registry.leave_all(vec![x.clone(), y.clone()], a.id()).await;

        assert!(registry.subscribers_of(x).await.is_empty());
        assert!(registry.subscribers_of(y).await.is_empty());
    }

    #[tokio::test]
    async fn stopped_actor_degrades_to_noop() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let registry = TopicRegistryHandle { tx };
        let (a, _rx_a) = peer();

        registry.join(vec![TopicName::from("x")], a).await;
        let publication = Publication::new(TopicName::from("x"), Map::new());
        assert_eq!(registry.publish(publication).await, 0);
        assert!(registry.subscribers_of(TopicName::from("x")).await.is_empty());
    }
}
