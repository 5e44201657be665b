//! Inbound message dispatch for a single connection.

use tracing::{debug, warn};

use super::connection::Connection;
use super::messages::{ClientMessage, Publication, ServerMessage};
use super::types::OutboundMessage;

/// A decoded-or-not data frame as handed over by the transport
#[derive(Debug, Clone, Copy)]
pub enum Inbound<'a> {
    Text(&'a str),
    Binary(&'a [u8]),
}

/// Decode and dispatch one frame. Frames that do not decode are dropped and
/// the connection stays open.
pub async fn handle_frame(conn: &mut Connection, frame: Inbound<'_>) {
    if conn.is_closed() {
        return;
    }

    let decoded = match frame {
        Inbound::Text(text) => ClientMessage::decode(text),
        Inbound::Binary(data) => ClientMessage::decode_binary(data),
    };

    match decoded {
        Ok(msg) => dispatch(conn, msg).await,
        Err(e) => debug!(conn = %conn.id(), "Dropping frame: {}", e),
    }
}

pub async fn dispatch(conn: &mut Connection, msg: ClientMessage) {
    if conn.is_closed() {
        return;
    }

    match msg {
        ClientMessage::Subscribe { topics } => conn.subscribe(topics).await,

        ClientMessage::Unsubscribe { topics } => conn.unsubscribe(topics).await,

        ClientMessage::Publish {
            topic: Some(topic),
            payload,
        } if !topic.as_str().is_empty() => {
            let publication = Publication::new(topic, payload);
            let topic = publication.topic.clone();
            let clients = conn.publish(publication).await;
            debug!(conn = %conn.id(), topic = %topic, clients, "published");
        }

        ClientMessage::Publish { .. } => {
            debug!(conn = %conn.id(), "Ignoring publish without topic");
        }

        ClientMessage::Ping => match serde_json::to_string(&ServerMessage::Pong) {
            Ok(json) => conn.send(OutboundMessage::from(json)).await,
            Err(e) => warn!(conn = %conn.id(), "failed to encode pong: {}", e),
        },

        ClientMessage::Unknown => {
            debug!(conn = %conn.id(), "Ignoring message of unknown type");
        }
    }
}
