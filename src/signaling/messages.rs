use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::types::{SignalingError, TopicName};

/// Messages sent from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Join every listed topic
    #[serde(rename = "subscribe")]
    Subscribe {
        #[serde(default, deserialize_with = "string_entries")]
        topics: Vec<TopicName>,
    },

    /// Leave every listed topic
    #[serde(rename = "unsubscribe")]
    Unsubscribe {
        #[serde(default, deserialize_with = "string_entries")]
        topics: Vec<TopicName>,
    },

    /// Relay to every subscriber of `topic`; all other fields travel untouched
    #[serde(rename = "publish")]
    Publish {
        #[serde(default)]
        topic: Option<TopicName>,
        #[serde(flatten)]
        payload: Map<String, Value>,
    },

    /// Application-level liveness check, answered with a pong
    #[serde(rename = "ping")]
    Ping,

    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    pub fn decode(text: &str) -> Result<Self, SignalingError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn decode_binary(data: &[u8]) -> Result<Self, SignalingError> {
        let text = std::str::from_utf8(data).map_err(|_| SignalingError::InvalidUtf8)?;
        Self::decode(text)
    }
}

/// Keeps only the string entries of a JSON array; anything else yields nothing.
fn string_entries<'de, D>(deserializer: D) -> Result<Vec<TopicName>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(TopicName::from(s)),
            _ => None,
        })
        .collect())
}

/// Messages sent from server to client
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage<'a> {
    /// Reply to a client ping
    #[serde(rename = "pong")]
    Pong,

    /// A relayed publish, annotated with the receiver count at dispatch time
    #[serde(rename = "publish")]
    Publish {
        topic: &'a TopicName,
        #[serde(flatten)]
        payload: &'a Map<String, Value>,
        clients: usize,
    },
}

/// A publish request ready for fan-out.
#[derive(Debug, Clone)]
pub struct Publication {
    pub topic: TopicName,
    payload: Map<String, Value>,
}

impl Publication {
    /// Any client-supplied `clients` field is discarded; the relay owns it.
    pub fn new(topic: TopicName, mut payload: Map<String, Value>) -> Self {
        payload.remove("clients");
        payload.remove("topic");
        payload.remove("type");
        Self { topic, payload }
    }

    pub fn encode(&self, clients: usize) -> Result<String, SignalingError> {
        let msg = ServerMessage::Publish {
            topic: &self.topic,
            payload: &self.payload,
            clients,
        };
        Ok(serde_json::to_string(&msg)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_subscribe() {
        let json = r#"{"type": "subscribe", "topics": ["lobby", "room-1"]}"#;
        let msg = ClientMessage::decode(json).unwrap();
        if let ClientMessage::Subscribe { topics } = msg {
            assert_eq!(topics, vec![TopicName::from("lobby"), TopicName::from("room-1")]);
        } else {
            panic!("Expected Subscribe");
        }
    }

    #[test]
    fn parse_subscribe_drops_non_string_topics() {
        let json = r#"{"type": "subscribe", "topics": ["a", 1, null, {"x": 1}, "b"]}"#;
        let msg = ClientMessage::decode(json).unwrap();
        if let ClientMessage::Subscribe { topics } = msg {
            assert_eq!(topics, vec![TopicName::from("a"), TopicName::from("b")]);
        } else {
            panic!("Expected Subscribe");
        }
    }

    #[test]
    fn parse_subscribe_without_topics() {
        let msg = ClientMessage::decode(r#"{"type": "subscribe"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Subscribe { topics } if topics.is_empty()));

        let msg = ClientMessage::decode(r#"{"type": "subscribe", "topics": "lobby"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Subscribe { topics } if topics.is_empty()));
    }

    #[test]
    fn parse_unsubscribe() {
        let json = r#"{"type": "unsubscribe", "topics": ["lobby"]}"#;
        let msg = ClientMessage::decode(json).unwrap();
        assert!(matches!(msg, ClientMessage::Unsubscribe { topics } if topics.len() == 1));
    }

    #[test]
    fn parse_publish_keeps_payload() {
        let json = r#"{"type": "publish", "topic": "lobby", "sdp": "v=0", "from": 7}"#;
        let msg = ClientMessage::decode(json).unwrap();
        if let ClientMessage::Publish { topic, payload } = msg {
            assert_eq!(topic, Some(TopicName::from("lobby")));
            assert_eq!(payload.get("sdp"), Some(&Value::from("v=0")));
            assert_eq!(payload.get("from"), Some(&Value::from(7)));
            assert!(!payload.contains_key("type"));
            assert!(!payload.contains_key("topic"));
        } else {
            panic!("Expected Publish");
        }
    }

    #[test]
    fn parse_publish_without_topic() {
        let msg = ClientMessage::decode(r#"{"type": "publish", "sdp": "x"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Publish { topic: None, .. }));
    }

    #[test]
    fn parse_ping() {
        let msg = ClientMessage::decode(r#"{"type": "ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        let msg = ClientMessage::decode(r#"{"type": "announce", "topic": "x"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Unknown));
    }

    #[test]
    fn malformed_input_is_a_decode_error() {
        assert!(matches!(
            ClientMessage::decode("{not json"),
            Err(SignalingError::Decode(_))
        ));
        assert!(ClientMessage::decode(r#"{"topics": ["a"]}"#).is_err());
        assert!(ClientMessage::decode("null").is_err());
    }

    #[test]
    fn binary_frames_decode_as_json() {
        let msg = ClientMessage::decode_binary(br#"{"type": "ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
        assert!(matches!(
            ClientMessage::decode_binary(&[0xff, 0xfe]),
            Err(SignalingError::InvalidUtf8)
        ));
    }

    #[test]
    fn serialize_pong() {
        let json = serde_json::to_string(&ServerMessage::Pong).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);
    }

    #[test]
    fn publication_overwrites_clients() {
        let mut payload = Map::new();
        payload.insert("sdp".to_string(), Value::from("offer"));
        payload.insert("clients".to_string(), Value::from(99));
        let publication = Publication::new(TopicName::from("lobby"), payload);

        let json = publication.encode(2).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "publish");
        assert_eq!(value["topic"], "lobby");
        assert_eq!(value["sdp"], "offer");
        assert_eq!(value["clients"], 2);
        assert_eq!(json.matches("clients").count(), 1);
    }
}
