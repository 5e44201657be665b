//! WebSocket topic relay for WebRTC signaling

mod actor;
mod connection;
pub mod health;
mod heartbeat;
mod messages;
mod registry;
mod router;
mod server;
mod types;

pub use actor::TopicRegistryHandle;
pub use connection::{Connection, ConnectionState};
pub use heartbeat::{HEARTBEAT_INTERVAL, Heartbeat, Probe};
pub use messages::{ClientMessage, Publication, ServerMessage};
pub use registry::TopicRegistry;
pub use router::{Inbound, dispatch, handle_frame};
pub use server::{DEFAULT_SIGNALING_PORT, SignalingServer, shutdown_signal};
pub use types::{ConnectionId, OutboundMessage, PeerHandle, SignalingError, TopicName};
