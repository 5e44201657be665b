use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tracing::{debug, error, info, warn};

use super::actor::TopicRegistryHandle;
use super::connection::Connection;
use super::health::{self, RequestHead};
use super::heartbeat::{HEARTBEAT_INTERVAL, Heartbeat, Probe, heartbeat_timer};
use super::router::{self, Inbound};
use super::types::{ConnectionId, OutboundMessage, PeerHandle, SignalingError};

pub const DEFAULT_SIGNALING_PORT: u16 = 4444;
const CLOSE_GRACE: Duration = Duration::from_secs(1);

pub struct SignalingServer {
    listener: TcpListener,
    registry: TopicRegistryHandle,
    heartbeat_interval: Duration,
}

impl SignalingServer {
    /// Bind the listener and start the topic registry
    pub async fn bind(addr: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Signaling server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            registry: TopicRegistryHandle::spawn(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
        })
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> TopicRegistryHandle {
        self.registry.clone()
    }

    pub async fn run(self) -> std::io::Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> std::io::Result<()> {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Signaling server shutting down");
                    return Ok(());
                }

                accepted = self.listener.accept() => {
                    let (stream, addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!("Accept failed: {}", e);
                            continue;
                        }
                    };
                    let registry = self.registry.clone();
                    let interval = self.heartbeat_interval;

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, registry, interval).await {
                            debug!("Connection error from {}: {}", addr, e);
                        }
                    });
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    registry: TopicRegistryHandle,
    heartbeat_interval: Duration,
) -> Result<(), SignalingError> {
    match health::peek_request(&stream).await? {
        None => return Ok(()),
        Some(RequestHead::Plain { len }) => {
            debug!("Health check from {}", addr);
            health::respond_okay(&mut stream, len).await?;
            return Ok(());
        }
        Some(RequestHead::Upgrade) => {}
    }

    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    run_session(ws_stream, addr, registry, heartbeat_interval).await;
    Ok(())
}

/// Drive one upgraded connection until it closes, from whatever cause.
pub(crate) async fn run_session<S>(
    ws_stream: WebSocketStream<S>,
    addr: SocketAddr,
    registry: TopicRegistryHandle,
    heartbeat_interval: Duration,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let id = ConnectionId::generate();
    info!(conn = %id, "WebSocket connection from {}", addr);

    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let (ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel::<Message>();

    let mut connection = Connection::new(PeerHandle::new(id, tx), registry);
    let mut heartbeat = Heartbeat::new();
    let mut timer = heartbeat_timer(heartbeat_interval);

    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(msg) = rx.recv() => {
                    let ws_msg = Message::Text(msg.into_inner());
                    if let Err(e) = ws_tx.send(ws_msg).await {
                        debug!(conn = %id, "Send failed: {}", e);
                        break;
                    }
                }
                Some(ctrl_msg) = ctrl_rx.recv() => {
                    let closing = matches!(ctrl_msg, Message::Close(_));
                    if let Err(e) = ws_tx.send(ctrl_msg).await {
                        debug!(conn = %id, "Send failed: {}", e);
                        break;
                    }
                    if closing {
                        break;
                    }
                }
                else => break,
            }
        }
    });
    let mut writer_done = false;

    loop {
        tokio::select! {
            _ = timer.tick() => match heartbeat.tick() {
                Probe::TimedOut => {
                    warn!(conn = %id, "No pong received, disconnecting {}", addr);
                    break;
                }
                Probe::Send => {
                    if ctrl_tx.send(Message::Ping(Bytes::new())).is_err() {
                        break;
                    }
                    debug!(conn = %id, "Ping sent");
                }
            },

            _ = &mut send_task => {
                writer_done = true;
                break;
            }

            msg = ws_rx.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        debug!(conn = %id, "WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                };

                match msg {
                    Message::Text(text) => {
                        router::handle_frame(&mut connection, Inbound::Text(&text)).await;
                    }
                    Message::Binary(data) => {
                        router::handle_frame(&mut connection, Inbound::Binary(&data)).await;
                    }
                    Message::Pong(_) => {
                        heartbeat.acknowledge();
                        debug!(conn = %id, "Pong received");
                    }
                    Message::Close(_) => {
                        debug!(conn = %id, "Close received");
                        break;
                    }
                    _ => {}
                }

                if connection.is_closed() {
                    break;
                }
            }
        }
    }

    drop(timer);
    connection.close().await;

    if !writer_done {
        let _ = ctrl_tx.send(Message::Close(None));
        if timeout(CLOSE_GRACE, &mut send_task).await.is_err() {
            send_task.abort();
        }
    }
    info!(conn = %id, "WebSocket disconnected: {}", addr);
}

/// Resolve when `signal` fires. If the signal cannot be installed, log it and
/// never resolve, so the server keeps running instead of exiting at once.
pub async fn shutdown_signal<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
