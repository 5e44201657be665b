//! Plain HTTP health responder sharing the signaling port.
//!
//! Any request that does not ask for a WebSocket upgrade gets a fixed
//! `200 okay`. The request head is inspected with `peek` so an upgrade
//! request reaches the WebSocket handshake untouched.

use std::io;
use std::time::Duration;

use httparse::{EMPTY_HEADER, Request, Status};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

const MAX_HEAD_LEN: usize = 64 * 1024;
// same header budget as tungstenite's handshake parser
const MAX_HEADERS: usize = 124;
const HEAD_TIMEOUT: Duration = Duration::from_secs(5);
const PEEK_BACKOFF: Duration = Duration::from_millis(5);

pub const OKAY_RESPONSE: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 4\r\nConnection: close\r\n\r\nokay";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestHead {
    /// WebSocket upgrade; leave the bytes for the handshake
    Upgrade,
    /// Anything else; `len` bytes of head to consume before replying
    Plain { len: usize },
}

/// Classify a (possibly partial) request head. `None` means more bytes are needed.
///
/// Bytes that are not HTTP at all still count as a plain request.
pub fn classify(data: &[u8]) -> Option<RequestHead> {
    let mut headers = [EMPTY_HEADER; MAX_HEADERS];
    let mut req = Request::new(&mut headers);

    match req.parse(data) {
        Ok(Status::Complete(len)) => {
            if wants_websocket(req.headers) {
                Some(RequestHead::Upgrade)
            } else {
                Some(RequestHead::Plain { len })
            }
        }
        Ok(Status::Partial) => None,
        Err(_) => Some(RequestHead::Plain { len: data.len() }),
    }
}

fn wants_websocket(headers: &[httparse::Header<'_>]) -> bool {
    headers
        .iter()
        .filter(|h| h.name.eq_ignore_ascii_case("upgrade"))
        .filter_map(|h| std::str::from_utf8(h.value).ok())
        .flat_map(|value| value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("websocket"))
}

/// Wait until the request head is complete. `Ok(None)` if the peer hung up first.
pub async fn peek_request(stream: &TcpStream) -> io::Result<Option<RequestHead>> {
    let mut buf = vec![0u8; MAX_HEAD_LEN];
    let peek = async {
        loop {
            let n = stream.peek(&mut buf).await?;
            if n == 0 {
                return Ok(None);
            }
            if let Some(head) = classify(&buf[..n]) {
                return Ok(Some(head));
            }
            if n == buf.len() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "request head too large",
                ));
            }
            sleep(PEEK_BACKOFF).await;
        }
    };

    timeout(HEAD_TIMEOUT, peek)
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "request head timed out"))?
}

/// Consume the request head and answer `okay`.
pub async fn respond_okay(stream: &mut TcpStream, head_len: usize) -> io::Result<()> {
    let mut head = vec![0u8; head_len];
    stream.read_exact(&mut head).await?;
    stream.write_all(OKAY_RESPONSE).await?;
    stream.shutdown().await
}
