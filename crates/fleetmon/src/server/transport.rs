//! Session transports
//!
//! A push session sits on top of any duplex text channel, expressed as
//! a pair of trait halves so the reader flow and the writer flow can
//! run on separate tasks. Two implementations are provided: an
//! in-memory pair for tests and local wiring, and a WebSocket transport
//! for real operator clients.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// Transport-level failures
///
/// All of these terminate the session; retry policy belongs to the
/// caller.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Read or write exceeded the configured timeout
    #[error("transport timed out")]
    Timeout,

    /// Inbound frame exceeded the configured size bound
    #[error("frame of {size} bytes exceeds limit of {limit}")]
    FrameTooLarge { size: usize, limit: usize },

    /// Underlying connection failed or was torn down by the peer
    #[error("connection lost: {message}")]
    ConnectionLost { message: String },
}

impl TransportError {
    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::ConnectionLost {
            message: message.into(),
        }
    }
}

/// Outbound half of a duplex text channel
#[async_trait]
pub trait TransportSink: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the outbound half; subsequent sends fail
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Inbound half of a duplex text channel
///
/// `Ok(None)` means the peer closed the connection cleanly.
#[async_trait]
pub trait TransportStream: Send {
    async fn recv(&mut self) -> Result<Option<String>, TransportError>;
}

// ============================================================================
// In-memory transport
// ============================================================================

/// One endpoint of an in-memory duplex pair
pub struct MemoryEndpoint {
    pub sink: MemorySink,
    pub stream: MemoryStream,
}

/// Create a connected pair of in-memory endpoints
pub fn memory_pair(buffer: usize) -> (MemoryEndpoint, MemoryEndpoint) {
    let (a_tx, b_rx) = mpsc::channel(buffer);
    let (b_tx, a_rx) = mpsc::channel(buffer);
    (
        MemoryEndpoint {
            sink: MemorySink { tx: Some(a_tx) },
            stream: MemoryStream { rx: a_rx },
        },
        MemoryEndpoint {
            sink: MemorySink { tx: Some(b_tx) },
            stream: MemoryStream { rx: b_rx },
        },
    )
}

pub struct MemorySink {
    tx: Option<mpsc::Sender<String>>,
}

#[async_trait]
impl TransportSink for MemorySink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| TransportError::connection_lost("sink closed"))?;
        tx.send(text)
            .await
            .map_err(|_| TransportError::connection_lost("peer disconnected"))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        Ok(())
    }
}

pub struct MemoryStream {
    rx: mpsc::Receiver<String>,
}

#[async_trait]
impl TransportStream for MemoryStream {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        Ok(self.rx.recv().await)
    }
}

// ============================================================================
// WebSocket transport
// ============================================================================

/// Accept a server-side WebSocket with the frame bound set on the
/// socket itself.
///
/// The bound must hold while a frame is being received, not after it
/// has been buffered whole; an inbound message over `max_frame_bytes`
/// fails the read with a capacity error instead of occupying memory
/// first.
pub async fn accept_websocket<S>(
    stream: S,
    max_frame_bytes: usize,
) -> Result<(WsSink<S>, WsStream<S>), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(max_frame_bytes);
    config.max_frame_size = Some(max_frame_bytes);
    let ws = tokio_tungstenite::accept_async_with_config(stream, Some(config))
        .await
        .map_err(|e| TransportError::connection_lost(e.to_string()))?;
    Ok(websocket_halves(ws))
}

/// Split an established WebSocket connection into session transport
/// halves. Server-side accepts should go through [`accept_websocket`]
/// so the frame bound is enforced on the socket.
pub fn websocket_halves<S>(ws: WebSocketStream<S>) -> (WsSink<S>, WsStream<S>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (sink, stream) = ws.split();
    (WsSink { sink }, WsStream { stream })
}

pub struct WsSink<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
}

#[async_trait]
impl<S> TransportSink for WsSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::connection_lost(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.sink
            .close()
            .await
            .map_err(|e| TransportError::connection_lost(e.to_string()))
    }
}

pub struct WsStream<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

#[async_trait]
impl<S> TransportStream for WsStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.stream.next().await {
                None => return Ok(None),
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) => return Ok(None),
                // Control frames are handled by tungstenite; skip them
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Binary(_))) => {
                    return Err(TransportError::connection_lost("unexpected binary frame"))
                }
                Some(Err(e)) => return Err(TransportError::connection_lost(e.to_string())),
            }
        }
    }
}
