//! Authenticated push-session protocol
//!
//! A session wraps one duplex transport and enforces a strict two-phase
//! state machine: the first inbound frame must be an `auth` message
//! carrying a valid bearer token; only then does the channel carry
//! application traffic. Messages are JSON envelopes with a required
//! `type` and an opaque `data` payload the caller decodes once it knows
//! the type.
//!
//! After authentication the channel splits into independent sender and
//! receiver halves so a writer task and a reader task can run
//! concurrently. Closing either half releases a peer blocked on the
//! other promptly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, warn};

use fleetmon_store::{PrincipalId, TokenStore};

use crate::server::transport::{TransportError, TransportSink, TransportStream};

/// Message type carrying the one-time authentication handshake
pub const AUTH_TYPE: &str = "auth";

/// Message type used for error payloads
pub const ERROR_TYPE: &str = "error";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Read limit preventing a hostile or buggy peer from flooding us
const DEFAULT_MAX_FRAME_BYTES: usize = 8096;

/// Per-session protocol policy
///
/// Passed explicitly to each session so different sessions can carry
/// distinct policies (e.g. a longer timeout for long campaigns).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on any single read or write
    pub timeout: Duration,
    /// Upper bound on an inbound frame, in bytes
    pub max_frame_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// Wire envelope: a type tag plus an opaque payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Deserialize)]
struct AuthData {
    token: String,
}

/// Session protocol errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// Malformed or out-of-order message
    #[error("protocol violation: {reason}")]
    InvalidProtocol { reason: String },

    /// Token did not validate; the channel is closed
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Transport failure; the channel is closed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Operation on a closed channel
    #[error("session channel closed")]
    Closed,
}

impl SessionError {
    fn protocol(reason: impl Into<String>) -> Self {
        Self::InvalidProtocol {
            reason: reason.into(),
        }
    }
}

/// Session state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Initial, unauthenticated; only an `auth` frame is legal
    Connected,
    /// Handshake complete; application traffic flows both ways
    Authenticated,
    /// Terminal; all operations fail
    Closed,
}

fn decode_envelope(text: &str) -> Result<Envelope, SessionError> {
    let envelope: Envelope = serde_json::from_str(text)
        .map_err(|e| SessionError::protocol(format!("malformed message: {}", e)))?;
    if envelope.kind.is_empty() {
        return Err(SessionError::protocol("empty message type"));
    }
    Ok(envelope)
}

fn encode_envelope(kind: &str, data: Value) -> Result<String, SessionError> {
    if kind.is_empty() {
        return Err(SessionError::protocol("empty message type"));
    }
    serde_json::to_string(&Envelope {
        kind: kind.to_string(),
        data,
    })
    .map_err(|e| SessionError::protocol(format!("failed to encode message: {}", e)))
}

/// One authenticated, persistent, message-framed connection
pub struct SessionChannel {
    sink: Box<dyn TransportSink>,
    stream: Box<dyn TransportStream>,
    config: SessionConfig,
    state: SessionState,
}

impl SessionChannel {
    pub fn new(
        sink: impl TransportSink + 'static,
        stream: impl TransportStream + 'static,
        config: SessionConfig,
    ) -> Self {
        Self {
            sink: Box::new(sink),
            stream: Box::new(stream),
            config,
            state: SessionState::Connected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Perform the one-time authentication exchange.
    ///
    /// Reads exactly one frame, which must be
    /// `{"type": "auth", "data": {"token": ...}}` with a token the
    /// store validates. Any other first frame, a malformed frame, or an
    /// invalid token closes the channel; it never reaches
    /// `Authenticated` and cannot be retried on this instance.
    pub async fn authenticate(
        &mut self,
        tokens: &dyn TokenStore,
    ) -> Result<PrincipalId, SessionError> {
        match self.state {
            SessionState::Connected => {}
            SessionState::Authenticated => {
                return Err(SessionError::protocol("already authenticated"))
            }
            SessionState::Closed => return Err(SessionError::Closed),
        }

        let text = self.recv_text().await?;
        let envelope = match decode_envelope(&text) {
            Ok(envelope) => envelope,
            Err(err) => {
                self.reject(&err.to_string()).await;
                return Err(err);
            }
        };

        if envelope.kind != AUTH_TYPE {
            let err = SessionError::protocol(format!(
                "expected {:?} message, got {:?}",
                AUTH_TYPE, envelope.kind
            ));
            self.reject(&err.to_string()).await;
            return Err(err);
        }

        let auth: AuthData = match serde_json::from_value(envelope.data) {
            Ok(auth) => auth,
            Err(e) => {
                let err = SessionError::protocol(format!("malformed auth payload: {}", e));
                self.reject(&err.to_string()).await;
                return Err(err);
            }
        };

        match tokens.validate_token(&auth.token).await {
            Ok(principal) => {
                debug!(%principal, "session authenticated");
                self.state = SessionState::Authenticated;
                Ok(principal)
            }
            Err(err) => {
                warn!(error = %err, "session authentication failed");
                self.reject("authentication failed").await;
                Err(SessionError::AuthenticationFailed)
            }
        }
    }

    /// Read one application message
    ///
    /// A malformed or empty-type frame is rejected as
    /// `InvalidProtocol` without closing the channel; transport
    /// failures (timeout, oversized frame, lost connection) close it.
    pub async fn read_message(&mut self) -> Result<Envelope, SessionError> {
        self.check_authenticated()?;
        let text = self.recv_text().await?;
        decode_envelope(&text)
    }

    /// Write one application message
    pub async fn write_message(&mut self, kind: &str, data: Value) -> Result<(), SessionError> {
        self.check_authenticated()?;
        let text = encode_envelope(kind, data)?;
        self.send_text(text).await
    }

    /// Write an error message (`type = "error"`)
    pub async fn write_error(&mut self, data: Value) -> Result<(), SessionError> {
        self.write_message(ERROR_TYPE, data).await
    }

    /// Close the channel; terminal
    pub async fn close(&mut self) {
        if self.state != SessionState::Closed {
            self.state = SessionState::Closed;
            let _ = timeout(self.config.timeout, self.sink.close()).await;
        }
    }

    /// Split an authenticated channel into independent halves.
    ///
    /// The sender half is the only way to push to this session, so
    /// holding one is proof the handshake completed. Closing the sender
    /// releases a receiver blocked on a read.
    pub fn split(self) -> Result<(SessionSender, SessionReceiver), SessionError> {
        match self.state {
            SessionState::Authenticated => {}
            SessionState::Connected => {
                return Err(SessionError::protocol("split before authentication"))
            }
            SessionState::Closed => return Err(SessionError::Closed),
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok((
            SessionSender {
                sink: self.sink,
                config: self.config.clone(),
                shutdown: shutdown_tx,
                closed: false,
            },
            SessionReceiver {
                stream: self.stream,
                config: self.config,
                shutdown: shutdown_rx,
                closed: false,
            },
        ))
    }

    fn check_authenticated(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Authenticated => Ok(()),
            SessionState::Connected => Err(SessionError::protocol("not authenticated")),
            SessionState::Closed => Err(SessionError::Closed),
        }
    }

    /// Best-effort error reply, then close; used on handshake failure
    async fn reject(&mut self, reason: &str) {
        if let Ok(text) = encode_envelope(ERROR_TYPE, serde_json::json!({ "error": reason })) {
            let _ = timeout(self.config.timeout, self.sink.send(text)).await;
        }
        self.close().await;
    }

    async fn recv_text(&mut self) -> Result<String, SessionError> {
        match timeout(self.config.timeout, self.stream.recv()).await {
            Err(_) => {
                self.close().await;
                Err(TransportError::Timeout.into())
            }
            Ok(Err(err)) => {
                self.close().await;
                Err(err.into())
            }
            Ok(Ok(None)) => {
                self.close().await;
                Err(TransportError::connection_lost("connection closed by peer").into())
            }
            Ok(Ok(Some(text))) => {
                if text.len() > self.config.max_frame_bytes {
                    let err = TransportError::FrameTooLarge {
                        size: text.len(),
                        limit: self.config.max_frame_bytes,
                    };
                    self.close().await;
                    Err(err.into())
                } else {
                    Ok(text)
                }
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), SessionError> {
        match timeout(self.config.timeout, self.sink.send(text)).await {
            Err(_) => {
                self.close().await;
                Err(TransportError::Timeout.into())
            }
            Ok(Err(err)) => {
                self.close().await;
                Err(err.into())
            }
            Ok(Ok(())) => Ok(()),
        }
    }
}

/// Writer half of an authenticated session
///
/// Callers serialize their own writes; the half is `&mut self` so two
/// writers cannot race on one channel.
pub struct SessionSender {
    sink: Box<dyn TransportSink>,
    config: SessionConfig,
    shutdown: watch::Sender<bool>,
    closed: bool,
}

impl SessionSender {
    pub async fn send(&mut self, kind: &str, data: Value) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        let text = encode_envelope(kind, data)?;
        match timeout(self.config.timeout, self.sink.send(text)).await {
            Err(_) => {
                self.shut_down().await;
                Err(TransportError::Timeout.into())
            }
            Ok(Err(err)) => {
                self.shut_down().await;
                Err(err.into())
            }
            Ok(Ok(())) => Ok(()),
        }
    }

    /// Send an error message (`type = "error"`)
    pub async fn send_error(&mut self, data: Value) -> Result<(), SessionError> {
        self.send(ERROR_TYPE, data).await
    }

    /// Close the session; releases a receiver blocked on a read
    pub async fn close(&mut self) {
        if !self.closed {
            self.shut_down().await;
        }
    }

    async fn shut_down(&mut self) {
        self.closed = true;
        let _ = self.shutdown.send(true);
        let _ = timeout(self.config.timeout, self.sink.close()).await;
    }
}

/// Reader half of an authenticated session
pub struct SessionReceiver {
    stream: Box<dyn TransportStream>,
    config: SessionConfig,
    shutdown: watch::Receiver<bool>,
    closed: bool,
}

impl SessionReceiver {
    /// Read one application message.
    ///
    /// Unblocks promptly with `Closed` when the sender half closes the
    /// session, even mid-read.
    pub async fn recv(&mut self) -> Result<Envelope, SessionError> {
        if self.closed || *self.shutdown.borrow() {
            self.closed = true;
            return Err(SessionError::Closed);
        }

        // Biased so a close raised by the sender half wins over a
        // simultaneously ended stream.
        let outcome = tokio::select! {
            biased;
            _ = self.shutdown.changed() => {
                self.closed = true;
                return Err(SessionError::Closed);
            }
            outcome = timeout(self.config.timeout, self.stream.recv()) => outcome,
        };

        match outcome {
            Err(_) => {
                self.closed = true;
                Err(TransportError::Timeout.into())
            }
            Ok(Err(err)) => {
                self.closed = true;
                Err(err.into())
            }
            Ok(Ok(None)) => {
                self.closed = true;
                Err(TransportError::connection_lost("connection closed by peer").into())
            }
            Ok(Ok(Some(text))) => {
                if text.len() > self.config.max_frame_bytes {
                    self.closed = true;
                    return Err(TransportError::FrameTooLarge {
                        size: text.len(),
                        limit: self.config.max_frame_bytes,
                    }
                    .into());
                }
                decode_envelope(&text)
            }
        }
    }
}
