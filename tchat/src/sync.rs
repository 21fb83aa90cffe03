//! Inbound message stream.
//!
//! [`SyncEngine::connect`] opens the relay's `/read` socket; the engine it
//! returns walks `Authenticating -> Streaming -> Closed`. Every frame read
//! while streaming is decoded as one [`Message`] and forwarded to the
//! dispatch channel; frames that fail to decode become system notices and
//! the stream continues. Connection-level failures are fatal.

use std::fmt;
use std::time::Duration;

use tchat_proto::message::{CodecError, Message};
use tchat_proto::wire::ACCEPTANCE_TOKEN;
use url::Url;

use crate::chat::{DispatchSender, DispatchUnit};
use crate::transport::FrameError;
use crate::transport::FrameStream;
use crate::transport::websocket::{CONNECT_TIMEOUT, WsFrameStream};

/// How long the relay has to answer the cookie.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of an open read stream.
///
/// Connecting is not a state: an engine only exists once its socket is
/// open, and a failed connect never yields one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Socket open, cookie not yet accepted.
    Authenticating,
    /// Cookie accepted, forwarding messages.
    Streaming,
    /// Socket closed; terminal.
    Closed,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Authenticating => "authenticating",
            Self::Streaming => "streaming",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Errors from the read stream.
///
/// Everything except [`Decode`](Self::Decode) ends the stream.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The socket could not be opened.
    #[error("could not connect to tchatd server: {0}")]
    Connection(FrameError),

    /// The cookie could not be sent or no reply arrived.
    #[error("could not authenticate to tchatd server: {0}")]
    Authentication(FrameError),

    /// The relay answered the cookie with something other than the
    /// acceptance token.
    #[error("failed to authenticate to tchatd server: relay replied {reply:?}")]
    Rejected {
        /// What the relay sent back.
        reply: String,
    },

    /// The socket failed while streaming.
    #[error("error reading from tchatd server: {0}")]
    Read(FrameError),

    /// The relay closed the socket.
    #[error("tchatd server closed the connection")]
    ConnectionClosed,

    /// [`SyncEngine::authenticate`] was called outside `Authenticating`.
    #[error("cannot authenticate read stream in state {state}")]
    NotAuthenticating {
        /// State at the time of the call.
        state: SyncState,
    },

    /// [`SyncEngine::stream`] was called outside `Streaming`.
    #[error("read stream is not streaming (state: {state})")]
    NotStreaming {
        /// State at the time of the call.
        state: SyncState,
    },

    /// A frame was not a valid message.
    #[error("an error occurred parsing this message: {0}")]
    Decode(CodecError),
}

/// Drives one authenticated read stream.
pub struct SyncEngine<S> {
    stream: S,
    state: SyncState,
    handshake_timeout: Duration,
}

impl SyncEngine<WsFrameStream> {
    /// Open the WebSocket at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Connection`] if the socket cannot be opened
    /// within [`CONNECT_TIMEOUT`].
    pub async fn connect(url: &Url) -> Result<Self, SyncError> {
        let stream = WsFrameStream::connect(url, CONNECT_TIMEOUT)
            .await
            .map_err(SyncError::Connection)?;
        Ok(Self::from_stream(stream))
    }
}

impl<S: FrameStream> SyncEngine<S> {
    /// Wrap an already-open stream. The engine starts in `Authenticating`.
    pub const fn from_stream(stream: S) -> Self {
        Self {
            stream,
            state: SyncState::Authenticating,
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }

    /// Override [`HANDSHAKE_TIMEOUT`].
    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SyncState {
        self.state
    }

    /// Send `cookie` and wait for the acceptance token.
    ///
    /// On any failure the socket is closed and the engine moves to `Closed`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Rejected`] if the reply is not the acceptance token.
    /// - [`SyncError::Authentication`] if the exchange fails or times out.
    /// - [`SyncError::NotAuthenticating`] if called in any other state.
    pub async fn authenticate(&mut self, cookie: &str) -> Result<(), SyncError> {
        if self.state != SyncState::Authenticating {
            return Err(SyncError::NotAuthenticating { state: self.state });
        }

        let result = tokio::time::timeout(self.handshake_timeout, self.handshake(cookie))
            .await
            .unwrap_or(Err(SyncError::Authentication(FrameError::Timeout)));

        match result {
            Ok(()) => {
                tracing::info!("read stream authenticated");
                self.state = SyncState::Streaming;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(err = %e, "read stream authentication failed");
                self.shutdown().await;
                Err(e)
            }
        }
    }

    async fn handshake(&mut self, cookie: &str) -> Result<(), SyncError> {
        self.stream
            .send_text(cookie)
            .await
            .map_err(SyncError::Authentication)?;
        let reply = match self.stream.next_frame().await {
            Some(Ok(reply)) => reply,
            Some(Err(e)) => return Err(SyncError::Authentication(e)),
            None => return Err(SyncError::Authentication(FrameError::ConnectionClosed)),
        };
        if reply != ACCEPTANCE_TOKEN.as_bytes() {
            return Err(SyncError::Rejected {
                reply: String::from_utf8_lossy(&reply).into_owned(),
            });
        }
        Ok(())
    }

    /// Forward every inbound frame to `dispatch` until the stream ends.
    ///
    /// Returns `Ok(())` if the dispatch consumer goes away first.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Read`] on a connection-level read failure.
    /// - [`SyncError::ConnectionClosed`] when the relay hangs up.
    /// - [`SyncError::NotStreaming`] if the handshake has not succeeded.
    pub async fn stream(&mut self, dispatch: &DispatchSender) -> Result<(), SyncError> {
        if self.state != SyncState::Streaming {
            return Err(SyncError::NotStreaming { state: self.state });
        }

        loop {
            let frame = tokio::select! {
                biased;
                () = dispatch.closed() => {
                    tracing::debug!("dispatch channel closed, stopping read stream");
                    self.shutdown().await;
                    return Ok(());
                }
                frame = self.stream.next_frame() => frame,
            };

            let frame = match frame {
                Some(Ok(frame)) => frame,
                Some(Err(FrameError::ConnectionClosed)) | None => {
                    self.shutdown().await;
                    return Err(SyncError::ConnectionClosed);
                }
                Some(Err(e)) => {
                    self.shutdown().await;
                    return Err(SyncError::Read(e));
                }
            };

            let unit = match Message::from_json(&frame) {
                Ok(message) => DispatchUnit::Chat(message),
                Err(e) => {
                    tracing::warn!(err = %e, len = frame.len(), "undecodable frame on read stream");
                    DispatchUnit::system(SyncError::Decode(e))
                }
            };

            if dispatch.send(unit).is_err() {
                self.shutdown().await;
                return Ok(());
            }
        }
    }

    async fn shutdown(&mut self) {
        if self.state != SyncState::Closed {
            self.stream.close().await;
            self.state = SyncState::Closed;
        }
    }
}

/// Connect, authenticate with `cookie`, then stream into `dispatch`.
///
/// # Errors
///
/// Returns the first fatal [`SyncError`].
pub async fn run(url: Url, cookie: String, dispatch: DispatchSender) -> Result<(), SyncError> {
    let mut engine = SyncEngine::connect(&url).await?;
    engine.authenticate(&cookie).await?;
    engine.stream(&dispatch).await
}
