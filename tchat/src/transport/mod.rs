//! Transport layer abstractions for tchat.
//!
//! Two seams live here:
//! - [`FrameStream`]: a persistent duplex stream of whole frames, used by the
//!   [`SyncEngine`](crate::sync::SyncEngine) for the inbound `/read` socket.
//!   Implemented by [`websocket::WsFrameStream`] and, for tests,
//!   [`loopback::LoopbackStream`].
//! - [`http::HttpTransport`]: a single form POST, used by the send path.

pub mod http;
pub mod loopback;
pub mod websocket;

/// Errors that can occur on a frame stream.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The stream was closed by the remote end.
    #[error("connection closed")]
    ConnectionClosed,

    /// The operation did not complete in time.
    #[error("stream operation timed out")]
    Timeout,

    /// An underlying I/O or protocol error occurred.
    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A duplex, message-framed connection.
///
/// Frame boundaries are preserved: one call to [`next_frame`](Self::next_frame)
/// yields exactly one frame sent by the remote end. Control frames
/// (ping/pong) are handled below this trait and never surface.
pub trait FrameStream: Send {
    /// Send one text frame.
    fn send_text(
        &mut self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<(), FrameError>> + Send;

    /// Receive the payload of the next data frame.
    ///
    /// Returns `None` once the remote end has closed the stream cleanly.
    fn next_frame(
        &mut self,
    ) -> impl std::future::Future<Output = Option<Result<Vec<u8>, FrameError>>> + Send;

    /// Close the stream. Errors while closing are logged, not returned.
    fn close(&mut self) -> impl std::future::Future<Output = ()> + Send;
}
