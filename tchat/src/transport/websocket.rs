//! WebSocket implementation of [`FrameStream`] over tokio-tungstenite.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::{FrameError, FrameStream};

/// Default timeout for opening the WebSocket.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Type alias for the client side of a WebSocket connection.
type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// A connected WebSocket carrying text or binary data frames.
pub struct WsFrameStream {
    /// The underlying socket.
    inner: WsStream,
    /// The URL this stream was opened against.
    url: Url,
}

impl WsFrameStream {
    /// Open a WebSocket to `url`, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// - [`FrameError::Timeout`] if the handshake does not finish in time.
    /// - [`FrameError::Io`] if the TCP connect or HTTP upgrade fails.
    pub async fn connect(url: &Url, timeout: Duration) -> Result<Self, FrameError> {
        let (inner, _response) = tokio::time::timeout(timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| {
                tracing::warn!(url = %url, "read stream connect timed out");
                FrameError::Timeout
            })?
            .map_err(|e| {
                tracing::warn!(url = %url, err = %e, "read stream connect failed");
                FrameError::Io(std::io::Error::other(e))
            })?;

        tracing::info!(url = %url, "read stream connected");
        Ok(Self {
            inner,
            url: url.clone(),
        })
    }
}

impl FrameStream for WsFrameStream {
    async fn send_text(&mut self, text: &str) -> Result<(), FrameError> {
        self.inner
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| FrameError::Io(std::io::Error::other(e)))
    }

    async fn next_frame(&mut self) -> Option<Result<Vec<u8>, FrameError>> {
        while let Some(msg) = self.inner.next().await {
            match msg {
                Ok(WsMessage::Text(text)) => return Some(Ok(text.as_bytes().to_vec())),
                Ok(WsMessage::Binary(data)) => return Some(Ok(data.to_vec())),
                Ok(WsMessage::Close(frame)) => {
                    tracing::info!(url = %self.url, ?frame, "read stream closed by server");
                    return None;
                }
                Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_)) => {
                    // Pongs are queued by tungstenite itself.
                }
                Err(e) => return Some(Err(FrameError::Io(std::io::Error::other(e)))),
            }
        }
        None
    }

    async fn close(&mut self) {
        if let Err(e) = self.inner.close(None).await {
            tracing::debug!(url = %self.url, err = %e, "error closing read stream");
        }
    }
}
