//! Loopback frame stream for testing.
//!
//! Uses in-process [`tokio::sync::mpsc`] channels to stand in for the
//! relay's `/read` socket. [`LoopbackStream::create_pair`] returns the
//! client end (a [`FrameStream`]) and a [`LoopbackRelay`] handle that
//! plays the server: it sees every text frame the client sends and can
//! push arbitrary frames, inject errors, or hang up.

use tokio::sync::mpsc;

use super::{FrameError, FrameStream};

/// Client end of a loopback connection.
pub struct LoopbackStream {
    /// Frames sent by the client, delivered to the relay handle.
    outgoing: mpsc::Sender<String>,
    /// Frames (or injected errors) pushed by the relay handle.
    incoming: mpsc::Receiver<Result<Vec<u8>, FrameError>>,
}

/// Server end of a loopback connection.
pub struct LoopbackRelay {
    from_client: mpsc::Receiver<String>,
    to_client: mpsc::Sender<Result<Vec<u8>, FrameError>>,
}

impl LoopbackStream {
    /// Create a connected client/relay pair with `buffer` slots per direction.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use tchat::transport::FrameStream;
    /// use tchat::transport::loopback::LoopbackStream;
    ///
    /// # async fn example() {
    /// let (mut client, mut relay) = LoopbackStream::create_pair(8);
    /// client.send_text("cookie").await.unwrap();
    /// assert_eq!(relay.recv_text().await.as_deref(), Some("cookie"));
    /// relay.send_text("accepted").await;
    /// let frame = client.next_frame().await.unwrap().unwrap();
    /// assert_eq!(frame, b"accepted");
    /// # }
    /// ```
    #[must_use]
    pub fn create_pair(buffer: usize) -> (Self, LoopbackRelay) {
        let (out_tx, out_rx) = mpsc::channel(buffer);
        let (in_tx, in_rx) = mpsc::channel(buffer);
        (
            Self {
                outgoing: out_tx,
                incoming: in_rx,
            },
            LoopbackRelay {
                from_client: out_rx,
                to_client: in_tx,
            },
        )
    }
}

impl FrameStream for LoopbackStream {
    async fn send_text(&mut self, text: &str) -> Result<(), FrameError> {
        self.outgoing
            .send(text.to_string())
            .await
            .map_err(|_| FrameError::ConnectionClosed)
    }

    async fn next_frame(&mut self) -> Option<Result<Vec<u8>, FrameError>> {
        self.incoming.recv().await
    }

    async fn close(&mut self) {
        self.incoming.close();
    }
}

impl LoopbackRelay {
    /// Receive the next text frame sent by the client.
    ///
    /// Returns `None` once the client end has been dropped.
    pub async fn recv_text(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Push a text frame to the client. Returns `false` if the client is gone.
    pub async fn send_text(&self, text: &str) -> bool {
        self.send_bytes(text.as_bytes()).await
    }

    /// Push a raw frame to the client. Returns `false` if the client is gone.
    pub async fn send_bytes(&self, bytes: &[u8]) -> bool {
        self.to_client.send(Ok(bytes.to_vec())).await.is_ok()
    }

    /// Deliver a connection-level error to the client's next read.
    pub async fn fail(&self, error: FrameError) -> bool {
        self.to_client.send(Err(error)).await.is_ok()
    }

    /// Returns `true` once the client has closed or dropped its end.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.to_client.is_closed()
    }

    /// Hang up: the client's next read returns `None`.
    pub fn hang_up(self) {
        drop(self);
    }
}
