//! Relay server core: shared state, the `/read` stream and the `/send`
//! endpoint.
//!
//! Readers open a WebSocket on `/read`, present the cookie as their first
//! text frame and, once answered with `"accepted"`, receive every message
//! the relay accepts afterwards as one JSON text frame. Writers POST a
//! [`SendForm`] to `/send`; signed forms are verified against the key
//! embedded in the author's service id before anything is broadcast.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{DefaultBodyLimit, Form, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tchat_proto::message::Message;
use tchat_proto::signing::SignedMessageError;
use tchat_proto::wire::{
    ACCEPTANCE_TOKEN, FormError, READ_PATH, REJECTION_TOKEN, SEND_PATH, SendForm,
};
use tokio::sync::broadcast;

/// Default largest accepted `/send` body (64 KB).
const DEFAULT_MAX_FORM_SIZE: usize = 64 * 1024;

/// Default per-reader backlog.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// What the relay pushes to every authenticated reader.
#[derive(Debug, Clone)]
enum Outbound {
    /// One text frame, passed through verbatim.
    Frame(String),
    /// Close the socket.
    Close,
}

/// Shared relay state: the reader cookie and the fan-out channel.
pub struct RelayState {
    read_cookie: String,
    outbound: broadcast::Sender<Outbound>,
    max_form_size: usize,
}

impl RelayState {
    /// Relay state with default limits.
    #[must_use]
    pub fn new(read_cookie: impl Into<String>) -> Self {
        Self::with_config(read_cookie, DEFAULT_BROADCAST_CAPACITY, DEFAULT_MAX_FORM_SIZE)
    }

    /// Relay state with explicit limits from
    /// [`RelayConfig`](crate::config::RelayConfig).
    #[must_use]
    pub fn with_config(
        read_cookie: impl Into<String>,
        broadcast_capacity: usize,
        max_form_size: usize,
    ) -> Self {
        let (outbound, _) = broadcast::channel(broadcast_capacity.max(1));
        Self {
            read_cookie: read_cookie.into(),
            outbound,
            max_form_size,
        }
    }

    /// Number of currently authenticated readers.
    #[must_use]
    pub fn reader_count(&self) -> usize {
        self.outbound.receiver_count()
    }

    /// Broadcast an accepted message. Returns how many readers it reached.
    pub fn publish(&self, message: &Message) -> usize {
        match message.to_canonical_json() {
            Ok(json) => self.publish_raw(String::from_utf8_lossy(&json).into_owned()),
            Err(e) => {
                tracing::error!(error = %e, "could not encode accepted message");
                0
            }
        }
    }

    /// Broadcast an arbitrary text frame, valid JSON or not.
    pub fn publish_raw(&self, frame: impl Into<String>) -> usize {
        self.outbound.send(Outbound::Frame(frame.into())).unwrap_or(0)
    }

    /// Send a close frame to every reader.
    pub fn close_all_connections(&self) {
        let readers = self.outbound.send(Outbound::Close).unwrap_or(0);
        tracing::info!(readers, "closing all read streams");
    }
}

/// Handles an upgraded `/read` socket.
///
/// 1. Wait for the first text frame and compare it to the cookie.
/// 2. Reply `"rejected"` and close on mismatch.
/// 3. Subscribe, reply `"accepted"`, then forward broadcasts until either
///    side goes away.
pub async fn handle_read_socket(mut socket: WebSocket, state: Arc<RelayState>) {
    let Some(cookie) = wait_for_cookie(&mut socket).await else {
        tracing::warn!("read stream closed before presenting a cookie");
        return;
    };

    if cookie != state.read_cookie {
        tracing::warn!("read stream presented a wrong cookie");
        let _ = socket.send(WsMessage::Text(REJECTION_TOKEN.into())).await;
        let _ = socket.send(WsMessage::Close(None)).await;
        return;
    }

    // Subscribe before answering so nothing published after the reply is missed.
    let mut rx = state.outbound.subscribe();
    if socket
        .send(WsMessage::Text(ACCEPTANCE_TOKEN.into()))
        .await
        .is_err()
    {
        return;
    }
    tracing::info!(readers = state.reader_count(), "read stream accepted");

    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Ok(Outbound::Frame(text)) => {
                    if socket.send(WsMessage::Text(text.into())).await.is_err() {
                        tracing::warn!("read stream write failed");
                        break;
                    }
                }
                Ok(Outbound::Close) | Err(broadcast::error::RecvError::Closed) => {
                    let _ = socket.send(WsMessage::Close(None)).await;
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "read stream lagging, messages dropped");
                }
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(WsMessage::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {
                    // Readers have nothing more to say after the cookie.
                }
            },
        }
    }

    tracing::info!("read stream ended");
}

/// Returns the first text frame, skipping control frames.
async fn wait_for_cookie(socket: &mut WebSocket) -> Option<String> {
    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            WsMessage::Text(text) => return Some(text.as_str().to_string()),
            WsMessage::Binary(data) => return Some(String::from_utf8_lossy(&data).into_owned()),
            WsMessage::Close(_) => return None,
            WsMessage::Ping(_) | WsMessage::Pong(_) => {}
        }
    }
    None
}

/// `POST /send`: accept either form variant and broadcast the message.
///
/// Answers 200 `ok`, 400 for a malformed form, 401 for a signature that
/// does not verify against the author's service id.
async fn send_handler(
    State(state): State<Arc<RelayState>>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> (StatusCode, String) {
    let Form(fields) = match form {
        Ok(form) => form,
        Err(e) => {
            tracing::warn!(error = %e, "unreadable send form");
            return (StatusCode::BAD_REQUEST, e.body_text());
        }
    };

    let result = SendForm::from_fields(&fields).and_then(|form| {
        let message = form.open()?;
        Ok((form, message))
    });

    match result {
        Ok((form, message)) => {
            let variant = match form {
                SendForm::Signed { .. } => "signed",
                SendForm::Private { .. } => "private",
            };
            let readers = state.publish(&message);
            tracing::info!(
                author = %message.service_id,
                variant,
                readers,
                "message accepted"
            );
            (StatusCode::OK, "ok".to_string())
        }
        Err(e) => {
            let status = status_for(&e);
            tracing::warn!(error = %e, status = status.as_u16(), "send rejected");
            (status, e.to_string())
        }
    }
}

const fn status_for(err: &FormError) -> StatusCode {
    match err {
        FormError::Signed(
            SignedMessageError::Verification(_) | SignedMessageError::Identity(_),
        ) => StatusCode::UNAUTHORIZED,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// axum handler that upgrades `/read` requests.
async fn read_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<RelayState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_read_socket(socket, state))
}

/// The relay's routes over `state`.
pub fn router(state: Arc<RelayState>) -> axum::Router {
    let limit = state.max_form_size;
    axum::Router::new()
        .route(READ_PATH, axum::routing::get(read_handler))
        .route(SEND_PATH, axum::routing::post(send_handler))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

/// Starts the relay with a pre-configured [`RelayState`].
///
/// Returns the bound address (useful with port 0) and the server task.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<RelayState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "relay server error");
        }
    });

    Ok((bound_addr, handle))
}

/// Starts a relay with default limits.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
    read_cookie: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(RelayState::new(read_cookie))).await
}
