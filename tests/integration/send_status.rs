//! Integration tests for the outbound send path.
//!
//! Validates how a send's outcome is reported:
//! - 200 echoes the original message
//! - any other status becomes a system notice carrying the code and body
//! - transport failures become a system notice carrying the cause
//!
//! against a stub transport, a live HTTP stub, and the tchat relay.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use tchat::chat::DispatchUnit;
use tchat::chat::send::Sender;
use tchat::config::SendPolicy;
use tchat::crypto::Keypair;
use tchat::transport::http::{HttpError, HttpResponse, HttpTransport, ReqwestTransport};
use tchat_proto::message::Message;
use tchat_proto::signing::SignedMessage;
use tchat_proto::wire::SendForm;
use tchat_relay::relay::{RelayState, start_server_with_state};

/// Answers every request with a fixed outcome.
struct FixedTransport(Result<(u16, &'static str), &'static str>);

impl HttpTransport for FixedTransport {
    async fn post_form(
        &self,
        _url: &str,
        _fields: &[(&str, &str)],
    ) -> Result<HttpResponse, HttpError> {
        match self.0 {
            Ok((status, body)) => Ok(HttpResponse {
                status,
                body: body.to_string(),
            }),
            Err(cause) => Err(HttpError::Request(cause.to_string())),
        }
    }
}

fn signed_policy() -> SendPolicy {
    SendPolicy::Signed {
        proxy_address: "127.0.0.1:9050".to_string(),
    }
}

fn peer() -> String {
    Keypair::generate().service_id().as_str().to_string()
}

/// Serve `/send` with a fixed status and body; returns `host:port`.
async fn start_http_stub(status: StatusCode, body: &'static str) -> String {
    let app = axum::Router::new().route(
        "/send",
        axum::routing::post(move || async move { (status, body) }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr.to_string()
}

fn private_sender(server_address: &str, keypair: &Keypair) -> Sender<ReqwestTransport> {
    Sender::new(
        ReqwestTransport::direct().unwrap(),
        SendPolicy::PrivateChannel {
            server_address: server_address.to_string(),
        },
        &peer(),
        keypair,
    )
}

// =============================================================================
// Stub transport
// =============================================================================

#[tokio::test]
async fn status_200_echoes_original_message() {
    let keypair = Keypair::generate();
    let sender = Sender::new(FixedTransport(Ok((200, ""))), signed_policy(), &peer(), &keypair);

    let unit = sender.send("hello there").await;
    assert_eq!(
        unit,
        DispatchUnit::Chat(Message::new(&keypair.service_id(), "hello there"))
    );
}

#[tokio::test]
async fn status_404_reports_code_and_body() {
    let sender = Sender::new(
        FixedTransport(Ok((404, "not found"))),
        signed_policy(),
        &peer(),
        &Keypair::generate(),
    );

    let unit = sender.send("x").await;
    assert!(unit.is_system());
    assert_eq!(unit.author(), "(System)");
    assert_eq!(
        unit.content(),
        "error sending message: received status code 404: not found"
    );
}

#[tokio::test]
async fn network_failure_reports_cause() {
    let sender = Sender::new(
        FixedTransport(Err("proxy unreachable")),
        signed_policy(),
        &peer(),
        &Keypair::generate(),
    );

    assert_eq!(
        sender.send("x").await,
        DispatchUnit::System("error sending message: proxy unreachable".to_string())
    );
}

// =============================================================================
// Live HTTP
// =============================================================================

#[tokio::test]
async fn live_404_is_reported() {
    let addr = start_http_stub(StatusCode::NOT_FOUND, "not found").await;
    let sender = private_sender(&addr, &Keypair::generate());

    assert_eq!(
        sender.send("x").await,
        DispatchUnit::System(
            "error sending message: received status code 404: not found".to_string()
        )
    );
}

#[tokio::test]
async fn live_200_echoes() {
    let addr = start_http_stub(StatusCode::OK, "ok").await;
    let keypair = Keypair::generate();
    let sender = private_sender(&addr, &keypair);

    assert_eq!(
        sender.send("ping").await,
        DispatchUnit::Chat(Message::new(&keypair.service_id(), "ping"))
    );
}

#[tokio::test]
async fn refused_connection_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let sender = private_sender(&addr, &Keypair::generate());
    let unit = sender.send("x").await;
    assert!(unit.is_system());
    assert!(unit.content().starts_with("error sending message: "));
    assert!(!unit.content().contains("status code"));
}

// =============================================================================
// Relay
// =============================================================================

#[tokio::test]
async fn relay_accepts_signed_form_and_refuses_forgery() {
    let state = Arc::new(RelayState::new("c"));
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", state).await.unwrap();
    let url = format!("http://{addr}/send");
    let transport = ReqwestTransport::direct().unwrap();

    let author = Keypair::generate();
    let signed = SignedMessage::new(
        author.signing_key(),
        Message::new(&author.service_id(), "signed hello"),
    )
    .unwrap();
    let form = SendForm::signed(&signed);
    let response = transport.post_form(&url, &form.fields()).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, "ok");

    let impostor = Keypair::generate();
    let forged = SignedMessage::new(
        impostor.signing_key(),
        Message::new(&author.service_id(), "not really"),
    )
    .unwrap();
    let form = SendForm::signed(&forged);
    let response = transport.post_form(&url, &form.fields()).await.unwrap();
    assert_eq!(response.status, 401);
}

#[tokio::test]
async fn relay_rejects_incomplete_form() {
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::new(RelayState::new("c")))
        .await
        .unwrap();
    let sender = Sender::new(
        ReqwestTransport::direct().unwrap(),
        SendPolicy::PrivateChannel {
            server_address: addr.to_string(),
        },
        &peer(),
        &Keypair::generate(),
    );

    let transport = ReqwestTransport::direct().unwrap();
    let response = tokio::time::timeout(
        Duration::from_secs(5),
        transport.post_form(&sender.target_url(), &[("message", "{}")]),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(response.status, 400);
}
