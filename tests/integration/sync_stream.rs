//! Integration tests for the inbound read stream against the tchat relay.
//!
//! Validates:
//! - a wrong cookie closes the stream before any message is delivered
//! - a right cookie moves the engine to streaming
//! - undecodable frames surface as system notices without ending the stream
//! - the relay hanging up is fatal
//! - a message sent through the relay comes back on the stream

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use tchat::chat::send::Sender;
use tchat::chat::{DispatchUnit, dispatch_channel};
use tchat::config::SendPolicy;
use tchat::crypto::Keypair;
use tchat::sync::{self, SyncEngine, SyncError, SyncState};
use tchat::transport::http::ReqwestTransport;
use tchat_relay::relay::{RelayState, start_server_with_state};
use url::Url;

const COOKIE: &str = "let-me-in";

/// Start the relay in-process; returns its state and the `/read` URL.
async fn start_relay() -> (Arc<RelayState>, Url, std::net::SocketAddr) {
    let state = Arc::new(RelayState::new(COOKIE));
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .expect("failed to start relay");
    let url = Url::parse(&format!("ws://{addr}/read")).unwrap();
    (state, url, addr)
}

async fn recv(rx: &mut tchat::chat::DispatchReceiver) -> DispatchUnit {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("recv timed out")
        .expect("dispatch channel closed")
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn wrong_cookie_is_rejected_and_closed() {
    let (state, url, _) = start_relay().await;

    let mut engine = SyncEngine::connect(&url).await.unwrap();
    assert_eq!(engine.state(), SyncState::Authenticating);

    let err = engine.authenticate("nope").await.unwrap_err();
    assert!(matches!(err, SyncError::Rejected { ref reply } if reply == "rejected"));
    assert_eq!(engine.state(), SyncState::Closed);

    let (tx, mut rx) = dispatch_channel();
    state.publish_raw(r#"{"ServiceID":"a","Content":"b"}"#);
    assert!(matches!(
        engine.stream(&tx).await,
        Err(SyncError::NotStreaming {
            state: SyncState::Closed
        })
    ));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn right_cookie_starts_streaming() {
    let (state, url, _) = start_relay().await;

    let mut engine = SyncEngine::connect(&url).await.unwrap();
    engine.authenticate(COOKIE).await.unwrap();
    assert_eq!(engine.state(), SyncState::Streaming);
    assert_eq!(state.reader_count(), 1);
}

#[tokio::test]
async fn run_with_wrong_cookie_fails() {
    let (_state, url, _) = start_relay().await;
    let (tx, _rx) = dispatch_channel();
    let err = sync::run(url, "nope".to_string(), tx).await.unwrap_err();
    assert!(
        err.to_string()
            .starts_with("failed to authenticate to tchatd server")
    );
}

#[tokio::test]
async fn unreachable_relay_is_connection_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("ws://{addr}/read")).unwrap();
    let err = SyncEngine::connect(&url).await.err().unwrap();
    assert!(matches!(err, SyncError::Connection(_)));
    assert!(
        err.to_string()
            .starts_with("could not connect to tchatd server: ")
    );
}

// =============================================================================
// Streaming
// =============================================================================

#[tokio::test]
async fn bad_frame_is_reported_and_stream_continues() {
    let (state, url, _) = start_relay().await;
    let mut engine = SyncEngine::connect(&url).await.unwrap();
    engine.authenticate(COOKIE).await.unwrap();

    let (tx, mut rx) = dispatch_channel();
    let stream = tokio::spawn(async move { engine.stream(&tx).await });

    state.publish_raw("{\"ServiceID\": 12");
    state.publish_raw(r#"{"ServiceID":"peer","Content":"still here"}"#);

    let notice = recv(&mut rx).await;
    assert!(notice.is_system());
    assert!(
        notice
            .content()
            .starts_with("an error occurred parsing this message: ")
    );

    let chat = recv(&mut rx).await;
    assert_eq!(chat.author(), "peer");
    assert_eq!(chat.content(), "still here");

    state.close_all_connections();
    let result = tokio::time::timeout(Duration::from_secs(5), stream)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(SyncError::ConnectionClosed)));
}

#[tokio::test]
async fn relay_hang_up_is_fatal_for_run() {
    let (state, url, _) = start_relay().await;
    let (tx, mut rx) = dispatch_channel();
    let run = tokio::spawn(sync::run(url, COOKIE.to_string(), tx));

    for _ in 0..100 {
        if state.reader_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    state.publish_raw(r#"{"ServiceID":"x","Content":"last"}"#);
    assert_eq!(recv(&mut rx).await.content(), "last");

    state.close_all_connections();
    let result = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(SyncError::ConnectionClosed)));
}

#[tokio::test]
async fn private_send_comes_back_on_stream() {
    let (_state, url, addr) = start_relay().await;
    let mut engine = SyncEngine::connect(&url).await.unwrap();
    engine.authenticate(COOKIE).await.unwrap();

    let (tx, mut rx) = dispatch_channel();
    let _stream = tokio::spawn(async move { engine.stream(&tx).await });

    let keypair = Keypair::generate();
    let sender = Sender::new(
        ReqwestTransport::direct().unwrap(),
        SendPolicy::PrivateChannel {
            server_address: addr.to_string(),
        },
        keypair.service_id().as_str(),
        &keypair,
    );

    let echo = sender.send("round trip").await;
    assert!(matches!(echo, DispatchUnit::Chat(_)));

    let received = recv(&mut rx).await;
    assert_eq!(received, echo);
}
