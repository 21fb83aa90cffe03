//! Integration tests for dispatch ordering.
//!
//! The send path and the read stream are independent producers into one
//! channel with a single consumer. Each producer's units must reach the
//! display in the order that producer enqueued them, and the display
//! must see exactly the enqueue order of the channel.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use tchat::app::ChatLog;
use tchat::chat::send::Sender;
use tchat::chat::{self, DispatchUnit, DisplaySink, dispatch_channel};
use tchat::config::SendPolicy;
use tchat::crypto::Keypair;
use tchat::sync::{SyncEngine, SyncError};
use tchat::transport::http::{HttpError, HttpResponse, HttpTransport};
use tchat::transport::loopback::LoopbackStream;
use tchat_proto::wire::ACCEPTANCE_TOKEN;

struct AlwaysOk;

impl HttpTransport for AlwaysOk {
    async fn post_form(
        &self,
        _url: &str,
        _fields: &[(&str, &str)],
    ) -> Result<HttpResponse, HttpError> {
        tokio::task::yield_now().await;
        Ok(HttpResponse {
            status: 200,
            body: String::new(),
        })
    }
}

/// Records `author|body` per delivered line.
#[derive(Default)]
struct Recorder(Vec<(String, String)>);

impl DisplaySink for Recorder {
    fn push_line(&mut self, author: &str, body: &str) {
        self.0.push((author.to_string(), body.to_string()));
    }
}

#[tokio::test]
async fn single_producer_order_is_preserved() {
    let (tx, mut rx) = dispatch_channel();
    for i in 0..50 {
        tx.send(DispatchUnit::System(format!("notice {i}"))).unwrap();
    }

    let mut log = ChatLog::new();
    assert_eq!(chat::drain(&mut rx, &mut log), 50);

    let bodies: Vec<&str> = log.lines().iter().map(|l| l.body.as_str()).collect();
    let expected: Vec<String> = (0..50).map(|i| format!("notice {i}")).collect();
    assert_eq!(bodies, expected);
}

#[tokio::test]
async fn concurrent_producers_keep_their_own_order() {
    let (tx, rx) = dispatch_channel();

    // Producer 1: the read stream, fed by a loopback relay.
    let (client, mut relay) = LoopbackStream::create_pair(64);
    let relay_task = tokio::spawn(async move {
        assert!(relay.recv_text().await.is_some());
        relay.send_text(ACCEPTANCE_TOKEN).await;
        for i in 0..20 {
            let frame = format!(r#"{{"ServiceID":"peer","Content":"in {i}"}}"#);
            relay.send_text(&frame).await;
            if i % 3 == 0 {
                tokio::task::yield_now().await;
            }
        }
        relay.hang_up();
    });
    let sync_tx = tx.clone();
    let sync_task = tokio::spawn(async move {
        let mut engine = SyncEngine::from_stream(client);
        engine.authenticate("cookie").await.unwrap();
        let _ = engine.stream(&sync_tx).await;
    });

    // Producer 2: the send path.
    let keypair = Keypair::generate();
    let me = keypair.service_id().as_str().to_string();
    let send_tx = tx.clone();
    let send_task = tokio::spawn(async move {
        let sender = Sender::new(
            AlwaysOk,
            SendPolicy::Signed {
                proxy_address: "127.0.0.1:9050".to_string(),
            },
            Keypair::generate().service_id().as_str(),
            &keypair,
        );
        for i in 0..20 {
            let unit = sender.send(&format!("out {i}")).await;
            send_tx.send(unit).unwrap();
        }
    });
    drop(tx);

    let consumer = tokio::spawn(async move {
        let mut recorder = Recorder::default();
        chat::consume(rx, &mut recorder).await;
        recorder
    });

    relay_task.await.unwrap();
    sync_task.await.unwrap();
    send_task.await.unwrap();
    let recorder = tokio::time::timeout(Duration::from_secs(5), consumer)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(recorder.0.len(), 40);

    let inbound: Vec<&str> = recorder
        .0
        .iter()
        .filter(|(author, _)| author == "peer")
        .map(|(_, body)| body.as_str())
        .collect();
    let expected_in: Vec<String> = (0..20).map(|i| format!("in {i}")).collect();
    assert_eq!(inbound, expected_in);

    let outbound: Vec<&str> = recorder
        .0
        .iter()
        .filter(|(author, _)| *author == me)
        .map(|(_, body)| body.as_str())
        .collect();
    let expected_out: Vec<String> = (0..20).map(|i| format!("out {i}")).collect();
    assert_eq!(outbound, expected_out);
}

#[tokio::test]
async fn interleaved_enqueue_order_is_display_order() {
    let (tx, mut rx) = dispatch_channel();
    let keypair = Keypair::generate();
    let sender = Sender::new(
        AlwaysOk,
        SendPolicy::Signed {
            proxy_address: "127.0.0.1:9050".to_string(),
        },
        Keypair::generate().service_id().as_str(),
        &keypair,
    );

    tx.send(sender.send("first").await).unwrap();
    tx.send(DispatchUnit::system("second")).unwrap();
    tx.send(sender.send("third").await).unwrap();

    let mut log = ChatLog::new();
    chat::drain(&mut rx, &mut log);

    let me = keypair.service_id();
    assert_eq!(
        log.text(),
        format!("{me}> first\n(System)> second\n{me}> third\n")
    );
}

#[tokio::test]
async fn completed_send_echoes_before_later_peer_frame() {
    let (tx, mut rx) = dispatch_channel();
    let keypair = Keypair::generate();
    let me = keypair.service_id().as_str().to_string();
    let sender = Sender::new(
        AlwaysOk,
        SendPolicy::Signed {
            proxy_address: "127.0.0.1:9050".to_string(),
        },
        Keypair::generate().service_id().as_str(),
        &keypair,
    );

    let (client, mut relay) = LoopbackStream::create_pair(8);
    let handshake = tokio::spawn(async move {
        assert!(relay.recv_text().await.is_some());
        relay.send_text(ACCEPTANCE_TOKEN).await;
        relay
    });
    let mut engine = SyncEngine::from_stream(client);
    engine.authenticate("cookie").await.unwrap();
    let relay = handshake.await.unwrap();

    tx.send(sender.send("mine").await).unwrap();

    let sync_tx = tx.clone();
    let stream = tokio::spawn(async move { engine.stream(&sync_tx).await });
    relay
        .send_text(r#"{"ServiceID":"peer","Content":"theirs"}"#)
        .await;
    relay.hang_up();
    assert!(matches!(
        stream.await.unwrap(),
        Err(SyncError::ConnectionClosed)
    ));
    drop(tx);

    let mut log = ChatLog::new();
    assert_eq!(chat::drain(&mut rx, &mut log), 2);
    assert_eq!(log.text(), format!("{me}> mine\npeer> theirs\n"));
}

#[tokio::test]
async fn long_messages_are_wrapped_on_delivery() {
    let (tx, mut rx) = dispatch_channel();
    tx.send(DispatchUnit::System("z".repeat(85))).unwrap();

    let mut log = ChatLog::new();
    chat::drain(&mut rx, &mut log);
    assert_eq!(
        log.text(),
        format!("(System)> {}\n {}\n", "z".repeat(80), "z".repeat(5))
    );
}
