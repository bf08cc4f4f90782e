#![allow(clippy::unwrap_used)]

// Integration tests for `RemoteLink` against a local websocket relay.

use std::future::Future;
use std::time::Duration;

use belabot_api::link::{LinkConfig, LinkState, ReconnectConfig, RemoteLink};
use belabot_api::protocol::request::Command;
use belabot_api::{Error, Push, Request};
use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

type Ws = WebSocketStream<TcpStream>;

// ── Fake relay ───────────────────────────────────────────────────────

async fn spawn_relay<F, Fut>(session: F) -> Url
where
    F: FnOnce(Ws) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        session(ws).await;
    });

    Url::parse(&format!("ws://{addr}/ws/remote")).unwrap()
}

/// Next JSON frame from the client, skipping keepalives.
async fn next_json(ws: &mut Ws) -> Value {
    loop {
        let message = ws.next().await.unwrap().unwrap();
        if let Message::Text(text) = message {
            let value: Value = serde_json::from_str(text.as_str()).unwrap();
            if value.get("keepalive").is_none() {
                return value;
            }
        }
    }
}

async fn send_json(ws: &mut Ws, value: Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

/// Check the auth frame and answer it.
async fn handshake(ws: &mut Ws, accept: bool) {
    let auth = next_json(ws).await;
    assert_eq!(auth["remote"]["auth/key"]["key"], "secret-key");
    assert_eq!(auth["remote"]["auth/key"]["version"], 6);
    send_json(ws, json!({"remote": {"auth/key": accept}})).await;
}

/// Keep the server side open until the client goes away.
async fn drain(ws: &mut Ws) {
    while let Some(Ok(_)) = ws.next().await {}
}

fn link_config(url: Url) -> LinkConfig {
    let mut config = LinkConfig::new(url, SecretString::from("secret-key".to_string()));
    config.request_timeout = Duration::from_millis(500);
    config.handshake_timeout = Duration::from_secs(2);
    config.reconnect = ReconnectConfig {
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(100),
        max_retries: Some(0),
    };
    config
}

// ── Handshake ────────────────────────────────────────────────────────

#[tokio::test]
async fn connect_authenticates_and_becomes_ready() {
    let url = spawn_relay(|mut ws| async move {
        handshake(&mut ws, true).await;
        drain(&mut ws).await;
    })
    .await;

    let link = RemoteLink::new(link_config(url));
    link.connect().await.unwrap();

    assert_eq!(link.state(), LinkState::Ready);
    assert!(link.status().last_error.is_none());
    link.shutdown();
}

#[tokio::test]
async fn rejected_key_is_an_authentication_error() {
    let url = spawn_relay(|mut ws| async move {
        handshake(&mut ws, false).await;
        drain(&mut ws).await;
    })
    .await;

    let link = RemoteLink::new(link_config(url));
    let err = link.connect().await.unwrap_err();

    assert!(err.is_auth(), "expected auth error, got {err:?}");
    assert_ne!(link.state(), LinkState::Ready);
    link.shutdown();
}

#[tokio::test]
async fn unreachable_relay_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("ws://{addr}/ws/remote")).unwrap();
    let link = RemoteLink::new(link_config(url));

    let err = link.connect().await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "got {err:?}");
    link.shutdown();
}

// ── Requests ─────────────────────────────────────────────────────────

#[tokio::test]
async fn request_resolves_with_matching_response() {
    let url = spawn_relay(|mut ws| async move {
        handshake(&mut ws, true).await;
        let request = next_json(&mut ws).await;
        assert_eq!(request["bitrate"]["max_br"], 2500);
        send_json(&mut ws, json!({"response": {"id": request["id"], "result": null}})).await;
        drain(&mut ws).await;
    })
    .await;

    let link = RemoteLink::new(link_config(url));
    link.connect().await.unwrap();

    let result = link.request(Request::bitrate(2500)).await.unwrap();
    assert_eq!(result, Value::Null);
    assert_eq!(link.in_flight(), 0);
    link.shutdown();
}

#[tokio::test]
async fn out_of_order_responses_are_matched_by_id() {
    let url = spawn_relay(|mut ws| async move {
        handshake(&mut ws, true).await;
        let first = next_json(&mut ws).await;
        let second = next_json(&mut ws).await;

        // Answer in reverse order, echoing the verb back as the result.
        for request in [second, first] {
            let verb = if request.get("command").is_some() { "command" } else { "stop" };
            send_json(&mut ws, json!({"response": {"id": request["id"], "result": verb}})).await;
        }
        drain(&mut ws).await;
    })
    .await;

    let link = RemoteLink::new(link_config(url));
    link.connect().await.unwrap();

    let (poweroff, stop) = tokio::join!(
        link.request(Request::Command(Command::Poweroff)),
        link.request(Request::stop()),
    );

    assert_eq!(poweroff.unwrap(), json!("command"));
    assert_eq!(stop.unwrap(), json!("stop"));
    link.shutdown();
}

#[tokio::test]
async fn error_response_is_a_remote_rejection() {
    let url = spawn_relay(|mut ws| async move {
        handshake(&mut ws, true).await;
        let request = next_json(&mut ws).await;
        send_json(
            &mut ws,
            json!({"response": {"id": request["id"], "error": "invalid interface"}}),
        )
        .await;
        drain(&mut ws).await;
    })
    .await;

    let link = RemoteLink::new(link_config(url));
    link.connect().await.unwrap();

    let err = link.request(Request::stop()).await.unwrap_err();
    assert!(
        matches!(&err, Error::RemoteRejected { message } if message == "invalid interface"),
        "got {err:?}"
    );
    link.shutdown();
}

#[tokio::test]
async fn unanswered_request_times_out() {
    let url = spawn_relay(|mut ws| async move {
        handshake(&mut ws, true).await;
        drain(&mut ws).await;
    })
    .await;

    let link = RemoteLink::new(link_config(url));
    link.connect().await.unwrap();

    let err = link.request(Request::stop()).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }), "got {err:?}");
    assert_eq!(link.in_flight(), 0);
    link.shutdown();
}

#[tokio::test]
async fn disconnect_fails_in_flight_requests() {
    let url = spawn_relay(|mut ws| async move {
        handshake(&mut ws, true).await;
        let _request = next_json(&mut ws).await;
        // Drop the socket without answering.
    })
    .await;

    let link = RemoteLink::new(link_config(url));
    link.connect().await.unwrap();

    let err = link.request(Request::stop()).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "got {err:?}");

    // No relay is listening any more, so requests now fail fast.
    let err = link.request(Request::stop()).await.unwrap_err();
    assert!(matches!(err, Error::NotConnected), "got {err:?}");
    link.shutdown();
}

// ── Reconnect ────────────────────────────────────────────────────────

#[tokio::test]
async fn reconnects_after_drop_and_retries_rejected_key() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (events_tx, mut events) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        // First session: authenticate, then hang up.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        handshake(&mut ws, true).await;
        ws.close(None).await.unwrap();
        drop(ws);
        events_tx.send("closed").unwrap();

        // Second: the key is refused once.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        handshake(&mut ws, false).await;
        drop(ws);
        events_tx.send("rejected").unwrap();

        // Third: serve normally.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        handshake(&mut ws, true).await;
        events_tx.send("accepted").unwrap();
        let request = next_json(&mut ws).await;
        assert!(request.get("stop").is_some(), "{request}");
        send_json(&mut ws, json!({"response": {"id": request["id"], "result": true}})).await;
        drain(&mut ws).await;
    });

    let url = Url::parse(&format!("ws://{addr}/ws/remote")).unwrap();
    let mut config = link_config(url);
    config.reconnect.max_retries = None;
    let link = RemoteLink::new(config);
    link.connect().await.unwrap();

    let mut seen = Vec::new();
    for _ in 0..3 {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        seen.push(event);
    }
    assert_eq!(seen, ["closed", "rejected", "accepted"]);

    let mut status = link.subscribe_status();
    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| s.state == LinkState::Ready),
    )
    .await
    .unwrap()
    .unwrap();

    let result = link.request(Request::stop()).await.unwrap();
    assert_eq!(result, Value::Bool(true));
    link.shutdown();
}

// ── Pushes ───────────────────────────────────────────────────────────

#[tokio::test]
async fn pushes_are_delivered_to_handlers() {
    let url = spawn_relay(|mut ws| async move {
        handshake(&mut ws, true).await;
        send_json(
            &mut ws,
            json!({
                "status": {"is_streaming": true},
                "remote": {"is_encoder_online": true}
            }),
        )
        .await;
        drain(&mut ws).await;
    })
    .await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let link = RemoteLink::new(link_config(url));
    link.on_push(move |push| {
        let _ = tx.send(push.clone());
    });
    link.connect().await.unwrap();

    let mut kinds = Vec::new();
    for _ in 0..2 {
        let push = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        kinds.push(push.kind());
        if let Push::Status(status) = push {
            assert_eq!(status.is_streaming, Some(true));
        }
    }
    kinds.sort_unstable();
    assert_eq!(kinds, vec!["remote", "status"]);
    link.shutdown();
}

#[tokio::test]
async fn keepalive_is_sent_while_ready() {
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let url = spawn_relay(move |mut ws| async move {
        handshake(&mut ws, true).await;
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Text(text) = message {
                if text.as_str() == r#"{"keepalive":null}"# {
                    let _ = seen_tx.send(());
                }
            }
        }
    })
    .await;

    let mut config = link_config(url);
    config.keepalive_interval = Duration::from_millis(50);
    let link = RemoteLink::new(config);
    link.connect().await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), seen_rx.recv())
        .await
        .unwrap()
        .unwrap();
    link.shutdown();
}
