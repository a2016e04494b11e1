use crate::fixtures::test_app::TestApp;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn next_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("Timeout waiting for WS message")
            .expect("WS stream ended")
            .expect("WS read failed");
        if msg.is_text() {
            return serde_json::from_str(msg.to_text().unwrap()).unwrap();
        }
    }
}

/// Reads messages until one with the given `type` arrives, skipping
/// unrelated pushes (e.g. simulated transcripts in degraded mode).
async fn next_of_type(ws: &mut WsStream, message_type: &str) -> Value {
    for _ in 0..20 {
        let json = next_json(ws).await;
        if json["type"] == message_type {
            return json;
        }
    }
    panic!("no '{}' message within 20 reads", message_type);
}

#[tokio::test]
async fn connect_sends_client_id() {
    let app = TestApp::spawn().await;

    let (mut ws, _) = tokio_tungstenite::connect_async(app.ws_url())
        .await
        .expect("WS connect failed");

    let json = next_json(&mut ws).await;
    assert_eq!(json["type"], "connected");
    assert!(json["clientId"].as_u64().unwrap() >= 1);

    ws.close(None).await.ok();
}

#[tokio::test]
async fn ping_gets_pong() {
    let app = TestApp::spawn().await;

    let (mut ws, _) = tokio_tungstenite::connect_async(app.ws_url())
        .await
        .expect("WS connect failed");
    next_json(&mut ws).await; // connected

    ws.send(Message::text(r#"{"type":"ping"}"#)).await.unwrap();
    let json = next_of_type(&mut ws, "pong").await;
    assert_eq!(json["type"], "pong");

    ws.close(None).await.ok();
}

#[tokio::test]
async fn search_command_pushes_recommendations() {
    let app = TestApp::spawn().await;

    let (mut ws, _) = tokio_tungstenite::connect_async(app.ws_url())
        .await
        .expect("WS connect failed");
    next_json(&mut ws).await; // connected

    ws.send(Message::text(
        r#"{"type":"search_properties","transcript":"Cliente: busco departamento con alberca en zona sur"}"#,
    ))
    .await
    .unwrap();

    let json = next_of_type(&mut ws, "recommendations").await;
    let properties = json["properties"].as_array().unwrap();
    assert!(!properties.is_empty());
    assert_eq!(properties[0]["name"], "Torre Vista Sur");

    ws.close(None).await.ok();
}

#[tokio::test]
async fn malformed_and_unknown_messages_are_ignored() {
    let app = TestApp::spawn().await;

    let (mut ws, _) = tokio_tungstenite::connect_async(app.ws_url())
        .await
        .expect("WS connect failed");
    next_json(&mut ws).await; // connected

    ws.send(Message::text("not json at all")).await.unwrap();
    ws.send(Message::text(r#"{"type":"reboot_server"}"#))
        .await
        .unwrap();

    // the session must still be alive and responsive
    ws.send(Message::text(r#"{"type":"ping"}"#)).await.unwrap();
    let json = next_of_type(&mut ws, "pong").await;
    assert_eq!(json["type"], "pong");

    ws.close(None).await.ok();
}

#[tokio::test]
async fn audio_frames_in_degraded_mode_keep_session_alive() {
    let app = TestApp::spawn().await;

    let (mut ws, _) = tokio_tungstenite::connect_async(app.ws_url())
        .await
        .expect("WS connect failed");
    next_json(&mut ws).await; // connected

    // no Deepgram key: frames are counted and discarded
    for _ in 0..10 {
        ws.send(Message::binary(vec![0u8; 640])).await.unwrap();
    }

    ws.send(Message::text(r#"{"type":"ping"}"#)).await.unwrap();
    let json = next_of_type(&mut ws, "pong").await;
    assert_eq!(json["type"], "pong");

    ws.close(None).await.ok();
}

#[tokio::test]
async fn health_counts_live_connections() {
    let app = TestApp::spawn().await;

    let (mut ws, _) = tokio_tungstenite::connect_async(app.ws_url())
        .await
        .expect("WS connect failed");
    // the counter is incremented before "connected" is pushed
    next_json(&mut ws).await;

    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["connections"], 1);

    ws.close(None).await.ok();
}
