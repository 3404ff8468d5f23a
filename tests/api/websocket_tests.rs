//! WebSocket End-to-End Tests
//!
//! Real server on a loopback port, real tokio-tungstenite clients.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::common::{token_for, TestApp};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(addr: SocketAddr, user_id: i64) -> Client {
    let url = format!("ws://{}/ws?token={}", addr, token_for(user_id));
    let (client, _) = connect_async(url).await.unwrap();
    client
}

async fn send_frame(client: &mut Client, frame: Value) {
    client.send(Message::Text(frame.to_string().into())).await.unwrap();
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn assert_silent(client: &mut Client) {
    assert!(
        tokio::time::timeout(Duration::from_millis(200), client.next())
            .await
            .is_err(),
        "unexpected frame"
    );
}

/// Wait until the hub has applied the preceding commands from every reader.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_relay_reaches_room_but_not_sender() {
    let app = TestApp::new().await;
    let chat_id = app.private_chat(1, 2).await;
    let addr = app.spawn_server().await;

    let mut alice = connect(addr, 1).await;
    let mut bob = connect(addr, 2).await;
    send_frame(&mut alice, json!({ "type": "join_chat", "chat_id": chat_id })).await;
    send_frame(&mut bob, json!({ "type": "join_chat", "chat_id": chat_id })).await;
    settle().await;

    let typing = json!({ "type": "typing", "chat_id": chat_id, "payload": { "is_typing": true } });
    send_frame(&mut alice, typing.clone()).await;

    assert_eq!(next_json(&mut bob).await, typing);
    assert_silent(&mut alice).await;
}

#[tokio::test]
async fn test_rest_message_is_pushed_over_websocket() {
    let app = TestApp::new().await;
    let chat_id = app.private_chat(1, 2).await;
    let addr = app.spawn_server().await;

    let mut bob = connect(addr, 2).await;
    send_frame(&mut bob, json!({ "type": "join_chat", "chat_id": chat_id })).await;
    settle().await;

    let response = app
        .post_json_auth(
            &format!("/api/v1/chats/{}/messages", chat_id),
            json!({ "content": "over the wire" }),
            &token_for(1),
        )
        .await;
    assert_eq!(response.status, axum::http::StatusCode::CREATED);

    let event = next_json(&mut bob).await;
    assert_eq!(event["type"], "new_message");
    assert_eq!(event["message"]["content"], "over the wire");
}

#[tokio::test]
async fn test_non_member_join_is_ignored() {
    let app = TestApp::new().await;
    let chat_id = app.private_chat(1, 2).await;
    let addr = app.spawn_server().await;

    let mut alice = connect(addr, 1).await;
    let mut mallory = connect(addr, 3).await;
    send_frame(&mut alice, json!({ "type": "join_chat", "chat_id": chat_id })).await;
    send_frame(&mut mallory, json!({ "type": "join_chat", "chat_id": chat_id })).await;
    send_frame(&mut mallory, json!({ "bogus": true })).await;
    settle().await;

    send_frame(&mut alice, json!({ "type": "typing", "chat_id": chat_id })).await;
    assert_silent(&mut mallory).await;

    // still connected after the rejected join and the malformed frame
    assert_eq!(app.state.hub.stats().await.unwrap().connections, 2);
}

#[tokio::test]
async fn test_header_token_is_accepted() {
    let app = TestApp::new().await;
    let addr = app.spawn_server().await;

    let mut request = format!("ws://{}/ws", addr).into_client_request().unwrap();
    request.headers_mut().insert(
        "Authorization",
        format!("Bearer {}", token_for(5)).parse().unwrap(),
    );

    let (_client, response) = connect_async(request).await.unwrap();
    assert_eq!(response.status().as_u16(), 101);
    settle().await;
    assert_eq!(app.state.hub.stats().await.unwrap().connections, 1);
}

#[tokio::test]
async fn test_upgrade_refused_when_hub_stopped() {
    let app = TestApp::with_stopped_hub().await;
    let addr = app.spawn_server().await;

    let url = format!("ws://{}/ws?token={}", addr, token_for(1));
    match connect_async(url).await {
        Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 503),
        Err(other) => panic!("expected an HTTP rejection, got {other}"),
        Ok(_) => panic!("upgrade should have been refused"),
    }
}

#[tokio::test]
async fn test_missing_or_bad_token_gets_401() {
    let app = TestApp::new().await;
    let addr = app.spawn_server().await;

    for url in [
        format!("ws://{}/ws", addr),
        format!("ws://{}/ws?token=garbage", addr),
    ] {
        match connect_async(url).await {
            Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 401),
            Err(other) => panic!("expected an HTTP rejection, got {other}"),
            Ok(_) => panic!("upgrade should have been refused"),
        }
    }
    assert_eq!(app.state.hub.stats().await.unwrap().connections, 0);
}

#[tokio::test]
async fn test_second_login_replaces_first() {
    let app = TestApp::new().await;
    let chat_id = app.private_chat(1, 2).await;
    let addr = app.spawn_server().await;

    let mut first = connect(addr, 1).await;
    settle().await;
    let mut second = connect(addr, 1).await;
    send_frame(&mut second, json!({ "type": "join_chat", "chat_id": chat_id })).await;
    settle().await;

    // the replaced socket is closed by the server
    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match first.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "replaced connection should be closed");

    let mut bob = connect(addr, 2).await;
    send_frame(&mut bob, json!({ "type": "join_chat", "chat_id": chat_id })).await;
    settle().await;
    send_frame(&mut bob, json!({ "type": "typing", "chat_id": chat_id })).await;
    assert_eq!(next_json(&mut second).await["type"], "typing");

    assert_eq!(app.state.hub.stats().await.unwrap().connections, 2);
}
