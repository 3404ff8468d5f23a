//! Chat API Tests
//!
//! REST endpoints and the realtime events they publish through the hub.

use std::time::Duration;

use axum::http::StatusCode;
use bytes::Bytes;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::common::{token_for, TestApp};

/// Register `user_id` directly with the hub and subscribe it to `chat_id`.
async fn subscribe(app: &TestApp, user_id: i64, chat_id: i64) -> mpsc::Receiver<Bytes> {
    let hub = &app.state.hub;
    let (handle, outbound) = hub.new_connection(user_id);
    let connection_id = handle.connection_id();
    hub.register(handle).await.unwrap();
    hub.join_room(user_id, connection_id, chat_id).await.unwrap();
    outbound
}

async fn next_event(outbound: &mut mpsc::Receiver<Bytes>) -> Value {
    let payload = tokio::time::timeout(Duration::from_secs(1), outbound.recv())
        .await
        .expect("timed out waiting for event")
        .expect("outbound queue closed");
    serde_json::from_slice(&payload).unwrap()
}

async fn assert_quiet(outbound: &mut mpsc::Receiver<Bytes>) {
    assert!(
        tokio::time::timeout(Duration::from_millis(100), outbound.recv())
            .await
            .is_err(),
        "unexpected event"
    );
}

#[tokio::test]
async fn test_chat_routes_require_auth() {
    let app = TestApp::new().await;

    let response = app.get("/api/v1/chats").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.get_auth("/api/v1/chats", "not-a-token").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_chat_is_idempotent_and_listed_for_both_users() {
    let app = TestApp::new().await;

    let first = app.private_chat(1, 2).await;
    let second = app.private_chat(2, 1).await;
    assert_eq!(first, second);

    for user in [1, 2] {
        let response = app.get_auth("/api/v1/chats", &token_for(user)).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["chats"].as_array().unwrap().len(), 1);
        assert_eq!(response.body["chats"][0]["type"], "private");
    }

    let response = app.get_auth("/api/v1/chats", &token_for(3)).await;
    assert_eq!(response.body["chats"], json!([]));
}

#[tokio::test]
async fn test_create_chat_with_self_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .post_json_auth("/api/v1/chats", json!({ "recipient_id": 1 }), &token_for(1))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_send_message_fans_out_to_other_members_only() {
    let app = TestApp::new().await;
    let chat_id = app.private_chat(1, 2).await;
    let mut sender = subscribe(&app, 1, chat_id).await;
    let mut recipient = subscribe(&app, 2, chat_id).await;

    let response = app
        .post_json_auth(
            &format!("/api/v1/chats/{}/messages", chat_id),
            json!({ "type": "text", "content": "hello" }),
            &token_for(1),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let message_id = response.body["message"]["id"].as_i64().unwrap();
    assert_eq!(response.body["message"]["status"], "sent");

    let event = next_event(&mut recipient).await;
    assert_eq!(event["type"], "new_message");
    assert_eq!(event["message"]["id"], message_id);
    assert_eq!(event["message"]["content"], "hello");

    assert_quiet(&mut sender).await;
}

#[tokio::test]
async fn test_non_member_cannot_post_or_read() {
    let app = TestApp::new().await;
    let chat_id = app.private_chat(1, 2).await;
    let uri = format!("/api/v1/chats/{}/messages", chat_id);

    let response = app
        .post_json_auth(&uri, json!({ "content": "intruder" }), &token_for(3))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app.get_auth(&uri, &token_for(3)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app.get_auth("/api/v1/chats/999/messages", &token_for(1)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app.get_auth("/api/v1/chats/abc/messages", &token_for(1)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_message_body_is_rejected() {
    let app = TestApp::new().await;
    let chat_id = app.private_chat(1, 2).await;

    let response = app
        .post_json_auth(
            &format!("/api/v1/chats/{}/messages", chat_id),
            json!({ "type": "image" }),
            &token_for(1),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_message_history_pages_oldest_first() {
    let app = TestApp::new().await;
    let chat_id = app.private_chat(1, 2).await;
    let uri = format!("/api/v1/chats/{}/messages", chat_id);

    for i in 0..3 {
        app.post_json_auth(&uri, json!({ "content": format!("m{}", i) }), &token_for(1))
            .await;
    }

    let response = app.get_auth(&uri, &token_for(2)).await;
    assert_eq!(response.status, StatusCode::OK);
    let contents: Vec<&str> = response.body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["m0", "m1", "m2"]);

    let response = app
        .get_auth(&format!("{}?limit=1&offset=1", uri), &token_for(2))
        .await;
    assert_eq!(response.body["messages"][0]["content"], "m1");
}

#[tokio::test]
async fn test_status_update_reaches_everyone_in_chat() {
    let app = TestApp::new().await;
    let chat_id = app.private_chat(1, 2).await;
    let response = app
        .post_json_auth(
            &format!("/api/v1/chats/{}/messages", chat_id),
            json!({ "content": "ping" }),
            &token_for(1),
        )
        .await;
    let message_id = response.body["message"]["id"].as_i64().unwrap();

    let mut sender = subscribe(&app, 1, chat_id).await;
    let mut reader = subscribe(&app, 2, chat_id).await;

    let response = app
        .request(
            "PUT",
            &format!("/api/v1/chats/messages/{}/status", message_id),
            Some(&token_for(2)),
            Some(json!({ "status": "read" })),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"]["status"], "read");

    let expected = json!({
        "type": "message_status",
        "message_id": message_id,
        "status": "read",
        "user_id": 2
    });
    assert_eq!(next_event(&mut sender).await, expected);
    assert_eq!(next_event(&mut reader).await, expected);
}

#[tokio::test]
async fn test_only_sender_can_delete() {
    let app = TestApp::new().await;
    let chat_id = app.private_chat(1, 2).await;
    let response = app
        .post_json_auth(
            &format!("/api/v1/chats/{}/messages", chat_id),
            json!({ "content": "oops" }),
            &token_for(1),
        )
        .await;
    let message_id = response.body["message"]["id"].as_i64().unwrap();
    let uri = format!("/api/v1/chats/messages/{}", message_id);

    let mut recipient = subscribe(&app, 2, chat_id).await;

    let response = app.request("DELETE", &uri, Some(&token_for(2)), None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app.request("DELETE", &uri, Some(&token_for(1)), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({ "success": true }));

    assert_eq!(
        next_event(&mut recipient).await,
        json!({ "type": "message_deleted", "message_id": message_id })
    );

    let response = app.request("DELETE", &uri, Some(&token_for(1)), None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
