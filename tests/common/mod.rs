//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use tokio::sync::mpsc;
use tower::ServiceExt;

use chat_hub::config::{
    CorsSettings, HubSettings, JwtSettings, ServerSettings, Settings, WebSocketSettings,
};
use chat_hub::presentation::http::routes::create_router;
use chat_hub::presentation::middleware::issue_token;
use chat_hub::presentation::websocket::HubHandle;
use chat_hub::startup::AppState;

pub const TEST_JWT_SECRET: &str = "integration-test-secret-at-least-32-chars";

/// Settings suitable for tests: loopback, ephemeral port, default hub sizing.
pub fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        jwt: JwtSettings {
            secret: TEST_JWT_SECRET.into(),
        },
        hub: HubSettings::default(),
        cors: CorsSettings {
            allowed_origins: vec![],
        },
        websocket: WebSocketSettings::default(),
        environment: "test".into(),
    }
}

/// Signed token for `user_id`, valid for an hour.
pub fn token_for(user_id: i64) -> String {
    issue_token(user_id, TEST_JWT_SECRET, 3600).unwrap()
}

/// Test application: the real router over a fresh hub and store.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

/// Decoded test response
pub struct TestResponse {
    pub status: StatusCode,
    pub body: serde_json::Value,
}

impl TestApp {
    pub async fn new() -> Self {
        let state = AppState::new(test_settings());
        let router = create_router(state.clone());
        Self { router, state }
    }

    /// An app whose hub handle points at a mailbox nobody drains.
    pub async fn with_stopped_hub() -> Self {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let mut state = AppState::new(test_settings());
        state.hub = HubHandle::new(tx, 256);
        let router = create_router(state.clone());
        Self { router, state }
    }

    /// Serve the router on an ephemeral loopback port.
    pub async fn spawn_server(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into()))
        };

        TestResponse { status, body }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request("GET", uri, None, None).await
    }

    pub async fn get_auth(&self, uri: &str, token: &str) -> TestResponse {
        self.request("GET", uri, Some(token), None).await
    }

    pub async fn post_json_auth(
        &self,
        uri: &str,
        body: serde_json::Value,
        token: &str,
    ) -> TestResponse {
        self.request("POST", uri, Some(token), Some(body)).await
    }

    /// Open the private chat between two users and return its ID.
    pub async fn private_chat(&self, user_a: i64, user_b: i64) -> i64 {
        let response = self
            .post_json_auth(
                "/api/v1/chats",
                serde_json::json!({ "recipient_id": user_b }),
                &token_for(user_a),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
        response.body["chat"]["id"].as_i64().unwrap()
    }
}
