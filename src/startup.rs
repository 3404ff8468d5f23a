//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;

use crate::application::services::{ChatService, ChatServiceImpl};
use crate::config::Settings;
use crate::domain::ChatRepository;
use crate::infrastructure::repositories::InMemoryStore;
use crate::presentation::http::{handlers, routes};
use crate::presentation::websocket::{Hub, HubHandle};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub chats: Arc<dyn ChatRepository>,
    pub chat_service: Arc<dyn ChatService>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Spawn the hub and wire the in-memory store into the services.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(settings: Settings) -> Self {
        let hub = Hub::spawn(&settings.hub);
        let store = Arc::new(InMemoryStore::new());
        let chat_service = ChatServiceImpl::new(store.clone(), store.clone(), hub.clone());

        Self {
            hub,
            chats: store,
            chat_service: Arc::new(chat_service),
            settings: Arc::new(settings),
        }
    }
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        handlers::health::init_server_start();

        let addr = settings.server_addr();
        let state = AppState::new(settings);
        tracing::info!(
            mailbox_capacity = state.settings.hub.mailbox_capacity,
            outbound_capacity = state.settings.hub.outbound_capacity,
            "Hub configured"
        );

        let router = routes::create_router(state);

        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
