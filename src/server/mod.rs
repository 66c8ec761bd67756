//! HTTP/WebSocket server assembly
//!
//! [`RelayServer`] binds one listener that carries both surfaces: the
//! WebSocket upgrade gate at `/` and the JSON API under `/api`. Session
//! state lives in the shared [`SessionStore`]; every socket gets its own
//! task spawned by the upgrade.

pub mod broadcaster;
pub mod gate;
pub mod http;
pub mod listener;

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::registry::SessionStore;

/// The broadcast relay server
pub struct RelayServer {
    store: Arc<SessionStore>,
}

impl RelayServer {
    /// Create a server with the given configuration
    ///
    /// Creates the recordings directory if missing.
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let store = SessionStore::new(config).await?;
        Ok(Self { store })
    }

    /// The shared session store
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Build the router carrying both the upgrade gate and the HTTP API
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(gate::upgrade))
            .route("/api/session/create", post(http::create_session))
            .route("/api/session/:id/stop", post(http::stop_session))
            .route("/api/recording/:file", get(http::download_recording))
            .route("/api/status", get(http::status))
            .with_state(Arc::clone(&self.store))
    }

    /// Run the server until the process dies
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server, tearing down every live session once `shutdown`
    /// resolves
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.store.config().bind_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;

        tracing::info!(
            %addr,
            hostname = %self.store.config().hostname,
            recordings = %self.store.config().recordings_dir.display(),
            "relay server listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        self.store.shutdown_all().await;
        Ok(())
    }
}
