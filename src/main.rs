//! livecast server binary
//!
//! Configured entirely from the environment (`PORT`, `HOSTNAME`,
//! `SESSION_TTL_MS`, `RECORDINGS_DIR`, `MAX_LISTENERS_PER_SESSION`).
//! Exits 0 after a graceful shutdown, non-zero when the bind fails.

use livecast::{RelayServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("livecast=info")),
        )
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(
        port = config.port,
        hostname = %config.hostname,
        recordings = %config.recordings_dir.display(),
        max_listeners = config.max_listeners,
        ttl_ms = config.session_ttl.as_millis() as u64,
        "starting livecast"
    );

    let server = RelayServer::new(config).await?;
    server.run_until(shutdown_signal()).await?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
