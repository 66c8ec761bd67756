//! Session store implementation
//!
//! The central registry that creates, resolves, and removes live broadcast
//! sessions. Thread-safe via `RwLock`; the upgrade gate and HTTP handlers
//! share one store behind an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::RwLock;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::recording::RecordingSink;
use crate::relay::RelayHub;
use crate::session::{Session, TeardownReason};

/// Length of the public session id, in random bytes (8 hex chars)
const SESSION_ID_BYTES: usize = 4;

/// Length of the listener token, in random bytes (32 hex chars)
const SESSION_TOKEN_BYTES: usize = 16;

/// Central registry for all live sessions
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    config: ServerConfig,
}

impl SessionStore {
    /// Create a store, ensuring the recordings directory exists
    pub async fn new(config: ServerConfig) -> Result<Arc<Self>> {
        tokio::fs::create_dir_all(&config.recordings_dir).await?;

        Ok(Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }))
    }

    /// The configuration the store was built with
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Create a session: fresh id and token, open recording sink, scheduled
    /// expiry, atomic insertion
    pub async fn create(self: &Arc<Self>) -> Result<Arc<Session>> {
        let token = random_hex(SESSION_TOKEN_BYTES);
        let created_at_ms = unix_ms();

        // Id allocation and insertion happen under one write lock, so two
        // concurrent creates can never collide
        let mut sessions = self.sessions.write().await;
        let id = loop {
            let candidate = random_hex(SESSION_ID_BYTES);
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let path = self
            .config
            .recordings_dir
            .join(format!("broadcast-{}-{}.webm", id, created_at_ms));
        let sink = RecordingSink::open(
            path,
            self.config.sink_high_water,
            self.config.sink_low_water,
        )
        .await?;

        let hub = Arc::new(RelayHub::new(self.config.listener_queue_depth, sink));
        let session = Arc::new(Session::new(
            id.clone(),
            token,
            created_at_ms,
            self.config.session_ttl.as_millis() as u64,
            self.config.max_listeners,
            hub,
        ));

        sessions.insert(id.clone(), Arc::clone(&session));
        drop(sessions);

        let expiry_task = tokio::spawn({
            let store = Arc::clone(self);
            let sid = id.clone();
            let ttl = self.config.session_ttl;
            async move {
                tokio::time::sleep(ttl).await;
                if let Some(session) = store.get(&sid).await {
                    // Detach the handle first so teardown does not abort the
                    // very task running it
                    session.take_expiry_task().await;
                    store.end_session(&sid, TeardownReason::Expired).await;
                }
            }
        });
        session.set_expiry_task(expiry_task).await;

        tracing::info!(
            session = %id,
            ttl_ms = self.config.session_ttl.as_millis() as u64,
            recording = %session.recording_file_name(),
            "session created"
        );
        Ok(session)
    }

    /// Look up a live session by id
    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Remove a session from the registry; idempotent
    pub async fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let removed = self.sessions.write().await.remove(id);
        if removed.is_some() {
            tracing::debug!(session = %id, "session removed from store");
        }
        removed
    }

    /// Tear a session down and remove it
    ///
    /// Returns `false` when the id is unknown. Safe to call from any trigger
    /// concurrently; the session's single-shot guard deduplicates the work.
    pub async fn end_session(self: &Arc<Self>, id: &str, reason: TeardownReason) -> bool {
        let Some(session) = self.get(id).await else {
            return false;
        };
        session.teardown(reason).await;
        self.remove(id).await;
        true
    }

    /// Tear down every live session (process shutdown)
    pub async fn shutdown_all(self: &Arc<Self>) {
        let ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        if ids.is_empty() {
            return;
        }

        tracing::info!(sessions = ids.len(), "shutting down live sessions");
        for id in ids {
            self.end_session(&id, TeardownReason::Shutdown).await;
        }
    }

    /// Number of live sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
