//! The per-broadcast session aggregate

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::protocol::ServerMessage;
use crate::registry::AdmissionError;
use crate::relay::{RelayFrame, RelayHub};
use crate::stats::SessionStats;

/// Control-message channel into a peer's socket task
pub type ControlSender = mpsc::UnboundedSender<ServerMessage>;

/// Everything a freshly admitted listener needs
///
/// The welcome messages and init-segment snapshot are computed atomically
/// with the fan-out subscription, so the socket task can send them before
/// draining live frames without reordering.
#[derive(Debug)]
pub struct ListenerAttachment {
    /// Id for the later `detach_listener` call
    pub id: u64,
    /// `ok`, plus `broadcast-started` when a broadcaster is attached
    pub welcome: Vec<ServerMessage>,
    /// Cached init segment, present once the first chunk arrived
    pub init_segment: Option<Bytes>,
    /// Live frame subscription
    pub frames: broadcast::Receiver<RelayFrame>,
}

struct SessionState {
    broadcaster: Option<ControlSender>,
    listeners: HashMap<u64, ControlSender>,
    next_listener_id: u64,
    expiry_task: Option<JoinHandle<()>>,
}

/// One live broadcast: identity, membership, relay hub, recording
pub struct Session {
    id: String,
    token: String,
    created_at_ms: u64,
    expires_at_ms: u64,
    max_listeners: usize,
    hub: Arc<RelayHub>,
    state: Mutex<SessionState>,
    active: AtomicBool,
    torn_down: AtomicBool,
}

impl Session {
    /// Create an active session with an empty broadcaster slot
    pub fn new(
        id: String,
        token: String,
        created_at_ms: u64,
        ttl_ms: u64,
        max_listeners: usize,
        hub: Arc<RelayHub>,
    ) -> Self {
        Self {
            id,
            token,
            created_at_ms,
            expires_at_ms: created_at_ms.saturating_add(ttl_ms),
            max_listeners,
            hub,
            state: Mutex::new(SessionState {
                broadcaster: None,
                listeners: HashMap::new(),
                next_listener_id: 1,
                expiry_task: None,
            }),
            active: AtomicBool::new(true),
            torn_down: AtomicBool::new(false),
        }
    }

    /// Public session identifier (8 hex chars)
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Listener admission secret (32 hex chars)
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Creation instant, unix epoch milliseconds
    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    /// Expiry instant, unix epoch milliseconds
    pub fn expires_at_ms(&self) -> u64 {
        self.expires_at_ms
    }

    /// Whether the session still admits peers and forwards chunks
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Basename of this session's recording file
    pub fn recording_file_name(&self) -> String {
        self.hub.recording_file_name()
    }

    /// Number of currently attached listeners
    pub async fn listener_count(&self) -> usize {
        self.state.lock().await.listeners.len()
    }

    /// Snapshot of the session's relay counters
    pub async fn stats(&self) -> SessionStats {
        self.hub.stats().await
    }

    /// Occupy the broadcaster slot
    ///
    /// Fails with [`AdmissionError::BroadcasterAlreadyPresent`] when taken
    /// and [`AdmissionError::SessionNotLive`] once teardown has begun. On
    /// success every attached listener is told `broadcast-started` and the
    /// broadcaster receives the current `listener-count`.
    pub async fn attach_broadcaster(&self, ctl: ControlSender) -> Result<(), AdmissionError> {
        let mut state = self.state.lock().await;

        if !self.is_active() {
            return Err(AdmissionError::SessionNotLive);
        }
        if state.broadcaster.is_some() {
            return Err(AdmissionError::BroadcasterAlreadyPresent);
        }

        state.broadcaster = Some(ctl.clone());
        self.hub.set_broadcaster_ctl(Some(ctl.clone())).await;

        let _ = ctl.send(ServerMessage::ListenerCount {
            count: state.listeners.len(),
        });
        for listener in state.listeners.values() {
            let _ = listener.send(ServerMessage::BroadcastStarted);
        }

        tracing::info!(
            session = %self.id,
            listeners = state.listeners.len(),
            "broadcaster attached"
        );
        Ok(())
    }

    /// Admit a listener
    ///
    /// Fails with [`AdmissionError::SessionNotLive`] or
    /// [`AdmissionError::CapacityExceeded`].
    pub async fn attach_listener(
        &self,
        ctl: ControlSender,
    ) -> Result<ListenerAttachment, AdmissionError> {
        let mut state = self.state.lock().await;

        if !self.is_active() {
            return Err(AdmissionError::SessionNotLive);
        }
        if state.listeners.len() >= self.max_listeners {
            return Err(AdmissionError::CapacityExceeded);
        }

        let id = state.next_listener_id;
        state.next_listener_id += 1;
        state.listeners.insert(id, ctl);

        let count = state.listeners.len();
        self.hub.note_listeners(count).await;
        if let Some(broadcaster) = &state.broadcaster {
            let _ = broadcaster.send(ServerMessage::ListenerCount { count });
        }

        let mut welcome = vec![ServerMessage::Ok {
            session_id: self.id.clone(),
        }];
        if state.broadcaster.is_some() {
            welcome.push(ServerMessage::BroadcastStarted);
        }

        let (init_segment, frames) = self.hub.subscribe().await;

        tracing::debug!(session = %self.id, listener = id, count, "listener attached");
        Ok(ListenerAttachment {
            id,
            welcome,
            init_segment,
            frames,
        })
    }

    /// Remove a listener; the broadcaster gets an updated `listener-count`
    pub async fn detach_listener(&self, id: u64) {
        let mut state = self.state.lock().await;

        if state.listeners.remove(&id).is_some() {
            let count = state.listeners.len();
            if let Some(broadcaster) = &state.broadcaster {
                let _ = broadcaster.send(ServerMessage::ListenerCount { count });
            }
            tracing::debug!(session = %self.id, listener = id, count, "listener detached");
        }
    }

    /// Route one binary chunk from the broadcaster; no-op once teardown began
    pub async fn forward(&self, chunk: Bytes) {
        if !self.is_active() {
            return;
        }
        self.hub.ingest(chunk).await;
    }

    /// Register the expiry timer task so teardown can cancel it
    pub async fn set_expiry_task(&self, task: JoinHandle<()>) {
        self.state.lock().await.expiry_task = Some(task);
    }

    /// Detach the expiry timer task without aborting it
    ///
    /// The expiry task itself calls this before triggering teardown, so the
    /// teardown it causes never aborts the task it is running on.
    pub async fn take_expiry_task(&self) -> Option<JoinHandle<()>> {
        self.state.lock().await.expiry_task.take()
    }

    pub(crate) fn hub(&self) -> &Arc<RelayHub> {
        &self.hub
    }

    /// Flip the single-shot teardown guard; `true` when already torn down
    pub(super) fn begin_teardown(&self) -> bool {
        self.torn_down.swap(true, Ordering::AcqRel)
    }

    /// Deactivate and strip all membership state for teardown
    pub(super) async fn strip_peers(
        &self,
    ) -> (
        Option<ControlSender>,
        HashMap<u64, ControlSender>,
        Option<JoinHandle<()>>,
    ) {
        let mut state = self.state.lock().await;
        self.active.store(false, Ordering::Release);
        (
            state.broadcaster.take(),
            std::mem::take(&mut state.listeners),
            state.expiry_task.take(),
        )
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use crate::recording::RecordingSink;
    use crate::session::TeardownReason;

    use super::*;

    async fn test_session(max_listeners: usize) -> (Arc<Session>, std::path::PathBuf) {
        use rand::RngCore;
        let mut suffix = [0u8; 4];
        rand::rngs::OsRng.fill_bytes(&mut suffix);

        let path = std::env::temp_dir().join(format!(
            "livecast-session-{}-{}.webm",
            std::process::id(),
            hex::encode(suffix)
        ));
        let _ = tokio::fs::remove_file(&path).await;

        let sink = RecordingSink::open(&path, 1024 * 1024, 1024).await.unwrap();
        let hub = Arc::new(RelayHub::new(8, sink));
        let session = Arc::new(Session::new(
            "a1b2c3d4".into(),
            "f".repeat(32),
            1_000,
            900_000,
            max_listeners,
            hub,
        ));
        (session, path)
    }

    fn ctl() -> (ControlSender, mpsc::UnboundedReceiver<ServerMessage>) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn test_single_broadcaster_slot() {
        let (session, path) = test_session(10).await;
        let (tx1, _rx1) = ctl();
        let (tx2, _rx2) = ctl();

        session.attach_broadcaster(tx1).await.unwrap();
        let err = session.attach_broadcaster(tx2).await.unwrap_err();
        assert_eq!(err, AdmissionError::BroadcasterAlreadyPresent);

        session.teardown(TeardownReason::Shutdown).await;
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_listener_capacity_enforced() {
        let (session, path) = test_session(2).await;

        let (tx1, _rx1) = ctl();
        let (tx2, _rx2) = ctl();
        let (tx3, _rx3) = ctl();
        session.attach_listener(tx1).await.unwrap();
        session.attach_listener(tx2).await.unwrap();

        let err = session.attach_listener(tx3).await.unwrap_err();
        assert_eq!(err, AdmissionError::CapacityExceeded);
        assert_eq!(session.listener_count().await, 2);

        // Detaching frees a slot
        session.detach_listener(1).await;
        let (tx4, _rx4) = ctl();
        assert!(session.attach_listener(tx4).await.is_ok());

        session.teardown(TeardownReason::Shutdown).await;
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_welcome_reflects_broadcaster_presence() {
        let (session, path) = test_session(10).await;

        let (tx1, _rx1) = ctl();
        let att = session.attach_listener(tx1).await.unwrap();
        assert_eq!(
            att.welcome,
            vec![ServerMessage::Ok {
                session_id: "a1b2c3d4".into()
            }]
        );

        let (btx, _brx) = ctl();
        session.attach_broadcaster(btx).await.unwrap();

        let (tx2, _rx2) = ctl();
        let att = session.attach_listener(tx2).await.unwrap();
        assert_eq!(att.welcome.len(), 2);
        assert_eq!(att.welcome[1], ServerMessage::BroadcastStarted);

        session.teardown(TeardownReason::Shutdown).await;
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_existing_listeners_learn_of_broadcaster() {
        let (session, path) = test_session(10).await;

        let (ltx, mut lrx) = ctl();
        session.attach_listener(ltx).await.unwrap();

        let (btx, mut brx) = ctl();
        session.attach_broadcaster(btx).await.unwrap();

        assert_eq!(lrx.recv().await, Some(ServerMessage::BroadcastStarted));
        assert_eq!(brx.recv().await, Some(ServerMessage::ListenerCount { count: 1 }));

        session.teardown(TeardownReason::Shutdown).await;
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_broadcaster_sees_listener_count_changes() {
        let (session, path) = test_session(10).await;
        let (btx, mut brx) = ctl();
        session.attach_broadcaster(btx).await.unwrap();
        assert_eq!(brx.recv().await, Some(ServerMessage::ListenerCount { count: 0 }));

        let (ltx, _lrx) = ctl();
        let att = session.attach_listener(ltx).await.unwrap();
        assert_eq!(brx.recv().await, Some(ServerMessage::ListenerCount { count: 1 }));

        session.detach_listener(att.id).await;
        assert_eq!(brx.recv().await, Some(ServerMessage::ListenerCount { count: 0 }));

        session.teardown(TeardownReason::Shutdown).await;
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_teardown_notifies_listeners_once() {
        let (session, path) = test_session(10).await;
        let (ltx, mut lrx) = ctl();
        session.attach_listener(ltx).await.unwrap();

        session.teardown(TeardownReason::StoppedByBroadcaster).await;
        session.teardown(TeardownReason::Expired).await;

        assert_eq!(
            lrx.recv().await,
            Some(ServerMessage::SessionEnded {
                reason: TeardownReason::StoppedByBroadcaster
            })
        );
        // Channel closed right after the final message; no duplicates
        assert_eq!(lrx.recv().await, None);

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_no_admission_after_teardown() {
        let (session, path) = test_session(10).await;
        session.teardown(TeardownReason::Expired).await;

        let (btx, _brx) = ctl();
        assert_eq!(
            session.attach_broadcaster(btx).await.unwrap_err(),
            AdmissionError::SessionNotLive
        );
        let (ltx, _lrx) = ctl();
        assert_eq!(
            session.attach_listener(ltx).await.unwrap_err(),
            AdmissionError::SessionNotLive
        );

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_forward_stops_after_teardown() {
        let (session, path) = test_session(10).await;

        session.forward(Bytes::from_static(b"before")).await;
        session.teardown(TeardownReason::Shutdown).await;
        session.forward(Bytes::from_static(b"after")).await;

        let contents = tokio::fs::read(&path).await.unwrap();
        assert_eq!(contents, b"before");
        assert_eq!(session.stats().await.chunks_received, 1);

        let _ = tokio::fs::remove_file(&path).await;
    }
}
