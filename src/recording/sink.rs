//! Append-only recording sink with watermark backpressure
//!
//! The sink owns a writer task holding the file descriptor. `write` enqueues
//! a chunk and reports whether the buffered byte count is still below the
//! high-water mark; the congestion watch channel flips back to `false` once
//! the writer drains below the low-water mark. Producers are expected to
//! throttle on a `false` return but may keep writing: chunks are buffered
//! regardless, never dropped while the disk is healthy.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{mpsc, oneshot, watch};

use crate::error::{Error, Result};

enum SinkCommand {
    Chunk(Bytes),
    Close(oneshot::Sender<()>),
}

/// Sequential writer of opaque byte chunks to a single append-mode file
pub struct RecordingSink {
    path: PathBuf,
    tx: mpsc::UnboundedSender<SinkCommand>,
    pending: Arc<AtomicUsize>,
    congested: Arc<watch::Sender<bool>>,
    congested_rx: watch::Receiver<bool>,
    high_water: usize,
    closed: AtomicBool,
}

impl RecordingSink {
    /// Open (creating if necessary) the file at `path` in append mode
    pub async fn open(path: impl Into<PathBuf>, high_water: usize, low_water: usize) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .await
            .map_err(|source| Error::Recording {
                path: path.clone(),
                source,
            })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (congested_tx, congested_rx) = watch::channel(false);
        let congested = Arc::new(congested_tx);
        let pending = Arc::new(AtomicUsize::new(0));

        tokio::spawn(run_writer(
            file,
            rx,
            Arc::clone(&pending),
            Arc::clone(&congested),
            low_water.min(high_water),
            path.clone(),
        ));

        Ok(Self {
            path,
            tx,
            pending,
            congested,
            congested_rx,
            high_water,
            closed: AtomicBool::new(false),
        })
    }

    /// Append a chunk
    ///
    /// Returns `true` while the buffered byte count stays below the
    /// high-water mark, `false` once the producer should throttle. The chunk
    /// is buffered either way. Writes after `close` are discarded.
    pub fn write(&self, chunk: Bytes) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return true;
        }

        let len = chunk.len();
        let buffered = self.pending.fetch_add(len, Ordering::AcqRel) + len;

        if self.tx.send(SinkCommand::Chunk(chunk)).is_err() {
            // Writer task is gone (disk failure path); relay continues
            self.pending.fetch_sub(len, Ordering::AcqRel);
            return true;
        }

        if buffered >= self.high_water {
            self.congested.send_replace(true);
            return false;
        }
        true
    }

    /// Watch the congestion flag: `true` above the high-water mark, `false`
    /// again once the writer drains below the low-water mark
    pub fn subscribe_congestion(&self) -> watch::Receiver<bool> {
        self.congested_rx.clone()
    }

    /// Flush pending chunks and release the file; idempotent
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(SinkCommand::Close(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Path of the recording file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Basename of the recording file, as exposed by the download endpoint
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Bytes queued but not yet written
    pub fn pending_bytes(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

async fn run_writer(
    file: File,
    mut rx: mpsc::UnboundedReceiver<SinkCommand>,
    pending: Arc<AtomicUsize>,
    congested: Arc<watch::Sender<bool>>,
    low_water: usize,
    path: PathBuf,
) {
    let mut writer = BufWriter::new(file);
    let mut failed = false;

    while let Some(cmd) = rx.recv().await {
        match cmd {
            SinkCommand::Chunk(chunk) => {
                if !failed {
                    if let Err(e) = writer.write_all(&chunk).await {
                        tracing::error!(
                            path = %path.display(),
                            error = %e,
                            "recording write failed; discarding subsequent chunks"
                        );
                        failed = true;
                    }
                }

                // Drain accounting runs even on the failure path so latched
                // backpressure always clears
                let remaining = pending
                    .fetch_sub(chunk.len(), Ordering::AcqRel)
                    .saturating_sub(chunk.len());
                if remaining <= low_water && *congested.borrow() {
                    congested.send_replace(false);
                }
            }
            SinkCommand::Close(done) => {
                if !failed {
                    if let Err(e) = writer.flush().await {
                        tracing::warn!(path = %path.display(), error = %e, "recording flush failed");
                    } else if let Err(e) = writer.get_ref().sync_all().await {
                        tracing::warn!(path = %path.display(), error = %e, "recording sync failed");
                    }
                }
                congested.send_replace(false);
                let _ = done.send(());
                break;
            }
        }
    }

    tracing::debug!(path = %path.display(), "recording writer finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "livecast-sink-{}-{}.webm",
            tag,
            std::process::id()
        ))
    }

    #[tokio::test]
    async fn test_write_concatenates_in_order() {
        let path = temp_path("concat");
        let _ = tokio::fs::remove_file(&path).await;

        let sink = RecordingSink::open(&path, 1024 * 1024, 1024).await.unwrap();
        assert!(sink.write(Bytes::from_static(b"hello ")));
        assert!(sink.write(Bytes::from_static(b"webm ")));
        assert!(sink.write(Bytes::from_static(b"world")));
        sink.close().await;

        let contents = tokio::fs::read(&path).await.unwrap();
        assert_eq!(contents, b"hello webm world");

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_high_water_reports_backpressure() {
        let path = temp_path("watermark");
        let _ = tokio::fs::remove_file(&path).await;

        let sink = RecordingSink::open(&path, 8, 4).await.unwrap();

        // A chunk that alone crosses the high-water mark is still buffered
        // but reports not-accepted
        assert!(!sink.write(Bytes::from(vec![0u8; 16])));

        // Drain signal fires once the writer catches up
        let mut rx = sink.subscribe_congestion();
        rx.wait_for(|congested| !congested).await.unwrap();

        // Below the mark again, writes are accepted
        assert!(sink.write(Bytes::from_static(b"ok")));
        sink.close().await;

        let contents = tokio::fs::read(&path).await.unwrap();
        assert_eq!(contents.len(), 18);

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_final() {
        let path = temp_path("close");
        let _ = tokio::fs::remove_file(&path).await;

        let sink = RecordingSink::open(&path, 1024, 512).await.unwrap();
        assert!(sink.write(Bytes::from_static(b"data")));
        sink.close().await;
        sink.close().await;

        // Writes after close are dropped
        assert!(sink.write(Bytes::from_static(b"late")));
        let contents = tokio::fs::read(&path).await.unwrap();
        assert_eq!(contents, b"data");

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_file_name_is_basename() {
        let path = temp_path("name");
        let _ = tokio::fs::remove_file(&path).await;

        let sink = RecordingSink::open(&path, 1024, 512).await.unwrap();
        assert!(sink.file_name().starts_with("livecast-sink-name-"));
        assert!(!sink.file_name().contains('/'));
        sink.close().await;

        let _ = tokio::fs::remove_file(&path).await;
    }
}
