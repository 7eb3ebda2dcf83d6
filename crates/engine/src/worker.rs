//! Per-file transfer worker: copy, verify, retry.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use oxfer_store::RemoteFileStore;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, warn};

use crate::CHUNK_SIZE;
use crate::checksum::{digest_file, digest_reader};
use crate::types::{TransferEvent, TransferOutcome, TransferStatus};

/// Copies one local file to `remote_path` and verifies the copy by
/// comparing independently computed digests, restarting the whole
/// attempt on mismatch up to `max_retries` times.
///
/// Each attempt holds one pool permit for its full read+write+verify
/// duration, so the concurrency bound reflects pressure on both local
/// and remote I/O. Only checksum mismatches are retried: an unreadable
/// source or a failed copy is terminal for the file, since retrying
/// would just mask a persistent problem.
pub async fn transfer(
    store: Arc<dyn RemoteFileStore>,
    pool: Arc<Semaphore>,
    local_path: PathBuf,
    remote_path: String,
    max_retries: u32,
    events: mpsc::Sender<TransferEvent>,
) -> TransferOutcome {
    // Events are best-effort: a full or unread channel never stalls a
    // transfer, so try_send throughout.
    let _ = events.try_send(TransferEvent::FileStarted {
        local: local_path.clone(),
        remote: remote_path.clone(),
    });

    let mut attempt = 0u32;
    loop {
        attempt += 1;

        let permit = match Arc::clone(&pool).acquire_owned().await {
            Ok(p) => p,
            Err(_) => {
                // Pool closed: the orchestrator is gone.
                return finish(
                    &events,
                    local_path,
                    remote_path,
                    TransferStatus::IoError {
                        message: "worker pool closed".into(),
                    },
                    attempt,
                    0,
                );
            }
        };

        let result = {
            let store = Arc::clone(&store);
            let local = local_path.clone();
            let remote = remote_path.clone();
            tokio::task::spawn_blocking(move || run_attempt(store.as_ref(), &local, &remote))
                .await
        };
        drop(permit);

        let result = match result {
            Ok(r) => r,
            Err(e) => Attempt::Fatal(format!("task join error: {e}")),
        };

        match result {
            Attempt::Verified { bytes } => {
                debug!(
                    local = %local_path.display(),
                    remote = %remote_path,
                    attempt,
                    bytes,
                    "transfer verified"
                );
                return finish(
                    &events,
                    local_path,
                    remote_path,
                    TransferStatus::Success,
                    attempt,
                    bytes,
                );
            }
            Attempt::Mismatch if attempt <= max_retries => {
                warn!(
                    local = %local_path.display(),
                    remote = %remote_path,
                    attempt,
                    "checksum mismatch, re-sending"
                );
                let _ = events.try_send(TransferEvent::Retried {
                    local: local_path.clone(),
                    attempt,
                });
            }
            Attempt::Mismatch => {
                warn!(
                    local = %local_path.display(),
                    remote = %remote_path,
                    attempts = attempt,
                    "checksum retries exhausted"
                );
                return finish(
                    &events,
                    local_path,
                    remote_path,
                    TransferStatus::ChecksumExhausted,
                    attempt,
                    0,
                );
            }
            Attempt::Fatal(message) => {
                return finish(
                    &events,
                    local_path,
                    remote_path,
                    TransferStatus::IoError { message },
                    attempt,
                    0,
                );
            }
        }
    }
}

/// Result of one attempt's blocking section.
enum Attempt {
    Verified { bytes: u64 },
    Mismatch,
    Fatal(String),
}

/// One full attempt: local digest, copy, remote digest. Blocking.
fn run_attempt(store: &dyn RemoteFileStore, local: &Path, remote: &str) -> Attempt {
    // An unreadable source is not something a retry can fix.
    let local_digest = match digest_file(local) {
        Ok(d) => d,
        Err(e) => {
            return Attempt::Fatal(format!("local read '{}' failed: {e}", local.display()));
        }
    };

    let bytes = match copy_to_remote(store, local, remote) {
        Ok(n) => n,
        Err(message) => return Attempt::Fatal(message),
    };

    let remote_digest = match store.open(remote) {
        Ok(reader) => match digest_reader(reader) {
            Ok(d) => d,
            Err(e) => return Attempt::Fatal(format!("remote read '{remote}' failed: {e}")),
        },
        Err(e) => return Attempt::Fatal(format!("remote open '{remote}' failed: {e}")),
    };

    if local_digest == remote_digest {
        Attempt::Verified { bytes }
    } else {
        Attempt::Mismatch
    }
}

fn copy_to_remote(
    store: &dyn RemoteFileStore,
    local: &Path,
    remote: &str,
) -> Result<u64, String> {
    let mut src = std::fs::File::open(local)
        .map_err(|e| format!("local open '{}' failed: {e}", local.display()))?;
    let mut dst = store
        .create(remote)
        .map_err(|e| format!("remote create '{remote}' failed: {e}"))?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = src
            .read(&mut buf)
            .map_err(|e| format!("local read '{}' failed: {e}", local.display()))?;
        if n == 0 {
            break;
        }
        dst.write_all(&buf[..n])
            .map_err(|e| format!("remote write '{remote}' failed: {e}"))?;
        total += n as u64;
    }
    dst.flush()
        .map_err(|e| format!("remote flush '{remote}' failed: {e}"))?;
    Ok(total)
}

fn finish(
    events: &mpsc::Sender<TransferEvent>,
    local_path: PathBuf,
    remote_path: String,
    status: TransferStatus,
    attempts: u32,
    bytes: u64,
) -> TransferOutcome {
    let outcome = TransferOutcome {
        local_path,
        remote_path,
        status,
        attempts,
        bytes,
    };
    let _ = events.try_send(TransferEvent::FileDone {
        outcome: outcome.clone(),
    });
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxfer_store::{MemoryStore, RemoteError, RemoteStat};
    use tempfile::TempDir;

    fn pool(n: usize) -> Arc<Semaphore> {
        Arc::new(Semaphore::new(n))
    }

    fn events() -> (mpsc::Sender<TransferEvent>, mpsc::Receiver<TransferEvent>) {
        mpsc::channel(64)
    }

    async fn drain(mut rx: mpsc::Receiver<TransferEvent>) -> Vec<TransferEvent> {
        let mut out = Vec::new();
        while let Ok(e) = rx.try_recv() {
            out.push(e);
        }
        out
    }

    /// Store wrapper that appends a junk byte to every file written, so
    /// the remote digest never matches (even for empty files).
    struct CorruptingStore {
        inner: MemoryStore,
    }

    impl RemoteFileStore for CorruptingStore {
        fn open(&self, path: &str) -> Result<Box<dyn Read + Send>, RemoteError> {
            self.inner.open(path)
        }

        fn create(&self, path: &str) -> Result<Box<dyn Write + Send>, RemoteError> {
            let inner = self.inner.create(path)?;
            Ok(Box::new(CorruptWriter { inner: Some(inner) }))
        }

        fn mkdir_all(&self, path: &str) -> Result<(), RemoteError> {
            self.inner.mkdir_all(path)
        }

        fn stat(&self, path: &str) -> Result<RemoteStat, RemoteError> {
            self.inner.stat(path)
        }
    }

    struct CorruptWriter {
        inner: Option<Box<dyn Write + Send>>,
    }

    impl Write for CorruptWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.inner.as_mut().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.inner.as_mut().unwrap().flush()
        }
    }

    impl Drop for CorruptWriter {
        fn drop(&mut self) {
            if let Some(mut inner) = self.inner.take() {
                let _ = inner.write_all(b"\xff");
            }
        }
    }

    fn local_file(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[tokio::test]
    async fn reliable_store_succeeds_first_attempt() {
        let dir = TempDir::new().unwrap();
        let local = local_file(&dir, "a.txt", b"hello");
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = events();

        let outcome = transfer(
            Arc::clone(&store) as Arc<dyn RemoteFileStore>,
            pool(2),
            local.clone(),
            "/a.txt".into(),
            3,
            tx,
        )
        .await;

        assert_eq!(outcome.status, TransferStatus::Success);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.bytes, 5);
        assert_eq!(store.contents("/a.txt").unwrap(), b"hello");

        // No retry events on the happy path.
        let evts = drain(rx).await;
        assert!(
            !evts
                .iter()
                .any(|e| matches!(e, TransferEvent::Retried { .. }))
        );
    }

    #[tokio::test]
    async fn always_corrupting_store_exhausts_retries() {
        let dir = TempDir::new().unwrap();
        let local = local_file(&dir, "a.txt", b"payload");
        let store = Arc::new(CorruptingStore {
            inner: MemoryStore::new(),
        });
        let (tx, rx) = events();

        let outcome = transfer(store, pool(1), local, "/a.txt".into(), 2, tx).await;

        assert_eq!(outcome.status, TransferStatus::ChecksumExhausted);
        // maxRetries = 2 means exactly 3 attempts, never more, never fewer.
        assert_eq!(outcome.attempts, 3);

        let retries = drain(rx)
            .await
            .iter()
            .filter(|e| matches!(e, TransferEvent::Retried { .. }))
            .count();
        assert_eq!(retries, 2);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let dir = TempDir::new().unwrap();
        let local = local_file(&dir, "b.txt", b"");
        let store = Arc::new(CorruptingStore {
            inner: MemoryStore::new(),
        });
        let (tx, _rx) = events();

        let outcome = transfer(store, pool(1), local, "/b.txt".into(), 0, tx).await;
        assert_eq!(outcome.status, TransferStatus::ChecksumExhausted);
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn unreadable_source_is_fatal_without_retry() {
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = events();

        let outcome = transfer(
            store,
            pool(1),
            PathBuf::from("/nonexistent/source.bin"),
            "/x".into(),
            5,
            tx,
        )
        .await;

        assert!(matches!(outcome.status, TransferStatus::IoError { .. }));
        assert_eq!(outcome.attempts, 1);
        let evts = drain(rx).await;
        assert!(
            !evts
                .iter()
                .any(|e| matches!(e, TransferEvent::Retried { .. }))
        );
    }

    #[tokio::test]
    async fn remote_create_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let local = local_file(&dir, "c.txt", b"data");
        // Parent directory never materialized: MemoryStore rejects create.
        let store = Arc::new(MemoryStore::new());
        let (tx, _rx) = events();

        let outcome = transfer(store, pool(1), local, "/missing/c.txt".into(), 4, tx).await;

        match outcome.status {
            TransferStatus::IoError { ref message } => {
                assert!(message.contains("remote create"), "{message}");
            }
            other => panic!("expected IoError, got {other:?}"),
        }
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn corrupt_remote_is_left_in_place() {
        let dir = TempDir::new().unwrap();
        let local = local_file(&dir, "d.txt", b"abc");
        let inner = MemoryStore::new();
        let store = Arc::new(CorruptingStore {
            inner: inner.clone(),
        });
        let (tx, _rx) = events();

        let outcome = transfer(store, pool(1), local, "/d.txt".into(), 0, tx).await;
        assert_eq!(outcome.status, TransferStatus::ChecksumExhausted);
        // The mismatching file stays on the store for inspection.
        assert_eq!(inner.contents("/d.txt").unwrap(), b"abc\xff");
    }
}
