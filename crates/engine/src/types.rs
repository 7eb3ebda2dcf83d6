//! Engine data types: requests, outcomes, events.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Parameters for one transfer run. Immutable after construction.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Local file or directory to copy.
    pub source_root: PathBuf,
    /// Destination path on the remote store.
    pub dest_root: String,
    /// Maximum concurrently active file transfers (values below 1 are
    /// treated as 1).
    pub max_parallel: usize,
    /// Retries after a checksum mismatch; 0 means a single attempt.
    pub max_retries: u32,
}

/// Terminal status of one file's transfer attempt cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Local and remote digests matched.
    Success,
    /// Every attempt produced mismatching digests. The corrupt remote
    /// file is left in place for inspection.
    ChecksumExhausted,
    /// A local read or remote write failed; not retried.
    IoError { message: String },
}

/// Result of one file's full transfer-and-verify cycle.
///
/// Produced exactly once per file and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub local_path: PathBuf,
    pub remote_path: String,
    pub status: TransferStatus,
    /// Attempts used, 1-based: `max_retries + 1` on exhaustion.
    pub attempts: u32,
    /// Bytes copied on the final attempt.
    pub bytes: u64,
}

impl TransferOutcome {
    /// `true` if the file transferred and verified.
    pub fn is_success(&self) -> bool {
        matches!(self.status, TransferStatus::Success)
    }
}

/// Aggregate result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReport {
    pub outcomes: Vec<TransferOutcome>,
    /// `true` if any file did not reach success.
    pub failed: bool,
    /// Total bytes copied by successful transfers.
    pub bytes_transferred: u64,
}

/// Progress event emitted during a run.
///
/// Best-effort: events are dropped if nobody listens and never block or
/// fail a transfer.
#[derive(Debug, Clone)]
pub enum TransferEvent {
    /// A remote directory was materialized.
    DirCreated { remote: String },
    /// A file was dispatched to the worker pool.
    FileStarted { local: PathBuf, remote: String },
    /// An attempt's digests mismatched and the file will be re-sent.
    Retried { local: PathBuf, attempt: u32 },
    /// A file reached a terminal outcome.
    FileDone { outcome: TransferOutcome },
}
