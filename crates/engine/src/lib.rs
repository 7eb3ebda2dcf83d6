//! Parallel verified tree transfer.
//!
//! Walks a local file or directory tree, mirrors the directory structure
//! on a [`RemoteFileStore`](oxfer_store::RemoteFileStore), copies each
//! file on a bounded worker pool, and verifies every copy by comparing
//! independently computed SHA-256 digests, retrying on mismatch.

mod checksum;
mod mapper;
mod orchestrator;
mod types;
mod worker;

pub use checksum::{digest_file, digest_reader};
pub use mapper::{join_remote, map_entry, remote_parent, resolve_single_file};
pub use orchestrator::{TreeOrchestrator, run_transfer};
pub use types::{
    TransferEvent, TransferOutcome, TransferReport, TransferRequest, TransferStatus,
};

/// Buffer size for copying and hashing: 64 KiB.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Errors that abort a whole transfer run.
///
/// Per-file failures are not errors at this level: they are reported as
/// terminal [`TransferOutcome`]s so sibling transfers keep going.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid path: {0}")]
    Path(String),

    #[error("remote error: {0}")]
    Remote(#[from] oxfer_store::RemoteError),

    #[error("worker task failed: {0}")]
    Join(String),
}
