//! Remote file store abstraction.
//!
//! The transfer engine talks to the destination server exclusively through
//! [`RemoteFileStore`]. Using a trait keeps the engine decoupled from the
//! transport and testable with in-memory stores.

use std::io::{Read, Write};

mod memory;

pub use memory::MemoryStore;

/// Errors produced by a remote file store.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    Denied(String),

    #[error("store error: {0}")]
    Store(String),
}

/// Metadata for one remote path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteStat {
    /// Size in bytes (0 for directories).
    pub size: u64,
    pub is_dir: bool,
}

/// A file store on the destination server.
///
/// Implementations must support concurrent use from multiple workers
/// without external synchronization; a transport that cannot multiplex a
/// single connection should hold several independent sessions internally.
pub trait RemoteFileStore: Send + Sync {
    /// Opens an existing remote file for reading.
    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>, RemoteError>;

    /// Creates (or truncates) a remote file for writing.
    ///
    /// The parent directory must already exist.
    fn create(&self, path: &str) -> Result<Box<dyn Write + Send>, RemoteError>;

    /// Creates a directory and any missing parents. Idempotent: succeeds
    /// when the directory already exists.
    fn mkdir_all(&self, path: &str) -> Result<(), RemoteError>;

    /// Stats a remote path.
    fn stat(&self, path: &str) -> Result<RemoteStat, RemoteError>;
}
