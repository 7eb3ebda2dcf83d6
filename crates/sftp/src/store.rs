//! `RemoteFileStore` over a pool of SFTP channels.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use oxfer_store::{RemoteError, RemoteFileStore, RemoteStat};
use ssh2::ErrorCode;
use tracing::{debug, info};

use crate::config::SftpConfig;
use crate::{SftpError, session};

// libssh2 SFTP status codes we care about.
const LIBSSH2_FX_NO_SUCH_FILE: i32 = 2;
const LIBSSH2_FX_PERMISSION_DENIED: i32 = 3;

/// SFTP-backed [`RemoteFileStore`].
///
/// libssh2 serializes operations on one session, so a single session
/// would make concurrent workers take turns. The store therefore
/// authenticates several independent sessions and hands them out
/// round-robin; the engine treats them as equivalent instances of the
/// same capability. Each channel sits behind a mutex that scopes the
/// metadata calls; file handles returned by `open`/`create` own their
/// session reference and are used outside the lock.
pub struct SftpStore {
    channels: Vec<Mutex<ssh2::Sftp>>,
    next: AtomicUsize,
}

impl SftpStore {
    /// Connects `channels` independent sessions to the endpoint.
    ///
    /// Blocking; call off the async runtime. Values below 1 are treated
    /// as 1.
    pub fn connect(config: &SftpConfig, channels: usize) -> Result<Self, SftpError> {
        let count = channels.max(1);
        let mut pool = Vec::with_capacity(count);
        for _ in 0..count {
            let sess = session::connect(config)?;
            pool.push(Mutex::new(sess.sftp()?));
        }
        info!(host = %config.host, channels = count, "sftp store connected");
        Ok(Self {
            channels: pool,
            next: AtomicUsize::new(0),
        })
    }

    fn channel(&self) -> MutexGuard<'_, ssh2::Sftp> {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.channels.len();
        self.channels[i].lock().unwrap()
    }
}

impl RemoteFileStore for SftpStore {
    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>, RemoteError> {
        let file = self
            .channel()
            .open(Path::new(path))
            .map_err(|e| remote_err(e, path))?;
        Ok(Box::new(file))
    }

    fn create(&self, path: &str) -> Result<Box<dyn Write + Send>, RemoteError> {
        let file = self
            .channel()
            .create(Path::new(path))
            .map_err(|e| remote_err(e, path))?;
        Ok(Box::new(file))
    }

    fn mkdir_all(&self, path: &str) -> Result<(), RemoteError> {
        let sftp = self.channel();
        for prefix in ancestor_paths(path) {
            if sftp.stat(Path::new(&prefix)).is_ok() {
                continue;
            }
            match sftp.mkdir(Path::new(&prefix), 0o755) {
                Ok(()) => debug!(remote = %prefix, "created remote directory"),
                // Lost a race with another creator, or stat was refused
                // while the directory exists: re-stat decides.
                Err(e) => {
                    if sftp.stat(Path::new(&prefix)).is_err() {
                        return Err(remote_err(e, &prefix));
                    }
                }
            }
        }
        Ok(())
    }

    fn stat(&self, path: &str) -> Result<RemoteStat, RemoteError> {
        let stat = self
            .channel()
            .stat(Path::new(path))
            .map_err(|e| remote_err(e, path))?;
        Ok(RemoteStat {
            size: stat.size.unwrap_or(0),
            is_dir: stat.is_dir(),
        })
    }
}

/// Maps an ssh2 error onto the store error taxonomy.
fn remote_err(e: ssh2::Error, path: &str) -> RemoteError {
    match e.code() {
        ErrorCode::SFTP(LIBSSH2_FX_NO_SUCH_FILE) => RemoteError::NotFound(path.to_string()),
        ErrorCode::SFTP(LIBSSH2_FX_PERMISSION_DENIED) => {
            RemoteError::Denied(path.to_string())
        }
        _ => RemoteError::Store(format!("'{path}': {e}")),
    }
}

/// Every ancestor prefix of `path`, outermost first, `path` included:
/// `/a/b/c` yields `/a`, `/a/b`, `/a/b/c`.
fn ancestor_paths(path: &str) -> Vec<String> {
    let absolute = path.starts_with('/');
    let mut acc = String::new();
    let mut out = Vec::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        if acc.is_empty() {
            if absolute {
                acc.push('/');
            }
        } else {
            acc.push('/');
        }
        acc.push_str(part);
        out.push(acc.clone());
    }
    out
}
