//! ssh2-backed implementation of the oxfer remote file store.
//!
//! Session establishment and authentication live in [`session`]; the
//! [`SftpStore`] pools several independent SFTP channels so concurrent
//! workers are not serialized on a single libssh2 session.

mod config;
mod session;
mod store;

pub use config::{AuthMethod, SftpConfig};
pub use store::SftpStore;

/// Errors raised while establishing SFTP sessions.
#[derive(Debug, thiserror::Error)]
pub enum SftpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),

    #[error("authentication failed for {user}@{host}: {tried}")]
    Auth {
        user: String,
        host: String,
        tried: String,
    },
}
