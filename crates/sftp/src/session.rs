//! SSH session establishment and authentication.

use std::net::TcpStream;

use ssh2::Session;
use tracing::debug;

use crate::SftpError;
use crate::config::{AuthMethod, SftpConfig};

/// Connects and authenticates one SSH session.
///
/// Auth methods are tried in the order given by the config; failures are
/// collected so the final error names everything that was attempted.
pub(crate) fn connect(config: &SftpConfig) -> Result<Session, SftpError> {
    let tcp = TcpStream::connect(config.addr())?;
    let mut session = Session::new()?;
    session.set_tcp_stream(tcp);
    session.handshake()?;

    let mut tried = Vec::new();
    for method in &config.auth {
        match method {
            AuthMethod::Agent => {
                if let Err(e) = session.userauth_agent(&config.username) {
                    tried.push(format!("agent: {e}"));
                }
            }
            AuthMethod::KeyFile { path, passphrase } => {
                if let Err(e) = session.userauth_pubkey_file(
                    &config.username,
                    None,
                    path,
                    passphrase.as_deref(),
                ) {
                    tried.push(format!("key {}: {e}", path.display()));
                }
            }
            AuthMethod::Password(password) => {
                if let Err(e) = session.userauth_password(&config.username, password) {
                    tried.push(format!("password: {e}"));
                }
            }
        }
        if session.authenticated() {
            debug!(host = %config.host, user = %config.username, "ssh session authenticated");
            return Ok(session);
        }
    }

    Err(SftpError::Auth {
        user: config.username.clone(),
        host: config.host.clone(),
        tried: if tried.is_empty() {
            "no auth methods configured".into()
        } else {
            tried.join("; ")
        },
    })
}
