//! Connection parameters for an SFTP endpoint.

use std::path::PathBuf;

/// One way of authenticating the SSH user.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Ask the running SSH agent.
    Agent,
    /// Public-key file, optionally passphrase-protected.
    KeyFile {
        path: PathBuf,
        passphrase: Option<String>,
    },
    /// Plain password.
    Password(String),
}

/// Parameters for one SFTP endpoint.
#[derive(Debug, Clone)]
pub struct SftpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Tried in order; the first method that authenticates wins.
    pub auth: Vec<AuthMethod>,
}

impl SftpConfig {
    /// `host:port` address string for the TCP connection.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_joins_host_and_port() {
        let config = SftpConfig {
            host: "backup.example.net".into(),
            port: 2022,
            username: "deploy".into(),
            auth: vec![AuthMethod::Agent],
        };
        assert_eq!(config.addr(), "backup.example.net:2022");
    }
}
