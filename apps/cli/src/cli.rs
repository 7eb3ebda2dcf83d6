//! Argument parsing.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use oxfer_sftp::{AuthMethod, SftpConfig};

/// Copies a file or directory tree to a remote server over SFTP, with
/// concurrent per-file transfers and SHA-256 verification.
#[derive(Parser, Debug)]
#[command(name = "oxfer", version, about)]
pub struct Args {
    /// Local file or directory to copy.
    pub source: PathBuf,

    /// Destination path on the remote server.
    pub dest: String,

    /// Remote host name or address.
    #[arg(short = 'H', long, required_unless_present = "dry_run")]
    pub host: Option<String>,

    /// SSH port.
    #[arg(short = 'p', long, default_value_t = 22)]
    pub port: u16,

    /// Remote user name.
    #[arg(short, long, required_unless_present = "dry_run")]
    pub user: Option<String>,

    /// Private key file for public-key authentication.
    #[arg(short, long)]
    pub identity: Option<PathBuf>,

    /// Password; prefer setting OXFER_PASSWORD over passing this on the
    /// command line.
    #[arg(long, env = "OXFER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Maximum concurrent file transfers.
    #[arg(short = 'j', long, default_value_t = 4,
          value_parser = clap::value_parser!(u16).range(1..))]
    pub parallel: u16,

    /// Retries after a checksum mismatch.
    #[arg(short, long, default_value_t = 2)]
    pub retries: u32,

    /// Walk and "transfer" into an in-memory store instead of the
    /// network; useful to preview what a run would do.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the full transfer report as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    /// More verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Builds the SFTP endpoint config. Agent auth is always tried
    /// first; an identity file and a password extend the ladder.
    pub fn sftp_config(&self) -> anyhow::Result<SftpConfig> {
        let host = self.host.clone().context("--host is required")?;
        let username = self.user.clone().context("--user is required")?;

        let mut auth = vec![AuthMethod::Agent];
        if let Some(path) = &self.identity {
            auth.push(AuthMethod::KeyFile {
                path: path.clone(),
                passphrase: None,
            });
        }
        if let Some(password) = &self.password {
            auth.push(AuthMethod::Password(password.clone()));
        }

        Ok(SftpConfig {
            host,
            port: self.port,
            username,
            auth,
        })
    }
}
