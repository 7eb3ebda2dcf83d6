//! Command-line entry point for verified SFTP tree transfer.

mod cli;

use std::sync::Arc;

use clap::Parser;
use oxfer_engine::{TransferEvent, TransferRequest, TransferStatus, TreeOrchestrator};
use oxfer_sftp::SftpStore;
use oxfer_store::{MemoryStore, RemoteFileStore};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    run(args).await
}

async fn run(args: cli::Args) -> anyhow::Result<()> {
    let store: Arc<dyn RemoteFileStore> = if args.dry_run {
        info!("dry run: transferring into an in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        let config = args.sftp_config()?;
        let channels = args.parallel as usize;
        info!(host = %config.host, port = config.port, "connecting");
        let store =
            tokio::task::spawn_blocking(move || SftpStore::connect(&config, channels))
                .await??;
        Arc::new(store)
    };

    let mut orchestrator = TreeOrchestrator::new(store);
    let events = orchestrator
        .take_events()
        .map(|rx| tokio::spawn(log_events(rx)));

    let report = orchestrator
        .run(TransferRequest {
            source_root: args.source.clone(),
            dest_root: args.dest.clone(),
            max_parallel: args.parallel as usize,
            max_retries: args.retries,
        })
        .await?;

    // Closing the orchestrator's event sender lets the logger drain out.
    drop(orchestrator);
    if let Some(handle) = events {
        let _ = handle.await;
    }

    let ok = report.outcomes.iter().filter(|o| o.is_success()).count();
    info!(
        files = report.outcomes.len(),
        ok,
        bytes = report.bytes_transferred,
        "transfer finished"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for outcome in report.outcomes.iter().filter(|o| !o.is_success()) {
            warn!(
                local = %outcome.local_path.display(),
                remote = %outcome.remote_path,
                attempts = outcome.attempts,
                status = ?outcome.status,
                "file failed"
            );
        }
    }

    if report.failed {
        let failures = report.outcomes.len() - ok;
        anyhow::bail!("{failures} of {} files failed verification or transfer", report.outcomes.len());
    }
    Ok(())
}

async fn log_events(mut events: tokio::sync::mpsc::Receiver<TransferEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            TransferEvent::DirCreated { remote } => {
                debug!(remote = %remote, "directory created");
            }
            TransferEvent::FileStarted { local, remote } => {
                debug!(local = %local.display(), remote = %remote, "transfer started");
            }
            TransferEvent::Retried { local, attempt } => {
                warn!(local = %local.display(), attempt, "checksum mismatch, retrying");
            }
            TransferEvent::FileDone { outcome } => match outcome.status {
                TransferStatus::Success => {
                    info!(
                        local = %outcome.local_path.display(),
                        remote = %outcome.remote_path,
                        attempts = outcome.attempts,
                        "verified"
                    );
                }
                TransferStatus::ChecksumExhausted => {
                    warn!(
                        local = %outcome.local_path.display(),
                        remote = %outcome.remote_path,
                        attempts = outcome.attempts,
                        "checksum retries exhausted; remote copy left for inspection"
                    );
                }
                TransferStatus::IoError { ref message } => {
                    warn!(local = %outcome.local_path.display(), error = %message, "transfer error");
                }
            },
        }
    }
}
