//! Tree walk, directory materialization, and worker dispatch.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use oxfer_store::RemoteFileStore;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::EngineError;
use crate::mapper;
use crate::types::{TransferEvent, TransferOutcome, TransferReport, TransferRequest};
use crate::worker;

/// Orchestrates one verified transfer run against a remote store.
pub struct TreeOrchestrator {
    store: Arc<dyn RemoteFileStore>,
    events_tx: mpsc::Sender<TransferEvent>,
    events_rx: Option<mpsc::Receiver<TransferEvent>>,
}

impl TreeOrchestrator {
    /// Creates a new orchestrator for the given store.
    pub fn new(store: Arc<dyn RemoteFileStore>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            store,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<TransferEvent>> {
        self.events_rx.take()
    }

    /// Runs one transfer request to completion.
    ///
    /// Directories are created synchronously in walk order, so a file
    /// transfer can never race ahead of its own ancestor directories.
    /// Files are dispatched to a bounded worker pool as the walk finds
    /// them and joined after the walk finishes. A directory creation
    /// failure aborts the run (files beneath it cannot succeed);
    /// per-file failures are reported in the aggregate result instead.
    pub async fn run(&self, request: TransferRequest) -> Result<TransferReport, EngineError> {
        let pool = Arc::new(Semaphore::new(request.max_parallel.max(1)));
        let mut workers: JoinSet<TransferOutcome> = JoinSet::new();

        let meta = std::fs::metadata(&request.source_root)?;
        if meta.is_dir() {
            self.walk_tree(&request, &pool, &mut workers)?;
        } else {
            self.dispatch_single(&request, &pool, &mut workers).await?;
        }

        // Drain: every dispatched worker reaches a terminal outcome.
        let mut outcomes = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => return Err(EngineError::Join(e.to_string())),
            }
        }

        let failed = outcomes.iter().any(|o| !o.is_success());
        let bytes_transferred = outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.bytes)
            .sum();
        info!(
            files = outcomes.len(),
            failed, bytes_transferred, "transfer run complete"
        );

        Ok(TransferReport {
            outcomes,
            failed,
            bytes_transferred,
        })
    }

    /// Walks the source tree top-down, materializing each directory
    /// before dispatching anything beneath it.
    fn walk_tree(
        &self,
        request: &TransferRequest,
        pool: &Arc<Semaphore>,
        workers: &mut JoinSet<TransferOutcome>,
    ) -> Result<(), EngineError> {
        let mut queue = VecDeque::new();
        queue.push_back(request.source_root.clone());

        while let Some(dir) = queue.pop_front() {
            let remote_dir =
                mapper::map_entry(&request.source_root, &request.dest_root, &dir)?;
            self.ensure_dir(&remote_dir)?;

            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                let metadata = entry.metadata()?;
                let path = entry.path();

                if metadata.is_dir() {
                    queue.push_back(path);
                } else if metadata.is_file() {
                    let remote =
                        mapper::map_entry(&request.source_root, &request.dest_root, &path)?;
                    self.dispatch(workers, pool, path, remote, request.max_retries);
                }
            }
        }
        Ok(())
    }

    /// Single-file source: resolve the destination once, make sure its
    /// parent directory exists, dispatch one worker.
    async fn dispatch_single(
        &self,
        request: &TransferRequest,
        pool: &Arc<Semaphore>,
        workers: &mut JoinSet<TransferOutcome>,
    ) -> Result<(), EngineError> {
        let remote = {
            let store = Arc::clone(&self.store);
            let source = request.source_root.clone();
            let dest = request.dest_root.clone();
            tokio::task::spawn_blocking(move || {
                mapper::resolve_single_file(store.as_ref(), &source, &dest)
            })
            .await
            .map_err(|e| EngineError::Join(e.to_string()))??
        };

        if let Some(parent) = mapper::remote_parent(&remote) {
            self.ensure_dir(parent)?;
        }
        self.dispatch(
            workers,
            pool,
            request.source_root.clone(),
            remote,
            request.max_retries,
        );
        Ok(())
    }

    /// Materializes one remote directory. Any failure is fatal to the run.
    fn ensure_dir(&self, remote: &str) -> Result<(), EngineError> {
        self.store.mkdir_all(remote)?;
        debug!(remote, "remote directory ready");
        let _ = self.events_tx.try_send(TransferEvent::DirCreated {
            remote: remote.to_string(),
        });
        Ok(())
    }

    fn dispatch(
        &self,
        workers: &mut JoinSet<TransferOutcome>,
        pool: &Arc<Semaphore>,
        local: PathBuf,
        remote: String,
        max_retries: u32,
    ) {
        workers.spawn(worker::transfer(
            Arc::clone(&self.store),
            Arc::clone(pool),
            local,
            remote,
            max_retries,
            self.events_tx.clone(),
        ));
    }
}

/// Convenience wrapper: runs one transfer without subscribing to events.
pub async fn run_transfer(
    store: Arc<dyn RemoteFileStore>,
    source_root: impl Into<PathBuf>,
    dest_root: impl Into<String>,
    max_parallel: usize,
    max_retries: u32,
) -> Result<TransferReport, EngineError> {
    let orchestrator = TreeOrchestrator::new(store);
    orchestrator
        .run(TransferRequest {
            source_root: source_root.into(),
            dest_root: dest_root.into(),
            max_parallel,
            max_retries,
        })
        .await
}
