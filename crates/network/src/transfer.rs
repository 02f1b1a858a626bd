//! Platform download backend contract and the HTTP implementation
//!
//! Backends run transfers off the control task and report back through the
//! coordinator's event channel; they never touch library state.

use crate::client::Client;
use crate::error::NetworkError;
use crate::job::JobId;
use futures::StreamExt;
use log::{debug, warn};
use narrivo_core::DownloadError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// What to fetch and where to put it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub job_id: JobId,
    pub url: String,
    pub destination: PathBuf,
}

/// Backend-assigned handle for a running transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferHandle(pub u64);

/// Report from a backend about one transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    Progress {
        job_id: JobId,
        bytes_done: u64,
        bytes_total: Option<u64>,
    },
    Completed {
        job_id: JobId,
        path: PathBuf,
        bytes: u64,
    },
    Failed {
        job_id: JobId,
        error: DownloadError,
    },
}

impl TransferEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            TransferEvent::Progress { job_id, .. }
            | TransferEvent::Completed { job_id, .. }
            | TransferEvent::Failed { job_id, .. } => *job_id,
        }
    }
}

pub type TransferSender = mpsc::UnboundedSender<TransferEvent>;

/// Platform download backend
pub trait TransferBackend: Send + Sync {
    /// Starts fetching `request.url` into `request.destination`
    fn start_transfer(
        &self,
        request: TransferRequest,
        events: TransferSender,
    ) -> Result<TransferHandle, DownloadError>;

    /// Stops a transfer; no further events are sent for it
    fn cancel(&self, handle: TransferHandle);

    /// Removes partially written data for `destination`
    fn discard_partial(&self, destination: &Path);
}

/// Path a transfer writes to before it completes
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

/// Streams downloads with reqwest on the tokio runtime
///
/// Data goes to `<destination>.part` and is renamed into place once the
/// body is complete. Cancelling signals the task, which stops at its next
/// chunk and removes its own partial file; a new transfer to the same
/// destination waits for that cleanup before touching the file.
pub struct HttpTransfer {
    client: Client,
    next_handle: AtomicU64,
    tasks: Mutex<HashMap<u64, RunningTransfer>>,
    /// Cancelled tasks still cleaning up, by destination
    draining: Mutex<HashMap<PathBuf, JoinHandle<()>>>,
}

struct RunningTransfer {
    destination: PathBuf,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

enum RunOutcome {
    Completed(u64),
    Cancelled,
}

/// Resolves once cancellation is requested or the backend is gone
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|cancelled| *cancelled).await;
}

impl HttpTransfer {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            next_handle: AtomicU64::new(1),
            tasks: Mutex::new(HashMap::new()),
            draining: Mutex::new(HashMap::new()),
        }
    }

    async fn run(
        client: &Client,
        request: &TransferRequest,
        events: &TransferSender,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<RunOutcome, NetworkError> {
        let response = tokio::select! {
            _ = cancelled(cancel) => return Ok(RunOutcome::Cancelled),
            response = client.get(&request.url) => response?,
        };
        let total = response.content_length();

        if let Some(parent) = request.destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let part = partial_path(&request.destination);
        let mut file = File::create(&part).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;

        loop {
            // File operations are never raced against cancellation, only
            // the wait for the next chunk
            let next = tokio::select! {
                _ = cancelled(cancel) => {
                    drop(file);
                    remove_partial(&part).await;
                    return Ok(RunOutcome::Cancelled);
                }
                next = stream.next() => next,
            };
            let Some(chunk_result) = next else {
                break;
            };
            let chunk = chunk_result?;
            if chunk.is_empty() {
                continue;
            }
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            let _ = events.send(TransferEvent::Progress {
                job_id: request.job_id,
                bytes_done: downloaded,
                bytes_total: total,
            });
        }

        file.flush().await?;
        drop(file);
        if *cancel.borrow() {
            remove_partial(&part).await;
            return Ok(RunOutcome::Cancelled);
        }
        tokio::fs::rename(&part, &request.destination).await?;
        Ok(RunOutcome::Completed(downloaded))
    }
}

async fn remove_partial(part: &Path) {
    match tokio::fs::remove_file(part).await {
        Ok(()) => debug!("Removed partial download {}", part.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", part.display(), e),
    }
}

impl TransferBackend for HttpTransfer {
    fn start_transfer(
        &self,
        request: TransferRequest,
        events: TransferSender,
    ) -> Result<TransferHandle, DownloadError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| DownloadError::Network {
            message: format!("no async runtime: {}", e),
        })?;
        let lock_error = |message: String| DownloadError::Network { message };

        let mut tasks = self.tasks.lock().map_err(|e| lock_error(e.to_string()))?;
        let previous = self
            .draining
            .lock()
            .map_err(|e| lock_error(e.to_string()))?
            .remove(&request.destination);

        let handle = TransferHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let client = self.client.clone();
        let destination = request.destination.clone();
        let (cancel_tx, mut cancel_rx) = watch::channel(false);

        let task = runtime.spawn(async move {
            if let Some(previous) = previous {
                debug!("Waiting for cancelled transfer to {}", request.destination.display());
                let _ = previous.await;
            }

            debug!("Transfer {} started: {}", request.job_id, request.url);
            let event = match Self::run(&client, &request, &events, &mut cancel_rx).await {
                Ok(RunOutcome::Completed(bytes)) => TransferEvent::Completed {
                    job_id: request.job_id,
                    path: request.destination.clone(),
                    bytes,
                },
                Ok(RunOutcome::Cancelled) => {
                    debug!("Transfer {} cancelled", request.job_id);
                    return;
                }
                Err(e) => {
                    remove_partial(&partial_path(&request.destination)).await;
                    TransferEvent::Failed {
                        job_id: request.job_id,
                        error: e.to_download_error(),
                    }
                }
            };
            let _ = events.send(event);
        });

        tasks.retain(|_, running| !running.task.is_finished());
        tasks.insert(
            handle.0,
            RunningTransfer {
                destination,
                cancel: cancel_tx,
                task,
            },
        );
        Ok(handle)
    }

    fn cancel(&self, handle: TransferHandle) {
        let running = match self.tasks.lock() {
            Ok(mut tasks) => tasks.remove(&handle.0),
            Err(e) => {
                warn!("Transfer table poisoned: {}", e);
                None
            }
        };
        let Some(running) = running else {
            return;
        };

        let _ = running.cancel.send(true);
        match self.draining.lock() {
            Ok(mut draining) => {
                draining.retain(|_, task| !task.is_finished());
                draining.insert(running.destination, running.task);
            }
            Err(e) => warn!("Transfer table poisoned: {}", e),
        }
    }

    fn discard_partial(&self, destination: &Path) {
        let part = partial_path(destination);
        match std::fs::remove_file(&part) {
            Ok(()) => debug!("Removed partial download {}", part.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", part.display(), e),
        }
    }
}
