//! Asset acquisition jobs
//!
//! `DownloadCoordinator` owns every running job and is driven from the
//! control task: backends push [`TransferEvent`]s into a channel and the
//! coordinator applies them one at a time, updating the book registry as
//! jobs finish.
//!
//! Per job:
//! - progress is forwarded only when `bytes_done` strictly increases
//! - exactly one terminal status is reported, after which the job is gone
//!   and any late event for it is dropped
//! - starting a job for an asset that already has one cancels the older
//!   job first (newest request wins)

use crate::error::{NetworkError, NetworkResult};
use crate::job::{DownloadJob, DownloadStatus, JobId};
use crate::transfer::{TransferBackend, TransferEvent, TransferHandle, TransferRequest};
use log::{debug, info, warn};
use narrivo_core::{
    AssetKind, AssetRef, AssetState, AssetUpdate, Book, BookId, Observers, SubscriptionId,
};
use narrivo_library::{BookRegistry, LibraryError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Result of asking for an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A job is running (or already finished with an error)
    Started(JobId),
    /// The asset was already local; nothing to do
    AlreadyReady,
}

struct ActiveJob {
    job: DownloadJob,
    handle: Option<TransferHandle>,
    /// The asset slot as it was before acquisition started
    previous: Option<AssetRef>,
}

pub struct DownloadCoordinator {
    backend: Arc<dyn TransferBackend>,
    download_dir: PathBuf,
    jobs: HashMap<JobId, ActiveJob>,
    by_asset: HashMap<(BookId, AssetKind), JobId>,
    events_tx: mpsc::UnboundedSender<TransferEvent>,
    events_rx: mpsc::UnboundedReceiver<TransferEvent>,
    observers: Observers<DownloadJob>,
}

impl DownloadCoordinator {
    pub fn new(backend: Arc<dyn TransferBackend>, download_dir: impl Into<PathBuf>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            download_dir: download_dir.into(),
            jobs: HashMap::new(),
            by_asset: HashMap::new(),
            events_tx,
            events_rx,
            observers: Observers::new(),
        }
    }

    /// Registers an observer called with a job snapshot on every change
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&DownloadJob) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Snapshot of every running job
    pub fn jobs(&self) -> Vec<DownloadJob> {
        self.jobs.values().map(|active| active.job.clone()).collect()
    }

    pub fn job(&self, id: JobId) -> Option<&DownloadJob> {
        self.jobs.get(&id).map(|active| &active.job)
    }

    /// Running job for one asset of a book
    pub fn job_for(&self, book_id: &BookId, kind: AssetKind) -> Option<&DownloadJob> {
        self.by_asset
            .get(&(book_id.clone(), kind))
            .and_then(|id| self.job(*id))
    }

    pub fn is_idle(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Where an asset of `book` downloaded from `url` is stored
    pub fn destination_for(&self, book: &Book, kind: AssetKind, url: &str) -> PathBuf {
        let subdir = match kind {
            AssetKind::Audio => "audiobooks",
            AssetKind::Text => "ebooks",
        };
        let ext = url_extension(url).unwrap_or(match kind {
            AssetKind::Audio => "mp3",
            AssetKind::Text => "epub",
        });
        self.download_dir
            .join(subdir)
            .join(format!("{}.{}", safe_title(&book.title), ext))
    }

    /// Starts acquiring one asset of a book from `url`
    ///
    /// An asset that is already ready is left alone. A job already running
    /// for the same asset is cancelled first. Partial data from an earlier
    /// attempt is removed before the new transfer begins. Cancelling the job
    /// later puts the asset slot back the way it was before this call.
    pub async fn start(
        &mut self,
        registry: &mut BookRegistry,
        book_id: &BookId,
        kind: AssetKind,
        url: &str,
    ) -> NetworkResult<StartOutcome> {
        let book = registry
            .get(book_id)
            .ok_or_else(|| LibraryError::BookNotFound(book_id.to_string()))?;

        if book.asset(kind).is_some_and(AssetRef::is_ready) {
            debug!("{} asset of {} already ready", kind, book_id);
            return Ok(StartOutcome::AlreadyReady);
        }

        let destination = self.destination_for(book, kind, url);
        let mut previous = book.asset(kind).cloned();

        if let Some(running) = self.by_asset.get(&(book_id.clone(), kind)).copied() {
            info!("Restarting {} download for {}", kind, book_id);
            if let Some(replaced) = self.finish(running, DownloadStatus::Cancelled) {
                previous = replaced.previous;
            }
        }
        self.backend.discard_partial(&destination);

        let mut job =
            DownloadJob::new(book_id.clone(), kind, url.to_string(), destination.clone());
        let job_id = job.id;

        registry
            .merge_assets(
                book_id,
                AssetUpdate::single(
                    kind,
                    AssetRef {
                        uri: url.to_string(),
                        state: AssetState::Acquiring,
                    },
                ),
            )
            .await?;

        let request = TransferRequest {
            job_id,
            url: url.to_string(),
            destination,
        };

        match self.backend.start_transfer(request, self.events_tx.clone()) {
            Ok(handle) => {
                info!("Download {} started: {} {} <- {}", job_id, book_id, kind, url);
                job.status = DownloadStatus::Running;
                self.observers.notify(&job);
                self.by_asset.insert((book_id.clone(), kind), job_id);
                self.jobs.insert(
                    job_id,
                    ActiveJob {
                        job,
                        handle: Some(handle),
                        previous,
                    },
                );
            }
            Err(error) => {
                warn!("Download {} could not start: {}", job_id, error);
                self.mark_asset(registry, book_id, kind, AssetState::Failed).await;
                job.status = DownloadStatus::Error(error);
                self.observers.notify(&job);
            }
        }

        Ok(StartOutcome::Started(job_id))
    }

    /// Starts jobs for every asset of a book that is not yet local
    pub async fn acquire(
        &mut self,
        registry: &mut BookRegistry,
        book_id: &BookId,
    ) -> NetworkResult<Vec<StartOutcome>> {
        let book = registry
            .get(book_id)
            .ok_or_else(|| LibraryError::BookNotFound(book_id.to_string()))?;

        let pending: Vec<(AssetKind, String)> = AssetKind::ALL
            .iter()
            .filter_map(|kind| {
                book.asset(*kind)
                    .filter(|asset| !asset.is_ready())
                    .map(|asset| (*kind, asset.uri.clone()))
            })
            .collect();

        let mut outcomes = Vec::with_capacity(pending.len());
        for (kind, url) in pending {
            outcomes.push(self.start(registry, book_id, kind, &url).await?);
        }
        Ok(outcomes)
    }

    /// Cancels a running job and removes its partial data
    ///
    /// The book's asset slot is restored to what it held before the job
    /// started, so a cancelled download leaves no trace on the book.
    pub async fn cancel(
        &mut self,
        registry: &mut BookRegistry,
        job_id: JobId,
    ) -> NetworkResult<()> {
        let ActiveJob { job, previous, .. } = self
            .finish(job_id, DownloadStatus::Cancelled)
            .ok_or_else(|| NetworkError::JobNotFound(job_id.to_string()))?;

        if let Err(e) = registry
            .restore_asset(&job.book_id, job.asset_kind, previous)
            .await
        {
            warn!("Cannot restore {} asset of {}: {}", job.asset_kind, job.book_id, e);
        }
        Ok(())
    }

    /// Cancels every running job
    pub async fn cancel_all(&mut self, registry: &mut BookRegistry) -> usize {
        let ids: Vec<JobId> = self.jobs.keys().copied().collect();
        let mut cancelled = 0;
        for id in ids {
            if self.cancel(registry, id).await.is_ok() {
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Waits for the next backend event
    ///
    /// Returns `None` once no job is running and no event is queued.
    pub async fn next_event(&mut self) -> Option<TransferEvent> {
        if self.jobs.is_empty() {
            return self.events_rx.try_recv().ok();
        }
        self.events_rx.recv().await
    }

    /// Applies events until every job has reached a terminal state
    pub async fn run_until_idle(&mut self, registry: &mut BookRegistry) {
        while let Some(event) = self.next_event().await {
            self.handle_event(registry, event).await;
        }
    }

    /// Applies one backend event; returns false if it was dropped
    pub async fn handle_event(
        &mut self,
        registry: &mut BookRegistry,
        event: TransferEvent,
    ) -> bool {
        let job_id = event.job_id();
        if !self.jobs.contains_key(&job_id) {
            debug!("Dropping event for finished job {}", job_id);
            return false;
        }

        match event {
            TransferEvent::Progress {
                bytes_done,
                bytes_total,
                ..
            } => {
                let Some(active) = self.jobs.get_mut(&job_id) else {
                    return false;
                };
                if !active.job.progress.advance_to(bytes_done, bytes_total) {
                    return false;
                }
                self.observers.notify(&active.job);
                true
            }
            TransferEvent::Completed { path, bytes, .. } => {
                let Some(ActiveJob { job, .. }) = self.finish(job_id, DownloadStatus::Completed)
                else {
                    return false;
                };
                info!(
                    "Download {} completed: {} bytes -> {}",
                    job_id,
                    bytes,
                    path.display()
                );
                let local = AssetRef::local(path.to_string_lossy().into_owned());
                if let Err(e) = registry
                    .merge_assets(&job.book_id, AssetUpdate::single(job.asset_kind, local))
                    .await
                {
                    warn!("Completed download for missing book {}: {}", job.book_id, e);
                }
                true
            }
            TransferEvent::Failed { error, .. } => {
                let Some(ActiveJob { job, .. }) =
                    self.finish(job_id, DownloadStatus::Error(error.clone()))
                else {
                    return false;
                };
                warn!("Download {} failed: {}", job_id, error);
                self.mark_asset(registry, &job.book_id, job.asset_kind, AssetState::Failed)
                    .await;
                true
            }
        }
    }

    /// Removes a job and reports its terminal status
    ///
    /// Non-completed jobs get their transfer stopped and partial data
    /// discarded.
    fn finish(&mut self, job_id: JobId, status: DownloadStatus) -> Option<ActiveJob> {
        let mut active = self.jobs.remove(&job_id)?;
        let job = &mut active.job;
        self.by_asset.remove(&(job.book_id.clone(), job.asset_kind));

        if status != DownloadStatus::Completed {
            if let Some(handle) = active.handle.take() {
                self.backend.cancel(handle);
            }
            self.backend.discard_partial(&job.destination);
        }

        debug!("Download {} -> {}", job_id, status);
        job.status = status;
        self.observers.notify(job);
        Some(active)
    }

    async fn mark_asset(
        &self,
        registry: &mut BookRegistry,
        book_id: &BookId,
        kind: AssetKind,
        state: AssetState,
    ) {
        if let Err(e) = registry.set_asset_state(book_id, kind, state).await {
            warn!("Cannot mark {} asset of {}: {}", kind, book_id, e);
        }
    }
}

/// Lowercase file name stem safe for any file system
pub fn safe_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn url_extension(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    let last = path.rsplit('/').next()?;
    let (_, ext) = last.rsplit_once('.')?;
    let valid =
        !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(ext)
}

impl std::fmt::Debug for DownloadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadCoordinator")
            .field("download_dir", &self.download_dir)
            .field("jobs", &self.jobs.len())
            .finish()
    }
}
