//! The façade callers start and query downloads through.

use super::builder::SessionManagerBuilder;
use super::config::SessionConfig;
use super::coordinator::TransferCoordinator;
use crate::dispatch::SerialQueue;
use crate::download::{DownloadHandle, DownloadOptions};
use crate::error::Result;
use crate::ledger::{Ledger, LedgerWriter, ScopedLedger};
use crate::transport::{
    DownloadRequest, TaskId, TaskSource, TaskState, Transport, TransportSession, TransportTask,
};

use reqwest::Url;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns one transport session and the downloads running in it.
///
/// Creating a manager reconciles the ledger with the transport: every live
/// task with a matching record gets its [`DownloadHandle`] back, with the
/// directory and file name it was started with. Live tasks without a record
/// are reported by [`untracked_tasks`](SessionManager::untracked_tasks) and
/// records without a live task stay in the ledger until
/// [`purge_orphaned_records`](SessionManager::purge_orphaned_records).
///
/// ```rust,no_run
/// use trawl::download::DownloadOptions;
/// use trawl::session::SessionManager;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = SessionManager::builder().build()?;
/// let download = manager.download(
///     "https://example.com/file.zip".parse()?,
///     DownloadOptions::new()
///         .directory("downloads")
///         .on_complete(|download, error, location| match error {
///             None => println!("{} saved to {:?}", download.url(), location),
///             Some(e) => println!("{} failed: {}", download.url(), e),
///         }),
/// );
/// println!("{}", download);
/// # Ok(())
/// # }
/// ```
pub struct SessionManager {
    config: SessionConfig,
    auto_start: bool,
    session: Arc<dyn TransportSession>,
    coordinator: Arc<TransferCoordinator>,
    ledger: LedgerWriter,
    queue: SerialQueue,
    untracked: Vec<Arc<dyn TransportTask>>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("identifier", &self.config.identifier)
            .field("kind", &self.config.kind)
            .field("auto_start", &self.auto_start)
            .field("downloads", &self.coordinator.len())
            .finish()
    }
}

impl SessionManager {
    /// Creates a builder with the default options.
    pub fn builder() -> SessionManagerBuilder {
        SessionManagerBuilder::new()
    }

    /// A manager for the default session, with the default options.
    pub fn default_session() -> Result<Self> {
        SessionManagerBuilder::new().build()
    }

    /// A manager for the background session `identifier`, keeping its state
    /// under `state_dir`.
    pub fn background(identifier: impl Into<String>, state_dir: impl Into<PathBuf>) -> Result<Self> {
        SessionManagerBuilder::new()
            .identifier(identifier)
            .background(state_dir)
            .build()
    }

    pub(crate) fn new(
        config: SessionConfig,
        auto_start: bool,
        transport: Arc<dyn Transport>,
        ledger: Arc<Ledger>,
    ) -> Result<Self> {
        let queue = SerialQueue::spawn();
        let ledger = LedgerWriter::spawn(ledger);
        let coordinator = Arc::new(TransferCoordinator::new(
            config.identifier.clone(),
            queue.clone(),
        ));
        let session = transport.open_session(&config, coordinator.clone())?;
        let untracked = reconcile(&session, &coordinator, &ledger.scoped(&config.identifier));
        session.activate();

        info!(
            "Session {} ready with {} restored download(s)",
            config.identifier,
            coordinator.len()
        );
        Ok(Self {
            config,
            auto_start,
            session,
            coordinator,
            ledger,
            queue,
            untracked,
        })
    }

    /// Starts a download of `source`.
    ///
    /// The handle is registered and persisted before this returns. The
    /// transfer begins right away when [`auto_start`](Self::auto_start) is
    /// set; otherwise call [`DownloadHandle::resume`].
    pub fn start(&self, source: impl Into<TaskSource>, options: DownloadOptions) -> Arc<DownloadHandle> {
        let source = source.into();
        let resume_data = match &source {
            TaskSource::ResumeData(data) => Some(data.clone()),
            _ => None,
        };
        let task = self.session.download_task(source);
        let download = Arc::new(DownloadHandle::new(
            task,
            options,
            resume_data,
            self.scoped_ledger(),
        ));
        debug!(
            "Created task {} for {} in session {}",
            download.task_id(),
            download.url(),
            self.config.identifier
        );

        self.coordinator.register(download.clone());
        download.save();
        if self.auto_start {
            download.resume();
        }
        download
    }

    /// Starts a download of `url`.
    pub fn download(&self, url: Url, options: DownloadOptions) -> Arc<DownloadHandle> {
        self.start(TaskSource::Url(url), options)
    }

    /// Starts a download of `request`, keeping its headers.
    pub fn download_request(
        &self,
        request: DownloadRequest,
        options: DownloadOptions,
    ) -> Arc<DownloadHandle> {
        self.start(TaskSource::Request(request), options)
    }

    /// Continues a transfer from the data produced by
    /// [`DownloadHandle::cancel_producing_resume_data`].
    ///
    /// Unusable data still yields a handle; it fails once resumed.
    pub fn download_with_resume_data(
        &self,
        resume_data: Vec<u8>,
        options: DownloadOptions,
    ) -> Arc<DownloadHandle> {
        self.start(TaskSource::ResumeData(resume_data), options)
    }

    /// Registered downloads, optionally restricted to one task state.
    pub fn current_downloads(&self, state: Option<TaskState>) -> Vec<Arc<DownloadHandle>> {
        let downloads = self.coordinator.downloads();
        match state {
            None => downloads,
            Some(state) => downloads
                .into_iter()
                .filter(|download| download.state() == state)
                .collect(),
        }
    }

    /// The registered download backed by task `task_id`.
    pub fn download_for_task(&self, task_id: TaskId) -> Option<Arc<DownloadHandle>> {
        self.coordinator.download(task_id)
    }

    /// Sets the one-shot callback fired once a background session has
    /// delivered every pending event and no task remains.
    pub fn set_background_events_handler<F>(&self, handler: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.coordinator.set_background_events_handler(Box::new(handler));
    }

    /// Whether new downloads begin as soon as they are created.
    pub fn auto_start(&self) -> bool {
        self.auto_start
    }

    /// Changes the auto-start policy for downloads created from now on.
    pub fn set_auto_start(&mut self, auto_start: bool) {
        self.auto_start = auto_start;
    }

    /// The session-scope identifier.
    pub fn identifier(&self) -> &str {
        &self.config.identifier
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The underlying transport session.
    pub fn session(&self) -> &Arc<dyn TransportSession> {
        &self.session
    }

    /// The ledger backing this manager.
    pub fn ledger(&self) -> &Arc<Ledger> {
        self.ledger.ledger()
    }

    /// Live transport tasks reconciliation found no record for and which
    /// have not completed since.
    pub fn untracked_tasks(&self) -> Vec<Arc<dyn TransportTask>> {
        self.untracked
            .iter()
            .filter(|task| task.state() != TaskState::Completed)
            .cloned()
            .collect()
    }

    /// Removes the ledger records of this scope whose task is not
    /// registered when the removal is applied. Returns how many were removed.
    pub async fn purge_orphaned_records(&self) -> usize {
        let coordinator = self.coordinator.clone();
        let removed = self
            .scoped_ledger()
            .retain(move || {
                coordinator
                    .task_ids()
                    .into_iter()
                    .map(|id| id.to_string())
                    .collect()
            })
            .await;
        if removed > 0 {
            info!(
                "Purged {} orphaned record(s) of session {}",
                removed, self.config.identifier
            );
        }
        removed
    }

    /// Waits until queued ledger writes are applied and queued
    /// notifications have run.
    pub async fn flush(&self) {
        self.ledger.flush().await;
        self.queue.barrier().await;
    }

    fn scoped_ledger(&self) -> ScopedLedger {
        self.ledger.scoped(&self.config.identifier)
    }
}

/// Rebuilds the handles of the live tasks of `session` from the ledger.
///
/// Returns the live tasks no record describes.
fn reconcile(
    session: &Arc<dyn TransportSession>,
    coordinator: &TransferCoordinator,
    ledger: &ScopedLedger,
) -> Vec<Arc<dyn TransportTask>> {
    let mut records = ledger.load();
    let mut untracked = Vec::new();

    for task in session.live_tasks() {
        match records.remove(&task.id().to_string()) {
            Some(record) => {
                let download = Arc::new(DownloadHandle::restore(task, &record, ledger.clone()));
                debug!("Restored download {}", download);
                coordinator.register(download);
            }
            None => {
                warn!(
                    "Live task {} ({}) of session {} has no ledger record",
                    task.id(),
                    task.original_request().url,
                    ledger.scope()
                );
                untracked.push(task);
            }
        }
    }

    if !records.is_empty() {
        debug!(
            "{} ledger record(s) of session {} have no live task",
            records.len(),
            ledger.scope()
        );
    }
    untracked
}
