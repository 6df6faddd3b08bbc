//! Routing of transport callbacks to download handles.
//!
//! The [`TransferCoordinator`] is the [`SessionEvents`] sink of one session.
//! It maps task identifiers to their [`DownloadHandle`], updates the handle
//! state on the transport's thread and forwards every notification to the
//! session's [`SerialQueue`].
//!
//! Callbacks for a task that is not (or no longer) registered are ignored:
//! late events after a completion, or events for tasks reconciliation did
//! not adopt.

use crate::dispatch::SerialQueue;
use crate::download::{DownloadHandle, Progress};
use crate::error::{Error, TransportError};
use crate::transport::{SessionEvents, TaskId, TransportSession, TransportTask};
use crate::utils::{lock, move_replacing};

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, trace, warn};

/// One-shot callback fired once a background session has nothing left to do.
pub type BackgroundEventsHandler = Box<dyn FnOnce() + Send>;

/// Owns the live task map of a session.
pub struct TransferCoordinator {
    scope: String,
    downloads: Mutex<HashMap<TaskId, Arc<DownloadHandle>>>,
    queue: SerialQueue,
    background_events_handler: Mutex<Option<BackgroundEventsHandler>>,
}

impl fmt::Debug for TransferCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferCoordinator")
            .field("scope", &self.scope)
            .field("downloads", &self.len())
            .finish()
    }
}

impl TransferCoordinator {
    pub fn new(scope: impl Into<String>, queue: SerialQueue) -> Self {
        Self {
            scope: scope.into(),
            downloads: Mutex::new(HashMap::new()),
            queue,
            background_events_handler: Mutex::new(None),
        }
    }

    /// The session-scope identifier.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Adds `download` to the live map.
    ///
    /// Returns `false`, leaving the map untouched, if its task is already
    /// registered.
    pub fn register(&self, download: Arc<DownloadHandle>) -> bool {
        let task_id = download.task_id();
        let mut downloads = lock(&self.downloads);
        if downloads.contains_key(&task_id) {
            warn!(
                "Task {} is already registered in session {}",
                task_id, self.scope
            );
            return false;
        }
        downloads.insert(task_id, download);
        trace!("Registered task {} in session {}", task_id, self.scope);
        true
    }

    /// The handle registered for `task_id`.
    pub fn download(&self, task_id: TaskId) -> Option<Arc<DownloadHandle>> {
        lock(&self.downloads).get(&task_id).cloned()
    }

    /// Every registered handle, in task order.
    pub fn downloads(&self) -> Vec<Arc<DownloadHandle>> {
        let mut downloads: Vec<_> = lock(&self.downloads).values().cloned().collect();
        downloads.sort_by_key(|download| download.task_id());
        downloads
    }

    /// Task identifiers of every registered handle.
    pub fn task_ids(&self) -> Vec<TaskId> {
        lock(&self.downloads).keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.downloads).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Installs the one-shot handler fired once background work is over.
    pub fn set_background_events_handler(&self, handler: BackgroundEventsHandler) {
        *lock(&self.background_events_handler) = Some(handler);
    }

    fn evict(&self, task_id: TaskId) -> Option<Arc<DownloadHandle>> {
        lock(&self.downloads).remove(&task_id)
    }

    /// The terminal error of a task.
    ///
    /// A transport error wins, then an error recorded while moving the file.
    /// A transfer without either whose response status is not `2xx` fails
    /// with [`Error::HttpStatus`].
    fn terminal_error(
        task: &Arc<dyn TransportTask>,
        download: &DownloadHandle,
        error: Option<TransportError>,
    ) -> Option<Error> {
        error.map(Error::from).or_else(|| download.error()).or_else(|| {
            task.response()
                .filter(|response| !response.is_acceptable())
                .map(|response| Error::HttpStatus {
                    status: response.status,
                    url: task.original_request().url.clone(),
                })
        })
    }
}

impl SessionEvents for TransferCoordinator {
    fn on_bytes_written(
        &self,
        task: &Arc<dyn TransportTask>,
        _bytes_written: u64,
        total_written: u64,
        total_expected: Option<u64>,
    ) {
        let Some(download) = self.download(task.id()) else {
            trace!("Ignoring progress of untracked task {}", task.id());
            return;
        };
        let progress = Progress::from_bytes(total_written, total_expected);
        download.set_progress(progress);
        self.queue.dispatch(move || {
            download.notify_progress(progress, total_written, total_expected);
        });
    }

    fn on_finished_to_temp_location(&self, task: &Arc<dyn TransportTask>, location: &Path) {
        let Some(download) = self.download(task.id()) else {
            trace!("Ignoring finished transfer of untracked task {}", task.id());
            return;
        };
        let destination = match download.destination() {
            Ok(destination) => destination,
            Err(e) => {
                warn!("{}", e);
                download.set_error(e);
                return;
            }
        };
        match move_replacing(location, &destination) {
            Ok(()) => {
                debug!("Task {} moved to {:?}", task.id(), destination);
                download.set_resulting_path(destination);
            }
            Err(e) => {
                warn!(
                    "Task {} could not be moved to {:?}: {}",
                    task.id(),
                    destination,
                    e
                );
                download.set_error(Error::Move {
                    destination,
                    source: Arc::new(e),
                });
            }
        }
    }

    fn on_task_completed(&self, task: &Arc<dyn TransportTask>, error: Option<TransportError>) {
        let Some(download) = self.evict(task.id()) else {
            trace!("Ignoring completion of untracked task {}", task.id());
            return;
        };
        let error = Self::terminal_error(task, &download, error);
        match &error {
            None => info!("Download {} completed", download),
            Some(e) if e.is_cancelled() => info!("Download {} cancelled", download),
            Some(e) => warn!("Download {} failed: {}", download, e),
        }
        if let Some(e) = &error {
            download.set_error(e.clone());
        }
        download.delete();
        self.queue.dispatch(move || {
            download.notify_finished(error.as_ref());
        });
    }

    fn on_all_background_events_drained(&self, session: &dyn TransportSession) {
        if !session.live_tasks().is_empty() {
            trace!(
                "Background events drained with tasks left in {}",
                self.scope
            );
            return;
        }
        let handler = lock(&self.background_events_handler).take();
        if let Some(handler) = handler {
            debug!("Background work of session {} finished", self.scope);
            self.queue.dispatch(handler);
        }
    }
}
