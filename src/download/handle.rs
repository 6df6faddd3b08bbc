//! The caller-facing representation of one transfer.

use super::observer::{CompletionCallback, DownloadObserver, ProgressCallback};
use super::Progress;
use crate::error::{Error, Result};
use crate::ledger::{ArchivedRecord, ScopedLedger};
use crate::transport::{ResumeDataCallback, TaskId, TaskState, TransportTask};
use crate::utils::{lock, normalize_path};

use reqwest::Url;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use tracing::trace;

/// Options of a new download.
///
/// ```rust
/// use trawl::download::DownloadOptions;
///
/// let options = DownloadOptions::new()
///     .directory("downloads")
///     .file_name("archive.zip")
///     .on_complete(|download, error, location| match error {
///         None => println!("{} saved to {:?}", download.task_id(), location),
///         Some(e) => println!("{} failed: {}", download.task_id(), e),
///     });
/// ```
#[derive(Default)]
pub struct DownloadOptions {
    pub(crate) directory: Option<PathBuf>,
    pub(crate) file_name: Option<String>,
    pub(crate) observer: Option<Weak<dyn DownloadObserver>>,
    pub(crate) on_progress: Option<ProgressCallback>,
    pub(crate) on_complete: Option<CompletionCallback>,
}

impl fmt::Debug for DownloadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadOptions")
            .field("directory", &self.directory)
            .field("file_name", &self.file_name)
            .field("observer", &self.observer.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

impl DownloadOptions {
    /// Creates empty options: temporary directory, server-suggested name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory the file is moved to once downloaded.
    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Name given to the file once downloaded.
    pub fn file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Observer notified of progress and completion. Only a weak reference is kept.
    pub fn observer(mut self, observer: &Arc<dyn DownloadObserver>) -> Self {
        self.observer = Some(Arc::downgrade(observer));
        self
    }

    /// Closure called with `(progress, total_written, total_expected)` on every chunk.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(Progress, u64, Option<u64>) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Closure called once the download reaches a terminal state.
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&DownloadHandle, Option<&Error>, Option<&Path>) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

#[derive(Debug, Default)]
struct HandleState {
    progress: Progress,
    error: Option<Error>,
    resulting_path: Option<PathBuf>,
}

/// One in-flight or completed download.
///
/// The mutable state (progress, error, final location) is written by the
/// session's coordinator only and can be read from anywhere.
pub struct DownloadHandle {
    task: Arc<dyn TransportTask>,
    directory: Option<PathBuf>,
    preferred_file_name: Option<String>,
    resume_data: Option<Vec<u8>>,
    ledger: ScopedLedger,
    state: Mutex<HandleState>,
    observer: Mutex<Option<Weak<dyn DownloadObserver>>>,
    on_progress: Mutex<Option<ProgressCallback>>,
    on_complete: Mutex<Option<CompletionCallback>>,
}

impl DownloadHandle {
    pub(crate) fn new(
        task: Arc<dyn TransportTask>,
        options: DownloadOptions,
        resume_data: Option<Vec<u8>>,
        ledger: ScopedLedger,
    ) -> Self {
        Self {
            task,
            directory: options.directory,
            preferred_file_name: options.file_name,
            resume_data,
            ledger,
            state: Mutex::new(HandleState::default()),
            observer: Mutex::new(options.observer),
            on_progress: Mutex::new(options.on_progress),
            on_complete: Mutex::new(options.on_complete),
        }
    }

    /// Rebuilds a handle from a persisted record. No observer is attached.
    pub(crate) fn restore(
        task: Arc<dyn TransportTask>,
        record: &ArchivedRecord,
        ledger: ScopedLedger,
    ) -> Self {
        let options = DownloadOptions {
            directory: record.directory.as_ref().map(PathBuf::from),
            file_name: record.file_name.clone(),
            ..DownloadOptions::default()
        };
        DownloadHandle::new(task, options, record.resume_data.clone(), ledger)
    }

    /// The underlying transport task.
    pub fn task(&self) -> &Arc<dyn TransportTask> {
        &self.task
    }

    /// Identifier of the underlying task.
    pub fn task_id(&self) -> TaskId {
        self.task.id()
    }

    /// URL of the original request.
    pub fn url(&self) -> &Url {
        &self.task.original_request().url
    }

    /// State of the underlying task.
    pub fn state(&self) -> TaskState {
        self.task.state()
    }

    /// The session scope this download belongs to.
    pub fn scope(&self) -> &str {
        self.ledger.scope()
    }

    /// Destination directory, if one was given.
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// The preferred name, or the one suggested by the server.
    pub fn file_name(&self) -> Option<String> {
        self.preferred_file_name
            .clone()
            .or_else(|| self.task.response().and_then(|r| r.suggested_filename))
    }

    /// Where the file will be moved once downloaded.
    ///
    /// Computed on every call: [`file_name`](Self::file_name) resolved against
    /// the directory (or the system temporary directory), then normalized.
    pub fn destination(&self) -> Result<PathBuf> {
        let file_name = self.file_name().ok_or(Error::UnresolvableDestination {
            task_id: self.task_id(),
        })?;
        let directory = self.directory.clone().unwrap_or_else(std::env::temp_dir);
        Ok(normalize_path(&directory.join(file_name)))
    }

    /// Current progress.
    pub fn progress(&self) -> Progress {
        lock(&self.state).progress
    }

    /// The error recorded so far, if any.
    pub fn error(&self) -> Option<Error> {
        lock(&self.state).error.clone()
    }

    /// Final location of the file, set only if moving it succeeded.
    pub fn resulting_path(&self) -> Option<PathBuf> {
        lock(&self.state).resulting_path.clone()
    }

    /// Resume data this download was started from, if any.
    pub fn resume_data(&self) -> Option<&[u8]> {
        self.resume_data.as_deref()
    }

    /// Attaches an observer, replacing the previous one. Only a weak reference is kept.
    pub fn set_observer(&self, observer: &Arc<dyn DownloadObserver>) {
        *lock(&self.observer) = Some(Arc::downgrade(observer));
    }

    /// Replaces the progress closure.
    pub fn set_on_progress<F>(&self, callback: F)
    where
        F: Fn(Progress, u64, Option<u64>) + Send + Sync + 'static,
    {
        *lock(&self.on_progress) = Some(Arc::new(callback));
    }

    /// Replaces the completion closure.
    pub fn set_on_complete<F>(&self, callback: F)
    where
        F: FnOnce(&DownloadHandle, Option<&Error>, Option<&Path>) + Send + 'static,
    {
        *lock(&self.on_complete) = Some(Box::new(callback));
    }

    /// Cancels the download. It cannot be resumed afterwards.
    ///
    /// The completion notification arrives later, carrying a cancellation error.
    pub fn cancel(&self) {
        self.task.cancel();
    }

    /// Pauses the download.
    pub fn suspend(&self) {
        self.task.suspend();
    }

    /// Resumes a paused download, or starts one that was not started yet.
    pub fn resume(&self) {
        self.task.resume();
    }

    /// Cancels the download and produces data to restart it later.
    ///
    /// `callback` runs exactly once, with `None` if the transfer cannot be
    /// resumed. It may run before or after the completion notification.
    pub fn cancel_producing_resume_data<F>(&self, callback: F)
    where
        F: FnOnce(Option<Vec<u8>>) + Send + 'static,
    {
        let callback: ResumeDataCallback = Box::new(callback);
        self.task.cancel_producing_resume_data(callback);
    }

    /// Snapshot persisted in the ledger.
    pub fn record(&self) -> ArchivedRecord {
        ArchivedRecord::new(
            self.task_id().to_string(),
            self.scope(),
            self.file_name(),
            self.directory
                .as_ref()
                .map(|d| d.to_string_lossy().into_owned()),
        )
        .with_resume_data(self.resume_data.clone())
    }

    /// Persists this download in the ledger of its scope.
    pub fn save(&self) {
        self.ledger.save(self.record());
    }

    /// Removes this download from the ledger of its scope.
    pub fn delete(&self) {
        self.ledger.delete(self.task_id().to_string());
    }

    pub(crate) fn set_progress(&self, progress: Progress) {
        lock(&self.state).progress = progress;
    }

    pub(crate) fn set_error(&self, error: Error) {
        lock(&self.state).error = Some(error);
    }

    pub(crate) fn set_resulting_path(&self, path: PathBuf) {
        lock(&self.state).resulting_path = Some(path);
    }

    fn observer(&self) -> Option<Arc<dyn DownloadObserver>> {
        lock(&self.observer).as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn notify_progress(
        &self,
        progress: Progress,
        total_written: u64,
        total_expected: Option<u64>,
    ) {
        if let Some(observer) = self.observer() {
            observer.on_progress(self, progress, total_written, total_expected);
        }
        let callback = lock(&self.on_progress).clone();
        if let Some(callback) = callback {
            callback(progress, total_written, total_expected);
        }
    }

    pub(crate) fn notify_finished(&self, error: Option<&Error>) {
        let location = self.resulting_path();
        trace!("Notifying completion of task {}", self.task_id());
        if let Some(observer) = self.observer() {
            observer.on_finished(self, error, location.as_deref());
        }
        let callback = lock(&self.on_complete).take();
        if let Some(callback) = callback {
            callback(self, error, location.as_deref());
        }
    }
}

impl fmt::Display for DownloadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let destination = self
            .destination()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "unresolved".into());
        write!(
            f,
            "DownloadHandle | URL: {} | task state: {} | destination: {} | fileName: {}",
            self.url(),
            self.state(),
            destination,
            self.file_name().as_deref().unwrap_or("none"),
        )
    }
}

impl fmt::Debug for DownloadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadHandle")
            .field("task_id", &self.task_id())
            .field("url", &self.url().as_str())
            .field("scope", &self.scope())
            .field("directory", &self.directory)
            .field("preferred_file_name", &self.preferred_file_name)
            .field("state", &lock(&self.state))
            .finish()
    }
}
