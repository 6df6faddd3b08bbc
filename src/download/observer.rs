//! Notification channels of a download.
//!
//! A download reports to an optional [`DownloadObserver`], held weakly so the
//! handle never keeps a UI object alive, and to optional closures. Both run
//! on the session's serial queue: zero or more progress notifications, then
//! exactly one terminal notification.

use super::{DownloadHandle, Progress};
use crate::error::Error;

use std::path::Path;
use std::sync::Arc;

/// Receives the events of the downloads it is attached to.
pub trait DownloadObserver: Send + Sync {
    /// A chunk of data was received.
    ///
    /// `total_expected` is `None` when the server did not announce a size.
    fn on_progress(
        &self,
        download: &DownloadHandle,
        progress: Progress,
        total_written: u64,
        total_expected: Option<u64>,
    );

    /// The download reached a terminal state.
    ///
    /// `error` is `None` on success, in which case `location` points at the
    /// file in its final destination.
    fn on_finished(&self, download: &DownloadHandle, error: Option<&Error>, location: Option<&Path>);
}

/// Closure invoked on every progress notification.
pub type ProgressCallback = Arc<dyn Fn(Progress, u64, Option<u64>) + Send + Sync>;

/// Closure invoked once, when the download reaches a terminal state.
pub type CompletionCallback =
    Box<dyn FnOnce(&DownloadHandle, Option<&Error>, Option<&Path>) + Send>;
