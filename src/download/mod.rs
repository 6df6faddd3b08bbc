//! Download handles and their notification channels.
//!
//! - [`handle`] - [`DownloadHandle`], one transfer, and [`DownloadOptions`]
//! - [`observer`] - [`DownloadObserver`] and the callback types
//! - [`progress`] - [`Progress`] values

pub mod handle;
pub mod observer;
pub mod progress;

pub use handle::{DownloadHandle, DownloadOptions};
pub use observer::{CompletionCallback, DownloadObserver, ProgressCallback};
pub use progress::Progress;
