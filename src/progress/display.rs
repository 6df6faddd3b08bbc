//! Console rendering of download progress.
//!
//! [`ProgressDisplay`] is a ready-made [`DownloadObserver`]: attach it to
//! any number of downloads and it draws one bar per running download plus
//! an overall bar counting the finished ones.
//!
//! # Examples
//!
//! ```rust,no_run
//! use trawl::download::DownloadOptions;
//! use trawl::progress::{ProgressDisplay, StyleOptions};
//! use trawl::session::SessionManager;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = SessionManager::builder().build()?;
//! let display = ProgressDisplay::new(StyleOptions::default());
//!
//! let observer = display.observer();
//! manager.download(
//!     "https://example.com/a.zip".parse()?,
//!     DownloadOptions::new().directory("downloads").observer(&observer),
//! );
//! # Ok(())
//! # }
//! ```

use crate::download::{DownloadHandle, DownloadObserver, Progress};
use crate::error::Error;
use crate::progress::StyleOptions;
use crate::transport::TaskId;
use crate::utils::lock;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Progress display manager that coordinates multiple progress bars.
pub struct ProgressDisplay {
    multi: MultiProgress,
    /// Counts finished downloads; its length grows with every new download.
    overall: ProgressBar,
    bars: Mutex<HashMap<(String, TaskId), ProgressBar>>,
    style_options: StyleOptions,
}

impl ProgressDisplay {
    /// Create a new progress display.
    pub fn new(style_options: StyleOptions) -> Arc<Self> {
        let multi = match style_options.is_enabled() {
            true => MultiProgress::new(),
            false => MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        };
        let overall = multi.add(style_options.overall().to_progress_bar(0));
        overall.set_length(0);
        Arc::new(Self {
            multi,
            overall,
            bars: Mutex::new(HashMap::new()),
            style_options,
        })
    }

    /// A display drawing nothing.
    pub fn hidden() -> Arc<Self> {
        ProgressDisplay::new(StyleOptions::hidden())
    }

    /// This display as an observer to hand to
    /// [`DownloadOptions::observer`](crate::download::DownloadOptions::observer).
    ///
    /// Downloads only hold the observer weakly: keep the display alive for as
    /// long as it should draw.
    pub fn observer(self: &Arc<Self>) -> Arc<dyn DownloadObserver> {
        self.clone()
    }

    /// Get the multi-progress instance, to print above the bars.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }

    /// Get the overall progress bar.
    pub fn overall(&self) -> &ProgressBar {
        &self.overall
    }

    /// Number of downloads currently drawn.
    pub fn active(&self) -> usize {
        lock(&self.bars).len()
    }

    /// Finish the overall bar, clearing or keeping it based on configuration.
    pub fn finish(&self) {
        if self.style_options.overall().clear {
            self.overall.finish_and_clear();
        } else {
            self.overall.finish();
        }
    }

    fn key(download: &DownloadHandle) -> (String, TaskId) {
        (download.scope().to_string(), download.task_id())
    }

    fn bar_for(&self, download: &DownloadHandle, total_expected: Option<u64>) -> ProgressBar {
        let mut bars = lock(&self.bars);
        bars.entry(Self::key(download))
            .or_insert_with(|| {
                self.overall.inc_length(1);
                let options = self.style_options.download();
                let bar = match total_expected {
                    Some(total) => options.to_progress_bar(total),
                    None => options.to_spinner(),
                };
                let bar = self.multi.add(bar);
                bar.set_message(download.file_name().unwrap_or_default());
                bar
            })
            .clone()
    }
}

impl DownloadObserver for ProgressDisplay {
    fn on_progress(
        &self,
        download: &DownloadHandle,
        _progress: Progress,
        total_written: u64,
        total_expected: Option<u64>,
    ) {
        let bar = self.bar_for(download, total_expected);
        if let Some(total) = total_expected {
            bar.set_length(total);
        }
        bar.set_position(total_written);
    }

    fn on_finished(&self, download: &DownloadHandle, error: Option<&Error>, _location: Option<&Path>) {
        let bar = lock(&self.bars).remove(&Self::key(download));
        let bar = match bar {
            Some(bar) => bar,
            None => {
                // Failed or cancelled before the first byte.
                self.overall.inc_length(1);
                ProgressBar::hidden()
            }
        };
        match error {
            Some(e) => bar.abandon_with_message(e.to_string()),
            None if self.style_options.download().clear => bar.finish_and_clear(),
            None => bar.finish(),
        }
        self.overall.inc(1);
    }
}
