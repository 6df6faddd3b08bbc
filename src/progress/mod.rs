//! Console progress bars.
//!
//! - `style` - Progress bar styling options and templates
//! - `display` - [`ProgressDisplay`], a [`DownloadObserver`] drawing the bars
//!
//! [`DownloadObserver`]: crate::download::DownloadObserver

pub(crate) mod display;
pub(crate) mod style;

pub use display::ProgressDisplay;
pub use style::{ProgressBarOpts, StyleOptions};
