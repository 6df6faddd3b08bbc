//! Trawl is a crate managing resumable HTTP(S) download sessions.
//!
//! Downloads stream to a temporary file, can be suspended, resumed and
//! canceled (optionally producing resume data), and are moved to a
//! caller-chosen destination once complete. Every download is recorded in a
//! persistent ledger so that the handles of transfers outliving the process
//! can be rebuilt on the next start.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use trawl::{DownloadOptions, Error, SessionManager};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = SessionManager::builder().build()?;
//! let (tx, rx) = tokio::sync::oneshot::channel();
//! manager.download(
//!     "https://github.com/seanmonstar/reqwest/archive/refs/tags/v0.11.9.zip".parse()?,
//!     DownloadOptions::new()
//!         .directory("output")
//!         .on_complete(move |_, error: Option<&Error>, location| {
//!             let _ = tx.send((error.cloned(), location.map(|p| p.to_path_buf())));
//!         }),
//! );
//! let (error, location) = rx.await?;
//! println!("error: {:?}, saved to: {:?}", error, location);
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`session`] - [`SessionManager`], its builder and the transfer coordinator
//! - [`download`] - [`DownloadHandle`], observers and [`Progress`]
//! - [`ledger`] - The persistent ledger and its key-value stores
//! - [`transport`] - The transport contract the sessions are built on
//! - [`http`] - The bundled reqwest transport
//! - [`dispatch`] - The serial queue notifications run on
//! - [`progress`] - Console progress bars
//! - [`error`] - Centralized error handling with the `Error` enum
//! - [`utils`] - Shared utility functions

pub mod dispatch;
pub mod download;
pub mod error;
pub mod http;
pub mod ledger;
pub mod progress;
pub mod session;
pub mod transport;
pub mod utils;

pub use download::{DownloadHandle, DownloadObserver, DownloadOptions, Progress};
pub use error::{Error, Result, TransportError};
pub use http::{create_http_client, HttpClientConfig, HttpTransport, ResumeData};
pub use ledger::{ArchivedRecord, FileStore, KeyValueStore, Ledger, MemoryStore};
pub use progress::{ProgressBarOpts, ProgressDisplay, StyleOptions};
pub use session::{SessionConfig, SessionKind, SessionManager, SessionManagerBuilder};
pub use transport::{DownloadRequest, TaskId, TaskSource, TaskState};
