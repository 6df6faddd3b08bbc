//! Download sessions.
//!
//! A [`SessionManager`] owns one transport session, the
//! [`TransferCoordinator`] routing its callbacks, and the ledger records of
//! its scope. Managers are created through a [`SessionManagerBuilder`]:
//!
//! ```rust,no_run
//! use trawl::download::DownloadOptions;
//! use trawl::session::SessionManager;
//! use trawl::transport::TaskState;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = SessionManager::builder()
//!     .identifier("com.example.downloads")
//!     .auto_start(false)
//!     .build()?;
//!
//! let download = manager.download(
//!     "https://example.com/big.iso".parse()?,
//!     DownloadOptions::new().directory("downloads").file_name("big.iso"),
//! );
//! download.resume();
//!
//! for download in manager.current_downloads(Some(TaskState::Running)) {
//!     println!("{}: {}", download, download.progress());
//! }
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod coordinator;
pub mod manager;

pub use builder::SessionManagerBuilder;
pub use config::{
    SessionConfig, SessionKind, BACKGROUND_SESSION_IDENTIFIER, DEFAULT_SESSION_IDENTIFIER,
};
pub use coordinator::{BackgroundEventsHandler, TransferCoordinator};
pub use manager::SessionManager;
