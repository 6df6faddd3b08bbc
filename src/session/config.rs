//! Session configuration.
//!
//! A [`SessionConfig`] names the session scope, says whether the session is
//! a default or a background one, and carries the HTTP client settings of
//! the bundled transport.
//!
//! # Examples
//!
//! ```rust
//! use trawl::session::{SessionConfig, SessionKind};
//!
//! let config = SessionConfig::background("com.example.sync", "/var/lib/example");
//! assert!(config.is_background());
//! assert_eq!(config.identifier, "com.example.sync");
//!
//! let config = SessionConfig::default();
//! assert!(matches!(config.kind, SessionKind::Default));
//! ```

use crate::http::HttpClientConfig;

use std::path::PathBuf;

/// Scope identifier of the default session.
pub const DEFAULT_SESSION_IDENTIFIER: &str = "trawl.downloads";

/// Conventional scope identifier of a process's background session.
pub const BACKGROUND_SESSION_IDENTIFIER: &str = "trawl.background.session";

/// Lifetime of the transfers of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKind {
    /// Transfers live as long as the process.
    Default,
    /// Transfers outlive the process: the session keeps its task table under
    /// `state_dir` and picks it up again when reopened with the same
    /// identifier.
    Background {
        /// Where the session state is kept.
        state_dir: PathBuf,
    },
}

/// Configuration of one transport session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The session-scope identifier. Ledger records are grouped by it.
    pub identifier: String,
    /// Default or background session.
    pub kind: SessionKind,
    /// Settings of the HTTP client of the bundled transport.
    pub http: HttpClientConfig,
    /// Directory receiving in-flight transfers.
    pub temp_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            identifier: DEFAULT_SESSION_IDENTIFIER.to_string(),
            kind: SessionKind::Default,
            http: HttpClientConfig::default(),
            temp_dir: std::env::temp_dir(),
        }
    }
}

impl SessionConfig {
    /// Configuration of a background session.
    pub fn background(identifier: impl Into<String>, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            identifier: identifier.into(),
            kind: SessionKind::Background {
                state_dir: state_dir.into(),
            },
            ..SessionConfig::default()
        }
    }

    /// Returns `true` for background sessions.
    pub fn is_background(&self) -> bool {
        matches!(self.kind, SessionKind::Background { .. })
    }

    /// Directory of the session state, for background sessions.
    pub fn state_dir(&self) -> Option<&PathBuf> {
        match &self.kind {
            SessionKind::Background { state_dir } => Some(state_dir),
            SessionKind::Default => None,
        }
    }
}
