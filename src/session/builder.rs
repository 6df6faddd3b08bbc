//! Builder pattern implementation for creating [`SessionManager`] instances.
//!
//! # Examples
//!
//! ## Basic Builder Usage
//!
//! ```rust,no_run
//! use trawl::session::SessionManagerBuilder;
//!
//! # #[tokio::main]
//! # async fn main() -> trawl::Result<()> {
//! let manager = SessionManagerBuilder::new()
//!     .identifier("com.example.downloads")
//!     .retries(5)
//!     .auto_start(false)
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Background Sessions
//!
//! ```rust,no_run
//! use trawl::session::SessionManagerBuilder;
//!
//! # #[tokio::main]
//! # async fn main() -> trawl::Result<()> {
//! // Transfers and ledger records survive a restart of the process.
//! let manager = SessionManagerBuilder::new()
//!     .identifier("com.example.sync")
//!     .background("/var/lib/example")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use super::config::{SessionConfig, SessionKind};
use super::manager::SessionManager;
use crate::error::{Error, Result};
use crate::http::HttpTransport;
use crate::ledger::{FileStore, KeyValueStore, Ledger, MemoryStore};
use crate::transport::Transport;

use reqwest::header::{HeaderMap, HeaderValue, IntoHeaderName};
use reqwest::Proxy;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// A builder used to create a [`SessionManager`].
///
/// Without an explicit [`store`](SessionManagerBuilder::store), background
/// sessions keep their ledger in a [`FileStore`] under their state
/// directory and default sessions in a [`MemoryStore`].
pub struct SessionManagerBuilder {
    config: SessionConfig,
    auto_start: bool,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl Default for SessionManagerBuilder {
    fn default() -> Self {
        Self {
            config: SessionConfig::default(),
            auto_start: true,
            store: None,
        }
    }
}

impl fmt::Debug for SessionManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManagerBuilder")
            .field("config", &self.config)
            .field("auto_start", &self.auto_start)
            .field("store", &self.store.is_some())
            .finish()
    }
}

impl SessionManagerBuilder {
    /// Creates a builder with the default options.
    pub fn new() -> Self {
        SessionManagerBuilder::default()
    }

    /// Starts from an existing configuration.
    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            config,
            ..SessionManagerBuilder::default()
        }
    }

    /// Sets the session-scope identifier.
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.config.identifier = identifier.into();
        self
    }

    /// Makes the session a background session keeping its state in `state_dir`.
    pub fn background(mut self, state_dir: impl Into<PathBuf>) -> Self {
        self.config.kind = SessionKind::Background {
            state_dir: state_dir.into(),
        };
        self
    }

    /// Set whether downloads begin as soon as they are created. Defaults to `true`.
    pub fn auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Sets the durable store of the ledger.
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the number of retries per request.
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.http.retries = retries;
        self
    }

    /// Bounds the time spent establishing a connection.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.http.connect_timeout = Some(timeout);
        self
    }

    /// Routes every request through `proxy`.
    pub fn proxy(mut self, proxy: Proxy) -> Self {
        self.config.http.proxy = Some(proxy);
        self
    }

    /// Sets the directory receiving in-flight transfers.
    pub fn temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = temp_dir.into();
        self
    }

    /// Helper method to get or create a new HeaderMap.
    fn new_header(&self) -> HeaderMap {
        match self.config.http.headers {
            Some(ref h) => h.to_owned(),
            _ => HeaderMap::new(),
        }
    }

    /// Add default http headers.
    ///
    /// You can call `.headers()` multiple times and all `HeaderMap` will be merged into a single one.
    ///
    /// # Example
    ///
    /// ```
    /// use reqwest::header::{self, HeaderValue, HeaderMap};
    /// use trawl::session::SessionManagerBuilder;
    ///
    /// let ua = HeaderValue::from_str("curl/7.87").expect("Invalid UA");
    ///
    /// let builder = SessionManagerBuilder::new()
    ///     .headers(HeaderMap::from_iter([(header::USER_AGENT, ua)]));
    /// ```
    ///
    /// See also [`header()`].
    ///
    /// [`header()`]: SessionManagerBuilder::header
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        let mut new = self.new_header();
        new.extend(headers);

        self.config.http.headers = Some(new);
        self
    }

    /// Add a default http header.
    ///
    /// # Example
    ///
    /// ```
    /// use reqwest::header::{self, HeaderValue};
    /// use trawl::session::SessionManagerBuilder;
    ///
    /// let auth = HeaderValue::from_str("Basic aGk6MTIzNDU2Cg==").expect("Invalid auth");
    ///
    /// let builder = SessionManagerBuilder::new()
    ///     .header(header::USER_AGENT, HeaderValue::from_static("trawl"))
    ///     .header(header::AUTHORIZATION, auth);
    /// ```
    pub fn header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        let mut new = self.new_header();

        new.insert(name, value);

        self.config.http.headers = Some(new);
        self
    }

    /// Create the [`SessionManager`] on the bundled HTTP transport.
    pub fn build(self) -> Result<SessionManager> {
        self.build_with_transport(Arc::new(HttpTransport::new()))
    }

    /// Create the [`SessionManager`] on a custom transport.
    ///
    /// Must be called within a Tokio runtime.
    pub fn build_with_transport(self, transport: Arc<dyn Transport>) -> Result<SessionManager> {
        tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Internal(format!("A session manager needs a Tokio runtime: {}", e)))?;

        let store: Arc<dyn KeyValueStore> = match (self.store, &self.config.kind) {
            (Some(store), _) => store,
            (None, SessionKind::Background { state_dir }) => Arc::new(FileStore::open(state_dir)?),
            (None, SessionKind::Default) => Arc::new(MemoryStore::new()),
        };

        SessionManager::new(
            self.config,
            self.auto_start,
            transport,
            Arc::new(Ledger::new(store)),
        )
    }
}
