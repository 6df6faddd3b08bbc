//! The bundled HTTP transport.
//!
//! This module implements the [`Transport`](crate::transport::Transport)
//! contract on top of reqwest:
//!
//! - [`client`] - the per-session HTTP client: retries, tracing, agent and timeouts
//! - [`session`] - [`HttpTransport`] and [`HttpSession`], the task table and
//!   the persistence of background sessions
//! - [`task`] - [`HttpTask`], the streaming driver of one transfer
//! - [`resume`] - the [`ResumeData`] format produced on cancellation
//!
//! Tasks stream their body to `<temp_dir>/trawl-<session>-<pid>-<seq>-<task>.part`,
//! a name no other session shares even within the same temp directory. A task
//! resumed from [`ResumeData`] asks for the missing bytes with `Range` and
//! `If-Range`; when the server answers with the whole body instead, the
//! partial file is truncated and the transfer starts over.
//!
//! # Examples
//!
//! ## Creating the Client of a Session
//!
//! ```rust
//! use trawl::http::create_http_client;
//! use trawl::session::SessionConfig;
//! use reqwest::header::{HeaderMap, USER_AGENT};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut headers = HeaderMap::new();
//! headers.insert(USER_AGENT, "MyApp/1.0".parse()?);
//!
//! let mut config = SessionConfig::default();
//! config.http.retries = 5;
//! config.http.headers = Some(headers);
//!
//! let client = create_http_client(&config)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Inspecting Resume Data
//!
//! ```rust
//! use trawl::http::ResumeData;
//!
//! let bytes = br#"{"url":"https://example.com/a.iso","partial_path":"/tmp/a.part","offset":10}"#;
//! let data = ResumeData::from_bytes(bytes).unwrap();
//! assert_eq!(data.offset, 10);
//! ```

pub mod client;
pub mod resume;
pub mod session;
pub mod task;

pub use client::{create_http_client, HttpClientConfig};
pub use resume::ResumeData;
pub use session::{HttpSession, HttpTransport};
pub use task::HttpTask;
