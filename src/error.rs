//! Error handling for the trawl library.
//!
//! Terminal download errors are stored on the [`DownloadHandle`] and handed to
//! both the observer and the completion callback, so every variant here is
//! cheap to clone: underlying I/O and client errors are shared through an
//! [`Arc`].
//!
//! [`DownloadHandle`]: crate::download::DownloadHandle

use reqwest::{StatusCode, Url};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::transport::TaskId;

/// Errors that can happen when using trawl.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Failure reported by the transport layer itself (network, TLS, cancellation...).
    ///
    /// Passed through verbatim as the terminal error of a download.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The transfer finished without a transport error but the server answered
    /// with a status outside of `200..300`.
    #[error("Erroneous HTTP status code {status} for {url}")]
    HttpStatus {
        /// The status code of the response.
        status: StatusCode,
        /// The URL of the original request.
        url: Url,
    },

    /// The downloaded file could not be moved to its destination.
    #[error("Unable to move the downloaded file to {destination:?}")]
    Move {
        /// Where the file was supposed to go.
        destination: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    /// No preferred name was given and the server did not suggest one.
    #[error("Cannot resolve a destination for task {task_id}: no file name available")]
    UnresolvableDestination {
        /// The task whose destination was requested.
        task_id: TaskId,
    },

    /// Error from the underlying URL parser or the expected URL format.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The durable key-value store rejected an operation.
    #[error("Store error: {0}")]
    Store(String),

    /// Persisted data could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error from an underlying system.
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O Error.
    #[error("I/O error")]
    IOError {
        #[source]
        source: Arc<io::Error>,
    },

    /// Error from the Reqwest library while building the HTTP client.
    #[error("Reqwest Error")]
    Reqwest {
        #[source]
        source: Arc<reqwest::Error>,
    },
}

impl Error {
    /// Returns `true` if the download ended because it was canceled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Transport(TransportError::Cancelled))
    }

    /// Returns the HTTP status carried by an [`Error::HttpStatus`].
    pub fn http_status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Error::IOError {
            source: Arc::new(source),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(source: reqwest::Error) -> Self {
        Error::Reqwest {
            source: Arc::new(source),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Errors surfaced by a transport session for one of its tasks.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// The task was canceled, with or without producing resume data.
    #[error("The download was cancelled")]
    Cancelled,

    /// The request could not be sent or the body could not be read.
    #[error("Request failed: {0}")]
    Request(String),

    /// Writing the transferred bytes to the temporary location failed.
    #[error("Transfer I/O error")]
    Io {
        #[source]
        source: Arc<io::Error>,
    },

    /// The resume data handed to the session cannot be used.
    #[error("Invalid resume data: {0}")]
    InvalidResumeData(String),
}

impl From<io::Error> for TransportError {
    fn from(source: io::Error) -> Self {
        TransportError::Io {
            source: Arc::new(source),
        }
    }
}

/// Result type alias for operations that can fail with a trawl error.
pub type Result<T> = std::result::Result<T, Error>;
