//! Value types shared between the session engine and transports.

use reqwest::{header::HeaderMap, StatusCode, Url};
use std::fmt;

/// Identifier of a task within its session.
pub type TaskId = u64;

/// State of a transport task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Transferring, or about to.
    Running,
    /// Paused, or created but not started yet.
    Suspended,
    /// Cancellation requested, terminal callback pending.
    Canceling,
    /// Terminal.
    Completed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Running => "running",
            TaskState::Suspended => "suspended",
            TaskState::Canceling => "canceling",
            TaskState::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// A GET request for a download.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// URL of the resource.
    pub url: Url,
    /// Extra headers sent with the request.
    pub headers: HeaderMap,
}

impl DownloadRequest {
    /// Creates a request without extra headers.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            headers: HeaderMap::new(),
        }
    }

    /// Adds headers to the request.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }
}

impl From<Url> for DownloadRequest {
    fn from(url: Url) -> Self {
        DownloadRequest::new(url)
    }
}

/// What a new task is created from.
#[derive(Debug, Clone)]
pub enum TaskSource {
    /// A plain URL.
    Url(Url),
    /// A request with custom headers.
    Request(DownloadRequest),
    /// Resume data produced by an earlier cancellation.
    ResumeData(Vec<u8>),
}

impl From<Url> for TaskSource {
    fn from(url: Url) -> Self {
        TaskSource::Url(url)
    }
}

impl From<DownloadRequest> for TaskSource {
    fn from(request: DownloadRequest) -> Self {
        TaskSource::Request(request)
    }
}

/// Response metadata of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Final URL, after redirects.
    pub url: Url,
    /// File name suggested by the server.
    pub suggested_filename: Option<String>,
    /// Expected size of the full resource, if known.
    pub content_length: Option<u64>,
}

impl TransportResponse {
    /// Returns `true` if the status is in `200..300`.
    pub fn is_acceptable(&self) -> bool {
        is_acceptable_status(self.status)
    }
}

/// Acceptable statuses are `200..300`.
pub fn is_acceptable_status(status: StatusCode) -> bool {
    (200..300).contains(&status.as_u16())
}
