//! Resume data and the persisted task table of background sessions.

use crate::error::{Error, Result, TransportError};
use crate::transport::{DownloadRequest, TaskId};

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Url,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// What is needed to continue an interrupted transfer.
///
/// Serialized as JSON; callers should treat the bytes as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeData {
    /// URL of the original request.
    pub url: String,
    /// Headers of the original request.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// File holding the bytes received so far.
    pub partial_path: PathBuf,
    /// Number of bytes in `partial_path`.
    pub offset: u64,
    /// `ETag` or `Last-Modified` of the resource, sent back as `If-Range`.
    #[serde(default)]
    pub validator: Option<String>,
}

impl ResumeData {
    /// Encodes the resume data.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes resume data produced by [`ResumeData::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, TransportError> {
        let data: ResumeData = serde_json::from_slice(bytes)
            .map_err(|e| TransportError::InvalidResumeData(e.to_string()))?;
        data.request()?;
        Ok(data)
    }

    /// Rebuilds the original request.
    pub fn request(&self) -> std::result::Result<DownloadRequest, TransportError> {
        let url = Url::parse(&self.url)
            .map_err(|e| TransportError::InvalidResumeData(format!("{}: {}", self.url, e)))?;
        Ok(DownloadRequest::new(url).with_headers(headers_from_pairs(&self.headers)))
    }
}

/// Flattens headers into string pairs, skipping non-UTF-8 values.
pub(crate) fn headers_to_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

pub(crate) fn headers_from_pairs(pairs: &[(String, String)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }
    headers
}

/// One task of a background session, as persisted between processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PersistedTask {
    pub id: TaskId,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    pub partial_path: PathBuf,
    #[serde(default)]
    pub validator: Option<String>,
    #[serde(default)]
    pub accepts_ranges: bool,
    #[serde(default)]
    pub running: bool,
}

/// Task table of a background session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct TaskTable {
    pub next_id: TaskId,
    pub tasks: Vec<PersistedTask>,
}

impl TaskTable {
    /// Reads the table at `path`. Missing or corrupt tables read as empty.
    pub fn load(path: &Path) -> Self {
        match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!("Ignoring corrupt task table {:?}: {}", path, e);
                TaskTable::default()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => TaskTable::default(),
            Err(e) => {
                tracing::warn!("Cannot read task table {:?}: {}", path, e);
                TaskTable::default()
            }
        }
    }

    /// Writes the table to `path` through a temporary file.
    pub fn store(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        fs::rename(&tmp, path).map_err(Error::from)
    }
}
