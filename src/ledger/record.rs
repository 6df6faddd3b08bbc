//! The durable counterpart of a download handle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Snapshot of a download's identity, as persisted in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedRecord {
    /// Task identifier, unique within the session scope.
    #[serde(rename = "taskIdentifier")]
    pub task_id: String,
    /// Session-scope identifier owning the record.
    #[serde(rename = "sessionConfigurationIdentifier")]
    pub scope: String,
    /// Preferred (or resolved) file name.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Destination directory, as a path string.
    #[serde(default)]
    pub directory: Option<String>,
    /// Opaque resume data.
    #[serde(default, with = "base64_blob")]
    pub resume_data: Option<Vec<u8>>,
}

impl ArchivedRecord {
    /// Creates a record without resume data.
    pub fn new(
        task_id: impl Into<String>,
        scope: impl Into<String>,
        file_name: Option<String>,
        directory: Option<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            scope: scope.into(),
            file_name,
            directory,
            resume_data: None,
        }
    }

    /// Attaches resume data to the record.
    pub fn with_resume_data(mut self, resume_data: Option<Vec<u8>>) -> Self {
        self.resume_data = resume_data;
        self
    }
}

impl fmt::Display for ArchivedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec![format!("ArchivedRecord {}", self.task_id)];
        if let Some(name) = &self.file_name {
            parts.push(format!("fileName: {}", name));
        }
        if let Some(dir) = &self.directory {
            parts.push(format!("directory: {}", dir));
        }
        parts.push(format!("has resume data: {}", self.resume_data.is_some()));
        write!(f, "{}", parts.join(" | "))
    }
}

mod base64_blob {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(blob: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match blob {
            Some(bytes) => s.serialize_some(&STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
            .transpose()
    }
}
