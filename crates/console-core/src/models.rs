use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry of a conversation log as replayed by `/poll`.
///
/// `sequence_no` is the stable identity of the entry: a later poll carrying the
/// same number replaces the earlier content instead of appending a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "no")]
    pub sequence_no: u64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub heading: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "temp", default)]
    pub is_temporary: bool,
    #[serde(rename = "kvps", default, skip_serializing_if = "Option::is_none")]
    pub kv_pairs: Option<Map<String, Value>>,
}

impl LogEntry {
    pub fn new(sequence_no: u64, kind: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sequence_no,
            kind: kind.into(),
            heading: String::new(),
            content: content.into(),
            is_temporary: false,
            kv_pairs: None,
        }
    }

    pub fn with_heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = heading.into();
        self
    }

    pub fn temporary(mut self) -> Self {
        self.is_temporary = true;
        self
    }

    pub fn is_user(&self) -> bool {
        self.kind == "user"
    }
}

/// Summary of one conversation known to the backend, as listed by `/poll`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSummary {
    pub id: String,
    #[serde(default)]
    pub no: u64,
    #[serde(default)]
    pub log_guid: String,
    #[serde(default)]
    pub log_version: u64,
    #[serde(default)]
    pub log_length: u64,
    #[serde(default)]
    pub paused: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::Base => "base",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelSize {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tiny" => Ok(Self::Tiny),
            "base" => Ok(Self::Base),
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            other => Err(format!("unknown model size '{other}'")),
        }
    }
}

/// A file sent as a multipart part (message attachment, upload, knowledge import).
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}
