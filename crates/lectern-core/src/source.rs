//! Source identity for uploaded files.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from a content hash when deriving an id.
const CONTENT_ID_LEN: usize = 16;

/// Marks content-derived ids so they never parse as numeric.
const CONTENT_ID_PREFIX: &str = "sha256:";

/// Identifier of an uploaded source file.
///
/// Upload handlers usually assign numeric ids; content-derived ids are strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceId {
    Numeric(i64),
    Named(String),
}

impl SourceId {
    /// Parse an id, preferring the numeric form. Returns `None` for blank input.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        Some(match s.parse::<i64>() {
            Ok(n) => SourceId::Numeric(n),
            Err(_) => SourceId::Named(s.to_string()),
        })
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceId::Numeric(n) => write!(f, "{}", n),
            SourceId::Named(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for SourceId {
    fn from(n: i64) -> Self {
        SourceId::Numeric(n)
    }
}

/// Identity of one uploaded file, threaded through every sub-pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: SourceId,
    pub name: String,
}

impl SourceRef {
    pub fn new(id: impl Into<SourceId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Split an upload name of the form `"<id>-<originalName>"`.
    ///
    /// Only the first dash separates the id, so `"7-my-notes.md"` yields
    /// id `7` and name `my-notes.md`.
    pub fn from_upload_name(upload_name: &str) -> Option<Self> {
        let (id, name) = upload_name.split_once('-')?;
        if name.is_empty() {
            return None;
        }
        let id = SourceId::parse(id)?;
        Some(Self {
            id,
            name: name.to_string(),
        })
    }

    /// Derive an id from the file's content hash.
    pub fn from_content(name: impl Into<String>, bytes: &[u8]) -> Self {
        let digest = hex::encode(Sha256::digest(bytes));
        Self {
            id: SourceId::Named(format!("{}{}", CONTENT_ID_PREFIX, &digest[..CONTENT_ID_LEN])),
            name: name.into(),
        }
    }

    /// Use a numeric `"<id>-<name>"` prefix when present, otherwise hash the
    /// content. Plain names like `"intro-notes.md"` are not split.
    pub fn resolve(upload_name: &str, bytes: &[u8]) -> Self {
        match Self::from_upload_name(upload_name) {
            Some(source) if matches!(source.id, SourceId::Numeric(_)) => source,
            _ => Self::from_content(upload_name, bytes),
        }
    }

    /// Name used for intermediate files derived from this source.
    pub fn upload_name(&self) -> String {
        format!("{}-{}", self.id, self.name)
    }
}

/// Caller-supplied context attached to every unit of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
}

impl BatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_course(mut self, course: impl Into<String>) -> Self {
        self.course = Some(course.into());
        self
    }
}
