use thiserror::Error;

use crate::validate::ValidationIssue;

/// Structural problems in the GLB framing. Decoding cannot continue past any of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    #[error("bad magic {found:02x?} (expected \"glTF\")")]
    BadMagic { found: [u8; 4] },

    #[error("unsupported container version {0} (only version 2 is readable)")]
    UnsupportedVersion(u32),

    #[error("container is truncated or corrupt: declared {declared} bytes, found {actual}")]
    TruncatedOrCorrupt { declared: usize, actual: usize },

    #[error("first chunk is not a JSON chunk")]
    MissingJsonChunk,
}

#[derive(Error, Debug)]
pub enum VrmError {
    #[error("malformed container: {0}")]
    ContainerFraming(#[from] FramingError),

    #[error("schema violation at '{path}': expected {expected}, found {actual}")]
    SchemaViolation {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("document failed validation with {} issue(s)", .0.len())]
    Validation(Vec<ValidationIssue>),

    #[error("cannot encode document at '{path}': {message}")]
    EncodingConstraintViolation { path: String, message: String },

    #[error("invalid JSON chunk: {0}")]
    Json(#[from] serde_json::Error),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

impl VrmError {
    pub(crate) fn schema(
        path: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        VrmError::SchemaViolation {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub(crate) fn encoding(path: impl Into<String>, message: impl Into<String>) -> Self {
        VrmError::EncodingConstraintViolation {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T, E = VrmError> = std::result::Result<T, E>;
