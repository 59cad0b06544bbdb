pub mod format;

pub use format::*;

use thiserror::Error;

/// Rejections raised before any decoding work happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Document is empty")]
    Empty,

    #[error("Unsupported document type: {0}")]
    UnsupportedType(String),

    #[error("Document is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("Declared type {declared} does not match document content ({detected})")]
    ContentMismatch {
        declared: String,
        detected: &'static str,
    },
}
