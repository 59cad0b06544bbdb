use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw upload handed to the pipeline. Lives for one analysis call.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub bytes: Vec<u8>,
    /// MIME type as declared by the uploader (not trusted until validated).
    pub mime_type: String,
}

impl Document {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Use a caller-assigned identity instead of a fresh one.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

/// Broad document families the pipeline knows how to read.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Image,
    Pdf,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pdf => "pdf",
        }
    }
}
