pub mod types;
pub mod confidence;
pub mod sanitize;
pub mod preprocess;
pub mod pdf;
pub mod pdfium;
pub mod ocr;
pub mod medical_correction;
pub mod orchestrator;

pub use types::*;
pub use confidence::*;
pub use sanitize::*;
pub use preprocess::*;
pub use pdf::*;
pub use ocr::*;
pub use orchestrator::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Tesseract OCR initialization failed: {0}")]
    OcrInit(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("OCR worker is not initialized")]
    OcrNotReady,

    #[error("Tessdata not found at: {0}")]
    TessdataNotFound(PathBuf),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("PDF page {page} rendering failed: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("PDF is password-protected")]
    PdfEncrypted,

    #[error("PDF has no pages")]
    EmptyDocument,

    #[error("Image processing error: {0}")]
    ImageProcessing(String),
}

impl ExtractionError {
    /// Errors that mean the OCR worker itself is unusable (not just this document).
    pub fn is_engine_unavailable(&self) -> bool {
        matches!(
            self,
            Self::OcrInit(_) | Self::OcrNotReady | Self::TessdataNotFound(_)
        )
    }
}
