use image::DynamicImage;
use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// Text recovered from one document, with per-block confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: String,
    /// Document-level confidence in [0, 1].
    pub confidence: f32,
    pub blocks: Vec<TextBlock>,
    pub method: ExtractionMethod,
    pub page_count: usize,
    pub warnings: Vec<ExtractionWarning>,
}

/// How text was extracted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Embedded PDF text objects read directly.
    PdfTextLayer,
    /// Raster image through OCR.
    Ocr,
    /// First PDF page rasterized, then OCR.
    PdfRenderedOcr,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PdfTextLayer => "pdf_text_layer",
            Self::Ocr => "ocr",
            Self::PdfRenderedOcr => "pdf_rendered_ocr",
        }
    }

    pub fn is_ocr(&self) -> bool {
        matches!(self, Self::Ocr | Self::PdfRenderedOcr)
    }
}

/// A spatially bounded region of recognized text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Rectangle in source-image pixel coordinates (PDF points for text layers).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoundingBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl BoundingBox {
    /// Build from a top-left corner plus size, as OCR engines report it.
    pub fn from_origin_size(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x0: x,
            y0: y,
            x1: x.saturating_add(width),
            y1: y.saturating_add(height),
        }
    }

    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }
}

/// Warnings about extraction quality
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ExtractionWarning {
    LowConfidence { confidence: f32 },
    HandwritingDetected,
    PartialExtraction { reason: String },
}

/// Raw OCR result from the engine
#[derive(Debug, Clone)]
pub struct OcrPageResult {
    pub text: String,
    pub confidence: f32,
    pub blocks: Vec<TextBlock>,
}

/// OCR engine abstraction (allows mocking for tests).
///
/// Engines are stateful: `initialize` acquires the expensive recognizer,
/// `terminate` releases it. Callers never share one engine across threads
/// without serialization; see `OcrWorker`.
pub trait OcrEngine: Send {
    fn initialize(&mut self) -> Result<(), ExtractionError>;

    /// Recognize an encoded (PNG) bitmap.
    fn recognize(&mut self, image_png: &[u8]) -> Result<OcrPageResult, ExtractionError>;

    fn terminate(&mut self);
}

/// Text layer of one PDF page.
#[derive(Debug, Clone)]
pub struct PdfPageText {
    pub page_number: usize,
    pub text: String,
    /// Page size in PDF points.
    pub width: f32,
    pub height: f32,
}

/// PDF access abstraction: text-layer reads and page rasterization.
pub trait PdfBackend {
    /// Text layer of at most `max_pages` leading pages.
    fn extract_text_pages(
        &self,
        pdf_bytes: &[u8],
        max_pages: usize,
    ) -> Result<Vec<PdfPageText>, ExtractionError>;

    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError>;

    /// Rasterize one page (0-based) at `scale` times its natural size.
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        scale: f32,
    ) -> Result<DynamicImage, ExtractionError>;
}
