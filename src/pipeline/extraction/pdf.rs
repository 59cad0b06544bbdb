//! Paginated documents: read the embedded text layer when it is usable,
//! otherwise rasterize the first page and OCR it.

use super::confidence::text_layer_confidence;
use super::ocr::OcrWorker;
use super::orchestrator::recognize_bitmap;
use super::preprocess::normalize_bitmap;
use super::types::{
    BoundingBox, ExtractionMethod, ExtractionResult, ExtractionWarning, PdfBackend, PdfPageText,
    TextBlock,
};
use super::ExtractionError;
use crate::pipeline_config::AnalyzerConfig;

/// Outcome of the direct text-layer attempt.
#[derive(Debug)]
pub enum TextLayerOutcome {
    /// Enough text to skip OCR.
    Sufficient(Vec<PdfPageText>),
    /// Too little text, or the layer could not be read.
    Insufficient { reason: String },
}

/// Read the first `max_text_layer_pages` pages and judge whether their
/// combined text clears `min_text_layer_chars`.
pub fn try_direct_text(
    pdf_bytes: &[u8],
    backend: &dyn PdfBackend,
    config: &AnalyzerConfig,
) -> TextLayerOutcome {
    let pages = match backend.extract_text_pages(pdf_bytes, config.max_text_layer_pages) {
        Ok(pages) => pages,
        Err(e) => {
            tracing::warn!(error = %e, "PDF text layer unreadable, falling back to OCR");
            return TextLayerOutcome::Insufficient {
                reason: format!("text layer unreadable: {e}"),
            };
        }
    };

    let chars = join_pages(&pages).trim().chars().count();
    if chars < config.min_text_layer_chars {
        tracing::debug!(
            chars,
            threshold = config.min_text_layer_chars,
            "PDF text layer too short, treating as scan"
        );
        return TextLayerOutcome::Insufficient {
            reason: format!("text layer has {chars} characters"),
        };
    }

    TextLayerOutcome::Sufficient(pages)
}

/// Extract a PDF: text layer first, render-then-OCR of page one as fallback.
pub fn extract_pdf(
    pdf_bytes: &[u8],
    backend: &dyn PdfBackend,
    worker: &OcrWorker,
    config: &AnalyzerConfig,
) -> Result<ExtractionResult, ExtractionError> {
    match try_direct_text(pdf_bytes, backend, config) {
        TextLayerOutcome::Sufficient(pages) => {
            let page_count = backend.page_count(pdf_bytes).unwrap_or(pages.len());
            Ok(text_layer_result(pages, page_count, config.max_text_layer_pages))
        }
        TextLayerOutcome::Insufficient { reason } => {
            tracing::info!(reason = %reason, "Rendering first PDF page for OCR");
            render_and_ocr(pdf_bytes, backend, worker, config)
        }
    }
}

fn render_and_ocr(
    pdf_bytes: &[u8],
    backend: &dyn PdfBackend,
    worker: &OcrWorker,
    config: &AnalyzerConfig,
) -> Result<ExtractionResult, ExtractionError> {
    let page_count = backend.page_count(pdf_bytes)?;
    if page_count == 0 {
        return Err(ExtractionError::EmptyDocument);
    }

    let rendered = backend.render_page(pdf_bytes, 0, config.pdf_render_scale)?;
    let gray = normalize_bitmap(rendered, config.max_image_dimension);
    let mut result = recognize_bitmap(worker, &gray, ExtractionMethod::PdfRenderedOcr, page_count)?;

    if page_count > 1 {
        result.warnings.push(ExtractionWarning::PartialExtraction {
            reason: format!("Only the first of {page_count} scanned pages was recognized"),
        });
    }
    Ok(result)
}

fn text_layer_result(pages: Vec<PdfPageText>, page_count: usize, max_pages: usize) -> ExtractionResult {
    let confidence = text_layer_confidence(&pages);
    let text = join_pages(&pages);

    let blocks = pages
        .iter()
        .filter(|p| !p.text.trim().is_empty())
        .map(|p| TextBlock {
            text: p.text.trim().to_string(),
            confidence,
            bbox: BoundingBox::from_origin_size(0, 0, p.width.max(0.0) as u32, p.height.max(0.0) as u32),
        })
        .collect();

    let mut warnings = Vec::new();
    if page_count > max_pages {
        warnings.push(ExtractionWarning::PartialExtraction {
            reason: format!("Only the first {max_pages} of {page_count} pages were read"),
        });
    }

    ExtractionResult {
        text,
        confidence,
        blocks,
        method: ExtractionMethod::PdfTextLayer,
        page_count,
        warnings,
    }
}

fn join_pages(pages: &[PdfPageText]) -> String {
    pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
