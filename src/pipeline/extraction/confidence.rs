use super::types::{ExtractionWarning, OcrPageResult, PdfPageText};

/// Confidence thresholds used by the review UI and pipeline
pub mod thresholds {
    /// Below this: extraction likely failed. Show strong warning.
    pub const VERY_LOW: f32 = 0.30;

    /// Below this: significant uncertainty. Flag all extracted fields.
    pub const LOW: f32 = 0.50;

    /// Below this: some uncertainty. Flag key medical fields.
    pub const MODERATE: f32 = 0.70;

    /// Above this: high confidence. No special flagging.
    pub const HIGH: f32 = 0.85;

    /// Above this: very high confidence. Extracted from digital source.
    pub const VERY_HIGH: f32 = 0.95;
}

/// Blocks under this confidence count as illegible for the handwriting check.
const ILLEGIBLE_BLOCK_CONFIDENCE: f32 = 0.40;

/// Confidence for an embedded PDF text layer: base 0.95, scaled by the share
/// of pages that actually carried text.
pub fn text_layer_confidence(pages: &[PdfPageText]) -> f32 {
    if pages.is_empty() {
        return 0.0;
    }

    let pages_with_text = pages.iter().filter(|p| !p.text.trim().is_empty()).count();
    let ratio = pages_with_text as f32 / pages.len() as f32;
    thresholds::VERY_HIGH * ratio
}

/// Analyze OCR result and generate warnings
pub fn analyze_ocr_quality(result: &OcrPageResult) -> Vec<ExtractionWarning> {
    let mut warnings = Vec::new();

    if result.confidence < thresholds::LOW {
        warnings.push(ExtractionWarning::LowConfidence {
            confidence: result.confidence,
        });
    }

    // Signs of handwriting: majority of blocks below the legibility floor
    if !result.blocks.is_empty() {
        let illegible = result
            .blocks
            .iter()
            .filter(|b| b.confidence < ILLEGIBLE_BLOCK_CONFIDENCE)
            .count();
        if illegible as f64 / result.blocks.len() as f64 > 0.50 {
            warnings.push(ExtractionWarning::HandwritingDetected);
        }
    }

    warnings
}
