use std::sync::Arc;

use image::GrayImage;

use super::confidence::analyze_ocr_quality;
use super::medical_correction::MedicalTermCorrector;
use super::ocr::OcrWorker;
use super::pdf::extract_pdf;
use super::preprocess::{encode_png, preprocess_image};
use super::sanitize::sanitize_extracted_text;
use super::types::{ExtractionMethod, ExtractionResult, ExtractionWarning, PdfBackend};
use super::ExtractionError;
use crate::models::DocumentKind;
use crate::pipeline_config::AnalyzerConfig;

/// Turns validated document bytes into conditioned text.
///
/// Uses trait objects for PDF access and a shared OCR worker, enabling
/// dependency injection.
pub struct DocumentExtractor {
    pdf_backend: Box<dyn PdfBackend + Send + Sync>,
    worker: Arc<OcrWorker>,
    corrector: MedicalTermCorrector,
    config: AnalyzerConfig,
}

impl DocumentExtractor {
    pub fn new(
        pdf_backend: Box<dyn PdfBackend + Send + Sync>,
        worker: Arc<OcrWorker>,
        config: AnalyzerConfig,
    ) -> Self {
        Self {
            pdf_backend,
            worker,
            corrector: MedicalTermCorrector::default(),
            config,
        }
    }

    /// Replace the post-OCR correction vocabulary.
    pub fn with_corrector(mut self, corrector: MedicalTermCorrector) -> Self {
        self.corrector = corrector;
        self
    }

    pub fn worker(&self) -> &Arc<OcrWorker> {
        &self.worker
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn extract(&self, kind: DocumentKind, bytes: &[u8]) -> Result<ExtractionResult, ExtractionError> {
        tracing::debug!(kind = kind.as_str(), bytes = bytes.len(), "Starting text extraction");

        let mut result = match kind {
            DocumentKind::Image => {
                let gray = preprocess_image(bytes, self.config.max_image_dimension)?;
                recognize_bitmap(&self.worker, &gray, ExtractionMethod::Ocr, 1)?
            }
            DocumentKind::Pdf => extract_pdf(bytes, &*self.pdf_backend, &self.worker, &self.config)?,
        };

        result.text = sanitize_extracted_text(&result.text);

        // Fuzzy correction only for OCR output; a text layer is already exact
        if result.method.is_ocr() {
            result.text = self.corrector.correct(&result.text);
        }

        if result.text.is_empty() {
            result.warnings.push(ExtractionWarning::PartialExtraction {
                reason: "No text could be extracted".into(),
            });
        }

        tracing::debug!(
            method = result.method.as_str(),
            pages = result.page_count,
            confidence = result.confidence,
            text_length = result.text.len(),
            warnings = result.warnings.len(),
            "Text extraction complete"
        );

        Ok(result)
    }
}

/// Encode a normalized bitmap and run it through the worker.
/// Initializes the worker on first use.
pub(crate) fn recognize_bitmap(
    worker: &OcrWorker,
    gray: &GrayImage,
    method: ExtractionMethod,
    page_count: usize,
) -> Result<ExtractionResult, ExtractionError> {
    worker.initialize()?;
    let png = encode_png(gray)?;
    let ocr = worker.recognize(&png)?;
    let warnings = analyze_ocr_quality(&ocr);

    Ok(ExtractionResult {
        text: ocr.text,
        confidence: ocr.confidence,
        blocks: ocr.blocks,
        method,
        page_count,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};

    use super::*;
    use crate::pipeline::extraction::ocr::MockOcrEngine;
    use crate::pipeline::extraction::pdfium::MockPdfBackend;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([240, 240, 240])))
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    fn extractor(engine: MockOcrEngine, backend: MockPdfBackend) -> DocumentExtractor {
        DocumentExtractor::new(
            Box::new(backend),
            Arc::new(OcrWorker::new(Box::new(engine))),
            AnalyzerConfig::default(),
        )
    }

    #[test]
    fn extract_image_uses_ocr() {
        let ex = extractor(
            MockOcrEngine::new("Metformin 500mg BD\nAmlodipine 5mg OD", 0.88),
            MockPdfBackend::scanned(0),
        );
        let result = ex.extract(DocumentKind::Image, &png(40, 30)).unwrap();

        assert_eq!(result.method, ExtractionMethod::Ocr);
        assert_eq!(result.page_count, 1);
        assert_eq!(result.blocks.len(), 2);
        assert!(ex.worker().is_ready());
    }

    #[test]
    fn extract_sanitizes_text() {
        let ex = extractor(
            MockOcrEngine::new("  Metformin\x00 500mg  \n\n\n Amlodipine 5mg  ", 0.9),
            MockPdfBackend::scanned(0),
        );
        let result = ex.extract(DocumentKind::Image, &png(10, 10)).unwrap();
        assert_eq!(result.text, "Metformin 500mg\nAmlodipine 5mg");
    }

    #[test]
    fn ocr_text_gets_medical_correction() {
        let ex = extractor(MockOcrEngine::new("Tab Metforrnin 500mg BD", 0.7), MockPdfBackend::scanned(0));
        let result = ex.extract(DocumentKind::Image, &png(10, 10)).unwrap();
        assert_eq!(result.text, "Tab Metformin 500mg BD");
    }

    #[test]
    fn text_layer_is_not_corrected() {
        let layer = "Tab Metforrnin 500mg BD after meals, prescribed by the clinic";
        let ex = extractor(MockOcrEngine::new("", 0.0), MockPdfBackend::with_pages(&[layer]));
        let result = ex.extract(DocumentKind::Pdf, b"%PDF-1.7").unwrap();
        assert_eq!(result.method, ExtractionMethod::PdfTextLayer);
        assert!(result.text.contains("Metforrnin"));
        assert!(!ex.worker().is_ready(), "text layer path must not start OCR");
    }

    #[test]
    fn handwriting_warning_propagates() {
        let engine = MockOcrEngine::new("illegible\nscrawl\nmarks", 0.2);
        let ex = extractor(engine, MockPdfBackend::scanned(0));
        let result = ex.extract(DocumentKind::Image, &png(10, 10)).unwrap();
        assert!(result.warnings.contains(&ExtractionWarning::HandwritingDetected));
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, ExtractionWarning::LowConfidence { .. })));
    }

    #[test]
    fn empty_recognition_is_flagged_not_failed() {
        let ex = extractor(MockOcrEngine::new("", 0.0), MockPdfBackend::scanned(0));
        let result = ex.extract(DocumentKind::Image, &png(10, 10)).unwrap();
        assert!(result.text.is_empty());
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, ExtractionWarning::PartialExtraction { .. })));
    }

    #[test]
    fn engine_init_failure_surfaces() {
        let ex = extractor(MockOcrEngine::failing_init(), MockPdfBackend::scanned(0));
        let err = ex.extract(DocumentKind::Image, &png(10, 10)).unwrap_err();
        assert!(err.is_engine_unavailable());
    }

    #[test]
    fn corrupt_image_is_a_preprocess_error() {
        let ex = extractor(MockOcrEngine::new("x", 0.9), MockPdfBackend::scanned(0));
        let err = ex.extract(DocumentKind::Image, b"\xFF\xD8\xFF\xE0 truncated").unwrap_err();
        assert!(matches!(err, ExtractionError::ImageProcessing(_)));
    }
}
