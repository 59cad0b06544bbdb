//! Prescription analysis orchestrator.
//!
//! Single entry point that drives the full pipeline:
//! validate → extract → parse → consolidate → detect → score.
//!
//! Engines come in through trait objects (`PdfBackend`, `OcrEngine`), so the
//! whole pipeline runs against mocks in tests.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::intelligence::{detect_diseases, KnowledgeBase, KnowledgeError};
use crate::models::{AnalysisResult, Document};
use crate::pipeline::extraction::medical_correction::MedicalTermCorrector;
use crate::pipeline::extraction::ocr::{OcrWorker, UnavailableOcrEngine};
use crate::pipeline::extraction::orchestrator::DocumentExtractor;
use crate::pipeline::extraction::pdfium::PdfiumBackend;
use crate::pipeline::extraction::types::{ExtractionResult, OcrEngine};
use crate::pipeline::extraction::ExtractionError;
use crate::pipeline::import::{validate, ValidationError};
use crate::pipeline::structuring::{aggregate_confidence, consolidate_medications, parse_medications};
use crate::pipeline_config::AnalyzerConfig;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that abort one document's analysis.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Document rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("Preprocessing failed: {0}")]
    Preprocess(ExtractionError),

    #[error("OCR engine unavailable: {0}")]
    OcrInit(ExtractionError),

    #[error("OCR recognition failed: {0}")]
    OcrRecognition(ExtractionError),

    #[error("Knowledge base error: {0}")]
    Knowledge(#[from] KnowledgeError),

    #[error("Analysis task failed: {0}")]
    Task(String),
}

impl From<ExtractionError> for AnalysisError {
    fn from(err: ExtractionError) -> Self {
        if err.is_engine_unavailable() {
            Self::OcrInit(err)
        } else if matches!(err, ExtractionError::OcrProcessing(_)) {
            Self::OcrRecognition(err)
        } else {
            Self::Preprocess(err)
        }
    }
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Runs one document at a time through the pipeline.
///
/// Holds the only shared state: the read-only knowledge base and the OCR
/// worker inside the extractor.
pub struct PrescriptionAnalyzer {
    extractor: DocumentExtractor,
    knowledge: Arc<KnowledgeBase>,
}

impl PrescriptionAnalyzer {
    /// Wire an analyzer from parts. The OCR corrector vocabulary is taken
    /// from the knowledge base.
    pub fn new(extractor: DocumentExtractor, knowledge: Arc<KnowledgeBase>) -> Self {
        let corrector = MedicalTermCorrector::new(knowledge.vocabulary());
        Self {
            extractor: extractor.with_corrector(corrector),
            knowledge,
        }
    }

    /// Production wiring: PDFium, Tesseract (when compiled in) and the
    /// bundled or overridden knowledge base.
    ///
    /// Missing PDFium or tessdata does not fail construction; the affected
    /// documents fail individually instead.
    pub fn from_config(config: AnalyzerConfig) -> Result<Self, AnalysisError> {
        let knowledge = Arc::new(KnowledgeBase::load_or_bundled(config.knowledge_dir.as_deref())?);

        let pdf_backend = PdfiumBackend::new().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "PDFium unavailable, PDF documents will fail");
            PdfiumBackend
        });

        let worker = Arc::new(OcrWorker::new(build_ocr_engine(&config)));
        let extractor = DocumentExtractor::new(Box::new(pdf_backend), worker, config);
        Ok(Self::new(extractor, knowledge))
    }

    pub fn config(&self) -> &AnalyzerConfig {
        self.extractor.config()
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    pub fn worker(&self) -> &Arc<OcrWorker> {
        self.extractor.worker()
    }

    /// Full pipeline for one document.
    pub fn analyze(&self, document: &Document) -> Result<AnalysisResult, AnalysisError> {
        let started = Instant::now();
        tracing::info!(
            document_id = %document.id,
            mime_type = %document.mime_type,
            bytes = document.byte_len(),
            "Analysis started"
        );

        let kind = validate(&document.bytes, &document.mime_type, self.config().max_document_bytes)
            .inspect_err(|e| tracing::warn!(document_id = %document.id, error = %e, "Document rejected"))?;

        let extraction = self.extractor.extract(kind, &document.bytes).map_err(|e| {
            tracing::warn!(document_id = %document.id, error = %e, "Extraction failed");
            AnalysisError::from(e)
        })?;

        let result = self.analyze_extraction(document.id, extraction);

        tracing::info!(
            document_id = %document.id,
            method = result.extraction.method.as_str(),
            medications = result.medications.len(),
            diseases = result.diseases.len(),
            confidence = result.confidence.overall,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Analysis complete"
        );
        Ok(result)
    }

    /// Structuring half of the pipeline, from already extracted text.
    pub fn analyze_extraction(&self, document_id: Uuid, extraction: ExtractionResult) -> AnalysisResult {
        let parsed = parse_medications(&extraction.text);
        tracing::debug!(
            document_id = %document_id,
            entries = parsed.entries.len(),
            candidate_lines = parsed.candidate_lines,
            yielded_lines = parsed.yielded_lines,
            "Medication lines parsed"
        );

        let medications = consolidate_medications(parsed.entries);
        let diseases = detect_diseases(&extraction.text, &medications, &self.knowledge);
        let confidence = aggregate_confidence(
            extraction.confidence,
            parsed.candidate_lines,
            parsed.yielded_lines,
            &diseases,
        );

        let result = AnalysisResult {
            id: document_id,
            analyzed_at: Utc::now(),
            extraction,
            medications,
            diseases,
            confidence,
        };

        if result.is_empty() {
            tracing::warn!(
                document_id = %document_id,
                text_length = result.extraction.text.len(),
                "No medications or conditions found"
            );
        }
        result
    }

    /// Run [`analyze`](Self::analyze) on tokio's blocking pool.
    pub async fn analyze_async(self: &Arc<Self>, document: Document) -> Result<AnalysisResult, AnalysisError> {
        let analyzer = Arc::clone(self);
        tokio::task::spawn_blocking(move || analyzer.analyze(&document))
            .await
            .map_err(|e| AnalysisError::Task(e.to_string()))?
    }
}

/// Tesseract when compiled in and its language data is found, otherwise an
/// engine that reports why OCR is unavailable.
fn build_ocr_engine(config: &AnalyzerConfig) -> Box<dyn OcrEngine> {
    #[cfg(feature = "ocr")]
    {
        use crate::pipeline::extraction::ocr::{find_tessdata_dir, TesseractEngine};

        let engine = find_tessdata_dir(config.tessdata_dir.as_deref(), &config.ocr_languages)
            .and_then(|dir| TesseractEngine::new(&dir, &config.ocr_languages));
        match engine {
            Ok(engine) => Box::new(engine),
            Err(e) => {
                tracing::warn!(error = %e, "Tesseract unavailable, image documents will fail");
                Box::new(UnavailableOcrEngine::new(e.to_string()))
            }
        }
    }

    #[cfg(not(feature = "ocr"))]
    {
        let _ = config;
        Box::new(UnavailableOcrEngine::new("built without the `ocr` feature"))
    }
}
