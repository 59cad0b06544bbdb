use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::diagnosis::DetectedDisease;
use super::medication::ParsedMedicationEntry;
use crate::pipeline::extraction::types::ExtractionResult;

/// Aggregate reliability of one analysis. Every field is in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OverallConfidence {
    pub overall: f32,
    pub ocr: f32,
    pub disease_detection: f32,
    pub medication_parsing: f32,
}

/// Everything the review UI receives for one uploaded prescription.
/// Never modified by the pipeline after it is returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub extraction: ExtractionResult,
    pub medications: Vec<ParsedMedicationEntry>,
    pub diseases: Vec<DetectedDisease>,
    pub confidence: OverallConfidence,
}

impl AnalysisResult {
    /// Nothing usable came out of the document. Still a valid result.
    pub fn is_empty(&self) -> bool {
        self.medications.is_empty() && self.diseases.is_empty()
    }
}
