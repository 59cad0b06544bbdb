use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Catalog entry for a chronic condition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChronicDisease {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub common_symptoms: Vec<String>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
}

/// Terms that name a disease in free text (disease_keywords.json, keyed by disease id).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiseaseKeywordEntry {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub abbreviations: Vec<String>,
    #[serde(default)]
    pub related_terms: Vec<String>,
}

impl DiseaseKeywordEntry {
    /// Every searchable term, blanks skipped.
    pub fn all_terms(&self) -> impl Iterator<Item = &str> {
        self.keywords
            .iter()
            .chain(&self.abbreviations)
            .chain(&self.related_terms)
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
    }
}

/// One disease a generic medication points to (medication_disease_map.json,
/// keyed by lowercase generic name).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicationDiseaseMapping {
    pub disease_id: String,
    pub disease_name: String,
    /// Probability-like weight in [0, 1].
    pub likelihood: f32,
    pub medication_class: String,
}

/// Counts shown by `rxlens knowledge`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeSummary {
    pub diseases: usize,
    pub keyword_terms: usize,
    pub medications: usize,
    pub mappings: usize,
}

#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("Knowledge file load failed ({0}): {1}")]
    Load(String, String),

    #[error("Knowledge file parse failed ({0}): {1}")]
    Parse(String, String),

    #[error("{file} references unknown disease '{disease_id}'")]
    UnknownDisease { file: String, disease_id: String },

    #[error("Likelihood {likelihood} for '{medication}' → '{disease_id}' is outside [0, 1]")]
    InvalidLikelihood {
        medication: String,
        disease_id: String,
        likelihood: f32,
    },

    #[error("Keyword pattern for '{0}' failed to compile: {1}")]
    Pattern(String, String),
}
