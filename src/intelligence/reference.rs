use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use regex::Regex;

use super::types::{
    ChronicDisease, DiseaseKeywordEntry, KnowledgeError, KnowledgeSummary, MedicationDiseaseMapping,
};

pub const DISEASES_FILE: &str = "chronic_diseases.json";
pub const KEYWORDS_FILE: &str = "disease_keywords.json";
pub const MEDICATIONS_FILE: &str = "medication_disease_map.json";

const BUNDLED_DISEASES: &str = include_str!("../../resources/chronic_diseases.json");
const BUNDLED_KEYWORDS: &str = include_str!("../../resources/disease_keywords.json");
const BUNDLED_MEDICATIONS: &str = include_str!("../../resources/medication_disease_map.json");

/// Whole-word, case-insensitive matcher for one disease's terms.
#[derive(Debug, Clone)]
pub struct KeywordPattern {
    pub disease_id: String,
    pub regex: Regex,
}

/// Static medical reference data. Loaded once, then shared read-only.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    diseases: Vec<ChronicDisease>,
    keywords: BTreeMap<String, DiseaseKeywordEntry>,
    /// Keyed by lowercase generic name.
    medications: HashMap<String, Vec<MedicationDiseaseMapping>>,
    patterns: Vec<KeywordPattern>,
}

impl KnowledgeBase {
    /// The reference data compiled into the binary.
    pub fn bundled() -> Result<Self, KnowledgeError> {
        Self::from_json(BUNDLED_DISEASES, BUNDLED_KEYWORDS, BUNDLED_MEDICATIONS)
    }

    /// Load the three reference files from `dir`.
    pub fn load(dir: &Path) -> Result<Self, KnowledgeError> {
        let diseases = read_file(dir, DISEASES_FILE)?;
        let keywords = read_file(dir, KEYWORDS_FILE)?;
        let medications = read_file(dir, MEDICATIONS_FILE)?;
        Self::from_json(&diseases, &keywords, &medications)
    }

    /// `dir` when given, the bundled data otherwise.
    pub fn load_or_bundled(dir: Option<&Path>) -> Result<Self, KnowledgeError> {
        match dir {
            Some(dir) => {
                tracing::info!(dir = %dir.display(), "Loading knowledge base override");
                Self::load(dir)
            }
            None => Self::bundled(),
        }
    }

    pub fn from_json(diseases: &str, keywords: &str, medications: &str) -> Result<Self, KnowledgeError> {
        let diseases: Vec<ChronicDisease> = serde_json::from_str(diseases)
            .map_err(|e| KnowledgeError::Parse(DISEASES_FILE.into(), e.to_string()))?;
        let keywords: BTreeMap<String, DiseaseKeywordEntry> = serde_json::from_str(keywords)
            .map_err(|e| KnowledgeError::Parse(KEYWORDS_FILE.into(), e.to_string()))?;
        let raw_medications: HashMap<String, Vec<MedicationDiseaseMapping>> =
            serde_json::from_str(medications)
                .map_err(|e| KnowledgeError::Parse(MEDICATIONS_FILE.into(), e.to_string()))?;

        let known = |id: &str| diseases.iter().any(|d| d.id == id);

        for disease_id in keywords.keys() {
            if !known(disease_id) {
                return Err(KnowledgeError::UnknownDisease {
                    file: KEYWORDS_FILE.into(),
                    disease_id: disease_id.clone(),
                });
            }
        }

        let mut medications = HashMap::with_capacity(raw_medications.len());
        for (name, mappings) in raw_medications {
            for m in &mappings {
                if !known(&m.disease_id) {
                    return Err(KnowledgeError::UnknownDisease {
                        file: MEDICATIONS_FILE.into(),
                        disease_id: m.disease_id.clone(),
                    });
                }
                if !(0.0..=1.0).contains(&m.likelihood) {
                    return Err(KnowledgeError::InvalidLikelihood {
                        medication: name.clone(),
                        disease_id: m.disease_id.clone(),
                        likelihood: m.likelihood,
                    });
                }
            }
            medications.insert(name.trim().to_lowercase(), mappings);
        }

        let patterns = keywords
            .iter()
            .filter_map(|(id, entry)| build_pattern(id, entry).transpose())
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            diseases = diseases.len(),
            keyword_sets = keywords.len(),
            medications = medications.len(),
            "Knowledge base loaded"
        );

        Ok(Self {
            diseases,
            keywords,
            medications,
            patterns,
        })
    }

    pub fn diseases(&self) -> &[ChronicDisease] {
        &self.diseases
    }

    pub fn disease(&self, id: &str) -> Option<&ChronicDisease> {
        self.diseases.iter().find(|d| d.id == id)
    }

    pub fn keywords_for(&self, disease_id: &str) -> Option<&DiseaseKeywordEntry> {
        self.keywords.get(disease_id)
    }

    /// Exact lookup by generic name, case-insensitive.
    pub fn mappings_for(&self, medication: &str) -> &[MedicationDiseaseMapping] {
        self.medications
            .get(&medication.trim().to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn keyword_patterns(&self) -> &[KeywordPattern] {
        &self.patterns
    }

    /// Medication names, disease names and disease terms, for OCR correction.
    pub fn vocabulary(&self) -> Vec<String> {
        let mut words: Vec<String> = self.medications.keys().cloned().collect();
        words.extend(self.diseases.iter().map(|d| d.name.clone()));
        for entry in self.keywords.values() {
            words.extend(entry.all_terms().map(str::to_string));
        }
        words.sort();
        words.dedup();
        words
    }

    pub fn summary(&self) -> KnowledgeSummary {
        KnowledgeSummary {
            diseases: self.diseases.len(),
            keyword_terms: self.keywords.values().map(|k| k.all_terms().count()).sum(),
            medications: self.medications.len(),
            mappings: self.medications.values().map(Vec::len).sum(),
        }
    }
}

fn read_file(dir: &Path, name: &str) -> Result<String, KnowledgeError> {
    let path = dir.join(name);
    std::fs::read_to_string(&path)
        .map_err(|e| KnowledgeError::Load(path.display().to_string(), e.to_string()))
}

/// Longest terms first so a multi-word keyword wins over its own suffix.
fn build_pattern(disease_id: &str, entry: &DiseaseKeywordEntry) -> Result<Option<KeywordPattern>, KnowledgeError> {
    let mut terms: Vec<&str> = entry.all_terms().collect();
    if terms.is_empty() {
        return Ok(None);
    }
    terms.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    terms.dedup();

    let alternation = terms
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    let regex = Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))
        .map_err(|e| KnowledgeError::Pattern(disease_id.to_string(), e.to_string()))?;

    Ok(Some(KeywordPattern {
        disease_id: disease_id.to_string(),
        regex,
    }))
}
