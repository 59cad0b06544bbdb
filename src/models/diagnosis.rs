use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Where a condition candidate came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DetectionSource {
    /// The condition is named in the document text.
    #[serde(rename = "explicit")]
    Explicit,
    /// The condition is implied by a prescribed medication.
    #[serde(rename = "medication-inferred")]
    MedicationInferred,
}

impl DetectionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::MedicationInferred => "medication-inferred",
        }
    }
}

/// A chronic-condition candidate with provenance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectedDisease {
    pub disease_id: String,
    pub disease_name: String,
    pub confidence: f32,
    pub matched_terms: BTreeSet<String>,
    /// Excerpt that triggered the detection.
    pub context: String,
    pub source: DetectionSource,
    pub related_medications: BTreeSet<String>,
}

impl DetectedDisease {
    /// Fold another detection of the same disease into this one.
    ///
    /// Higher confidence wins, term and medication sets are unioned, and an
    /// explicit mention outranks an inferred one regardless of score.
    pub fn absorb(&mut self, other: DetectedDisease) {
        debug_assert_eq!(self.disease_id, other.disease_id);

        let other_is_explicit = other.source == DetectionSource::Explicit;
        let self_is_explicit = self.source == DetectionSource::Explicit;

        if (other_is_explicit && !self_is_explicit)
            || (other_is_explicit == self_is_explicit && other.confidence > self.confidence)
        {
            self.context = other.context;
        }
        if other_is_explicit {
            self.source = DetectionSource::Explicit;
        }

        self.confidence = self.confidence.max(other.confidence);
        self.matched_terms.extend(other.matched_terms);
        self.related_medications.extend(other.related_medications);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(source: DetectionSource, confidence: f32, term: &str, med: Option<&str>) -> DetectedDisease {
        DetectedDisease {
            disease_id: "diabetes".into(),
            disease_name: "Type 2 Diabetes".into(),
            confidence,
            matched_terms: BTreeSet::from([term.to_string()]),
            context: format!("{} context", source.as_str()),
            source,
            related_medications: med.map(|m| BTreeSet::from([m.to_string()])).unwrap_or_default(),
        }
    }

    #[test]
    fn explicit_source_wins_with_higher_inferred_score() {
        let mut explicit = detection(DetectionSource::Explicit, 0.6, "diabetes", None);
        explicit.absorb(detection(DetectionSource::MedicationInferred, 0.95, "metformin", Some("metformin")));

        assert_eq!(explicit.source, DetectionSource::Explicit);
        assert!((explicit.confidence - 0.95).abs() < f32::EPSILON);
        assert_eq!(explicit.context, "explicit context");
        assert!(explicit.matched_terms.contains("diabetes"));
        assert!(explicit.matched_terms.contains("metformin"));
        assert!(explicit.related_medications.contains("metformin"));
    }

    #[test]
    fn inferred_absorbing_explicit_becomes_explicit() {
        let mut inferred = detection(DetectionSource::MedicationInferred, 0.95, "metformin", Some("metformin"));
        inferred.absorb(detection(DetectionSource::Explicit, 0.6, "dm", None));

        assert_eq!(inferred.source, DetectionSource::Explicit);
        assert!((inferred.confidence - 0.95).abs() < f32::EPSILON);
        assert_eq!(inferred.context, "explicit context");
    }

    #[test]
    fn same_source_keeps_max_confidence() {
        let mut a = detection(DetectionSource::MedicationInferred, 0.7, "glipizide", Some("glipizide"));
        a.absorb(detection(DetectionSource::MedicationInferred, 0.9, "metformin", Some("metformin")));
        assert!((a.confidence - 0.9).abs() < f32::EPSILON);
        assert_eq!(a.related_medications.len(), 2);
    }

    #[test]
    fn source_serializes_with_hyphen() {
        assert_eq!(
            serde_json::to_string(&DetectionSource::MedicationInferred).unwrap(),
            "\"medication-inferred\""
        );
        assert_eq!(serde_json::to_string(&DetectionSource::Explicit).unwrap(), "\"explicit\"");
    }
}
