use std::collections::{BTreeSet, HashMap};

use crate::models::{DetectedDisease, DetectionSource, ParsedMedicationEntry};

use super::reference::KnowledgeBase;

/// Fixed score for a condition named in the document itself.
pub const EXPLICIT_CONFIDENCE: f32 = 0.9;

/// Conditions named anywhere in `text`. One detection per disease, with
/// every distinct matched term and the line holding the first hit.
pub fn detect_explicit(text: &str, kb: &KnowledgeBase) -> Vec<DetectedDisease> {
    let mut found = Vec::new();

    for pattern in kb.keyword_patterns() {
        let mut hits = pattern.regex.find_iter(text).peekable();
        let Some(first) = hits.peek().map(|m| m.start()) else {
            continue;
        };
        let matched_terms: BTreeSet<String> = hits.map(|m| m.as_str().to_lowercase()).collect();

        let disease_name = kb
            .disease(&pattern.disease_id)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| pattern.disease_id.clone());

        found.push(DetectedDisease {
            disease_id: pattern.disease_id.clone(),
            disease_name,
            confidence: EXPLICIT_CONFIDENCE,
            matched_terms,
            context: line_containing(text, first).to_string(),
            source: DetectionSource::Explicit,
            related_medications: BTreeSet::new(),
        });
    }

    found
}

/// Conditions implied by prescribed medications. Only generic names are
/// looked up; anything else is logged and skipped.
pub fn detect_from_medications(medications: &[ParsedMedicationEntry], kb: &KnowledgeBase) -> Vec<DetectedDisease> {
    let mut found = Vec::new();

    for med in medications {
        let name = med.normalized_name();
        let mappings = kb.mappings_for(&name);
        if mappings.is_empty() {
            tracing::debug!(medication = %name, "No disease mapping for medication");
            continue;
        }

        for mapping in mappings {
            found.push(DetectedDisease {
                disease_id: mapping.disease_id.clone(),
                disease_name: mapping.disease_name.clone(),
                confidence: mapping.likelihood.clamp(0.0, 1.0),
                matched_terms: BTreeSet::from([name.clone()]),
                context: format!("{} ({})", med.name, mapping.medication_class),
                source: DetectionSource::MedicationInferred,
                related_medications: BTreeSet::from([name.clone()]),
            });
        }
    }

    found
}

/// Explicit and inferred detections merged per disease, highest confidence
/// first (ties broken by id).
pub fn detect_diseases(
    text: &str,
    medications: &[ParsedMedicationEntry],
    kb: &KnowledgeBase,
) -> Vec<DetectedDisease> {
    let explicit = detect_explicit(text, kb);
    let inferred = detect_from_medications(medications, kb);
    tracing::debug!(
        explicit = explicit.len(),
        inferred = inferred.len(),
        "Disease candidates collected"
    );
    merge_detections(explicit.into_iter().chain(inferred))
}

/// One entry per disease id, see [`DetectedDisease::absorb`].
pub fn merge_detections<I>(detections: I) -> Vec<DetectedDisease>
where
    I: IntoIterator<Item = DetectedDisease>,
{
    let mut merged: Vec<DetectedDisease> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for detection in detections {
        match index.get(&detection.disease_id) {
            Some(&pos) => merged[pos].absorb(detection),
            None => {
                index.insert(detection.disease_id.clone(), merged.len());
                merged.push(detection);
            }
        }
    }

    merged.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.disease_id.cmp(&b.disease_id))
    });
    merged
}

fn line_containing(text: &str, offset: usize) -> &str {
    let start = text[..offset].rfind('\n').map_or(0, |i| i + 1);
    let end = text[offset..].find('\n').map_or(text.len(), |i| offset + i);
    text[start..end].trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kb() -> KnowledgeBase {
        KnowledgeBase::bundled().unwrap()
    }

    fn med(name: &str) -> ParsedMedicationEntry {
        ParsedMedicationEntry {
            name: name.into(),
            strength: "5mg".into(),
            ..ParsedMedicationEntry::default()
        }
    }

    #[test]
    fn explicit_type_2_diabetes() {
        let found = detect_diseases("Diagnosis: type 2 diabetes", &[], &kb());
        assert_eq!(found.len(), 1);
        let d = &found[0];
        assert_eq!(d.disease_id, "diabetes");
        assert_eq!(d.source, DetectionSource::Explicit);
        assert!((d.confidence - EXPLICIT_CONFIDENCE).abs() < f32::EPSILON);
        assert!(d.matched_terms.contains("type 2 diabetes"));
        assert_eq!(d.context, "Diagnosis: type 2 diabetes");
    }

    #[test]
    fn explicit_match_is_whole_word() {
        assert!(detect_explicit("Admitted for review", &kb()).is_empty());
        assert!(detect_explicit("goutte", &kb()).is_empty());
        assert_eq!(detect_explicit("k/c/o HTN", &kb())[0].disease_id, "hypertension");
    }

    #[test]
    fn explicit_collects_all_terms_and_first_line() {
        let text = "Clinic notes\nHTN since 2015\nhigh blood pressure poorly controlled";
        let found = detect_explicit(text, &kb());
        let htn = found.iter().find(|d| d.disease_id == "hypertension").unwrap();
        assert_eq!(htn.context, "HTN since 2015");
        assert!(htn.matched_terms.contains("htn"));
        assert!(htn.matched_terms.contains("high blood pressure"));
    }

    #[test]
    fn inferred_from_generic_names() {
        let found = detect_diseases("", &[med("Metformin"), med("Amlodipine")], &kb());
        let ids: Vec<_> = found.iter().map(|d| d.disease_id.as_str()).collect();
        assert!(ids.contains(&"diabetes"));
        assert!(ids.contains(&"hypertension"));

        let diabetes = found.iter().find(|d| d.disease_id == "diabetes").unwrap();
        assert_eq!(diabetes.source, DetectionSource::MedicationInferred);
        assert!(diabetes.related_medications.contains("metformin"));
        assert!(diabetes.context.contains("Biguanide"));
    }

    #[test]
    fn brand_names_are_not_resolved() {
        assert!(detect_from_medications(&[med("Glucophage")], &kb()).is_empty());
    }

    #[test]
    fn explicit_beats_higher_inferred() {
        let explicit = DetectedDisease {
            confidence: 0.6,
            ..detect_explicit("diabetes", &kb()).remove(0)
        };
        let inferred = detect_from_medications(&[med("Metformin")], &kb())
            .into_iter()
            .find(|d| d.disease_id == "diabetes")
            .unwrap();
        assert!((inferred.confidence - 0.95).abs() < 1e-6);

        let merged = merge_detections([explicit, inferred]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source, DetectionSource::Explicit);
        assert!((merged[0].confidence - 0.95).abs() < 1e-6);
        assert!(merged[0].related_medications.contains("metformin"));
    }

    #[test]
    fn one_entry_per_disease_sorted() {
        let meds = [med("Metformin"), med("Glimepiride"), med("Amlodipine"), med("Telmisartan")];
        let found = detect_diseases("Type 2 diabetes, HTN", &meds, &kb());

        let mut ids: Vec<_> = found.iter().map(|d| d.disease_id.clone()).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);

        for pair in found.windows(2) {
            assert!(
                pair[0].confidence > pair[1].confidence
                    || (pair[0].confidence == pair[1].confidence && pair[0].disease_id < pair[1].disease_id)
            );
        }
        assert!(found.iter().all(|d| (0.0..=1.0).contains(&d.confidence)));
    }

    #[test]
    fn detection_is_idempotent() {
        let meds = [med("Metformin"), med("Atorvastatin")];
        let text = "k/c/o diabetes mellitus\nMetformin 500mg BD";
        assert_eq!(detect_diseases(text, &meds, &kb()), detect_diseases(text, &meds, &kb()));
    }

    #[test]
    fn nothing_found_in_plain_text() {
        assert!(detect_diseases("Take 1 tablet twice daily", &[], &kb()).is_empty());
    }

    #[test]
    fn line_containing_edges() {
        let text = "first\nsecond line\nthird";
        assert_eq!(line_containing(text, 0), "first");
        assert_eq!(line_containing(text, 8), "second line");
        assert_eq!(line_containing(text, text.len() - 1), "third");
    }
}
