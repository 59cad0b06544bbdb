use crate::models::{DetectedDisease, OverallConfidence};

/// Combine the three stage scores into an [`OverallConfidence`].
///
/// * `ocr`: the extraction confidence as reported.
/// * `medication_parsing`: yielded / candidate lines, 1.0 without candidates.
/// * `disease_detection`: mean detection confidence, 1.0 without detections.
/// * `overall`: mean of the three.
pub fn aggregate_confidence(
    ocr_confidence: f32,
    candidate_lines: usize,
    yielded_lines: usize,
    diseases: &[DetectedDisease],
) -> OverallConfidence {
    let ocr = clamp_unit(ocr_confidence);

    let medication_parsing = if candidate_lines == 0 {
        1.0
    } else {
        clamp_unit(yielded_lines as f32 / candidate_lines as f32)
    };

    let disease_detection = if diseases.is_empty() {
        1.0
    } else {
        let sum: f32 = diseases.iter().map(|d| clamp_unit(d.confidence)).sum();
        clamp_unit(sum / diseases.len() as f32)
    };

    OverallConfidence {
        overall: clamp_unit((ocr + medication_parsing + disease_detection) / 3.0),
        ocr,
        disease_detection,
        medication_parsing,
    }
}

/// NaN maps to 0.
fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
