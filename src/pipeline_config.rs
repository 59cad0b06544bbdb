//! Analyzer policy configuration.
//!
//! Every threshold the pipeline applies lives here: document size policy,
//! image normalization bounds, the PDF text-layer vs render decision and
//! OCR language selection. Defaults are the reference policy; each value can
//! be overridden from the environment at startup.

use std::path::PathBuf;

use serde::Serialize;

// ═══════════════════════════════════════════════════════════
// Reference policy
// ═══════════════════════════════════════════════════════════

/// 10 MB upload ceiling.
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

/// Longest image edge handed to OCR.
pub const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 2000;

/// Text layers shorter than this (after trimming) are treated as scans.
pub const DEFAULT_MIN_TEXT_LAYER_CHARS: usize = 50;

/// Only the first pages of a PDF are read for their text layer.
pub const DEFAULT_MAX_TEXT_LAYER_PAGES: usize = 5;

/// Upscale factor when rasterizing a PDF page for OCR.
pub const DEFAULT_PDF_RENDER_SCALE: f32 = 2.0;

pub const DEFAULT_OCR_LANGUAGES: &str = "eng";

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzerConfig {
    /// Documents larger than this are rejected before decoding.
    pub max_document_bytes: usize,
    /// Neither image dimension exceeds this after preprocessing.
    pub max_image_dimension: u32,
    pub min_text_layer_chars: usize,
    pub max_text_layer_pages: usize,
    pub pdf_render_scale: f32,
    /// Tesseract language spec, e.g. `eng` or `eng+fra`.
    pub ocr_languages: String,
    /// Explicit tessdata directory. `None` = discover at startup.
    pub tessdata_dir: Option<PathBuf>,
    /// Knowledge-base override directory. `None` = bundled data.
    pub knowledge_dir: Option<PathBuf>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            max_image_dimension: DEFAULT_MAX_IMAGE_DIMENSION,
            min_text_layer_chars: DEFAULT_MIN_TEXT_LAYER_CHARS,
            max_text_layer_pages: DEFAULT_MAX_TEXT_LAYER_PAGES,
            pdf_render_scale: DEFAULT_PDF_RENDER_SCALE,
            ocr_languages: DEFAULT_OCR_LANGUAGES.to_string(),
            tessdata_dir: None,
            knowledge_dir: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Derivation
// ═══════════════════════════════════════════════════════════

impl AnalyzerConfig {
    /// Defaults overridden by `RXLENS_*` variables and `TESSDATA_PREFIX`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values are logged
    /// and the default is kept.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, "RXLENS_MAX_DOCUMENT_BYTES") {
            config.max_document_bytes = v;
        }
        if let Some(v) = parse_var::<u32, _>(&lookup, "RXLENS_MAX_IMAGE_DIMENSION") {
            if v > 0 {
                config.max_image_dimension = v;
            } else {
                tracing::warn!("Ignoring zero RXLENS_MAX_IMAGE_DIMENSION");
            }
        }
        if let Some(v) = parse_var(&lookup, "RXLENS_MIN_TEXT_LAYER_CHARS") {
            config.min_text_layer_chars = v;
        }
        if let Some(v) = parse_var(&lookup, "RXLENS_MAX_TEXT_LAYER_PAGES") {
            config.max_text_layer_pages = v;
        }
        if let Some(v) = parse_var::<f32, _>(&lookup, "RXLENS_PDF_RENDER_SCALE") {
            if v > 0.0 && v.is_finite() {
                config.pdf_render_scale = v;
            } else {
                tracing::warn!(value = v, "Ignoring non-positive RXLENS_PDF_RENDER_SCALE");
            }
        }
        if let Some(langs) = lookup("RXLENS_OCR_LANGUAGES").filter(|s| !s.trim().is_empty()) {
            config.ocr_languages = langs.trim().to_string();
        }
        if let Some(dir) = lookup("TESSDATA_PREFIX").filter(|s| !s.trim().is_empty()) {
            config.tessdata_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup("RXLENS_KNOWLEDGE_DIR").filter(|s| !s.trim().is_empty()) {
            config.knowledge_dir = Some(PathBuf::from(dir));
        }

        config
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable configuration value");
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_reference_policy() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.max_document_bytes, 10 * 1024 * 1024);
        assert_eq!(config.max_image_dimension, 2000);
        assert_eq!(config.min_text_layer_chars, 50);
        assert_eq!(config.max_text_layer_pages, 5);
        assert!((config.pdf_render_scale - 2.0).abs() < f32::EPSILON);
        assert_eq!(config.ocr_languages, "eng");
        assert!(config.tessdata_dir.is_none());
        assert!(config.knowledge_dir.is_none());
    }

    #[test]
    fn empty_lookup_yields_defaults() {
        let config = AnalyzerConfig::from_lookup(|_| None);
        assert_eq!(config.max_document_bytes, DEFAULT_MAX_DOCUMENT_BYTES);
        assert_eq!(config.ocr_languages, DEFAULT_OCR_LANGUAGES);
    }

    #[test]
    fn overrides_are_applied() {
        let config = AnalyzerConfig::from_lookup(lookup_from(&[
            ("RXLENS_MAX_DOCUMENT_BYTES", "2048"),
            ("RXLENS_MAX_IMAGE_DIMENSION", "1500"),
            ("RXLENS_MIN_TEXT_LAYER_CHARS", "80"),
            ("RXLENS_MAX_TEXT_LAYER_PAGES", "3"),
            ("RXLENS_PDF_RENDER_SCALE", "3.0"),
            ("RXLENS_OCR_LANGUAGES", "eng+fra"),
            ("TESSDATA_PREFIX", "/opt/tessdata"),
            ("RXLENS_KNOWLEDGE_DIR", "/etc/rxlens/kb"),
        ]));
        assert_eq!(config.max_document_bytes, 2048);
        assert_eq!(config.max_image_dimension, 1500);
        assert_eq!(config.min_text_layer_chars, 80);
        assert_eq!(config.max_text_layer_pages, 3);
        assert!((config.pdf_render_scale - 3.0).abs() < f32::EPSILON);
        assert_eq!(config.ocr_languages, "eng+fra");
        assert_eq!(config.tessdata_dir, Some(PathBuf::from("/opt/tessdata")));
        assert_eq!(config.knowledge_dir, Some(PathBuf::from("/etc/rxlens/kb")));
    }

    #[test]
    fn zero_image_dimension_keeps_default() {
        let config = AnalyzerConfig::from_lookup(lookup_from(&[("RXLENS_MAX_IMAGE_DIMENSION", "0")]));
        assert_eq!(config.max_image_dimension, DEFAULT_MAX_IMAGE_DIMENSION);
    }

    #[test]
    fn unparseable_values_keep_defaults() {
        let config = AnalyzerConfig::from_lookup(lookup_from(&[
            ("RXLENS_MAX_DOCUMENT_BYTES", "ten megabytes"),
            ("RXLENS_PDF_RENDER_SCALE", "-1"),
            ("RXLENS_OCR_LANGUAGES", "   "),
        ]));
        assert_eq!(config.max_document_bytes, DEFAULT_MAX_DOCUMENT_BYTES);
        assert!((config.pdf_render_scale - DEFAULT_PDF_RENDER_SCALE).abs() < f32::EPSILON);
        assert_eq!(config.ocr_languages, DEFAULT_OCR_LANGUAGES);
    }

    #[test]
    fn config_serializes() {
        let json = serde_json::to_string(&AnalyzerConfig::default()).unwrap();
        assert!(json.contains("\"max_document_bytes\":10485760"));
        assert!(json.contains("\"ocr_languages\":\"eng\""));
    }
}
