pub mod import; // Document validation (type, size, magic bytes)
pub mod extraction; // Preprocessing, PDF strategy, OCR
pub mod structuring; // Medication line parsing + consolidation + scoring
pub mod processor; // End-to-end prescription analysis
