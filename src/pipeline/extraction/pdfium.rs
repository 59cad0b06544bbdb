//! PDF access via Google PDFium.
//!
//! Reads embedded text layers and rasterizes pages for OCR.
//!
//! `PdfiumBackend` is stateless (`Send + Sync`). Each operation creates
//! a fresh `Pdfium` instance because the upstream type is `!Send`.
//! The OS caches `dlopen`/`LoadLibrary` calls, so repeat loads are near-free.

use image::{DynamicImage, Rgb, RgbImage};
use pdfium_render::prelude::{PdfDocument, PdfRenderConfig, Pdfium, PdfiumError};
use tracing::{debug, warn};

use super::types::{PdfBackend, PdfPageText};
use super::ExtractionError;

/// Maximum dimension (width or height) for rendered page images.
/// Prevents OOM on extremely large pages or absurd scale settings.
pub const MAX_DIMENSION_PX: u32 = 4096;

/// PDF backend using Google PDFium.
pub struct PdfiumBackend;

impl PdfiumBackend {
    /// Create a new backend, verifying the PDFium library is loadable.
    ///
    /// Discovery order:
    /// 1. `PDFIUM_DYNAMIC_LIB_PATH` env var (explicit path to library file)
    /// 2. Alongside the running executable
    /// 3. System library search paths
    pub fn new() -> Result<Self, ExtractionError> {
        let _ = load_pdfium()?;
        Ok(Self)
    }
}

fn load_pdfium() -> Result<Pdfium, ExtractionError> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "Loading PDFium from env var");
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
            ExtractionError::PdfParsing(format!("Failed to load PDFium from {path}: {e}"))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            let candidates = [exe_dir.to_path_buf(), exe_dir.join("lib"), exe_dir.join("..").join("lib")];

            for dir in &candidates {
                let lib_path =
                    Pdfium::pdfium_platform_library_name_at_path(dir.to_string_lossy().as_ref());
                if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                    debug!(dir = %dir.display(), "Loaded PDFium from candidate directory");
                    return Ok(Pdfium::new(bindings));
                }
            }
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        ExtractionError::PdfParsing(format!(
            "PDFium library not found. Set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

/// Map PDF load errors, surfacing password protection distinctly.
fn map_load_error(e: PdfiumError) -> ExtractionError {
    let lower = format!("{e}").to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        ExtractionError::PdfEncrypted
    } else {
        ExtractionError::PdfParsing(format!("Failed to load PDF: {e}"))
    }
}

fn open<'a>(pdfium: &'a Pdfium, pdf_bytes: &'a [u8]) -> Result<PdfDocument<'a>, ExtractionError> {
    pdfium
        .load_pdf_from_byte_slice(pdf_bytes, None)
        .map_err(map_load_error)
}

/// Pixel dimensions for rendering a page at `scale` times its point size.
///
/// Both sides are clamped to [1, MAX_DIMENSION_PX], preserving aspect ratio
/// when capping.
pub fn compute_render_dimensions(width_points: f32, height_points: f32, scale: f32) -> (u32, u32) {
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

impl PdfBackend for PdfiumBackend {
    fn extract_text_pages(
        &self,
        pdf_bytes: &[u8],
        max_pages: usize,
    ) -> Result<Vec<PdfPageText>, ExtractionError> {
        let pdfium = load_pdfium()?;
        let document = open(&pdfium, pdf_bytes)?;
        let pages = document.pages();

        let count = (pages.len() as usize).min(max_pages);
        let mut out = Vec::with_capacity(count);
        for index in 0..count {
            let page = pages
                .get(index as u16)
                .map_err(|e| ExtractionError::PdfParsing(format!("Page {index}: {e}")))?;
            let text = page
                .text()
                .map_err(|e| ExtractionError::PdfParsing(format!("Page {index} text layer: {e}")))?
                .all();
            out.push(PdfPageText {
                page_number: index + 1,
                text,
                width: page.width().value,
                height: page.height().value,
            });
        }

        debug!(pages = out.len(), "Read PDF text layer");
        Ok(out)
    }

    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
        let pdfium = load_pdfium()?;
        let document = open(&pdfium, pdf_bytes)?;
        Ok(document.pages().len() as usize)
    }

    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        scale: f32,
    ) -> Result<DynamicImage, ExtractionError> {
        let pdfium = load_pdfium()?;
        let document = open(&pdfium, pdf_bytes)?;
        let pages = document.pages();

        if pages.len() == 0 {
            return Err(ExtractionError::EmptyDocument);
        }

        let index = u16::try_from(page_index).map_err(|_| ExtractionError::PdfRendering {
            page: page_index,
            reason: format!("Page index {page_index} exceeds u16 maximum"),
        })?;

        let page = pages.get(index).map_err(|_| ExtractionError::PdfRendering {
            page: page_index,
            reason: format!(
                "Page {page_index} out of range (document has {} pages)",
                pages.len()
            ),
        })?;

        let width_points = page.width().value;
        let height_points = page.height().value;
        let (target_w, target_h) = compute_render_dimensions(width_points, height_points, scale);

        let uncapped_w = (width_points * scale) as u32;
        let uncapped_h = (height_points * scale) as u32;
        if target_w != uncapped_w || target_h != uncapped_h {
            warn!(
                page = page_index,
                raw_width = uncapped_w,
                raw_height = uncapped_h,
                capped_width = target_w,
                capped_height = target_h,
                "Page dimensions capped to {MAX_DIMENSION_PX}px",
            );
        }

        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| ExtractionError::PdfRendering {
                page: page_index,
                reason: format!("Rendering failed: {e}"),
            })?;

        debug!(page = page_index, width = target_w, height = target_h, "Rendered PDF page");
        Ok(bitmap.as_image())
    }
}

// ── Mock for testing ──────────────────────────────────────

/// Mock PDF backend: a fixed list of page texts, blank white renders.
pub struct MockPdfBackend {
    pub pages: Vec<String>,
    pub fail_text_layer: bool,
}

impl MockPdfBackend {
    pub fn with_pages(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
            fail_text_layer: false,
        }
    }

    /// A scanned PDF: pages exist but carry no text layer.
    pub fn scanned(page_count: usize) -> Self {
        Self {
            pages: vec![String::new(); page_count],
            fail_text_layer: false,
        }
    }

    pub fn broken_text_layer(page_count: usize) -> Self {
        Self {
            fail_text_layer: true,
            ..Self::scanned(page_count)
        }
    }
}

impl PdfBackend for MockPdfBackend {
    fn extract_text_pages(
        &self,
        _pdf_bytes: &[u8],
        max_pages: usize,
    ) -> Result<Vec<PdfPageText>, ExtractionError> {
        if self.fail_text_layer {
            return Err(ExtractionError::PdfParsing("mock text layer unreadable".into()));
        }
        Ok(self
            .pages
            .iter()
            .take(max_pages)
            .enumerate()
            .map(|(i, text)| PdfPageText {
                page_number: i + 1,
                text: text.clone(),
                width: 612.0,
                height: 792.0,
            })
            .collect())
    }

    fn page_count(&self, _pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
        Ok(self.pages.len())
    }

    fn render_page(
        &self,
        _pdf_bytes: &[u8],
        page_index: usize,
        scale: f32,
    ) -> Result<DynamicImage, ExtractionError> {
        if self.pages.is_empty() {
            return Err(ExtractionError::EmptyDocument);
        }
        if page_index >= self.pages.len() {
            return Err(ExtractionError::PdfRendering {
                page: page_index,
                reason: format!(
                    "Page {page_index} out of range (mock has {} pages)",
                    self.pages.len()
                ),
            });
        }
        let (w, h) = compute_render_dimensions(61.2, 79.2, scale);
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    // ── Pure dimension logic tests (no PDFium needed) ──

    #[test]
    fn letter_at_double_scale() {
        assert_eq!(compute_render_dimensions(612.0, 792.0, 2.0), (1224, 1584));
    }

    #[test]
    fn a4_at_double_scale() {
        let (w, h) = compute_render_dimensions(595.0, 842.0, 2.0);
        assert_eq!((w, h), (1190, 1684));
    }

    #[test]
    fn dimension_guard_caps_oversized() {
        let (w, h) = compute_render_dimensions(5000.0, 7000.0, 2.0);
        assert!(w <= MAX_DIMENSION_PX, "Width {w} exceeds {MAX_DIMENSION_PX}");
        assert!(h <= MAX_DIMENSION_PX && h >= MAX_DIMENSION_PX - 1, "Height {h}");
        assert!(w >= 1);
    }

    #[test]
    fn dimension_guard_preserves_aspect_ratio() {
        let (w, h) = compute_render_dimensions(5000.0, 10000.0, 2.0);
        let ratio = h as f32 / w as f32;
        assert!((ratio - 2.0).abs() < 0.05, "Aspect ratio should be ~2:1, got {ratio}");
    }

    #[test]
    fn zero_points_clamped_to_1() {
        let (w, h) = compute_render_dimensions(0.0, 0.0, 2.0);
        assert_eq!((w, h), (1, 1));
    }

    #[test]
    fn single_dimension_oversized() {
        let (w, h) = compute_render_dimensions(20000.0, 100.0, 2.0);
        assert!(w <= MAX_DIMENSION_PX && w >= MAX_DIMENSION_PX - 1, "Width {w}");
        assert!(h >= 1);
    }

    // ── Mock backend ──

    #[test]
    fn mock_text_respects_page_limit() {
        let mock = MockPdfBackend::with_pages(&["a", "b", "c"]);
        let pages = mock.extract_text_pages(b"%PDF", 2).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].page_number, 2);
        assert_eq!(mock.page_count(b"%PDF").unwrap(), 3);
    }

    #[test]
    fn mock_render_scales_page() {
        let mock = MockPdfBackend::scanned(1);
        let img = mock.render_page(b"%PDF", 0, 2.0).unwrap();
        assert_eq!(img.dimensions(), (122, 158));
    }

    #[test]
    fn mock_errors_for_out_of_range() {
        let mock = MockPdfBackend::scanned(2);
        let err = mock.render_page(&[], 2, 2.0).unwrap_err();
        assert!(matches!(err, ExtractionError::PdfRendering { page: 2, .. }));
    }

    #[test]
    fn mock_errors_for_zero_pages() {
        let mock = MockPdfBackend::scanned(0);
        assert!(matches!(mock.render_page(&[], 0, 2.0), Err(ExtractionError::EmptyDocument)));
    }
}
