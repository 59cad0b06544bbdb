//! Bitmap normalization ahead of OCR.
//!
//! Every bitmap, whether decoded from an upload or rasterized from a PDF page,
//! goes through the same steps: bounded downscale, luminance grayscale and a
//! min/max contrast stretch. Uploaded photos get their EXIF orientation
//! applied first.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, ImageOutputFormat, Luma};
use tracing::debug;

use super::ExtractionError;

// ═══════════════════════════════════════════════════════════
// Entry points
// ═══════════════════════════════════════════════════════════

/// Decode an uploaded image and normalize it for recognition.
pub fn preprocess_image(bytes: &[u8], max_dimension: u32) -> Result<GrayImage, ExtractionError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| ExtractionError::ImageProcessing(format!("Image decode failed: {e}")))?;

    let orientation = read_exif_orientation(bytes);
    if orientation != 1 {
        debug!(orientation, "Applying EXIF orientation");
    }
    let oriented = apply_orientation(decoded, orientation);

    Ok(normalize_bitmap(oriented, max_dimension))
}

/// Downscale, grayscale and contrast-stretch an already decoded bitmap.
pub fn normalize_bitmap(img: DynamicImage, max_dimension: u32) -> GrayImage {
    let (w, h) = img.dimensions();
    let (new_w, new_h) = compute_fit_dimensions(w, h, max_dimension);

    let resized = if (new_w, new_h) != (w, h) {
        debug!(
            from = format!("{w}x{h}"),
            to = format!("{new_w}x{new_h}"),
            "Downscaling bitmap"
        );
        img.resize_exact(new_w, new_h, FilterType::Triangle)
    } else {
        img
    };

    contrast_stretch(&to_luminance(&resized))
}

// ═══════════════════════════════════════════════════════════
// Orientation
// ═══════════════════════════════════════════════════════════

/// Read EXIF tag 0x0112 (Orientation) from raw image bytes.
/// Returns 1 (normal) if no EXIF data or tag not present.
///
/// EXIF orientation values:
/// 1 = Normal, 2 = Mirrored, 3 = 180deg, 4 = Flipped V,
/// 5 = Mirrored + 90deg CW, 6 = 90deg CW, 7 = Mirrored + 270deg CW, 8 = 270deg CW
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(r) => r,
        Err(_) => return 1,
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

// ═══════════════════════════════════════════════════════════
// Geometry and pixels
// ═══════════════════════════════════════════════════════════

/// Largest size with the same aspect ratio whose longest edge is at most
/// `max_dimension`. Small images are NOT upscaled.
pub fn compute_fit_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (1, 1);
    }
    let max_dimension = max_dimension.max(1);
    if width.max(height) <= max_dimension {
        return (width, height);
    }

    let scale = max_dimension as f32 / width.max(height) as f32;
    let new_w = ((width as f32 * scale).round() as u32).clamp(1, max_dimension);
    let new_h = ((height as f32 * scale).round() as u32).clamp(1, max_dimension);
    (new_w, new_h)
}

/// Grayscale using ITU-R BT.601 luminance weights.
pub fn to_luminance(img: &DynamicImage) -> GrayImage {
    let rgb = img.to_rgb8();
    let (w, h) = (rgb.width(), rgb.height());
    let mut gray = GrayImage::new(w, h);
    for (x, y, p) in rgb.enumerate_pixels() {
        let luma = 0.299 * p.0[0] as f32 + 0.587 * p.0[1] as f32 + 0.114 * p.0[2] as f32;
        gray.put_pixel(x, y, Luma([luma.round().min(255.0) as u8]));
    }
    gray
}

/// Linearly remap the observed [min, max] intensity range onto [0, 255].
/// A flat image (min == max) is returned unchanged.
pub fn contrast_stretch(gray: &GrayImage) -> GrayImage {
    let (min, max) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));

    if gray.width() == 0 || gray.height() == 0 || min >= max {
        return gray.clone();
    }

    let range = (max - min) as f32;
    let mut out = gray.clone();
    for p in out.pixels_mut() {
        let v = (p.0[0] - min) as f32 * 255.0 / range;
        p.0[0] = v.round().min(255.0) as u8;
    }
    out
}

/// Encode a grayscale bitmap as PNG bytes for the OCR engine.
pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>, ExtractionError> {
    let dynamic = DynamicImage::ImageLuma8(img.clone());
    let mut cursor = Cursor::new(Vec::new());
    dynamic
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}
