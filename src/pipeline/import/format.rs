use crate::models::DocumentKind;

use super::ValidationError;

/// Image MIME types we accept. Everything here has a decoder enabled in Cargo.toml.
pub const ACCEPTED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/bmp",
    "image/tiff",
];

/// The single paginated format we accept.
pub const PDF_MIME: &str = "application/pdf";

/// Lowercase the MIME type and drop parameters (`; charset=...`).
pub fn normalize_mime(declared: &str) -> String {
    declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Map a declared MIME type onto a document family, if allowed.
pub fn classify_mime(declared: &str) -> Option<DocumentKind> {
    let mime = normalize_mime(declared);
    if mime == PDF_MIME {
        Some(DocumentKind::Pdf)
    } else if ACCEPTED_IMAGE_TYPES.contains(&mime.as_str()) {
        Some(DocumentKind::Image)
    } else {
        None
    }
}

/// Detect the document family from magic bytes (NOT the declared type).
pub fn sniff_kind(bytes: &[u8]) -> Option<(DocumentKind, &'static str)> {
    match bytes {
        // PDF: starts with %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => Some((DocumentKind::Pdf, "application/pdf")),
        // JPEG: starts with FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some((DocumentKind::Image, "image/jpeg")),
        // PNG: starts with 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some((DocumentKind::Image, "image/png")),
        // TIFF: little-endian (49 49 2A 00) or big-endian (4D 4D 00 2A)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => {
            Some((DocumentKind::Image, "image/tiff"))
        }
        // WEBP: RIFF....WEBP
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => {
            Some((DocumentKind::Image, "image/webp"))
        }
        // BMP: starts with BM
        [b'B', b'M', ..] => Some((DocumentKind::Image, "image/bmp")),
        _ => None,
    }
}

/// Policy check run before any decoding.
///
/// Order: emptiness, size ceiling, declared type allow-list, then a magic-byte
/// cross-check so a mislabeled or hostile upload never reaches a decoder.
pub fn validate(
    bytes: &[u8],
    declared_type: &str,
    max_bytes: usize,
) -> Result<DocumentKind, ValidationError> {
    if bytes.is_empty() {
        return Err(ValidationError::Empty);
    }

    if bytes.len() > max_bytes {
        return Err(ValidationError::TooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }

    let declared_kind = classify_mime(declared_type)
        .ok_or_else(|| ValidationError::UnsupportedType(normalize_mime(declared_type)))?;

    match sniff_kind(bytes) {
        Some((kind, _)) if kind == declared_kind => Ok(declared_kind),
        Some((_, detected)) => Err(ValidationError::ContentMismatch {
            declared: normalize_mime(declared_type),
            detected,
        }),
        None => Err(ValidationError::ContentMismatch {
            declared: normalize_mime(declared_type),
            detected: "unknown",
        }),
    }
}
