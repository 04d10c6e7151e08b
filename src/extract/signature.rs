//! Byte-signature checks.
//!
//! Extractors call [`check`] before handing bytes to a decoder so that a
//! misnamed file produces a clear error instead of a decoder failure (or a
//! panic deep inside a parsing library).

use notegraph_core::models::ContentType;

use super::ExtractError;

const PDF: &[u8] = b"%PDF-";
const ZIP: &[u8] = b"PK\x03\x04";
const OLE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF];

/// How far into the file `%PDF-` may appear.
const PDF_HEADER_WINDOW: usize = 1024;

/// Validates `bytes` against the format implied by `content_type` and the
/// lowercase extension `ext`. Formats without a known signature pass.
pub fn check(content_type: ContentType, ext: &str, bytes: &[u8]) -> Result<(), ExtractError> {
    let ok = match content_type {
        ContentType::Pdf => is_pdf(bytes),
        ContentType::OfficeDoc | ContentType::OfficeSheet | ContentType::OfficePresentation => {
            match ext {
                "doc" | "xls" | "ppt" => bytes.starts_with(OLE),
                "rtf" => bytes.starts_with(b"{\\rtf"),
                _ => bytes.starts_with(ZIP),
            }
        }
        ContentType::RasterImage => is_image(bytes),
        ContentType::Audio => is_audio(bytes),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(ExtractError::Signature(expected(content_type)))
    }
}

fn expected(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Pdf => "a PDF",
        ContentType::OfficeDoc | ContentType::OfficeSheet | ContentType::OfficePresentation => {
            "an Office document"
        }
        ContentType::RasterImage => "a supported image",
        ContentType::Audio => "a supported audio file",
        _ => "the expected format",
    }
}

pub fn is_pdf(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(PDF_HEADER_WINDOW)];
    window.windows(PDF.len()).any(|w| w == PDF)
}

pub fn is_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP)
}

pub fn is_image(bytes: &[u8]) -> bool {
    bytes.starts_with(PNG)
        || bytes.starts_with(JPEG)
        || bytes.starts_with(b"GIF87a")
        || bytes.starts_with(b"GIF89a")
        || is_riff(bytes, b"WEBP")
        || bytes.starts_with(b"BM")
        || bytes.starts_with(b"II*\0")
        || bytes.starts_with(b"MM\0*")
}

pub fn is_audio(bytes: &[u8]) -> bool {
    bytes.starts_with(b"ID3")
        || is_mpeg_frame(bytes)
        || is_riff(bytes, b"WAVE")
        || bytes.starts_with(b"OggS")
        || bytes.starts_with(b"fLaC")
        || bytes.get(4..8) == Some(b"ftyp".as_slice())
}

fn is_riff(bytes: &[u8], form: &[u8]) -> bool {
    bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(form)
}

/// MPEG audio / ADTS frame sync: eleven set bits.
fn is_mpeg_frame(bytes: &[u8]) -> bool {
    matches!(bytes, [0xFF, b, ..] if b & 0xE0 == 0xE0)
}
