//! Byte-level helpers: text decoding and image sniffing.

use std::borrow::Cow;

/// Decode bytes to a string, handling various encodings.
///
/// This function:
/// 1. First tries UTF-8 (a BOM is honored by encoding_rs)
/// 2. If malformed, tries the hint encoding (from `<meta charset>`)
/// 3. Falls back to Windows-1252
///
/// Uses `Cow<str>` to avoid allocation when the input is valid UTF-8.
///
/// ```ignore
/// assert_eq!(decode_text("Hello".as_bytes(), None), "Hello");
/// ```
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Extract the charset label from a `<meta charset="...">` or
/// `<meta http-equiv="Content-Type" content="...; charset=...">` near the top
/// of an HTML page.
pub fn extract_meta_charset(bytes: &[u8]) -> Option<&str> {
    // Browsers only prescan the first 1024 bytes
    let prefix = &bytes[..bytes.len().min(1024)];

    let pos = prefix
        .windows(8)
        .position(|w| w.eq_ignore_ascii_case(b"charset="))?;
    let mut rest = &prefix[pos + 8..];

    if let Some(&quote) = rest.first()
        && (quote == b'"' || quote == b'\'')
    {
        rest = &rest[1..];
    }
    let end = rest
        .iter()
        .position(|&b| matches!(b, b'"' | b'\'' | b';' | b'>' | b'/') || b.is_ascii_whitespace())
        .unwrap_or(rest.len());

    let label = std::str::from_utf8(&rest[..end]).ok()?;
    (!label.is_empty()).then_some(label)
}

// ============================================================================
// Image Sniffing
// ============================================================================

/// Extract image dimensions from raw image data.
///
/// Supports PNG, JPEG, GIF and WebP by parsing header bytes.
/// Returns `(width, height)` or `None` if the format is unrecognized.
pub fn extract_image_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 10 {
        return None;
    }

    // PNG: width/height in the IHDR chunk
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        if data.len() < 24 {
            return None;
        }
        let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
        let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
        return Some((width, height));
    }

    if data.starts_with(&[0xFF, 0xD8]) {
        return extract_jpeg_dimensions(data);
    }

    // GIF: little-endian logical screen size
    if data.starts_with(b"GIF") {
        let width = u16::from_le_bytes([data[6], data[7]]) as u32;
        let height = u16::from_le_bytes([data[8], data[9]]) as u32;
        return Some((width, height));
    }

    if data.len() >= 30 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return extract_webp_dimensions(data);
    }

    None
}

/// Extract dimensions from JPEG data by walking to the first SOF marker.
fn extract_jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let mut i = 2;
    while i + 4 < data.len() {
        if data[i] != 0xFF {
            i += 1;
            continue;
        }

        let marker = data[i + 1];
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof && i + 9 < data.len() {
            let height = u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32;
            let width = u16::from_be_bytes([data[i + 7], data[i + 8]]) as u32;
            return Some((width, height));
        }

        let length = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        i += 2 + length;
    }
    None
}

fn extract_webp_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    match &data[12..16] {
        b"VP8X" => {
            let w = u32::from_le_bytes([data[24], data[25], data[26], 0]) + 1;
            let h = u32::from_le_bytes([data[27], data[28], data[29], 0]) + 1;
            Some((w, h))
        }
        b"VP8 " => {
            let w = u16::from_le_bytes([data[26], data[27]]) & 0x3FFF;
            let h = u16::from_le_bytes([data[28], data[29]]) & 0x3FFF;
            Some((w as u32, h as u32))
        }
        b"VP8L" => {
            let bits = u32::from_le_bytes([data[21], data[22], data[23], data[24]]);
            Some(((bits & 0x3FFF) + 1, ((bits >> 14) & 0x3FFF) + 1))
        }
        _ => None,
    }
}

/// Image formats the converter recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Svg,
    WebP,
    Bmp,
}

impl ImageFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Svg => "image/svg+xml",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Bmp => "image/bmp",
        }
    }
}

/// Detect an image format from magic bytes, then from the path's extension.
pub fn detect_image_format(path: &str, data: &[u8]) -> Option<ImageFormat> {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(ImageFormat::Jpeg);
    }
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        return Some(ImageFormat::Png);
    }
    if data.starts_with(b"GIF8") {
        return Some(ImageFormat::Gif);
    }
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some(ImageFormat::WebP);
    }
    if data.starts_with(b"BM") {
        return Some(ImageFormat::Bmp);
    }

    let path = path
        .split(['?', '#'])
        .next()
        .unwrap_or(path)
        .to_ascii_lowercase();
    let ext = path.rsplit('.').next().unwrap_or("");
    match ext {
        "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
        "png" => Some(ImageFormat::Png),
        "gif" => Some(ImageFormat::Gif),
        "svg" => Some(ImageFormat::Svg),
        "webp" => Some(ImageFormat::WebP),
        "bmp" => Some(ImageFormat::Bmp),
        _ => None,
    }
}

/// MIME type of image data, or `None` when it is not a known image.
pub fn detect_mime_type(path: &str, data: &[u8]) -> Option<&'static str> {
    detect_image_format(path, data).map(ImageFormat::mime_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_header(w: u32, h: u32) -> Vec<u8> {
        let mut data = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        data.extend_from_slice(&[0, 0, 0, 13]);
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&w.to_be_bytes());
        data.extend_from_slice(&h.to_be_bytes());
        data.extend_from_slice(&[8, 6, 0, 0, 0]);
        data
    }

    #[test]
    fn test_decode_utf8() {
        assert_eq!(decode_text("héllo".as_bytes(), None), "héllo");
    }

    #[test]
    fn test_decode_with_hint_and_fallback() {
        let bytes = [0x63, 0x61, 0x66, 0xE9]; // "café" in latin1
        assert_eq!(decode_text(&bytes, Some("iso-8859-1")), "café");
        assert_eq!(decode_text(&bytes, None), "café");
    }

    #[test]
    fn test_extract_meta_charset() {
        assert_eq!(
            extract_meta_charset(br#"<html><head><meta charset="gbk"></head>"#),
            Some("gbk")
        );
        assert_eq!(
            extract_meta_charset(
                br#"<meta http-equiv="Content-Type" content="text/html; charset=shift_jis">"#
            ),
            Some("shift_jis")
        );
        assert_eq!(extract_meta_charset(b"<html></html>"), None);
    }

    #[test]
    fn test_png_dimensions() {
        assert_eq!(extract_image_dimensions(&png_header(640, 480)), Some((640, 480)));
    }

    #[test]
    fn test_gif_dimensions() {
        let mut gif = b"GIF89a".to_vec();
        gif.extend_from_slice(&[0x20, 0x00, 0x10, 0x00]);
        assert_eq!(extract_image_dimensions(&gif), Some((32, 16)));
    }

    #[test]
    fn test_unknown_data_has_no_dimensions() {
        assert_eq!(extract_image_dimensions(b"not an image at all"), None);
    }

    #[test]
    fn test_detect_mime_type() {
        assert_eq!(detect_mime_type("x.bin", &png_header(1, 1)), Some("image/png"));
        assert_eq!(detect_mime_type("photo.JPG?w=20", b""), Some("image/jpeg"));
        assert_eq!(detect_mime_type("icon.svg", b"<svg/>"), Some("image/svg+xml"));
        assert_eq!(detect_mime_type("notes.txt", b"hello"), None);
    }
}
