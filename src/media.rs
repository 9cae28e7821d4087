use std::path::Path;

use image::ImageFormat;

/// Media types the upload wizard accepts, compared case-insensitively.
pub const ACCEPTED_MEDIA_TYPES: [&str; 4] =
    ["image/gif", "image/jpeg", "image/png", "image/svg+xml"];

pub const SVG_MEDIA_TYPE: &str = "image/svg+xml";
const UNKNOWN_MEDIA_TYPE: &str = "application/octet-stream";

pub fn is_supported_media_type(media_type: &str) -> bool {
    ACCEPTED_MEDIA_TYPES
        .iter()
        .any(|accepted| accepted.eq_ignore_ascii_case(media_type))
}

/// Best guess at the media type of an uploaded file.
///
/// Magic bytes win over the file name; SVG has no magic bytes and is
/// recognized by its markup or extension.
pub fn sniff_media_type(name: &str, bytes: &[u8]) -> &'static str {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type();
    }
    if looks_like_svg(bytes) || has_extension(name, "svg") {
        return SVG_MEDIA_TYPE;
    }
    match ImageFormat::from_path(Path::new(name)) {
        Ok(format) => format.to_mime_type(),
        Err(_) if std::str::from_utf8(bytes).is_ok() => "text/plain",
        Err(_) => UNKNOWN_MEDIA_TYPE,
    }
}

fn has_extension(name: &str, ext: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    let Ok(text) = std::str::from_utf8(head) else {
        return false;
    };
    let text = text.trim_start();
    (text.starts_with("<svg") || text.starts_with("<?xml")) && text.contains("<svg")
}
