//! File extension inference for downloaded media.

use crosspost_core::MediaType;
use url::Url;

pub const FALLBACK_EXTENSION: &str = ".bin";
pub const VIDEO_FALLBACK_EXTENSION: &str = ".mp4";

/// Map a Content-Type header value to an extension, ignoring parameters.
pub fn extension_for_mime(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let extension = match mime.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/avif" => ".avif",
        "video/mp4" => ".mp4",
        "video/webm" => ".webm",
        "video/quicktime" => ".mov",
        "video/x-matroska" => ".mkv",
        _ => return None,
    };
    Some(extension)
}

/// Extension of the last path segment of `url`, query and fragment excluded.
pub fn extension_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.last()?;
    let (stem, ext) = segment.rsplit_once('.')?;

    let valid = !stem.is_empty()
        && (1..=5).contains(&ext.len())
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| format!(".{}", ext.to_ascii_lowercase()))
}

/// Content-Type first, then the URL path, then the declared media type.
pub fn resolve_extension(content_type: Option<&str>, url: &str, media_type: MediaType) -> String {
    if let Some(ext) = content_type.and_then(extension_for_mime) {
        return ext.to_string();
    }
    if let Some(ext) = extension_from_url(url) {
        return ext;
    }
    if media_type == MediaType::Video {
        return VIDEO_FALLBACK_EXTENSION.to_string();
    }
    FALLBACK_EXTENSION.to_string()
}
