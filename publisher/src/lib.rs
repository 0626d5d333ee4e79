pub mod destination;

pub use destination::{interpret_response, HttpPublisher};

use crosspost_core::{MediaPost, MediaType, PublishError};
use std::fmt;
use std::future::Future;
use std::path::Path;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv"];
const PHOTO_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png"];

/// Uploads a local media file and returns the destination's identifier for it.
pub trait Publisher {
    fn publish(
        &self,
        local_path: &Path,
        post: &MediaPost,
    ) -> impl Future<Output = Result<String, PublishError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Photo,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Photo => "photo",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared type wins; the file extension decides otherwise.
pub fn classify_media(local_path: &Path, media_type: MediaType) -> Result<MediaKind, PublishError> {
    match media_type {
        MediaType::Video => return Ok(MediaKind::Video),
        MediaType::Image | MediaType::Preview => return Ok(MediaKind::Photo),
        MediaType::External => {}
    }

    let extension = local_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        Ok(MediaKind::Video)
    } else if PHOTO_EXTENSIONS.contains(&extension.as_str()) {
        Ok(MediaKind::Photo)
    } else {
        Err(PublishError::UnsupportedMedia {
            path: local_path.display().to_string(),
        })
    }
}

pub fn build_caption(title: &str, footer: &str) -> String {
    let footer = footer.trim();
    if footer.is_empty() {
        title.to_string()
    } else {
        format!("{}\n{}", title, footer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_type_wins_over_extension() {
        let path = Path::new("media/reddit_1.bin");
        assert_eq!(classify_media(path, MediaType::Video).unwrap(), MediaKind::Video);
        assert_eq!(classify_media(path, MediaType::Image).unwrap(), MediaKind::Photo);
        assert_eq!(classify_media(path, MediaType::Preview).unwrap(), MediaKind::Photo);
    }

    #[test]
    fn test_extension_fallback() {
        assert_eq!(
            classify_media(Path::new("clip.MKV"), MediaType::External).unwrap(),
            MediaKind::Video
        );
        assert_eq!(
            classify_media(Path::new("pic.jpeg"), MediaType::External).unwrap(),
            MediaKind::Photo
        );

        let result = classify_media(Path::new("anim.gif"), MediaType::External);
        assert!(matches!(result, Err(PublishError::UnsupportedMedia { .. })));

        let result = classify_media(Path::new("no_extension"), MediaType::External);
        assert!(matches!(result, Err(PublishError::UnsupportedMedia { .. })));
    }

    #[test]
    fn test_caption() {
        assert_eq!(build_caption("Sunset", ""), "Sunset");
        assert_eq!(build_caption("Sunset", "  "), "Sunset");
        assert_eq!(
            build_caption("Sunset", "Follow for more"),
            "Sunset\nFollow for more"
        );
    }
}
