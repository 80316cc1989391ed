//! Media classification for chapter files.
//!
//! Pages can be backed by still images, animated GIFs or short videos. The
//! kind decides where an alternate lands when a group's variants are sorted:
//! stills first, then animations, then video.

use std::cmp::Ordering;
use std::path::Path;

pub const STILL_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];
pub const ANIMATED_EXTENSIONS: [&str; 1] = ["gif"];
pub const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "webm", "mkv", "avi", "mov"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MediaKind {
    Still,
    Animated,
    Video,
}

impl MediaKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        if STILL_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Still)
        } else if ANIMATED_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Animated)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else {
            None
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Sort rank used when ordering alternates.
    pub fn priority(self) -> u8 {
        match self {
            Self::Still => 0,
            Self::Animated => 1,
            Self::Video => 2,
        }
    }

    /// Whether a pixel size can be read from the file header.
    pub fn has_image_header(self) -> bool {
        !matches!(self, Self::Video)
    }
}

pub fn is_supported_media(path: &Path) -> bool {
    MediaKind::from_path(path).is_some()
}

/// Key for ordering alternates: kind, then extension, then file name.
///
/// Unknown extensions sort after video so a stray file never displaces a
/// real image at the front of the list.
pub fn variant_sort_key(path: &Path) -> (u8, String, String) {
    let rank = MediaKind::from_path(path)
        .map(MediaKind::priority)
        .unwrap_or(u8::MAX);
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    (rank, ext, name)
}

pub fn compare_variants(a: &Path, b: &Path) -> Ordering {
    variant_sort_key(a).cmp(&variant_sort_key(b))
}
