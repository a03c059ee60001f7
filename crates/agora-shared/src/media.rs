//! Attachment media classification.
//!
//! Declared MIME types from clients are advisory at best, so classification
//! combines byte-signature sniffing with the declared type. All callers go
//! through [`classify`]; the `Unknown` category is always rejected upstream.

use serde::{Deserialize, Serialize};

use crate::constants::JPEG_SIGNATURE;

/// Closed set of attachment categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Image,
    Gif,
    Video,
    Unknown,
}

impl MediaCategory {
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Gif => "gif",
            Self::Video => "video",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MediaCategory {
    type Err = ();

    /// Inverse of [`MediaCategory::as_str`]; anything else is `Unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "image" => Self::Image,
            "gif" => Self::Gif,
            "video" => Self::Video,
            _ => Self::Unknown,
        })
    }
}

/// Classify an attachment from its declared MIME type and leading bytes.
///
/// Byte signatures win over the declared type; the declared type is only
/// consulted when no signature matches (e.g. short or exotic files).
pub fn classify(declared_type: &str, data: &[u8]) -> MediaCategory {
    if let Some(category) = sniff(data) {
        return category;
    }

    match declared_type {
        "image/gif" => MediaCategory::Gif,
        t if t.starts_with("image/") => MediaCategory::Image,
        t if t.starts_with("video/") => MediaCategory::Video,
        _ => MediaCategory::Unknown,
    }
}

/// `true` when the data starts with the JPEG SOI marker (`FF D8`).
///
/// JPEG files can embed EXIF metadata (GPS position, device serial), which
/// the server strips before the bytes reach persistent storage. Detection
/// is by signature, never by the declared MIME type.
pub fn has_jpeg_signature(data: &[u8]) -> bool {
    data.len() >= 2 && data[..2] == JPEG_SIGNATURE
}

/// Map a declared MIME type to the file extension used on disk.
pub fn extension_for(declared_type: &str) -> &'static str {
    match declared_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        _ => "bin",
    }
}

fn sniff(data: &[u8]) -> Option<MediaCategory> {
    if has_jpeg_signature(data) {
        return Some(MediaCategory::Image);
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some(MediaCategory::Gif);
    }
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        return Some(MediaCategory::Image);
    }
    if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return Some(MediaCategory::Image);
    }
    // ISO BMFF (mp4, mov): "ftyp" box at offset 4.
    if data.len() >= 8 && &data[4..8] == b"ftyp" {
        return Some(MediaCategory::Video);
    }
    // Matroska / WebM EBML header.
    if data.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some(MediaCategory::Video);
    }
    None
}
