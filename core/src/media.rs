//! Media type classification.

use std::path::Path;

/// The four media classes the indexing pipeline dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    /// Text-bearing documents: PDF, Office formats, Markdown, plain text.
    Document,
    /// Still images.
    Image,
    /// Audio recordings.
    Audio,
    /// Video recordings (processed via their extracted audio track).
    Video,
}

impl MediaType {
    /// Classifies a file by extension.
    ///
    /// Mixed/unknown extensions are not rejected here — the caller should
    /// fall back to `document` when the file is text-decodable and reject
    /// it otherwise, per the file identity contract.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" | "docx" | "xlsx" | "pptx" | "md" | "markdown" | "txt" => Some(Self::Document),
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" | "tiff" => Some(Self::Image),
            "mp3" | "wav" | "flac" | "ogg" | "m4a" | "aac" => Some(Self::Audio),
            "mp4" | "mkv" | "mov" | "avi" | "webm" => Some(Self::Video),
            _ => None,
        }
    }

    /// Classifies a path by its extension, lowercased.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// The scheduler's per-document wall-clock budget for this media type.
    #[must_use]
    pub const fn processing_budget(self) -> std::time::Duration {
        use std::time::Duration;
        match self {
            Self::Document => Duration::from_secs(60),
            Self::Image => Duration::from_secs(30),
            Self::Audio | Self::Video => Duration::from_secs(30 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn classifies_known_extensions() {
        assert_eq!(MediaType::from_extension("pdf"), Some(MediaType::Document));
        assert_eq!(MediaType::from_extension("PNG"), Some(MediaType::Image));
        assert_eq!(MediaType::from_extension("wav"), Some(MediaType::Audio));
        assert_eq!(MediaType::from_extension("mp4"), Some(MediaType::Video));
    }

    #[test]
    fn unknown_extension_is_none() {
        assert_eq!(MediaType::from_extension("xyz"), None);
    }

    #[test]
    fn classifies_from_path() {
        let path = PathBuf::from("/tmp/report.PDF");
        assert_eq!(MediaType::from_path(&path), Some(MediaType::Document));
    }

    #[test]
    fn budgets_differ_by_media() {
        assert!(MediaType::Audio.processing_budget() > MediaType::Document.processing_budget());
    }
}
