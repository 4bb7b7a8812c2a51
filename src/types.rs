//! Core data types used throughout the arrange library
//!
//! ## Overview
//!
//! - **Candidates**: the fixed extension allow-list and [`MediaKind`], the
//!   per-format dispatch used by classification
//! - **Records**: [`MediaRecord`], the immutable result of classifying one file
//! - **Results**: [`Outcome`] for every candidate that went through a run, and
//!   [`Summary`] for the aggregate counts
//!
//! ## Examples
//!
//! ```rust
//! use arrange::types::{normalized_extension, MediaKind};
//! use std::path::Path;
//!
//! let ext = normalized_extension(Path::new("holiday/IMG_0001.JPG")).unwrap();
//! assert_eq!(ext, ".jpg");
//! assert_eq!(MediaKind::from_extension(&ext), Some(MediaKind::Jpeg));
//! ```

use crate::error::ArrangeError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Every extension the scanner will hand to classification
pub const MEDIA_EXTENSIONS: [&str; 8] = [
    // images
    ".jpg", ".jpeg", ".png", ".gif",
    // videos
    ".mov", ".mp4", ".m4v", ".avi",
];

/// Format family of a candidate, resolved from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// `.jpg` / `.jpeg`; the only kind with an embedded capture time
    Jpeg,
    /// `.png`
    Png,
    /// `.gif`
    Gif,
    /// `.mov`, `.mp4`, `.m4v`, `.avi`; content is never validated
    Video,
}

impl MediaKind {
    /// Map a normalized extension (lowercase, leading dot) to its kind
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            ".jpg" | ".jpeg" => Some(MediaKind::Jpeg),
            ".png" => Some(MediaKind::Png),
            ".gif" => Some(MediaKind::Gif),
            ".mov" | ".mp4" | ".m4v" | ".avi" => Some(MediaKind::Video),
            _ => None,
        }
    }

    /// Image format whose header must decode for a file of this kind
    pub fn image_format(self) -> Option<image::ImageFormat> {
        match self {
            MediaKind::Jpeg => Some(image::ImageFormat::Jpeg),
            MediaKind::Png => Some(image::ImageFormat::Png),
            MediaKind::Gif => Some(image::ImageFormat::Gif),
            MediaKind::Video => None,
        }
    }
}

/// Lower-cased extension of `path` including the leading dot
///
/// Everything from the last `.` of the file name onward, so a file literally
/// named `.JPG` yields `.jpg`. Returns `None` when the name has no dot.
pub fn normalized_extension(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let dot = name.rfind('.')?;
    Some(name[dot..].to_ascii_lowercase())
}

/// Check whether `path` carries one of the allow-listed extensions
pub fn is_candidate(path: &Path) -> bool {
    normalized_extension(path)
        .map(|ext| MEDIA_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Where a record's capture time came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSource {
    /// Embedded EXIF date/time field
    Exif,
    /// Filesystem modification time
    ModTime,
}

impl fmt::Display for TimeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeSource::Exif => write!(f, "exif"),
            TimeSource::ModTime => write!(f, "mtime"),
        }
    }
}

/// A classified media file, ready for placement
///
/// Created once by a parser worker and consumed once by the archive. Two
/// records with equal `content_digest` and `extension` are the same content and
/// always map to the same content-store address.
///
/// # Examples
///
/// ```rust
/// # use arrange::types::{MediaRecord, TimeSource};
/// # use chrono::{Local, TimeZone};
/// # use std::path::PathBuf;
/// let record = MediaRecord {
///     source_path: PathBuf::from("/photos/a.mov"),
///     content_digest: "60b725f10c9c85c70d97880dfe8191b3".to_string(),
///     extension: ".mov".to_string(),
///     captured_at: Local.timestamp_opt(1350815400, 0).unwrap(),
///     time_source: TimeSource::ModTime,
/// };
/// assert_eq!(record.bucket(), Some("60"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Path of the original file; never modified by the pipeline
    pub source_path: PathBuf,
    /// Lowercase hex digest of the full byte stream
    pub content_digest: String,
    /// Normalized extension (lowercase, leading dot)
    pub extension: String,
    /// Resolved capture time
    pub captured_at: DateTime<Local>,
    /// Which source the capture time was taken from
    pub time_source: TimeSource,
}

impl MediaRecord {
    /// Content-store bucket (first digest byte, hex encoded)
    pub fn bucket(&self) -> Option<&str> {
        self.content_digest.get(..2)
    }

    /// Capture time as unix nanoseconds, if representable
    pub fn captured_nanos(&self) -> Option<i64> {
        self.captured_at.timestamp_nanos_opt()
    }
}

/// Result of one candidate going through a run
#[derive(Debug)]
pub enum Outcome {
    /// Content was stored for the first time and linked into the index
    Placed {
        /// The record that was placed
        record: MediaRecord,
        /// Content-store entry
        content: PathBuf,
        /// Chronological index entry
        link: PathBuf,
    },
    /// Content was already in the store; nothing was written
    Duplicate {
        /// The record that lost the race
        record: MediaRecord,
        /// Existing content-store entry
        content: PathBuf,
    },
    /// Extension matched but content is not the claimed format
    Skipped {
        /// Candidate path
        path: PathBuf,
    },
    /// Classification or placement failed for this candidate
    Failed {
        /// Candidate path
        path: PathBuf,
        /// What went wrong
        error: ArrangeError,
    },
}

impl Outcome {
    /// Source path this outcome is about
    pub fn path(&self) -> &Path {
        match self {
            Outcome::Placed { record, .. } | Outcome::Duplicate { record, .. } => &record.source_path,
            Outcome::Skipped { path } | Outcome::Failed { path, .. } => path,
        }
    }

    /// Error carried by a failed outcome
    pub fn error(&self) -> Option<&ArrangeError> {
        match self {
            Outcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Aggregate counts of a run
///
/// # Examples
///
/// ```rust
/// # use arrange::types::Summary;
/// let summary = Summary { placed: 10, duplicates: 3, skipped: 1, failed: 0 };
/// assert_eq!(summary.total(), 14);
/// assert!(summary.is_clean());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Files stored and linked
    pub placed: usize,
    /// Files whose content was already stored
    pub duplicates: usize,
    /// Candidates rejected as not media
    pub skipped: usize,
    /// Candidates that failed to classify or place
    pub failed: usize,
}

impl Summary {
    /// Count one outcome
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Placed { .. } => self.placed += 1,
            Outcome::Duplicate { .. } => self.duplicates += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Total number of candidates seen
    pub fn total(&self) -> usize {
        self.placed + self.duplicates + self.skipped + self.failed
    }

    /// True when nothing failed
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}
