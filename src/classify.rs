//! Format classification and capture time resolution
//!
//! [`classify`] turns one candidate path into a [`MediaRecord`]:
//!
//! 1. The extension picks a [`MediaKind`].
//! 2. Image kinds must decode their format header (dimensions only, never the
//!    pixel data). A header that does not parse means the file is not what its
//!    name claims, and the candidate is reported as [`Classification::NotMedia`].
//! 3. JPEG files take their capture time from EXIF (`DateTimeOriginal`, then
//!    `DateTime`). Missing, unparseable or otherwise unusable metadata falls
//!    back to the modification time. Every other kind always uses the
//!    modification time.
//! 4. The whole file is streamed through SHA-256 once.
//!
//! Only two things fail a record: the file cannot be opened or read, or its
//! modification time is unavailable when it is needed.
//!
//! EXIF date/time fields carry no zone, so they are read as local wall-clock
//! time, the same zone modification times are reported in.

use crate::error::{ArrangeError, Result};
use crate::types::{normalized_extension, MediaKind, MediaRecord, TimeSource};
use crate::utils::{hash_reader, modification_time};
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use image::{ImageError, ImageFormat, ImageReader};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, trace};

/// Result of classifying one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A valid media file
    Media(MediaRecord),
    /// Extension matched the allow-list but the content is not that format
    NotMedia,
}

impl Classification {
    /// The record, if this was media
    pub fn into_record(self) -> Option<MediaRecord> {
        match self {
            Classification::Media(record) => Some(record),
            Classification::NotMedia => None,
        }
    }
}

/// Classify the file at `path`
///
/// Read-only: the source file is opened once and never modified.
///
/// # Errors
///
/// - [`ArrangeError::OpenSource`] if the file cannot be opened
/// - [`ArrangeError::ReadHeader`] if reading the image header fails at the I/O level
/// - [`ArrangeError::ModTime`] if the modification time is needed but unavailable
/// - [`ArrangeError::Digest`] if reading the file for the digest fails
///
/// # Example
///
/// ```rust,no_run
/// use arrange::classify::{classify, Classification};
/// use std::path::Path;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// match classify(Path::new("/photos/IMG_0001.JPG"))? {
///     Classification::Media(record) => println!("{} {}", record.captured_at, record.content_digest),
///     Classification::NotMedia => println!("not really a jpeg"),
/// }
/// # Ok(())
/// # }
/// ```
pub fn classify(path: &Path) -> Result<Classification> {
    let Some(extension) = normalized_extension(path) else {
        return Ok(Classification::NotMedia);
    };
    let Some(kind) = MediaKind::from_extension(&extension) else {
        return Ok(Classification::NotMedia);
    };

    let file = File::open(path).map_err(|source| ArrangeError::OpenSource {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    if let Some(format) = kind.image_format() {
        match validate_header(&mut reader, format) {
            Ok(()) => {}
            Err(HeaderError::Invalid(reason)) => {
                debug!("Not media: {:?} ({})", path, reason);
                return Ok(Classification::NotMedia);
            }
            Err(HeaderError::Io(source)) => {
                return Err(ArrangeError::ReadHeader {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
        rewind(&mut reader, path)?;
    }

    let embedded = match kind {
        MediaKind::Jpeg => {
            let found = exif_capture_time(&mut reader);
            if found.is_none() {
                trace!("No usable exif time in {:?}, using mtime", path);
            }
            rewind(&mut reader, path)?;
            found
        }
        _ => None,
    };

    let (captured_at, time_source) = match embedded {
        Some(time) => (time, TimeSource::Exif),
        None => {
            let mtime = modification_time(path).map_err(|source| ArrangeError::ModTime {
                path: path.to_path_buf(),
                source,
            })?;
            (mtime, TimeSource::ModTime)
        }
    };

    let content_digest = hash_reader(&mut reader).map_err(|source| ArrangeError::Digest {
        path: path.to_path_buf(),
        source,
    })?;

    trace!("Classified {:?} as {:?} at {} ({})", path, kind, captured_at, time_source);

    Ok(Classification::Media(MediaRecord {
        source_path: path.to_path_buf(),
        content_digest,
        extension,
        captured_at,
        time_source,
    }))
}

enum HeaderError {
    Invalid(String),
    Io(io::Error),
}

/// Decode just enough of `format` to learn the image dimensions
fn validate_header<R: BufRead + Seek>(reader: &mut R, format: ImageFormat) -> std::result::Result<(), HeaderError> {
    match ImageReader::with_format(reader, format).into_dimensions() {
        Ok(_) => Ok(()),
        // A short file is a malformed file, not a failing disk
        Err(ImageError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
            Err(HeaderError::Invalid(e.to_string()))
        }
        Err(ImageError::IoError(e)) => Err(HeaderError::Io(e)),
        Err(e) => Err(HeaderError::Invalid(e.to_string())),
    }
}

fn rewind<R: Seek>(reader: &mut R, path: &Path) -> Result<()> {
    reader
        .seek(SeekFrom::Start(0))
        .map(|_| ())
        .map_err(|source| ArrangeError::Digest {
            path: path.to_path_buf(),
            source,
        })
}

/// Capture time embedded in a JPEG's EXIF block
///
/// Returns `None` for every kind of failure: no EXIF segment, a truncated or
/// corrupt one, a missing tag, a malformed date string, or a wall-clock time
/// that does not exist in the local zone.
pub fn exif_capture_time<R: BufRead + Seek>(reader: &mut R) -> Option<DateTime<Local>> {
    let exif = match exif::Reader::new().read_from_container(reader) {
        Ok(exif) => exif,
        Err(e) => {
            trace!("Exif decode failed: {}", e);
            return None;
        }
    };

    [exif::Tag::DateTimeOriginal, exif::Tag::DateTime]
        .iter()
        .find_map(|tag| {
            let field = exif.get_field(*tag, exif::In::PRIMARY)?;
            match field.value {
                exif::Value::Ascii(ref values) if !values.is_empty() => {
                    exif::DateTime::from_ascii(&values[0]).ok()
                }
                _ => None,
            }
        })
        .and_then(|dt| exif_to_local(&dt))
}

fn exif_to_local(dt: &exif::DateTime) -> Option<DateTime<Local>> {
    let naive = NaiveDate::from_ymd_opt(i32::from(dt.year), u32::from(dt.month), u32::from(dt.day))?
        .and_hms_nano_opt(
            u32::from(dt.hour),
            u32::from(dt.minute),
            u32::from(dt.second),
            dt.nanosecond.unwrap_or(0),
        )?;
    Local.from_local_datetime(&naive).earliest()
}
