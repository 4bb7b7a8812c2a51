//! Content-addressed archive and chronological index
//!
//! ## Layout
//!
//! ```text
//! archive_root/
//! ├── content/               # Content-addressed store
//! │   ├── 00/ … ff/          # 256 buckets, first digest byte in hex
//! │   │   └── <rest-of-digest><ext>
//! └── date/                  # Chronological index (hard links into content/)
//!     └── <yyyy>/<mm>/
//!         └── <unix-nanos>[_<nnnn>]<ext>
//! ```
//!
//! ## Placement
//!
//! [`Archive::place`] is the single serialization point of a run. It takes
//! `&mut self`, so only one placement decision can be in flight per archive
//! handle and the existence check on a content address can never interleave
//! with another write to the same address.
//!
//! 1. The content address is derived from digest and extension alone.
//! 2. If the address exists the record is a [`Placement::Duplicate`] and
//!    nothing is written or linked.
//! 3. Otherwise the source bytes are copied verbatim into a newly created
//!    file at the address. A failed copy removes the partial file.
//! 4. The record is hard-linked into `date/<yyyy>/<mm>/` under its capture
//!    time in nanoseconds. Taken names are skipped by appending `_0000`,
//!    `_0001`, … up to [`MAX_NAME_SUFFIXES`] suffixes. If no link can be
//!    made the content file is removed again, so a later run stores it.
//!
//! Entries are never overwritten or deleted.

use crate::error::{ArrangeError, Result};
use crate::types::MediaRecord;
use crate::utils::is_addressable_digest;
use chrono::Datelike;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

/// Number of `_nnnn` suffixes tried after the bare chronological name
pub const MAX_NAME_SUFFIXES: usize = 10_000;

const CONTENT_DIR: &str = "content";
const DATE_DIR: &str = "date";

/// What [`Archive::place`] did with a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Content was new: copied into the store and linked into the index
    Stored {
        /// Content-store entry
        content: PathBuf,
        /// Chronological index entry
        link: PathBuf,
    },
    /// Content was already stored; nothing changed
    Duplicate {
        /// Existing content-store entry
        content: PathBuf,
    },
}

/// Handle on an archive root
///
/// # Example
///
/// ```rust,no_run
/// use arrange::classify::classify;
/// use arrange::store::{Archive, Placement};
/// use std::path::Path;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut archive = Archive::prepare("/archive")?;
/// if let Some(record) = classify(Path::new("/photos/a.jpg"))?.into_record() {
///     match archive.place(&record)? {
///         Placement::Stored { link, .. } => println!("stored as {}", link.display()),
///         Placement::Duplicate { .. } => println!("already archived"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Archive {
    root: PathBuf,
}

impl Archive {
    /// Provision the archive layout and open it
    ///
    /// Creates all 256 content buckets and the date root. Safe to call on an
    /// archive that already exists; nothing is removed.
    pub fn prepare(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let content = root.join(CONTENT_DIR);
        for bucket in 0..=0xffu8 {
            fs::create_dir_all(content.join(format!("{:02x}", bucket)))?;
        }
        fs::create_dir_all(root.join(DATE_DIR))?;

        info!("Prepared archive at {:?}", root);
        Ok(Self { root })
    }

    /// Open an archive created by [`Archive::prepare`]
    ///
    /// # Errors
    ///
    /// - [`ArrangeError::StoreNotInitialized`] if the content buckets or the
    ///   date root are missing
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let content = root.join(CONTENT_DIR);
        let complete = root.join(DATE_DIR).is_dir()
            && (0..=0xffu8).all(|bucket| content.join(format!("{:02x}", bucket)).is_dir());
        if !complete {
            return Err(ArrangeError::StoreNotInitialized(root));
        }

        debug!("Opened archive at {:?}", root);
        Ok(Self { root })
    }

    /// Archive root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root of the content-addressed store
    pub fn content_root(&self) -> PathBuf {
        self.root.join(CONTENT_DIR)
    }

    /// Root of the chronological index
    pub fn date_root(&self) -> PathBuf {
        self.root.join(DATE_DIR)
    }

    /// Content-store path of `record`
    ///
    /// Pure path computation; the filesystem is not touched.
    ///
    /// # Errors
    ///
    /// - [`ArrangeError::InvalidRecord`] if the digest is not lowercase hex of
    ///   at least three characters, or the extension is not a plain `.ext`
    pub fn content_path(&self, record: &MediaRecord) -> Result<PathBuf> {
        validate_record(record)?;
        let (bucket, rest) = record.content_digest.split_at(2);
        Ok(self
            .content_root()
            .join(bucket)
            .join(format!("{}{}", rest, record.extension)))
    }

    /// Chronological base name of `record`: `date/<yyyy>/<mm>/<unix-nanos>`
    ///
    /// The returned path has no extension and no disambiguating suffix.
    pub fn date_base(&self, record: &MediaRecord) -> Result<PathBuf> {
        let nanos = record
            .captured_nanos()
            .ok_or_else(|| ArrangeError::TimestampOutOfRange {
                path: record.source_path.clone(),
            })?;
        Ok(self
            .date_root()
            .join(format!("{:04}", record.captured_at.year()))
            .join(format!("{:02}", record.captured_at.month()))
            .join(nanos.to_string()))
    }

    /// Place one record into the archive
    ///
    /// # Errors
    ///
    /// Every error is specific to this record; the archive stays consistent
    /// and later records can still be placed.
    ///
    /// - [`ArrangeError::InvalidRecord`] / [`ArrangeError::TimestampOutOfRange`]
    ///   if the record cannot be addressed (checked before anything is written)
    /// - [`ArrangeError::CreateContent`], [`ArrangeError::OpenSource`],
    ///   [`ArrangeError::CopyContent`] while storing content
    /// - [`ArrangeError::CreateDateDir`], [`ArrangeError::Link`],
    ///   [`ArrangeError::CollisionLimit`] while linking into the index
    pub fn place(&mut self, record: &MediaRecord) -> Result<Placement> {
        let content = self.content_path(record)?;
        let base = self.date_base(record)?;

        let mut out = match OpenOptions::new().write(true).create_new(true).open(&content) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("Duplicate content {:?} for {:?}", content, record.source_path);
                return Ok(Placement::Duplicate { content });
            }
            Err(source) => {
                return Err(ArrangeError::CreateContent {
                    path: content,
                    source,
                })
            }
        };

        if let Err(e) = copy_source(&record.source_path, &mut out, &content) {
            drop(out);
            discard_partial(&content);
            return Err(e);
        }
        drop(out);

        let link = match link_into_index(&content, &base, &record.extension) {
            Ok(link) => link,
            Err(e) => {
                discard_partial(&content);
                return Err(e);
            }
        };
        trace!("Placed {:?} at {:?}", record.source_path, link);
        Ok(Placement::Stored { content, link })
    }
}

fn validate_record(record: &MediaRecord) -> Result<()> {
    if !is_addressable_digest(&record.content_digest) {
        return Err(ArrangeError::invalid_record(
            &record.source_path,
            format!("digest {:?} is not a lowercase hex string", record.content_digest),
        ));
    }
    let ext = &record.extension;
    let plain = ext.len() > 1
        && ext.starts_with('.')
        && ext[1..].chars().all(|c| c.is_ascii_alphanumeric());
    if !plain {
        return Err(ArrangeError::invalid_record(
            &record.source_path,
            format!("extension {:?} is not of the form .ext", ext),
        ));
    }
    Ok(())
}

fn copy_source(source_path: &Path, out: &mut File, content: &Path) -> Result<()> {
    let mut source = File::open(source_path).map_err(|source| ArrangeError::OpenSource {
        path: source_path.to_path_buf(),
        source,
    })?;
    io::copy(&mut source, out).map_err(|source| ArrangeError::CopyContent {
        from: source_path.to_path_buf(),
        to: content.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn discard_partial(content: &Path) {
    if let Err(e) = fs::remove_file(content) {
        warn!("Could not remove partial content file {:?}: {}", content, e);
    }
}

/// Candidate index name for probe number `attempt`
///
/// Attempt 0 is the bare name; attempt `n` is suffixed `_{n-1:04}`.
fn indexed_name(base: &Path, extension: &str, attempt: usize) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    if attempt > 0 {
        name.push(format!("_{:04}", attempt - 1));
    }
    name.push(extension);
    PathBuf::from(name)
}

fn link_into_index(content: &Path, base: &Path, extension: &str) -> Result<PathBuf> {
    if let Some(dir) = base.parent() {
        fs::create_dir_all(dir).map_err(|source| ArrangeError::CreateDateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let attempts = MAX_NAME_SUFFIXES + 1;
    for attempt in 0..attempts {
        let name = indexed_name(base, extension, attempt);
        match fs::hard_link(content, &name) {
            Ok(()) => return Ok(name),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                trace!("Index name {:?} taken", name);
            }
            Err(source) => {
                return Err(ArrangeError::Link {
                    from: content.to_path_buf(),
                    to: name,
                    source,
                })
            }
        }
    }

    Err(ArrangeError::CollisionLimit {
        base: base.to_path_buf(),
        attempts,
    })
}
