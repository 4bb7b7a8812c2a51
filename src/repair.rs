//! Chronological index repair
//!
//! Every entry under `date/` should be a hard link to a content-store entry.
//! Copying an archive with a tool that does not preserve links, or editing an
//! entry in place, breaks that and doubles the space used. [`relink`] walks the
//! index with the same scanner and parser workers the ingestion pipeline uses,
//! derives each entry's content address with [`Archive::content_path`] and
//! links the entry back to it.
//!
//! An entry whose content is missing from the store is left alone: it may be
//! the only remaining copy of those bytes.

use crate::error::{ArrangeError, Result};
use crate::merge::merge;
use crate::parser::{Parsed, WorkerPool};
use crate::pipeline::{spawn_scanner, CancelToken};
use crate::scanner::Scanner;
use crate::store::Archive;
use crate::types::MediaRecord;
use crossbeam_channel::bounded;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Suffix of the temporary link created next to an entry being replaced
///
/// Not on the media allow-list, so a concurrent scan never picks it up.
const RELINK_SUFFIX: &str = ".relink";

/// What happened to one index entry
#[derive(Debug)]
pub enum Repair {
    /// Entry replaced by a link to its content
    Relinked {
        /// Index entry
        entry: PathBuf,
        /// Content-store entry it now links to
        content: PathBuf,
    },
    /// Entry already shares storage with its content
    AlreadyLinked(PathBuf),
    /// No content-store entry for these bytes; left untouched
    MissingContent {
        /// Index entry
        entry: PathBuf,
        /// Expected content-store entry
        content: PathBuf,
    },
    /// Entry is not valid media
    Skipped(PathBuf),
    /// Entry could not be classified or relinked
    Failed {
        /// Index entry
        entry: PathBuf,
        /// What went wrong
        error: ArrangeError,
    },
}

/// Counts of a repair pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairSummary {
    /// Entries re-linked to their content
    pub relinked: usize,
    /// Entries that were already links
    pub already_linked: usize,
    /// Entries whose content is not in the store
    pub missing_content: usize,
    /// Entries that are not media
    pub skipped: usize,
    /// Entries that failed
    pub failed: usize,
}

impl RepairSummary {
    /// Count one repair result
    pub fn record(&mut self, repair: &Repair) {
        match repair {
            Repair::Relinked { .. } => self.relinked += 1,
            Repair::AlreadyLinked(_) => self.already_linked += 1,
            Repair::MissingContent { .. } => self.missing_content += 1,
            Repair::Skipped(_) => self.skipped += 1,
            Repair::Failed { .. } => self.failed += 1,
        }
    }

    /// Number of index entries examined
    pub fn total(&self) -> usize {
        self.relinked + self.already_linked + self.missing_content + self.skipped + self.failed
    }
}

/// Re-link every entry of the index in the archive at `root`
///
/// Entries are classified by `workers` parser threads; relinking happens on
/// the calling thread.
///
/// # Errors
///
/// - [`ArrangeError::StoreNotInitialized`] if `root` is not an archive
/// - [`ArrangeError::ScanRoot`] if the date root cannot be walked
pub fn relink(root: impl Into<PathBuf>, workers: usize) -> Result<RepairSummary> {
    relink_with(root, workers, |_| {})
}

/// [`relink`], reporting every entry to `on_entry` as it is handled
pub fn relink_with<F>(root: impl Into<PathBuf>, workers: usize, mut on_entry: F) -> Result<RepairSummary>
where
    F: FnMut(&Repair),
{
    let archive = Archive::open(root)?;
    let workers = workers.max(1);
    let capacity = workers.saturating_mul(4);
    let cancel = CancelToken::new();
    info!("Repairing index under {:?}", archive.date_root());

    let (path_tx, path_rx) = bounded(capacity);
    let scan = spawn_scanner(Scanner::new(archive.date_root()), path_tx, cancel.clone())?;
    let (outputs, handles) = WorkerPool::spawn(path_rx, workers, capacity, &cancel)?.into_parts();
    let parsed = merge(outputs, capacity)?;

    let mut summary = RepairSummary::default();
    for item in parsed.iter() {
        let repair = match item {
            Parsed::Record(record) => repair_entry(&archive, &record),
            Parsed::NotMedia(path) => Repair::Skipped(path),
            Parsed::Failed { path, error } => Repair::Failed { entry: path, error },
        };
        summary.record(&repair);
        on_entry(&repair);
    }

    for handle in handles {
        handle
            .join()
            .map_err(|_| ArrangeError::internal("parser worker panicked"))?;
    }
    scan.join()
        .map_err(|_| ArrangeError::internal("scanner panicked"))??;

    info!(
        "Repair finished: {} relinked, {} already linked, {} missing content, {} skipped, {} failed",
        summary.relinked,
        summary.already_linked,
        summary.missing_content,
        summary.skipped,
        summary.failed
    );
    Ok(summary)
}

fn repair_entry(archive: &Archive, record: &MediaRecord) -> Repair {
    let entry = record.source_path.clone();
    let content = match archive.content_path(record) {
        Ok(content) => content,
        Err(error) => return Repair::Failed { entry, error },
    };

    if !content.is_file() {
        warn!("No content for {:?}, expected {:?}", entry, content);
        return Repair::MissingContent { entry, content };
    }

    match same_file(&entry, &content) {
        Ok(true) => {
            debug!("{:?} already linked", entry);
            return Repair::AlreadyLinked(entry);
        }
        Ok(false) => {}
        Err(source) => {
            return Repair::Failed {
                error: ArrangeError::OpenSource {
                    path: entry.clone(),
                    source,
                },
                entry,
            }
        }
    }

    match replace_with_link(&content, &entry) {
        Ok(()) => {
            info!("{:?} > {:?}", entry, content);
            Repair::Relinked { entry, content }
        }
        Err(error) => {
            warn!("{}", error);
            Repair::Failed { entry, error }
        }
    }
}

/// Link `content` next to `entry` under a temporary name, then rename it over
/// `entry`, so the entry is never absent
fn replace_with_link(content: &Path, entry: &Path) -> Result<()> {
    let mut temp = OsString::from(entry.as_os_str());
    temp.push(RELINK_SUFFIX);
    let temp = PathBuf::from(temp);

    // Left over from an interrupted repair
    if temp.exists() {
        fs::remove_file(&temp)?;
    }

    fs::hard_link(content, &temp).map_err(|source| ArrangeError::Link {
        from: content.to_path_buf(),
        to: temp.clone(),
        source,
    })?;
    if let Err(source) = fs::rename(&temp, entry) {
        if let Err(e) = fs::remove_file(&temp) {
            warn!("Could not remove temporary link {:?}: {}", temp, e);
        }
        return Err(ArrangeError::Link {
            from: content.to_path_buf(),
            to: entry.to_path_buf(),
            source,
        });
    }
    Ok(())
}

#[cfg(unix)]
fn same_file(a: &Path, b: &Path) -> std::io::Result<bool> {
    use std::os::unix::fs::MetadataExt;
    let (a, b) = (fs::metadata(a)?, fs::metadata(b)?);
    Ok(a.dev() == b.dev() && a.ino() == b.ino())
}

#[cfg(not(unix))]
fn same_file(_a: &Path, _b: &Path) -> std::io::Result<bool> {
    Ok(false)
}
