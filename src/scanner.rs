//! Source tree scanning
//!
//! [`Scanner`] walks a directory tree and yields every regular file whose
//! extension is on the media allow-list. The walk is lazy: paths are produced
//! as the directory tree is read, so the first candidate reaches the parser
//! workers long before the walk finishes.
//!
//! Errors on individual entries (an unreadable subdirectory, a file removed
//! mid-walk) are logged and skipped. An error on the root itself ends the walk
//! and is kept aside until the caller asks for it with
//! [`CandidatePaths::finish`], so it is never interleaved with valid paths.
//!
//! ## Example
//!
//! ```rust,no_run
//! use arrange::scanner::Scanner;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut candidates = Scanner::new("/photos").candidates();
//! for path in &mut candidates {
//!     println!("{}", path.display());
//! }
//! candidates.finish()?;
//! # Ok(())
//! # }
//! ```

use crate::error::{ArrangeError, Result};
use crate::types::is_candidate;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// Recursive candidate finder for one source root
#[derive(Debug, Clone)]
pub struct Scanner {
    /// Directory to walk
    root: PathBuf,
    /// Whether to follow symbolic links during traversal
    follow_symlinks: bool,
}

impl Scanner {
    /// Create a scanner for `root` that does not follow symlinks
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_symlinks: false,
        }
    }

    /// Set symbolic link following behavior
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Root directory being scanned
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start the walk and return the lazy candidate sequence
    pub fn candidates(&self) -> CandidatePaths {
        debug!("Scanning {:?}", self.root);
        CandidatePaths {
            root: self.root.clone(),
            walker: WalkDir::new(&self.root)
                .follow_links(self.follow_symlinks)
                .into_iter(),
            root_error: None,
            done: false,
            yielded: 0,
        }
    }
}

/// Lazy sequence of candidate paths produced by [`Scanner::candidates`]
pub struct CandidatePaths {
    root: PathBuf,
    walker: walkdir::IntoIter,
    root_error: Option<walkdir::Error>,
    done: bool,
    yielded: usize,
}

impl CandidatePaths {
    /// Consume the sequence and report whether the root could be walked
    ///
    /// Call after iteration has ended. Any paths not yet taken are discarded.
    pub fn finish(self) -> Result<()> {
        match self.root_error {
            Some(source) => Err(ArrangeError::ScanRoot {
                path: self.root,
                source,
            }),
            None => {
                debug!("Scan of {:?} produced {} candidates", self.root, self.yielded);
                Ok(())
            }
        }
    }
}

impl Iterator for CandidatePaths {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        if self.done {
            return None;
        }

        loop {
            let entry = match self.walker.next() {
                Some(Ok(entry)) => entry,
                Some(Err(err)) if err.depth() == 0 => {
                    // The root itself is unusable; stop and keep the error for finish().
                    self.root_error = Some(err);
                    self.done = true;
                    return None;
                }
                Some(Err(err)) => {
                    warn!("Walk error: {}", err);
                    continue;
                }
                None => {
                    self.done = true;
                    return None;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            let path = entry.into_path();
            if is_candidate(&path) {
                self.yielded += 1;
                return Some(path);
            }
            trace!("Ignoring {:?}", path);
        }
    }
}
