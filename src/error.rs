//! Error types for the arrange library
//!
//! Record-level failures carry the path they happened on so the outcome stream
//! can be logged without extra context. Only [`ArrangeError::ScanRoot`] is fatal
//! to a whole run; everything else is isolated to the record that produced it.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the arrange library
pub type Result<T> = std::result::Result<T, ArrangeError>;

/// Main error type for all arrange operations
#[derive(Debug, Error)]
pub enum ArrangeError {
    /// I/O errors that are not tied to a specific record
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The scan root itself could not be traversed
    #[error("Cannot scan {path:?}: {source}")]
    ScanRoot {
        /// Root directory of the scan
        path: PathBuf,
        /// Underlying traversal error
        #[source]
        source: walkdir::Error,
    },

    /// Source file could not be opened
    #[error("Problem opening file {path:?}: {source}")]
    OpenSource {
        /// Source file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Reading an image header failed at the filesystem level
    #[error("Problem reading header of {path:?}: {source}")]
    ReadHeader {
        /// Source file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Modification time was unavailable, so no capture time could be resolved
    #[error("Unable to resolve a capture time for {path:?}: {source}")]
    ModTime {
        /// Source file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Reading the file while computing its digest failed
    #[error("Problem calculating checksum on {path:?}: {source}")]
    Digest {
        /// Source file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Content-store entry could not be created
    #[error("Could not create content file {path:?}: {source}")]
    CreateContent {
        /// Content-store path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Copying bytes into the content store failed
    #[error("Trouble copying {from:?} to {to:?}: {source}")]
    CopyContent {
        /// Source file path
        from: PathBuf,
        /// Content-store path
        to: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Year/month directory of the chronological index could not be created
    #[error("Problem creating date directory {path:?}: {source}")]
    CreateDateDir {
        /// Directory path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Hard link into the chronological index failed
    #[error("Could not link {from:?} to {to:?}: {source}")]
    Link {
        /// Content-store path
        from: PathBuf,
        /// Chronological index path
        to: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Every disambiguated chronological name was already taken
    #[error("Exhausted {attempts} chronological names for {base:?}")]
    CollisionLimit {
        /// Chronological base name (without suffix or extension)
        base: PathBuf,
        /// Number of names probed
        attempts: usize,
    },

    /// Capture time cannot be represented as unix nanoseconds
    #[error("Capture time of {path:?} is outside the representable nanosecond range")]
    TimestampOutOfRange {
        /// Source file path
        path: PathBuf,
    },

    /// A record carries a digest or extension that cannot be addressed
    #[error("Invalid media record for {path:?}: {reason}")]
    InvalidRecord {
        /// Source file path
        path: PathBuf,
        /// What is wrong with it
        reason: String,
    },

    /// Archive layout is missing
    #[error("Archive not initialized at path: {0:?}")]
    StoreNotInitialized(PathBuf),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Thread pool error
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rayon::ThreadPoolBuildError> for ArrangeError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        ArrangeError::ThreadPool(err.to_string())
    }
}

impl ArrangeError {
    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        ArrangeError::Internal(msg.into())
    }

    /// Create an invalid record error
    pub fn invalid_record(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ArrangeError::InvalidRecord {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error only affects a single record
    ///
    /// Record-level errors are reported in the outcome stream and never stop
    /// the pipeline.
    pub fn is_record_level(&self) -> bool {
        !matches!(
            self,
            ArrangeError::ScanRoot { .. }
                | ArrangeError::StoreNotInitialized(_)
                | ArrangeError::InvalidConfiguration(_)
                | ArrangeError::ThreadPool(_)
                | ArrangeError::Internal(_)
        )
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            ArrangeError::StoreNotInitialized(path) => {
                format!("Archive not initialized at {:?}. Run 'arrange init' first.", path)
            }
            ArrangeError::CollisionLimit { base, attempts } => {
                format!(
                    "More than {} distinct files share the capture time {:?}. \
                     The input is probably carrying bogus timestamps.",
                    attempts, base
                )
            }
            ArrangeError::ScanRoot { path, .. } => {
                format!("Cannot read source directory {:?}. Check that it exists and is readable.", path)
            }
            _ => self.to_string(),
        }
    }
}
