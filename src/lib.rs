//! # Arrange - Deduplicating media archiver
//!
//! Ingests photos and videos from arbitrary directory trees into an archive
//! that stores every distinct file exactly once and indexes it by capture time.
//!
//! ## Overview
//!
//! An archive has two trees:
//!
//! - `content/<2-hex>/<rest-of-digest><ext>` holds one copy of each distinct
//!   byte stream, addressed by its SHA-256 digest
//! - `date/<yyyy>/<mm>/<unix-nanos>[_NNNN]<ext>` holds a hard link to the
//!   content entry for every file ingested, named by capture time
//!
//! Capture time comes from EXIF `DateTimeOriginal` for JPEGs that carry it, and
//! from the file's modification time otherwise. Sources are only ever read.
//!
//! ## Architecture
//!
//! - **Scanner**: lazy recursive walk filtered by a fixed extension allow-list
//! - **Parser workers**: a pool of threads that validate each file's header
//!   against its extension, resolve its capture time and digest its content
//! - **Merger**: fans the worker outputs into one stream
//! - **Archive**: the single writer that stores new content, detects
//!   duplicates and links entries into the chronological index
//!
//! Stages are connected by bounded channels, so a slow disk on the archive side
//! throttles the scan instead of buffering the whole source tree in memory.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arrange::{Archive, Outcome, PipelineBuilder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Create the archive layout once
//! Archive::prepare("/archive")?;
//!
//! let mut run = PipelineBuilder::new()
//!     .workers(4)
//!     .build("/media/camera", "/archive")?
//!     .run()?;
//!
//! for outcome in &mut run {
//!     match outcome {
//!         Outcome::Placed { link, .. } => println!("+ {}", link.display()),
//!         Outcome::Duplicate { record, .. } => println!("= {}", record.source_path.display()),
//!         Outcome::Skipped { path } => println!("? {}", path.display()),
//!         Outcome::Failed { error, .. } => eprintln!("! {}", error),
//!     }
//! }
//!
//! let summary = run.finish()?;
//! println!("{} new, {} already archived", summary.placed, summary.duplicates);
//! # Ok(())
//! # }
//! ```
//!
//! ## Repairing an archive
//!
//! Copying an archive without preserving hard links turns every index entry
//! into a separate copy. [`repair::relink`] links them back to the content
//! store:
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let summary = arrange::repair::relink("/archive", 4)?;
//! println!("relinked {}", summary.relinked);
//! # Ok(())
//! # }
//! ```

// Public API modules
pub mod classify;
pub mod error;
pub mod merge;
pub mod meta;
pub mod parser;
pub mod pipeline;
pub mod repair;
pub mod scanner;
pub mod store;
pub mod types;

// Internal modules (not part of public API)
mod utils;

// Re-export main types for convenience
pub use classify::{classify, Classification};
pub use error::{ArrangeError, Result};
pub use pipeline::{CancelToken, Pipeline, PipelineBuilder, Run};
pub use repair::{Repair, RepairSummary};
pub use store::{Archive, Placement, MAX_NAME_SUFFIXES};
pub use types::*;
pub use utils::{hash_file_content, hash_reader, modification_time};
