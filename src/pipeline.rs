//! Ingestion pipeline
//!
//! ```text
//! Scanner ──▶ path queue ──▶ parser workers (N threads) ──▶ merge ──▶ Archive::place
//!  thread      (bounded)       one output each              (fan-in)   caller's thread
//! ```
//!
//! The pipeline is pull-driven. [`Pipeline::run`] starts the scanner, workers
//! and merger and returns a [`Run`], an iterator of [`Outcome`]s. Each call to
//! `next` takes one parsed candidate from the merged stream and, for media,
//! places it in the archive on the calling thread. Placement is therefore
//! strictly serial while classification runs in parallel.
//!
//! Draining the run to the end means every upstream stage has finished.
//! [`Run::finish`] does that and returns the [`Summary`], or the fatal error if
//! the source root could not be walked.
//!
//! ## Cancellation
//!
//! A [`CancelToken`] stops the scanner from queueing paths and the workers from
//! taking new ones. The stages then close their channels as they exit, so the
//! run still drains and terminates normally.
//!
//! ## Example
//!
//! ```rust,no_run
//! use arrange::{Archive, PipelineBuilder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! Archive::prepare("/archive")?;
//! let mut run = PipelineBuilder::new()
//!     .workers(8)
//!     .build("/photos", "/archive")?
//!     .run()?;
//! for outcome in &mut run {
//!     if let Some(error) = outcome.error() {
//!         eprintln!("{}", error);
//!     }
//! }
//! let summary = run.finish()?;
//! println!("placed {} of {}", summary.placed, summary.total());
//! # Ok(())
//! # }
//! ```

use crate::error::{ArrangeError, Result};
use crate::merge::merge;
use crate::parser::{Parsed, WorkerPool};
use crate::scanner::Scanner;
use crate::store::{Archive, Placement};
use crate::types::{Outcome, Summary};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Cooperative cancellation flag shared by all stages of a run
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that has not fired
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every stage holding a clone of this token to stop
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether [`CancelToken::cancel`] has been called
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Builder for configuring a [`Pipeline`]
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    workers: usize,
    queue_capacity: Option<usize>,
    follow_symlinks: bool,
    cancel: CancelToken,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    /// Create a builder with default settings
    ///
    /// One worker per available CPU, queues of four slots per worker,
    /// symlinks not followed.
    pub fn new() -> Self {
        Self {
            workers: num_cpus::get(),
            queue_capacity: None,
            follow_symlinks: false,
            cancel: CancelToken::new(),
        }
    }

    /// Set number of parser workers
    ///
    /// Values less than 1 are automatically set to 1.
    pub fn workers(mut self, count: usize) -> Self {
        self.workers = count.max(1);
        self
    }

    /// Set the capacity of every queue between stages
    ///
    /// Defaults to four slots per worker.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Set whether the scanner follows symbolic links
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Use `token` to cancel the run from elsewhere
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Build a pipeline from `source` into the archive at `dest`
    ///
    /// # Errors
    ///
    /// - [`ArrangeError::StoreNotInitialized`] if `dest` was not prepared
    /// - [`ArrangeError::InvalidConfiguration`] if the queue capacity is zero
    pub fn build(self, source: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Result<Pipeline> {
        let queue_capacity = self.queue_capacity.unwrap_or(self.workers.saturating_mul(4));
        if queue_capacity == 0 {
            return Err(ArrangeError::InvalidConfiguration(
                "queue capacity must be at least 1".to_string(),
            ));
        }

        Ok(Pipeline {
            scanner: Scanner::new(source).with_follow_symlinks(self.follow_symlinks),
            archive: Archive::open(dest)?,
            workers: self.workers,
            queue_capacity,
            cancel: self.cancel,
        })
    }
}

/// A configured, not yet started ingestion run
#[derive(Debug)]
pub struct Pipeline {
    scanner: Scanner,
    archive: Archive,
    workers: usize,
    queue_capacity: usize,
    cancel: CancelToken,
}

impl Pipeline {
    /// Source root being ingested
    pub fn source(&self) -> &Path {
        self.scanner.root()
    }

    /// Archive being written to
    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    /// Token that cancels this pipeline's run
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Start every stage and return the outcome stream
    pub fn run(self) -> Result<Run> {
        info!(
            "Arranging {:?} into {:?} with {} workers",
            self.scanner.root(),
            self.archive.root(),
            self.workers
        );

        let (path_tx, path_rx) = bounded(self.queue_capacity);
        let scan = spawn_scanner(self.scanner, path_tx, self.cancel.clone())?;
        let pool = WorkerPool::spawn(path_rx, self.workers, self.queue_capacity, &self.cancel)?;
        let (outputs, workers) = pool.into_parts();
        let parsed = merge(outputs, self.queue_capacity)?;

        Ok(Run {
            parsed,
            archive: self.archive,
            scan: Some(scan),
            workers,
            summary: Summary::default(),
            started: Instant::now(),
        })
    }
}

pub(crate) fn spawn_scanner(
    scanner: Scanner,
    paths: Sender<PathBuf>,
    cancel: CancelToken,
) -> Result<JoinHandle<Result<()>>> {
    thread::Builder::new()
        .name("arrange-scan".to_string())
        .spawn(move || {
            let mut candidates = scanner.candidates();
            for path in &mut candidates {
                if cancel.is_cancelled() {
                    debug!("Scan cancelled");
                    break;
                }
                if paths.send(path).is_err() {
                    break;
                }
            }
            // Close the queue before reporting so workers can wind down
            drop(paths);
            candidates.finish()
        })
        .map_err(|e| ArrangeError::ThreadPool(e.to_string()))
}

/// A started run: an iterator of outcomes, one per candidate
///
/// Placement happens inside [`Iterator::next`], on the thread that drives the
/// iterator.
#[derive(Debug)]
pub struct Run {
    parsed: Receiver<Parsed>,
    archive: Archive,
    scan: Option<JoinHandle<Result<()>>>,
    workers: Vec<JoinHandle<()>>,
    summary: Summary,
    started: Instant,
}

impl Run {
    /// Counts of the outcomes yielded so far
    pub fn summary(&self) -> Summary {
        self.summary
    }

    /// Drain the remaining outcomes and wait for every stage to exit
    ///
    /// # Errors
    ///
    /// - [`ArrangeError::ScanRoot`] if the source root could not be walked
    /// - [`ArrangeError::Internal`] if a stage thread panicked
    pub fn finish(mut self) -> Result<Summary> {
        self.by_ref().for_each(drop);

        for handle in self.workers.drain(..) {
            handle
                .join()
                .map_err(|_| ArrangeError::internal("parser worker panicked"))?;
        }
        if let Some(scan) = self.scan.take() {
            scan.join()
                .map_err(|_| ArrangeError::internal("scanner panicked"))??;
        }

        let summary = self.summary;
        info!(
            "Run finished in {:?}: {} placed, {} duplicates, {} skipped, {} failed",
            self.started.elapsed(),
            summary.placed,
            summary.duplicates,
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }

    fn place(&mut self, parsed: Parsed) -> Outcome {
        match parsed {
            Parsed::Record(record) => match self.archive.place(&record) {
                Ok(Placement::Stored { content, link }) => Outcome::Placed {
                    record,
                    content,
                    link,
                },
                Ok(Placement::Duplicate { content }) => Outcome::Duplicate { record, content },
                Err(error) => {
                    warn!("{}", error);
                    Outcome::Failed {
                        path: record.source_path,
                        error,
                    }
                }
            },
            Parsed::NotMedia(path) => Outcome::Skipped { path },
            Parsed::Failed { path, error } => Outcome::Failed { path, error },
        }
    }
}

impl Iterator for Run {
    type Item = Outcome;

    fn next(&mut self) -> Option<Outcome> {
        let parsed = self.parsed.recv().ok()?;
        let outcome = self.place(parsed);
        self.summary.record(&outcome);
        Some(outcome)
    }
}

/// Ingest `source` into the prepared archive at `dest` with `workers` parsers
///
/// Shorthand for `PipelineBuilder::new().workers(workers).build(source, dest)?.run()`.
pub fn run(source: impl Into<PathBuf>, dest: impl Into<PathBuf>, workers: usize) -> Result<Run> {
    PipelineBuilder::new()
        .workers(workers)
        .build(source, dest)?
        .run()
}
