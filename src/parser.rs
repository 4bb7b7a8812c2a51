//! Parser worker pool
//!
//! A fixed set of worker threads pulls candidate paths from one shared queue,
//! classifies each file and sends the result down the worker's own output
//! channel. Workers share nothing but the input queue: classification only
//! reads the source tree, so no locking is needed.
//!
//! Non-media candidates and classification failures are logged here and also
//! forwarded, so the final summary accounts for every candidate.

use crate::classify::{classify, Classification};
use crate::error::{ArrangeError, Result};
use crate::pipeline::CancelToken;
use crate::types::MediaRecord;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// What a worker produced for one candidate
#[derive(Debug)]
pub enum Parsed {
    /// Valid media, ready for placement
    Record(MediaRecord),
    /// Content did not match the extension
    NotMedia(PathBuf),
    /// Classification failed
    Failed {
        /// Candidate path
        path: PathBuf,
        /// What went wrong
        error: ArrangeError,
    },
}

/// Running parser workers and their output sequences
#[derive(Debug)]
pub struct WorkerPool {
    outputs: Vec<Receiver<Parsed>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `workers` threads consuming `paths`
    ///
    /// Each worker gets its own bounded output channel of `capacity` slots.
    /// A worker stops when the input queue is closed and drained, when its
    /// output is dropped, or when `cancel` fires.
    pub fn spawn(
        paths: Receiver<PathBuf>,
        workers: usize,
        capacity: usize,
        cancel: &CancelToken,
    ) -> Result<Self> {
        if workers == 0 {
            return Err(ArrangeError::InvalidConfiguration(
                "at least one parser worker is required".to_string(),
            ));
        }

        let mut outputs = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let (tx, rx) = bounded(capacity);
            let paths = paths.clone();
            let cancel = cancel.clone();
            let handle = thread::Builder::new()
                .name(format!("arrange-parse-{id}"))
                .spawn(move || work(id, paths, tx, cancel))
                .map_err(|e| ArrangeError::ThreadPool(e.to_string()))?;
            outputs.push(rx);
            handles.push(handle);
        }

        debug!("Started {} parser workers", workers);
        Ok(Self { outputs, handles })
    }

    /// Number of workers in the pool
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// True if the pool has no workers
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Split into the per-worker output sequences and the thread handles
    pub fn into_parts(self) -> (Vec<Receiver<Parsed>>, Vec<JoinHandle<()>>) {
        (self.outputs, self.handles)
    }
}

fn work(id: usize, paths: Receiver<PathBuf>, out: Sender<Parsed>, cancel: CancelToken) {
    let mut handled = 0usize;
    for path in paths.iter() {
        if cancel.is_cancelled() {
            debug!("Parser {} cancelled", id);
            break;
        }

        let parsed = match classify(&path) {
            Ok(Classification::Media(record)) => Parsed::Record(record),
            Ok(Classification::NotMedia) => {
                warn!("Not media: {:?}", path);
                Parsed::NotMedia(path)
            }
            Err(error) => {
                warn!("Parse error: {}", error);
                Parsed::Failed { path, error }
            }
        };
        handled += 1;

        if out.send(parsed).is_err() {
            // Nobody is listening any more
            break;
        }
    }
    debug!("Parser {} finished after {} candidates", id, handled);
}
