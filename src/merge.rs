//! Fan-in of worker output sequences
//!
//! [`merge`] spawns one draining thread per input sequence, each forwarding
//! into a shared output channel. A [`CountDownLatch`] holds the output open
//! until every drainer has finished, so the merged sequence never reports
//! "exhausted" while a worker is still producing. Ordering across inputs is
//! not preserved.

use crate::error::{ArrangeError, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use tracing::trace;

/// Blocks waiters until a fixed number of `count_down` calls have happened
#[derive(Debug)]
pub struct CountDownLatch {
    remaining: Mutex<usize>,
    zero: Condvar,
}

impl CountDownLatch {
    /// Create a latch that opens after `count` arrivals
    pub fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            zero: Condvar::new(),
        }
    }

    /// Record one arrival
    pub fn count_down(&self) {
        let mut remaining = self.remaining.lock();
        if *remaining > 0 {
            *remaining -= 1;
            if *remaining == 0 {
                self.zero.notify_all();
            }
        }
    }

    /// Block until the count reaches zero
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.zero.wait(&mut remaining);
        }
    }

    /// Arrivals still outstanding
    pub fn remaining(&self) -> usize {
        *self.remaining.lock()
    }
}

/// Combine `inputs` into one sequence of at most `capacity` buffered items
///
/// The returned receiver ends once every input has ended (or once the
/// receiver is dropped, in which case the drainers give up).
pub fn merge<T: Send + 'static>(inputs: Vec<Receiver<T>>, capacity: usize) -> Result<Receiver<T>> {
    let (out, merged) = bounded(capacity);
    let latch = Arc::new(CountDownLatch::new(inputs.len()));

    for (id, input) in inputs.into_iter().enumerate() {
        let out = out.clone();
        let latch = Arc::clone(&latch);
        thread::Builder::new()
            .name(format!("arrange-merge-{id}"))
            .spawn(move || {
                drain(input, &out);
                drop(out);
                latch.count_down();
            })
            .map_err(|e| ArrangeError::ThreadPool(e.to_string()))?;
    }

    thread::Builder::new()
        .name("arrange-merge-close".to_string())
        .spawn(move || close_when_done(&latch, out))
        .map_err(|e| ArrangeError::ThreadPool(e.to_string()))?;

    Ok(merged)
}

fn drain<T>(input: Receiver<T>, out: &Sender<T>) {
    for item in input.iter() {
        if out.send(item).is_err() {
            return;
        }
    }
}

fn close_when_done<T>(latch: &CountDownLatch, out: Sender<T>) {
    latch.wait();
    trace!("All merge inputs finished, closing output");
    drop(out);
}
