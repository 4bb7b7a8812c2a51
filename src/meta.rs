//! Ad-hoc timestamp resolution
//!
//! Resolves the capture time of an arbitrary list of files without touching
//! an archive, the way the ingestion pipeline would see them.

use crate::classify::{classify, Classification};
use crate::error::Result;
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::debug;

/// Classify every path on a pool of `workers` threads
///
/// Results come back in input order, one per path.
pub fn resolve_all(paths: Vec<PathBuf>, workers: usize) -> Result<Vec<(PathBuf, Result<Classification>)>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("arrange-meta-{i}"))
        .build()?;

    debug!("Resolving {} files on {} threads", paths.len(), pool.current_num_threads());
    Ok(pool.install(|| {
        paths
            .into_par_iter()
            .map(|path| {
                let classified = classify(&path);
                (path, classified)
            })
            .collect()
    }))
}
