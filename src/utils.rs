//! Utility functions for arrange
//!
//! Content digests and filesystem timestamps. Both are pure with respect to the
//! source tree: nothing here writes.

use chrono::{DateTime, Local};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

/// Hash a byte stream using SHA-256
///
/// Reads `reader` to the end in 8KB chunks and returns the digest as a
/// 64-character lowercase hexadecimal string.
///
/// # Example
///
/// ```rust
/// use arrange::hash_reader;
///
/// let digest = hash_reader(&b"Hello, world!"[..]).unwrap();
/// assert_eq!(digest.len(), 64);
/// assert_eq!(digest, hash_reader(&b"Hello, world!"[..]).unwrap());
/// ```
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192]; // 8KB buffer

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hash a file's content using SHA-256
pub fn hash_file_content(path: &Path) -> io::Result<String> {
    hash_reader(File::open(path)?)
}

/// Filesystem modification time of `path` in local time
pub fn modification_time(path: &Path) -> io::Result<DateTime<Local>> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(DateTime::<Local>::from(modified))
}

/// Check that `digest` is usable as a content address
///
/// The first two characters name the bucket and the rest names the entry, so
/// at least three lowercase hex characters are required.
pub(crate) fn is_addressable_digest(digest: &str) -> bool {
    digest.len() > 2
        && digest
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
