//! Property-based testing for arrange
//!
//! Uses proptest to check archive invariants over random byte streams and
//! timestamps.

use ::arrange::*;
use chrono::{Local, TimeZone};
use proptest::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Random video-like payloads; videos are never decoded, so any bytes work
fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

fn extension_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![".mov", ".mp4", ".avi"])
}

fn record_for(path: &Path, extension: &str, secs: i64) -> MediaRecord {
    MediaRecord {
        source_path: path.to_path_buf(),
        content_digest: hash_file_content(path).unwrap(),
        extension: extension.to_string(),
        captured_at: Local.timestamp_opt(secs, 0).unwrap(),
        time_source: TimeSource::ModTime,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_content_address_is_bucketed_hex(bytes in payload_strategy(), ext in extension_strategy()) {
        let dir = TempDir::new().unwrap();
        let archive = Archive::prepare(dir.path()).unwrap();
        let src = dir.path().join(format!("src{ext}"));
        fs::write(&src, &bytes).unwrap();

        let record = record_for(&src, ext, 1_000_000_000);
        let content = archive.content_path(&record).unwrap();
        let relative = content.strip_prefix(archive.content_root()).unwrap();
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        prop_assert_eq!(parts.len(), 2);
        prop_assert_eq!(parts[0].len(), 2);
        prop_assert!(parts[0].chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
        prop_assert_eq!(format!("{}{}", parts[0], parts[1]), format!("{}{}", record.content_digest, ext));
    }

    #[test]
    fn prop_placing_twice_is_a_duplicate(
        bytes in payload_strategy(),
        ext in extension_strategy(),
        secs in 0i64..4_000_000_000,
        later in 0i64..4_000_000_000,
    ) {
        let dir = TempDir::new().unwrap();
        let mut archive = Archive::prepare(dir.path().join("archive")).unwrap();
        let first = dir.path().join(format!("first{ext}"));
        let second = dir.path().join(format!("second{ext}"));
        fs::write(&first, &bytes).unwrap();
        fs::write(&second, &bytes).unwrap();

        let stored = archive.place(&record_for(&first, ext, secs)).unwrap();
        let again = archive.place(&record_for(&second, ext, later)).unwrap();

        match (stored, again) {
            (Placement::Stored { content: a, link }, Placement::Duplicate { content: b }) => {
                prop_assert_eq!(&a, &b);
                prop_assert_eq!(fs::read(&link).unwrap(), bytes.clone());
                prop_assert_eq!(fs::read(&a).unwrap(), bytes);
            }
            other => prop_assert!(false, "unexpected placements {:?}", other),
        }
    }

    #[test]
    fn prop_same_instant_never_overwrites(count in 1usize..12, secs in 0i64..4_000_000_000) {
        let dir = TempDir::new().unwrap();
        let mut archive = Archive::prepare(dir.path().join("archive")).unwrap();

        let mut links = Vec::new();
        for i in 0..count {
            let src = dir.path().join(format!("{i}.mov"));
            fs::write(&src, format!("clip {i}")).unwrap();
            match archive.place(&record_for(&src, ".mov", secs)).unwrap() {
                Placement::Stored { link, .. } => links.push(link),
                Placement::Duplicate { .. } => prop_assert!(false, "distinct bytes reported duplicate"),
            }
        }

        for (i, link) in links.iter().enumerate() {
            prop_assert_eq!(fs::read_to_string(link).unwrap(), format!("clip {i}"));
        }
        links.sort();
        links.dedup();
        prop_assert_eq!(links.len(), count);
    }
}
