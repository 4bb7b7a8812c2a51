//! Integration tests over generated camera dumps
//!
//! A seeded generator writes a mixed tree of photos, videos, corrupt files and
//! byte-identical copies; the tests ingest it and check the archive against
//! what the generator knows it wrote.

use crate::fixtures;
use ::arrange::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

/// What the generator put into the source tree
#[derive(Debug, Default)]
pub struct Manifest {
    /// Valid media files by path, with their bytes
    pub media: BTreeMap<PathBuf, Vec<u8>>,
    /// Files whose content does not match their extension
    pub corrupt: BTreeSet<PathBuf>,
    /// Files that are not candidates at all
    pub ignored: BTreeSet<PathBuf>,
}

impl Manifest {
    /// Number of distinct (bytes, extension) pairs among valid media
    pub fn distinct(&self) -> usize {
        self.media
            .iter()
            .map(|(path, bytes)| (bytes.clone(), normalized_extension(path)))
            .collect::<BTreeSet<_>>()
            .len()
    }
}

/// Source tree plus prepared archive
pub struct ArchiveHarness {
    pub source: TempDir,
    pub dest: TempDir,
    pub manifest: Manifest,
    rng: StdRng,
}

impl ArchiveHarness {
    /// Create an empty harness with a fixed seed
    pub fn new(seed: u64) -> Self {
        let dest = TempDir::new().unwrap();
        Archive::prepare(dest.path()).unwrap();
        Self {
            source: TempDir::new().unwrap(),
            dest,
            manifest: Manifest::default(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn random_dir(&mut self) -> PathBuf {
        let depth = self.rng.random_range(0..3);
        let mut dir = self.source.path().to_path_buf();
        for _ in 0..depth {
            dir = dir.join(format!("d{}", self.rng.random_range(0..4)));
        }
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Write `count` random files of every kind
    pub fn generate(&mut self, count: usize) -> anyhow::Result<()> {
        for i in 0..count {
            let dir = self.random_dir();
            let shade = self.rng.random::<u8>();
            let path = match self.rng.random_range(0..7) {
                0 => {
                    let p = dir.join(format!("IMG_{i:04}.JPG"));
                    let taken = format!(
                        "20{:02}:{:02}:{:02} 12:00:00",
                        self.rng.random_range(0..20),
                        self.rng.random_range(1..=12),
                        self.rng.random_range(1..=28)
                    );
                    fixtures::write_jpeg(&p, shade, Some(&taken));
                    p
                }
                1 => {
                    let p = dir.join(format!("scan_{i}.jpeg"));
                    fixtures::write_jpeg(&p, shade, None);
                    p
                }
                2 => {
                    let p = dir.join(format!("shot_{i}.png"));
                    fixtures::write_png(&p, shade);
                    p
                }
                3 => {
                    let p = dir.join(format!("anim_{i}.gif"));
                    fixtures::write_gif(&p, shade);
                    p
                }
                4 => {
                    let ext = ["mov", "mp4", "avi"][self.rng.random_range(0..3)];
                    let p = dir.join(format!("clip_{i}.{ext}"));
                    let len = self.rng.random_range(0..256);
                    let bytes: Vec<u8> = (0..len).map(|_| self.rng.random()).collect();
                    fs::write(&p, bytes)?;
                    p
                }
                5 => {
                    let ext = ["jpg", "png", "gif"][self.rng.random_range(0..3)];
                    let p = dir.join(format!("broken_{i}.{ext}"));
                    fs::write(&p, format!("this is not an image {i}"))?;
                    self.manifest.corrupt.insert(p);
                    continue;
                }
                _ => {
                    let p = dir.join(format!("notes_{i}.txt"));
                    fs::write(&p, "text")?;
                    self.manifest.ignored.insert(p);
                    continue;
                }
            };
            fixtures::set_mtime(&path, fixtures::OCT_21_2012 + self.rng.random_range(0..86_400 * 365));
            let bytes = fs::read(&path)?;
            self.manifest.media.insert(path, bytes);
        }
        Ok(())
    }

    /// Byte-identical copy of an existing media file under a new name
    pub fn duplicate_one(&mut self) -> anyhow::Result<PathBuf> {
        let (path, bytes) = self
            .manifest
            .media
            .iter()
            .next()
            .map(|(p, b)| (p.clone(), b.clone()))
            .ok_or_else(|| anyhow::anyhow!("no media generated"))?;
        let ext = path.extension().unwrap().to_string_lossy().into_owned();
        let copy = self.source.path().join(format!("copy-of-first.{ext}"));
        fs::write(&copy, &bytes)?;
        self.manifest.media.insert(copy.clone(), bytes);
        Ok(copy)
    }

    /// Ingest the source tree with `workers` parsers
    pub fn ingest(&self, workers: usize) -> anyhow::Result<(Vec<Outcome>, Summary)> {
        let mut run = PipelineBuilder::new()
            .workers(workers)
            .build(self.source.path(), self.dest.path())?
            .run()?;
        let outcomes: Vec<Outcome> = (&mut run).collect();
        let summary = run.finish()?;
        info!("Ingested with {} workers: {:?}", workers, summary);
        Ok((outcomes, summary))
    }

    pub fn content_files(&self) -> BTreeSet<PathBuf> {
        fixtures::list_files(&self.dest.path().join("content"))
    }

    pub fn date_files(&self) -> BTreeSet<PathBuf> {
        fixtures::list_files(&self.dest.path().join("date"))
    }
}

#[test]
fn test_generated_dump_is_fully_accounted_for() -> anyhow::Result<()> {
    let mut harness = ArchiveHarness::new(7);
    harness.generate(60)?;
    harness.duplicate_one()?;

    let (outcomes, summary) = harness.ingest(4)?;
    let m = &harness.manifest;

    assert_eq!(summary.total(), m.media.len() + m.corrupt.len());
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.skipped, m.corrupt.len());
    assert_eq!(summary.placed, m.distinct());
    assert_eq!(summary.duplicates, m.media.len() - m.distinct());

    let skipped: BTreeSet<PathBuf> = outcomes
        .iter()
        .filter(|o| matches!(o, Outcome::Skipped { .. }))
        .map(|o| o.path().to_path_buf())
        .collect();
    assert_eq!(&skipped, &m.corrupt);

    // One content entry and one date entry per distinct file
    assert_eq!(harness.content_files().len(), m.distinct());
    assert_eq!(harness.date_files().len(), m.distinct());
    Ok(())
}

#[test]
fn test_archived_bytes_match_sources() -> anyhow::Result<()> {
    let mut harness = ArchiveHarness::new(11);
    harness.generate(30)?;
    let (outcomes, _) = harness.ingest(3)?;

    for outcome in outcomes {
        if let Outcome::Placed { record, content, link } = outcome {
            let original = &harness.manifest.media[&record.source_path];
            assert_eq!(&fs::read(&content)?, original);
            assert_eq!(&fs::read(&link)?, original);
            assert_eq!(hash_file_content(&content)?, record.content_digest);
        }
    }
    Ok(())
}

#[test]
fn test_worker_count_does_not_change_the_archive() -> anyhow::Result<()> {
    let mut layouts = Vec::new();
    for workers in [1, 2, 8] {
        let mut harness = ArchiveHarness::new(23);
        harness.generate(40)?;
        harness.ingest(workers)?;
        layouts.push(harness.content_files());
    }
    assert_eq!(layouts[0], layouts[1]);
    assert_eq!(layouts[1], layouts[2]);
    Ok(())
}

#[test]
fn test_second_ingest_adds_only_new_files() -> anyhow::Result<()> {
    let mut harness = ArchiveHarness::new(31);
    harness.generate(20)?;
    let (_, first) = harness.ingest(2)?;

    let extra = harness.source.path().join("late-arrival.mov");
    fs::write(&extra, b"brand new clip")?;
    let (outcomes, second) = harness.ingest(2)?;

    assert_eq!(second.placed, 1);
    assert_eq!(second.duplicates, first.placed + first.duplicates);
    let placed: Vec<&Path> = outcomes
        .iter()
        .filter(|o| matches!(o, Outcome::Placed { .. }))
        .map(|o| o.path())
        .collect();
    assert_eq!(placed, vec![extra.as_path()]);
    Ok(())
}

#[test]
fn test_exif_dates_file_under_their_month() -> anyhow::Result<()> {
    let harness = ArchiveHarness::new(0);
    let path = harness.source.path().join("holiday.jpg");
    fixtures::write_jpeg(&path, 200, Some("2009:07:14 18:45:00"));
    fixtures::set_mtime(&path, fixtures::OCT_21_2012);

    let (outcomes, _) = harness.ingest(1)?;
    let link = match &outcomes[..] {
        [Outcome::Placed { link, record, .. }] => {
            assert_eq!(record.time_source, TimeSource::Exif);
            link.clone()
        }
        other => anyhow::bail!("unexpected outcomes: {:?}", other),
    };
    let relative = link.strip_prefix(harness.dest.path().join("date"))?;
    assert!(relative.starts_with("2009/07"), "{}", relative.display());
    Ok(())
}
