//! Generated media files for the integration suites

use filetime::FileTime;
use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::collections::BTreeSet;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 2012-10-21 10:30:00 UTC
pub const OCT_21_2012: i64 = 1_350_815_400;

/// Baseline JPEG, optionally carrying an EXIF DateTimeOriginal
pub fn write_jpeg(path: &Path, shade: u8, taken: Option<&str>) {
    let img = RgbImage::from_pixel(16, 16, Rgb([shade, 255 - shade, shade / 2]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Jpeg).unwrap();
    let jpeg = out.into_inner();

    let Some(taken) = taken else {
        fs::write(path, jpeg).unwrap();
        return;
    };
    assert_eq!(taken.len(), 19);

    // IFD0 -> Exif IFD -> DateTimeOriginal, little-endian
    let mut tiff = b"II*\0".to_vec();
    tiff.extend_from_slice(&8u32.to_le_bytes());
    for (tag, kind, count, value) in [(0x8769u16, 4u16, 1u32, 26u32), (0x9003, 2, 20, 44)] {
        tiff.extend_from_slice(&1u16.to_le_bytes());
        tiff.extend_from_slice(&tag.to_le_bytes());
        tiff.extend_from_slice(&kind.to_le_bytes());
        tiff.extend_from_slice(&count.to_le_bytes());
        tiff.extend_from_slice(&value.to_le_bytes());
        tiff.extend_from_slice(&0u32.to_le_bytes());
    }
    tiff.extend_from_slice(taken.as_bytes());
    tiff.push(0);

    let mut payload = b"Exif\0\0".to_vec();
    payload.extend_from_slice(&tiff);
    let len = (payload.len() as u16 + 2).to_be_bytes();

    let mut bytes = jpeg[..2].to_vec();
    bytes.extend_from_slice(&[0xFF, 0xE1, len[0], len[1]]);
    bytes.extend_from_slice(&payload);
    bytes.extend_from_slice(&jpeg[2..]);
    fs::write(path, bytes).unwrap();
}

fn rgba(shade: u8) -> RgbaImage {
    RgbaImage::from_pixel(8, 8, Rgba([shade, shade / 3, 255 - shade, 255]))
}

/// 8x8 PNG
pub fn write_png(path: &Path, shade: u8) {
    rgba(shade).save_with_format(path, ImageFormat::Png).unwrap();
}

/// 8x8 GIF
pub fn write_gif(path: &Path, shade: u8) {
    let mut out = Cursor::new(Vec::new());
    rgba(shade).write_to(&mut out, ImageFormat::Gif).unwrap();
    fs::write(path, out.into_inner()).unwrap();
}

/// Set the modification time to `secs` after the epoch
pub fn set_mtime(path: &Path, secs: i64) {
    filetime::set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
}

/// Every regular file under `root`, relative to it
pub fn list_files(root: &Path) -> BTreeSet<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
        .collect()
}
