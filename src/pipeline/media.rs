//! Media archive index and image dimension probing.
//!
//! The archive is walked once per conversion; every post then resolves its
//! image URLs against the same read-only [`MediaIndex`].

use crate::error::{FigureError, Wp2LatexError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Files to ignore during the archive scan.
const IGNORED_FILES: &[&str] = &[".DS_Store", "Thumbs.db"];

/// File name → path lookup over an exported media directory.
#[derive(Debug, Clone, Default)]
pub struct MediaIndex {
    root: PathBuf,
    files: HashMap<String, PathBuf>,
}

impl MediaIndex {
    /// Walk `root` recursively and index every file by its name.
    ///
    /// Entries are visited in sorted order and the first path seen for a
    /// name wins, so duplicate names across upload folders resolve the same
    /// way on every run.
    pub fn build(root: &Path) -> Result<Self, Wp2LatexError> {
        if !root.is_dir() {
            return Err(Wp2LatexError::MediaArchiveMissing {
                path: root.to_path_buf(),
            });
        }

        let mut files = HashMap::new();
        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if IGNORED_FILES.contains(&name) {
                continue;
            }
            files
                .entry(name.to_string())
                .or_insert_with(|| entry.path().to_path_buf());
        }

        info!("Indexed {} media files under {}", files.len(), root.display());
        Ok(Self {
            root: root.to_path_buf(),
            files,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Look a bare file name up.
    pub fn lookup(&self, file_name: &str) -> Option<&Path> {
        self.files.get(file_name).map(PathBuf::as_path)
    }

    /// Resolve an image URL to a file in the archive.
    ///
    /// Tries the URL's last path segment, then the same name without a
    /// WordPress resize suffix (`photo-1024x768.jpg` → `photo.jpg`).
    pub fn resolve_url(&self, url: &str) -> Result<&Path, FigureError> {
        let file_name = file_name_from_url(url).ok_or_else(|| FigureError::MalformedMarker {
            marker: url.to_string(),
        })?;

        if let Some(path) = self.lookup(&file_name) {
            return Ok(path);
        }
        if let Some(original) = strip_size_suffix(&file_name) {
            if let Some(path) = self.lookup(&original) {
                debug!("Resolved {} via original upload {}", file_name, original);
                return Ok(path);
            }
        }

        Err(FigureError::Unresolved {
            url: url.to_string(),
            file_name,
        })
    }
}

/// Last path segment of a URL, without query string or fragment.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.trim_end_matches('/').rsplit('/').next()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

static RE_SIZE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)-\d+x\d+(\.[A-Za-z0-9]+)$").unwrap());

fn strip_size_suffix(name: &str) -> Option<String> {
    RE_SIZE_SUFFIX
        .captures(name)
        .map(|caps| format!("{}{}", &caps[1], &caps[2]))
}

// ── Probing ──────────────────────────────────────────────────────────────────

/// Landscape or portrait, decided by the pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    /// Landscape iff strictly wider than tall; squares are portrait.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if width > height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

/// Byte offset of the height field in a baseline JFIF file written by
/// common cameras and WordPress' image editor.
const JPEG_SOF_OFFSET: u64 = 163;

/// Read `(width, height)` of an image without decoding it.
///
/// Uses the `image` crate's header readers first and falls back to a
/// fixed-offset JPEG read for files the decoders reject.
pub fn probe_dimensions(path: &Path) -> Result<(u32, u32), FigureError> {
    if !path.is_file() {
        return Err(FigureError::ImageNotFound {
            path: path.to_path_buf(),
        });
    }

    match image::image_dimensions(path) {
        Ok(dims) => Ok(dims),
        Err(e) => {
            debug!("Header read failed for {}: {}; trying JPEG fallback", path.display(), e);
            match jpeg_fixed_offset(path) {
                Ok((w, h)) if w > 0 && h > 0 => Ok((w, h)),
                Ok(_) => Err(FigureError::ProbeFailed {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                }),
                Err(io) => Err(FigureError::ProbeFailed {
                    path: path.to_path_buf(),
                    detail: format!("{e}; fallback: {io}"),
                }),
            }
        }
    }
}

fn jpeg_fixed_offset(path: &Path) -> std::io::Result<(u32, u32)> {
    let mut f = File::open(path)?;
    f.seek(SeekFrom::Start(JPEG_SOF_OFFSET))?;
    let mut buf = [0u8; 4];
    f.read_exact(&mut buf)?;
    let height = u16::from_be_bytes([buf[0], buf[1]]) as u32;
    let width = u16::from_be_bytes([buf[2], buf[3]]) as u32;
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_png(path: &Path, w: u32, h: u32) {
        image::RgbImage::new(w, h).save(path).unwrap();
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("http://assets.example/img/dsc01.jpg?w=640").as_deref(),
            Some("dsc01.jpg")
        );
        assert_eq!(
            file_name_from_url("https://x/a/b.png#top").as_deref(),
            Some("b.png")
        );
        assert_eq!(file_name_from_url("").as_deref(), None);
    }

    #[test]
    fn test_strip_size_suffix() {
        assert_eq!(
            strip_size_suffix("photo-1024x768.jpg").as_deref(),
            Some("photo.jpg")
        );
        assert_eq!(strip_size_suffix("photo.jpg"), None);
    }

    #[test]
    fn test_orientation() {
        assert_eq!(Orientation::from_dimensions(40, 20), Orientation::Landscape);
        assert_eq!(Orientation::from_dimensions(20, 40), Orientation::Portrait);
        assert_eq!(Orientation::from_dimensions(30, 30), Orientation::Portrait);
    }

    #[test]
    fn test_index_and_resolve() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("2020/04")).unwrap();
        write_png(&dir.path().join("2020/04/wide.png"), 40, 20);

        let index = MediaIndex::build(dir.path()).unwrap();
        assert_eq!(index.len(), 1);

        let p = index
            .resolve_url("http://assets.example/img/wide.png")
            .unwrap();
        assert!(p.ends_with("2020/04/wide.png"));

        let p = index
            .resolve_url("http://assets.example/img/wide-300x150.png")
            .unwrap();
        assert!(p.ends_with("wide.png"));

        let err = index.resolve_url("http://x/missing.png").unwrap_err();
        assert!(matches!(err, FigureError::Unresolved { .. }));
    }

    #[test]
    fn test_first_match_wins() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        write_png(&dir.path().join("a/same.png"), 10, 20);
        write_png(&dir.path().join("b/same.png"), 20, 10);

        let index = MediaIndex::build(dir.path()).unwrap();
        assert!(index.lookup("same.png").unwrap().starts_with(dir.path().join("a")));
    }

    #[test]
    fn test_missing_archive() {
        let err = MediaIndex::build(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, Wp2LatexError::MediaArchiveMissing { .. }));
    }

    #[test]
    fn test_probe_png() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("tall.png");
        write_png(&p, 12, 34);
        assert_eq!(probe_dimensions(&p).unwrap(), (12, 34));
    }

    #[test]
    fn test_probe_missing_file() {
        let err = probe_dimensions(Path::new("/nope/missing.jpg")).unwrap_err();
        assert!(matches!(err, FigureError::ImageNotFound { .. }));
    }

    #[test]
    fn test_probe_jpeg_fallback() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("odd.jpg");
        let mut bytes = vec![0u8; 200];
        bytes[163..165].copy_from_slice(&480u16.to_be_bytes());
        bytes[165..167].copy_from_slice(&640u16.to_be_bytes());
        std::fs::write(&p, &bytes).unwrap();
        assert_eq!(probe_dimensions(&p).unwrap(), (640, 480));
    }

    #[test]
    fn test_probe_garbage_fails() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("short.jpg");
        std::fs::write(&p, b"not an image").unwrap();
        assert!(matches!(
            probe_dimensions(&p).unwrap_err(),
            FigureError::ProbeFailed { .. }
        ));
    }
}
