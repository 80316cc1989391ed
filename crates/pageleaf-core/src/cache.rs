//! Remembers the last chapter and page read per series.
//!
//! Entries live under `<cache_dir>/<sha256 of series path>/bookmark.toml` so
//! arbitrary series paths never turn into awkward file names. Reads and
//! writes are best-effort.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const BOOKMARK_FILE: &str = "bookmark.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Chapter directory name.
    pub chapter: String,
    pub page: usize,
}

/// Load the bookmark for a series, if present and readable.
pub fn load_bookmark(cache_dir: &Path, series_path: &Path) -> Option<Bookmark> {
    let path = bookmark_path(cache_dir, series_path);
    let data = fs::read_to_string(&path).ok()?;
    match toml::from_str(&data) {
        Ok(bookmark) => Some(bookmark),
        Err(err) => {
            warn!(path = %path.display(), "Ignoring unreadable bookmark: {err}");
            None
        }
    }
}

/// Persist the reading position. Failures are logged and otherwise ignored.
pub fn save_bookmark(cache_dir: &Path, series_path: &Path, bookmark: &Bookmark) {
    if let Err(err) = try_save_bookmark(cache_dir, series_path, bookmark) {
        warn!(series = %series_path.display(), "Failed to save bookmark: {err:#}");
    }
}

fn try_save_bookmark(cache_dir: &Path, series_path: &Path, bookmark: &Bookmark) -> Result<()> {
    let path = bookmark_path(cache_dir, series_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let contents = toml::to_string(bookmark).context("Failed to serialize bookmark")?;
    fs::write(&path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    debug!(path = %path.display(), chapter = %bookmark.chapter, page = bookmark.page, "Saved bookmark");
    Ok(())
}

pub fn hash_dir(cache_dir: &Path, series_path: &Path) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(series_path.as_os_str().to_string_lossy().as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    cache_dir.join(hash)
}

fn bookmark_path(cache_dir: &Path, series_path: &Path) -> PathBuf {
    hash_dir(cache_dir, series_path).join(BOOKMARK_FILE)
}
