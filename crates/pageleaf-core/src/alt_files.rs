//! Moving alternate files in and out of a chapter's `alts/` directory.
//!
//! Linked alternates are renamed after their main page (`<main>_<n>.<ext>`)
//! so the directory stays readable by hand. Files inside archives are never
//! touched and keep their path.

use crate::archive::split_virtual;
use crate::catalog::ALTS_DIR;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Move,
    Copy,
}

/// Short hex tag that differs between calls for the same path.
fn unique_tag(seed: &Path, len: usize) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(seed.as_os_str().to_string_lossy().as_bytes());
    hasher.update(nanos.to_le_bytes());
    let mut tag = format!("{:x}", hasher.finalize());
    tag.truncate(len);
    tag
}

fn stem_and_extension(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    (stem, extension)
}

fn transfer(source: &Path, target: &Path, mode: Transfer) -> Result<()> {
    match mode {
        Transfer::Copy => {
            fs::copy(source, target).with_context(|| {
                format!("Failed to copy {} to {}", source.display(), target.display())
            })?;
        }
        Transfer::Move => {
            if fs::rename(source, target).is_err() {
                // Cross-device moves fall back to copy and delete.
                fs::copy(source, target).with_context(|| {
                    format!("Failed to move {} to {}", source.display(), target.display())
                })?;
                fs::remove_file(source)
                    .with_context(|| format!("Failed to remove {}", source.display()))?;
            }
        }
    }
    Ok(())
}

/// Put `source` into `<chapter>/alts/` as `<main stem>_<number><ext>`.
///
/// Returns the path the file now lives at. Missing files and archive
/// entries come back unchanged, as does a file already stored under the
/// target name. A taken name gets a random tag appended.
pub fn stash_alternate(
    chapter_dir: &Path,
    main_file: &Path,
    source: &Path,
    number: usize,
    mode: Transfer,
) -> Result<PathBuf> {
    if split_virtual(source).is_some() || split_virtual(main_file).is_some() || !source.is_file() {
        debug!(file = %source.display(), "Leaving alternate in place");
        return Ok(source.to_path_buf());
    }

    let alts_dir = chapter_dir.join(ALTS_DIR);
    let (main_stem, _) = stem_and_extension(main_file);
    let (_, extension) = stem_and_extension(source);
    let mut target = alts_dir.join(format!("{main_stem}_{number}{extension}"));
    if source == target {
        return Ok(target);
    }
    while target.exists() {
        let tag = unique_tag(source, 4);
        target = alts_dir.join(format!("{main_stem}_{number}_{tag}{extension}"));
    }

    fs::create_dir_all(&alts_dir)
        .with_context(|| format!("Failed to create {}", alts_dir.display()))?;
    transfer(source, &target, mode)?;
    info!(
        from = %source.display(),
        to = %target.display(),
        mode = ?mode,
        "Stored alternate"
    );
    Ok(target)
}

/// Rename a file under `alts/` to `<stem>_detached_<tag><ext>` so it no
/// longer matches any sidecar entry. Files elsewhere are left alone.
pub fn detach_alternate(path: &Path) -> Result<PathBuf> {
    let in_alts = path
        .parent()
        .and_then(Path::file_name)
        .is_some_and(|name| name == OsStr::new(ALTS_DIR));
    if !in_alts || split_virtual(path).is_some() || !path.is_file() {
        return Ok(path.to_path_buf());
    }
    let (stem, extension) = stem_and_extension(path);
    let target = path.with_file_name(format!(
        "{stem}_detached_{}{extension}",
        unique_tag(path, 8)
    ));
    fs::rename(path, &target).with_context(|| {
        format!("Failed to rename {} to {}", path.display(), target.display())
    })?;
    info!(from = %path.display(), to = %target.display(), "Detached alternate");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_chapter(prefix: &str) -> PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after epoch")
            .as_nanos();
        let dir = std::env::temp_dir()
            .join(format!("pageleaf_alts_{prefix}_{now}"))
            .join("Ch.1");
        fs::create_dir_all(&dir).expect("chapter dir should be created");
        dir
    }

    fn cleanup(chapter: &Path) {
        if let Some(series) = chapter.parent() {
            let _ = fs::remove_dir_all(series);
        }
    }

    #[test]
    fn moves_into_alts_under_the_main_page_name() {
        let chapter = temp_chapter("move");
        let main = chapter.join("05.jpg");
        let source = chapter.join("extra.png");
        fs::write(&source, b"x").expect("file should be written");

        let stored =
            stash_alternate(&chapter, &main, &source, 1, Transfer::Move).expect("move should work");

        assert_eq!(stored, chapter.join("alts").join("05_1.png"));
        assert!(stored.is_file());
        assert!(!source.exists());
        cleanup(&chapter);
    }

    #[test]
    fn taken_names_get_a_tag_and_copies_keep_the_source() {
        let chapter = temp_chapter("collision");
        let main = chapter.join("05.jpg");
        fs::create_dir_all(chapter.join("alts")).expect("alts dir should be created");
        fs::write(chapter.join("alts").join("05_1.jpg"), b"old").expect("file should be written");
        let outside = chapter.parent().expect("series dir").join("scan.jpg");
        fs::write(&outside, b"new").expect("file should be written");

        let stored = stash_alternate(&chapter, &main, &outside, 1, Transfer::Copy)
            .expect("copy should work");

        let name = stored.file_name().map(|n| n.to_string_lossy().to_string());
        let name = name.expect("stored file should have a name");
        assert!(name.starts_with("05_1_") && name.ends_with(".jpg"), "{name}");
        assert_eq!(fs::read(&stored).expect("copy should exist"), b"new");
        assert!(outside.is_file());
        cleanup(&chapter);
    }

    #[test]
    fn missing_and_already_stored_files_stay_put() {
        let chapter = temp_chapter("noop");
        let main = chapter.join("05.jpg");
        let missing = chapter.join("gone.jpg");
        assert_eq!(
            stash_alternate(&chapter, &main, &missing, 1, Transfer::Move).expect("no-op"),
            missing
        );

        let stored = chapter.join("alts").join("05_2.jpg");
        fs::create_dir_all(chapter.join("alts")).expect("alts dir should be created");
        fs::write(&stored, b"x").expect("file should be written");
        assert_eq!(
            stash_alternate(&chapter, &main, &stored, 2, Transfer::Move).expect("no-op"),
            stored
        );
        cleanup(&chapter);
    }

    #[test]
    fn detaching_renames_only_files_under_alts() {
        let chapter = temp_chapter("detach");
        let alt = chapter.join("alts").join("05_1.jpg");
        fs::create_dir_all(chapter.join("alts")).expect("alts dir should be created");
        fs::write(&alt, b"x").expect("file should be written");
        let loose = chapter.join("05_b.jpg");
        fs::write(&loose, b"x").expect("file should be written");

        let detached = detach_alternate(&alt).expect("rename should work");
        let name = detached
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        assert!(name.starts_with("05_1_detached_") && name.ends_with(".jpg"), "{name}");
        assert_eq!(detached.parent(), alt.parent());
        assert!(!alt.exists());

        assert_eq!(detach_alternate(&loose).expect("no-op"), loose);
        assert!(loose.is_file());
        cleanup(&chapter);
    }
}
