//! Chapters packed as `.zip` archives.
//!
//! Entries are addressed with virtual paths of the form `<archive>|<entry>`,
//! so they flow through the catalog, the sidecar and the path index like any
//! other file path.

use crate::media::MediaKind;
use crate::ordering::sort_by_number;
use anyhow::{Context, Result, anyhow};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

pub const ARCHIVE_SEPARATOR: char = '|';

const RESOURCE_FORK_DIR: &str = "__MACOSX";

pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

pub fn virtual_path(archive: &Path, entry: &str) -> PathBuf {
    PathBuf::from(format!(
        "{}{ARCHIVE_SEPARATOR}{entry}",
        archive.to_string_lossy()
    ))
}

/// Archive path and entry name of a virtual path.
pub fn split_virtual(path: &Path) -> Option<(PathBuf, String)> {
    let text = path.to_str()?;
    let (archive, entry) = text.split_once(ARCHIVE_SEPARATOR)?;
    let archive = PathBuf::from(archive);
    if entry.is_empty() || !is_archive(&archive) {
        return None;
    }
    Some((archive, entry.to_string()))
}

/// Entry names inside `alts/` and `translations/` are variants, never pages.
fn is_page_entry(name: &str) -> bool {
    if name.starts_with(RESOURCE_FORK_DIR) || name.ends_with('/') {
        return false;
    }
    let top = name.split('/').next().unwrap_or_default();
    let nested_store = name.contains('/')
        && (top == crate::catalog::ALTS_DIR || top == crate::catalog::TRANSLATIONS_DIR);
    !nested_store && MediaKind::from_path(Path::new(name)).is_some_and(MediaKind::has_image_header)
}

fn open(archive: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(archive)
        .with_context(|| format!("Failed to open archive {}", archive.display()))?;
    ZipArchive::new(file).with_context(|| format!("Invalid zip archive {}", archive.display()))
}

/// Image entries of an archive chapter as virtual paths, in reading order.
pub fn list_entries(archive: &Path) -> Result<Vec<PathBuf>> {
    let zip = open(archive)?;
    let mut entries: Vec<PathBuf> = zip
        .file_names()
        .filter(|name| is_page_entry(name))
        .map(|name| virtual_path(archive, name))
        .collect();
    sort_by_number(&mut entries);
    Ok(entries)
}

pub fn entry_exists(path: &Path) -> bool {
    let Some((archive, entry)) = split_virtual(path) else {
        return false;
    };
    open(&archive)
        .map(|zip| zip.file_names().any(|name| name == entry))
        .unwrap_or(false)
}

pub fn read_entry(path: &Path) -> Result<Vec<u8>> {
    let (archive, entry) =
        split_virtual(path).ok_or_else(|| anyhow!("Not an archive path: {}", path.display()))?;
    let mut zip = open(&archive)?;
    let mut file = zip
        .by_name(&entry)
        .with_context(|| format!("Missing entry {entry} in {}", archive.display()))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .with_context(|| format!("Failed to read entry {entry}"))?;
    Ok(bytes)
}

/// Pixel size of an image entry, decoded from its header.
pub fn entry_dimensions(path: &Path) -> Result<(u32, u32)> {
    let bytes = read_entry(path)?;
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("Failed to sniff image format")?
        .into_dimensions()
        .with_context(|| format!("Failed to read image header of {}", path.display()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ordering::file_name_lossy;
    use std::io::Write;
    use std::time::{SystemTime, UNIX_EPOCH};
    use zip::write::SimpleFileOptions;

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        image::DynamicImage::new_rgb8(width, height)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("png should encode");
        bytes
    }

    pub(crate) fn write_zip(path: &Path, entries: &[(&str, Vec<u8>)]) {
        let file = File::create(path).expect("archive should be created");
        let mut writer = zip::ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, bytes) in entries {
            writer
                .start_file(*name, options)
                .expect("entry should start");
            writer.write_all(bytes).expect("entry should be written");
        }
        writer.finish().expect("archive should finish");
    }

    fn temp_dir(prefix: &str) -> PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("pageleaf_archive_{prefix}_{now}"));
        std::fs::create_dir_all(&dir).expect("temp dir should be created");
        dir
    }

    #[test]
    fn virtual_paths_split_back_into_archive_and_entry() {
        let path = virtual_path(Path::new("/s/Ch.1.zip"), "pages/003.jpg");
        assert_eq!(
            split_virtual(&path),
            Some((PathBuf::from("/s/Ch.1.zip"), "pages/003.jpg".to_string()))
        );
        assert_eq!(file_name_lossy(&path), "003.jpg");
        assert_eq!(split_virtual(Path::new("/s/a|b.jpg")), None);
        assert_eq!(split_virtual(Path::new("/s/Ch.1/001.jpg")), None);
    }

    #[test]
    fn lists_image_entries_and_reads_headers() {
        let dir = temp_dir("list");
        let archive = dir.join("Chapter 3.zip");
        write_zip(
            &archive,
            &[
                ("10.jpg", b"x".to_vec()),
                ("__MACOSX/._2.png", b"x".to_vec()),
                ("2.png", png_bytes(6, 3)),
                ("notes.txt", b"x".to_vec()),
                ("clip.mp4", b"x".to_vec()),
                ("alts/2_1.png", png_bytes(6, 3)),
            ],
        );

        let entries = list_entries(&archive).expect("archive should list");
        let names: Vec<_> = entries.iter().map(|p| file_name_lossy(p)).collect();
        assert_eq!(names, vec!["2.png", "10.jpg"]);

        assert!(entry_exists(&virtual_path(&archive, "alts/2_1.png")));
        assert!(!entry_exists(&virtual_path(&archive, "missing.png")));
        assert_eq!(
            entry_dimensions(&virtual_path(&archive, "2.png")).expect("header should read"),
            (6, 3)
        );
        assert!(entry_dimensions(&virtual_path(&archive, "10.jpg")).is_err());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn corrupt_archive_is_an_error() {
        let dir = temp_dir("corrupt");
        let archive = dir.join("broken.zip");
        std::fs::write(&archive, b"not a zip").expect("file should be written");
        assert!(list_entries(&archive).is_err());
        let _ = std::fs::remove_dir_all(dir);
    }
}
