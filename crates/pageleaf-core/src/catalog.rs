//! Turns a chapter's flat file list into logical pages.
//!
//! Files named as alternates or translations in the sidecar never become
//! pages of their own; they are folded into the page of their group key.
//! References that cannot be found on disk are dropped silently.

use crate::archive::{self, is_archive, split_virtual};
use crate::media::{MediaKind, compare_variants, is_supported_media};
use crate::ordering::{file_name_lossy, sort_by_number};
use crate::sidecar::{ChapterGroups, GroupEntry};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const ALTS_DIR: &str = "alts";
pub const TRANSLATIONS_DIR: &str = "translations";

/// One logical reading unit. `variants[0]` is always the main file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub variants: Vec<PathBuf>,
    pub translations: BTreeMap<String, PathBuf>,
    pub current_variant_index: usize,
    pub active_translation: Option<String>,
    pub is_spread: bool,
    pub is_spread_explicit: bool,
}

impl Page {
    pub fn single(path: PathBuf) -> Self {
        Self {
            variants: vec![path],
            translations: BTreeMap::new(),
            current_variant_index: 0,
            active_translation: None,
            is_spread: false,
            is_spread_explicit: false,
        }
    }

    pub fn main_file(&self) -> &Path {
        &self.variants[0]
    }

    pub fn main_file_name(&self) -> String {
        file_name_lossy(self.main_file())
    }

    pub fn current_variant(&self) -> &Path {
        &self.variants[self.current_variant_index]
    }

    /// The file to display: the active translation, else the selected variant.
    pub fn effective_path(&self) -> &Path {
        self.active_translation
            .as_ref()
            .and_then(|lang| self.translations.get(lang))
            .map(PathBuf::as_path)
            .unwrap_or_else(|| self.current_variant())
    }

    /// Select a variant. Out-of-range indices are ignored.
    pub fn set_variant(&mut self, index: usize) -> bool {
        if index >= self.variants.len() || index == self.current_variant_index {
            return false;
        }
        self.current_variant_index = index;
        true
    }

    /// Activate `lang` when this page has it, otherwise fall back to the
    /// variant. Returns whether the active translation changed.
    pub fn apply_language(&mut self, lang: Option<&str>) -> bool {
        let next = lang
            .filter(|lang| self.translations.contains_key(*lang))
            .map(str::to_string);
        if next == self.active_translation {
            return false;
        }
        self.active_translation = next;
        true
    }

    /// Every file backing this page, variants first.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.variants
            .iter()
            .chain(self.translations.values())
            .map(PathBuf::as_path)
    }
}

/// Filesystem access needed while building a catalog.
pub trait MediaProbe {
    fn exists(&self, path: &Path) -> bool;
    /// Pixel size from the file header, when the file is an image.
    fn dimensions(&self, path: &Path) -> Option<(u32, u32)>;

    /// Media files of a chapter in reading order.
    fn chapter_files(&self, chapter_dir: &Path) -> Result<Vec<PathBuf>> {
        scan_chapter(chapter_dir)
    }
}

/// Probe backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl MediaProbe for FsProbe {
    fn exists(&self, path: &Path) -> bool {
        match split_virtual(path) {
            Some(_) => archive::entry_exists(path),
            None => path.is_file(),
        }
    }

    fn dimensions(&self, path: &Path) -> Option<(u32, u32)> {
        if !MediaKind::from_path(path).is_some_and(MediaKind::has_image_header) {
            return None;
        }
        let size = match split_virtual(path) {
            Some(_) => archive::entry_dimensions(path),
            None => image::image_dimensions(path).map_err(anyhow::Error::from),
        };
        match size {
            Ok(size) => Some(size),
            Err(err) => {
                warn!(path = %path.display(), "Failed to read image header: {err:#}");
                None
            }
        }
    }
}

/// Groups one chapter's files into pages using the chapter's sidecar groups.
pub struct CatalogBuilder<'a> {
    chapter_dir: &'a Path,
    files: &'a [PathBuf],
    groups: &'a ChapterGroups,
    probe: &'a dyn MediaProbe,
    lookup: HashMap<String, &'a Path>,
}

impl<'a> CatalogBuilder<'a> {
    pub fn new(
        chapter_dir: &'a Path,
        files: &'a [PathBuf],
        groups: &'a ChapterGroups,
        probe: &'a dyn MediaProbe,
    ) -> Self {
        let lookup = files
            .iter()
            .map(|path| (file_name_lossy(path), path.as_path()))
            .collect();
        Self {
            chapter_dir,
            files,
            groups,
            probe,
            lookup,
        }
    }

    /// Build pages in input order of their main files.
    pub fn build(&self) -> Vec<Page> {
        let referenced = self.groups.referenced_files();
        let mut claimed: HashSet<PathBuf> = HashSet::new();
        let mut pages = Vec::new();

        for path in self.files {
            let name = file_name_lossy(path);
            if referenced.contains(name.as_str()) || claimed.contains(path) {
                continue;
            }
            let mut page = self.resolve(path);
            page.variants.retain(|variant| {
                variant == path || !claimed.contains(variant)
            });
            page.translations
                .retain(|_, file| !claimed.contains(file.as_path()));
            claimed.extend(page.files().map(Path::to_path_buf));
            pages.push(page);
        }

        debug!(
            chapter = %self.chapter_dir.display(),
            files = self.files.len(),
            pages = pages.len(),
            "Built page catalog"
        );
        pages
    }

    /// Resolve one main file against its group entry, if it has one.
    pub fn resolve(&self, main_path: &Path) -> Page {
        let name = file_name_lossy(main_path);
        match self.groups.get(&name) {
            Some(entry) => self.resolve_group(main_path, entry),
            None => Page::single(main_path.to_path_buf()),
        }
    }

    fn resolve_group(&self, main_path: &Path, entry: &GroupEntry) -> Page {
        let (alt_names, translation_names) =
            self.collect_chain(&file_name_lossy(main_path), entry);

        let mut alts: Vec<PathBuf> = alt_names
            .iter()
            .filter_map(|alt| {
                let fallback = chapter_child(self.chapter_dir, &[ALTS_DIR, alt.as_str()]);
                self.resolve_reference(alt, fallback)
            })
            .filter(|alt| alt != main_path)
            .collect();
        alts.sort_by(|a, b| compare_variants(a, b));
        alts.dedup();

        let translations = translation_names
            .iter()
            .filter_map(|(lang, file)| {
                let parts = [TRANSLATIONS_DIR, lang.as_str(), file.as_str()];
                let fallback = chapter_child(self.chapter_dir, &parts);
                self.resolve_reference(file, fallback)
                    .map(|path| (lang.clone(), path))
            })
            .collect();

        let mut variants = Vec::with_capacity(alts.len() + 1);
        variants.push(main_path.to_path_buf());
        variants.extend(alts);

        Page {
            variants,
            translations,
            current_variant_index: 0,
            active_translation: None,
            is_spread: entry.spread.unwrap_or(false),
            is_spread_explicit: entry.spread_explicit,
        }
    }

    /// Alternate and translation names of a group, following alternates that
    /// are group keys themselves (`{"a": ["b"], "b": ["c"]}` gives `a` both
    /// `b` and `c`). Chained translations only fill languages still free.
    fn collect_chain(
        &self,
        main_name: &str,
        entry: &GroupEntry,
    ) -> (Vec<String>, BTreeMap<String, String>) {
        let mut alts = Vec::new();
        let mut translations = BTreeMap::new();
        let mut visited = HashSet::from([main_name.to_string()]);
        let mut pending = vec![entry];
        while let Some(group) = pending.pop() {
            for (lang, file) in &group.translations {
                translations
                    .entry(lang.clone())
                    .or_insert_with(|| file.clone());
            }
            for alt in &group.alts {
                if !visited.insert(alt.clone()) {
                    continue;
                }
                alts.push(alt.clone());
                if let Some(chained) = self.groups.get(alt) {
                    debug!(group = %alt, into = main_name, "Following chained group");
                    pending.push(chained);
                }
            }
        }
        (alts, translations)
    }

    fn resolve_reference(&self, file_name: &str, fallback: PathBuf) -> Option<PathBuf> {
        if let Some(path) = self.lookup.get(file_name) {
            return Some(path.to_path_buf());
        }
        if self.probe.exists(&fallback) {
            Some(fallback)
        } else {
            debug!(file = file_name, "Skipping missing referenced file");
            None
        }
    }
}

/// Path of `parts` below a chapter: a plain join for directories, an entry
/// path for archives.
pub fn chapter_child(chapter_dir: &Path, parts: &[&str]) -> PathBuf {
    if is_archive(chapter_dir) {
        archive::virtual_path(chapter_dir, &parts.join("/"))
    } else {
        parts
            .iter()
            .fold(chapter_dir.to_path_buf(), |path, part| path.join(part))
    }
}

/// Supported media files directly inside a chapter directory, in reading
/// order. Archive chapters list their image entries instead.
pub fn scan_chapter(chapter_dir: &Path) -> Result<Vec<PathBuf>> {
    if is_archive(chapter_dir) && chapter_dir.is_file() {
        return archive::list_entries(chapter_dir);
    }
    let entries = fs::read_dir(chapter_dir)
        .with_context(|| format!("Failed to read chapter dir {}", chapter_dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to list {}", chapter_dir.display()))?
            .path();
        if path.is_file() && is_supported_media(&path) {
            files.push(path);
        }
    }
    sort_by_number(&mut files);
    Ok(files)
}

/// Chapters of a series (directories and `.zip` archives), ordered by
/// chapter number.
pub fn scan_series(series_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(series_dir)
        .with_context(|| format!("Failed to read series dir {}", series_dir.display()))?;
    let mut chapters = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to list {}", series_dir.display()))?
            .path();
        let hidden = file_name_lossy(&path).starts_with('.');
        let is_chapter = path.is_dir() || (path.is_file() && is_archive(&path));
        if is_chapter && !hidden {
            chapters.push(path);
        }
    }
    sort_by_number(&mut chapters);
    Ok(chapters)
}
