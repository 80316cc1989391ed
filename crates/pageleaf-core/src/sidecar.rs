//! Per-series sidecar file describing page groupings.
//!
//! The file (`info.json` by default) sits in the series directory and maps
//! chapter name -> main file name -> group entry. Older files store a group
//! as a bare list of alternates; those are migrated in memory on read and
//! always written back in the object form.
//!
//! Chapters and groups keep the order they have in the file, and "first
//! group" below always means first in that order.
//!
//! Writes are best-effort and unlocked: two writers touching the same series
//! race and the later write wins.

use crate::media::compare_variants;
use crate::ordering::file_name_lossy;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_SIDECAR_FILE_NAME: &str = "info.json";

/// One group: a main file plus its alternates and translation overlays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawGroupEntry")]
pub struct GroupEntry {
    pub alts: Vec<String>,
    pub translations: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spread: Option<bool>,
    #[serde(skip_serializing_if = "is_false")]
    pub spread_explicit: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Shapes a group value may take on disk.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawGroupEntry {
    Legacy(Vec<String>),
    Canonical(CanonicalGroupEntry),
}

#[derive(Deserialize)]
struct CanonicalGroupEntry {
    #[serde(default)]
    alts: Vec<String>,
    #[serde(default)]
    translations: IndexMap<String, String>,
    #[serde(default)]
    spread: Option<bool>,
    #[serde(default)]
    spread_explicit: bool,
}

impl From<RawGroupEntry> for GroupEntry {
    fn from(raw: RawGroupEntry) -> Self {
        match raw {
            RawGroupEntry::Legacy(alts) => GroupEntry {
                alts,
                ..GroupEntry::default()
            },
            RawGroupEntry::Canonical(entry) => GroupEntry {
                alts: entry.alts,
                translations: entry.translations,
                spread: entry.spread,
                spread_explicit: entry.spread_explicit,
            },
        }
    }
}

impl GroupEntry {
    pub fn is_empty(&self) -> bool {
        self.alts.is_empty() && self.translations.is_empty() && self.spread.is_none()
    }

    /// Add alternates, keeping the list deduplicated, sorted, and free of the
    /// main file itself.
    fn merge_alts<'a>(&mut self, main_name: &str, names: impl IntoIterator<Item = &'a String>) {
        for name in names {
            if name != main_name && !self.alts.contains(name) {
                self.alts.push(name.clone());
            }
        }
        self.alts
            .sort_by(|a, b| compare_variants(Path::new(a), Path::new(b)));
    }

    /// Drop `name` from alts and from any translation value.
    fn forget(&mut self, name: &str) {
        self.alts.retain(|alt| alt != name);
        self.translations.retain(|_, file| file != name);
    }

    fn references(&self, name: &str) -> bool {
        self.alts.iter().any(|alt| alt == name) || self.translations.values().any(|f| f == name)
    }
}

/// Groups of a single chapter, keyed by main file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChapterGroups {
    groups: IndexMap<String, GroupEntry>,
}

impl ChapterGroups {
    pub fn get(&self, main_name: &str) -> Option<&GroupEntry> {
        self.groups.get(main_name)
    }

    pub fn contains_key(&self, main_name: &str) -> bool {
        self.groups.contains_key(main_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &GroupEntry)> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Every file named as an alternate or translation anywhere in the chapter.
    pub fn referenced_files(&self) -> HashSet<&str> {
        self.groups
            .values()
            .flat_map(|entry| {
                entry
                    .alts
                    .iter()
                    .chain(entry.translations.values())
                    .map(String::as_str)
            })
            .collect()
    }

    fn entry_mut(&mut self, main_name: &str) -> &mut GroupEntry {
        self.groups.entry(main_name.to_string()).or_default()
    }

    fn remove_if_empty(&mut self, main_name: &str) {
        if self.groups.get(main_name).is_some_and(GroupEntry::is_empty) {
            self.groups.shift_remove(main_name);
        }
    }
}

/// Whole sidecar file: chapter name -> groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SidecarConfig {
    chapters: IndexMap<String, ChapterGroups>,
}

impl SidecarConfig {
    pub fn chapter(&self, chapter: &str) -> Option<&ChapterGroups> {
        self.chapters.get(chapter)
    }

    /// Groups for `chapter`, or an empty set when the chapter has none.
    pub fn chapter_or_empty(&self, chapter: &str) -> ChapterGroups {
        self.chapters.get(chapter).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    fn chapter_mut(&mut self, chapter: &str) -> &mut ChapterGroups {
        self.chapters.entry(chapter.to_string()).or_default()
    }
}

/// Reads and rewrites the sidecar file of a series directory.
///
/// Construct once and share by reference; the store holds no cached state,
/// every call reads the file fresh.
#[derive(Debug, Clone)]
pub struct SidecarStore {
    file_name: String,
}

impl Default for SidecarStore {
    fn default() -> Self {
        Self::new(DEFAULT_SIDECAR_FILE_NAME)
    }
}

impl SidecarStore {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    pub fn sidecar_path(&self, series_path: &Path) -> PathBuf {
        series_path.join(&self.file_name)
    }

    /// Load the sidecar for a series. Missing or unparsable files yield an
    /// empty config.
    pub fn load(&self, series_path: &Path) -> SidecarConfig {
        let path = self.sidecar_path(series_path);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => {
                debug!(path = %path.display(), "No readable sidecar: {err}");
                return SidecarConfig::default();
            }
        };
        match parse_sidecar(&contents) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), "Ignoring malformed sidecar: {err:#}");
                SidecarConfig::default()
            }
        }
    }

    /// Write the config in canonical form. Failures are logged and otherwise
    /// ignored.
    pub fn save(&self, series_path: &Path, config: &SidecarConfig) {
        if let Err(err) = self.try_save(series_path, config) {
            warn!(series = %series_path.display(), "Failed to save sidecar: {err:#}");
        }
    }

    fn try_save(&self, series_path: &Path, config: &SidecarConfig) -> Result<()> {
        let path = self.sidecar_path(series_path);
        let contents =
            serde_json::to_string_pretty(config).context("Failed to serialize sidecar")?;
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write sidecar at {}", path.display()))?;
        debug!(path = %path.display(), "Saved sidecar");
        Ok(())
    }

    /// Group `alt_files` under `main_file`.
    ///
    /// Alternates that are themselves group keys have their own alternates
    /// folded into the target group, and their entry is removed. Files being
    /// linked are taken out of any other group's alternates so a file never
    /// belongs to two groups.
    pub fn link_pages<P: AsRef<Path>>(
        &self,
        series_path: &Path,
        chapter: &str,
        main_file: &Path,
        alt_files: &[P],
    ) {
        let mut config = self.load(series_path);
        let groups = config.chapter_mut(chapter);

        let main_name = file_name(main_file);
        let alt_names: Vec<String> = alt_files
            .iter()
            .map(|path| file_name(path.as_ref()))
            .filter(|name| !name.is_empty() && *name != main_name)
            .collect();

        let mut absorbed = Vec::new();
        let mut carried = Vec::new();
        for alt in &alt_names {
            if let Some(sub) = groups.groups.shift_remove(alt) {
                debug!(chapter, group = %alt, into = %main_name, "Merging existing group");
                absorbed.extend(sub.alts);
                carried.extend(sub.translations);
                if let Some(spread) = sub.spread {
                    debug!(chapter, group = %alt, spread, "Dropping spread mark of merged group");
                }
            }
        }

        for (key, entry) in groups.groups.iter_mut() {
            if *key == main_name {
                continue;
            }
            entry
                .alts
                .retain(|alt| *alt != main_name && !alt_names.contains(alt));
        }

        let entry = groups.entry_mut(&main_name);
        entry.merge_alts(&main_name, alt_names.iter().chain(absorbed.iter()));
        for (lang, file) in carried {
            if entry.translations.contains_key(&lang) {
                debug!(chapter, lang = %lang, file = %file, "Language already linked; dropping merged translation");
            } else {
                entry.translations.insert(lang, file);
            }
        }
        info!(
            chapter,
            main = %main_name,
            alts = entry.alts.len(),
            "Linked pages"
        );

        self.save(series_path, &config);
    }

    /// Point alternates of `main_file` at the names their files were moved to.
    pub fn rename_alternates(
        &self,
        series_path: &Path,
        chapter: &str,
        main_file: &Path,
        renames: &[(PathBuf, PathBuf)],
    ) {
        let mut config = self.load(series_path);
        let main_name = file_name(main_file);
        let Some(entry) = config
            .chapters
            .get_mut(chapter)
            .and_then(|groups| groups.groups.get_mut(&main_name))
        else {
            return;
        };
        let mut renamed = Vec::new();
        for (from, to) in renames {
            let (from, to) = (file_name(from), file_name(to));
            if from != to && entry.alts.contains(&from) {
                entry.alts.retain(|alt| *alt != from);
                renamed.push(to);
            }
        }
        if renamed.is_empty() {
            return;
        }
        entry.merge_alts(&main_name, renamed.iter());
        debug!(chapter, main = %main_name, renamed = renamed.len(), "Renamed alternates");
        self.save(series_path, &config);
    }

    /// Record `file` as the `lang` overlay of `main_file`.
    pub fn link_translation(
        &self,
        series_path: &Path,
        chapter: &str,
        main_file: &Path,
        lang: &str,
        file: &Path,
    ) {
        let mut config = self.load(series_path);
        let main_name = file_name(main_file);
        let translated = file_name(file);
        config
            .chapter_mut(chapter)
            .entry_mut(&main_name)
            .translations
            .insert(lang.to_string(), translated.clone());
        info!(chapter, main = %main_name, lang, file = %translated, "Linked translation");
        self.save(series_path, &config);
    }

    pub fn unlink_translation(&self, series_path: &Path, chapter: &str, main_file: &Path, lang: &str) {
        let mut config = self.load(series_path);
        let main_name = file_name(main_file);
        let groups = config.chapter_mut(chapter);
        if let Some(entry) = groups.groups.get_mut(&main_name) {
            entry.translations.shift_remove(lang);
        }
        groups.remove_if_empty(&main_name);
        info!(chapter, main = %main_name, lang, "Unlinked translation");
        self.save(series_path, &config);
    }

    /// Remove `file_name` from the chapter's groupings.
    ///
    /// A group key dissolves its whole group. Otherwise the first group that
    /// references the file loses that reference; later groups are left alone.
    pub fn unlink_page(&self, series_path: &Path, chapter: &str, target: &Path) {
        let mut config = self.load(series_path);
        let Some(groups) = config.chapters.get_mut(chapter) else {
            return;
        };
        let target_name = file_name(target);

        if groups.groups.shift_remove(&target_name).is_some() {
            info!(chapter, main = %target_name, "Dissolved group");
            self.save(series_path, &config);
            return;
        }

        let owner = groups
            .groups
            .iter()
            .find(|(_, entry)| entry.references(&target_name))
            .map(|(key, _)| key.clone());
        if let Some(owner) = owner {
            if let Some(entry) = groups.groups.get_mut(&owner) {
                entry.forget(&target_name);
            }
            groups.remove_if_empty(&owner);
            info!(chapter, main = %owner, file = %target_name, "Detached file from group");
        }
        self.save(series_path, &config);
    }

    /// Pin or clear the spread flag of one page.
    pub fn set_spread(
        &self,
        series_path: &Path,
        chapter: &str,
        main_file: &Path,
        is_spread: bool,
        explicit: bool,
    ) {
        let main_name = file_name(main_file);
        self.set_spreads(series_path, chapter, &[(main_name, is_spread)], explicit);
    }

    /// Record spread flags for several pages with one read and one write.
    ///
    /// Non-explicit `false` clears the mark instead of storing it, so
    /// auto-detection never leaves empty groups behind.
    pub fn set_spreads(
        &self,
        series_path: &Path,
        chapter: &str,
        marks: &[(String, bool)],
        explicit: bool,
    ) {
        if marks.is_empty() {
            return;
        }
        let mut config = self.load(series_path);
        let groups = config.chapter_mut(chapter);
        for (main_name, is_spread) in marks {
            let entry = groups.entry_mut(main_name);
            if explicit || *is_spread {
                entry.spread = Some(*is_spread);
                entry.spread_explicit = explicit;
            } else {
                entry.spread = None;
                entry.spread_explicit = false;
            }
            groups.remove_if_empty(main_name);
        }
        debug!(chapter, count = marks.len(), explicit, "Stored spread flags");
        self.save(series_path, &config);
    }
}

pub fn parse_sidecar(contents: &str) -> Result<SidecarConfig> {
    serde_json::from_str(contents).context("Invalid sidecar JSON")
}

fn file_name(path: &Path) -> String {
    file_name_lossy(path)
}
