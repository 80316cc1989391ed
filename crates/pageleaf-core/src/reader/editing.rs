use super::{ReaderEvent, ReaderModel, StartPosition};
use crate::alt_files::{Transfer, detach_alternate, stash_alternate};
use crate::archive::is_archive;
use crate::catalog::{ALTS_DIR, CatalogBuilder};
use crate::ordering::file_name_lossy;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

impl ReaderModel {
    /// Show `lang` overlays wherever a page has one; `None` reverts every page
    /// to its selected variant.
    pub fn set_preferred_language(&mut self, lang: Option<&str>) -> Vec<ReaderEvent> {
        self.preferred_language = lang.map(str::to_string);
        let changed = self
            .pages
            .iter_mut()
            .map(|page| page.apply_language(lang))
            .filter(|changed| *changed)
            .count();
        info!(lang = ?lang, pages_changed = changed, "Preferred language set");
        self.refresh_events()
    }

    /// Select a variant of one page. Out-of-range indices do nothing.
    pub fn change_variant(&mut self, page_index: usize, variant_index: usize) -> Vec<ReaderEvent> {
        let Some(page) = self.pages.get_mut(page_index) else {
            return Vec::new();
        };
        if !page.set_variant(variant_index) {
            return Vec::new();
        }
        debug!(page = page_index, variant = variant_index, "Variant selected");
        if self.visible_pages().contains(&page_index) {
            self.load_image()
        } else {
            Vec::new()
        }
    }

    /// Re-resolve one page from the sidecar without rebuilding the chapter.
    /// The selected variant survives when its file is still part of the page.
    ///
    /// When the page takes a file another page shows, or lets go of a file
    /// that belongs on its own page, the whole chapter is rebuilt instead so
    /// every file stays on exactly one page.
    pub fn update_page_variants(&mut self, page_index: usize) -> Vec<ReaderEvent> {
        let (Some(chapter_dir), Some(chapter_name)) =
            (self.chapter_dir().map(Path::to_path_buf), self.chapter_name())
        else {
            return Vec::new();
        };
        let Some(old) = self.pages.get(page_index) else {
            return Vec::new();
        };
        let selected = old.current_variant().to_path_buf();
        let main = old.main_file().to_path_buf();
        let was_spread = old.is_spread;
        let old_files: Vec<PathBuf> = old.files().map(Path::to_path_buf).collect();

        match self.probe.chapter_files(&chapter_dir) {
            Ok(files) => self.chapter_files = files,
            Err(err) => debug!("Keeping previous chapter listing: {err:#}"),
        }
        let sidecar = self.store.load(&self.series_path);
        let groups = sidecar.chapter_or_empty(&chapter_name);
        let mut page = CatalogBuilder::new(
            &chapter_dir,
            &self.chapter_files,
            &groups,
            self.probe.as_ref(),
        )
        .resolve(&main);

        let claimed_elsewhere = page
            .files()
            .any(|file| self.page_index_of(file).is_some_and(|owner| owner != page_index));
        let released_page = old_files.iter().any(|file| {
            !page.files().any(|kept| kept == file.as_path()) && self.chapter_files.contains(file)
        });
        if claimed_elsewhere || released_page {
            debug!(
                page = page_index,
                claimed_elsewhere, released_page, "Page set changed; rebuilding chapter"
            );
            return self.refresh();
        }

        page.current_variant_index = page
            .variants
            .iter()
            .position(|variant| *variant == selected)
            .unwrap_or(0);
        page.apply_language(self.preferred_language.as_deref());
        let stored_spread = groups
            .get(&page.main_file_name())
            .and_then(|entry| entry.spread);
        if stored_spread.is_none() {
            page.is_spread = was_spread;
        }
        let spread_changed = page.is_spread != was_spread;
        debug!(
            page = page_index,
            variants = page.variants.len(),
            translations = page.translations.len(),
            "Page variants updated"
        );
        self.pages[page_index] = page;
        self.unindex_files(page_index, &old_files);
        self.patch_path_index(page_index);

        if spread_changed {
            return self.refresh_events();
        }
        let mut events = vec![ReaderEvent::Refreshed];
        if self.visible_pages().contains(&page_index) {
            events.extend(self.load_image());
        }
        events
    }

    /// Pin a page's spread flag, overriding detection from now on.
    pub fn set_page_spread(&mut self, page_index: usize, is_spread: bool) -> Vec<ReaderEvent> {
        let Some(chapter_name) = self.chapter_name() else {
            return Vec::new();
        };
        let Some(page) = self.pages.get_mut(page_index) else {
            return Vec::new();
        };
        page.is_spread = is_spread;
        page.is_spread_explicit = true;
        let main = page.main_file().to_path_buf();
        self.store
            .set_spread(&self.series_path, &chapter_name, &main, is_spread, true);
        info!(page = page_index, is_spread, "Spread pinned");
        self.refresh_events()
    }

    /// Merge the selected pages into the lowest-indexed one. Every file of the
    /// other pages becomes an alternate of it and is moved into `alts/` under
    /// the main page's name.
    pub fn link_pages(&mut self, page_indices: &[usize]) -> Vec<ReaderEvent> {
        let (Some(chapter_dir), Some(chapter_name)) =
            (self.chapter_dir().map(Path::to_path_buf), self.chapter_name())
        else {
            return Vec::new();
        };
        let mut indices: Vec<usize> = page_indices
            .iter()
            .copied()
            .filter(|&index| index < self.pages.len())
            .collect();
        indices.sort_unstable();
        indices.dedup();
        let Some((&target, others)) = indices.split_first() else {
            return Vec::new();
        };
        if others.is_empty() {
            return Vec::new();
        }

        let main = self.pages[target].main_file().to_path_buf();
        let mut alts: Vec<PathBuf> = Vec::new();
        for file in indices
            .iter()
            .flat_map(|&index| self.pages[index].variants.iter())
        {
            if *file != main && !alts.contains(file) {
                alts.push(file.clone());
            }
        }
        info!(main = %main.display(), merged = others.len(), "Linking pages");
        self.store
            .link_pages(&self.series_path, &chapter_name, &main, &alts);

        let renames: Vec<(PathBuf, PathBuf)> = alts
            .iter()
            .enumerate()
            .filter_map(|(offset, alt)| {
                match stash_alternate(&chapter_dir, &main, alt, offset + 1, Transfer::Move) {
                    Ok(stored) => Some((alt.clone(), stored)),
                    Err(err) => {
                        warn!(file = %alt.display(), "Keeping alternate in place: {err:#}");
                        None
                    }
                }
            })
            .collect();
        self.store
            .rename_alternates(&self.series_path, &chapter_name, &main, &renames);
        self.reload(StartPosition::File(main))
    }

    /// Detach the file a page is showing from its group. On the main file this
    /// dissolves the group.
    ///
    /// Detached files stored under `alts/` are renamed out of the way; files in
    /// the chapter itself come back as pages.
    pub fn unlink_current_variant(&mut self, page_index: usize) -> Vec<ReaderEvent> {
        let Some(chapter_name) = self.chapter_name() else {
            return Vec::new();
        };
        let Some(page) = self.pages.get(page_index) else {
            return Vec::new();
        };
        if page.variants.len() == 1 && page.translations.is_empty() {
            return Vec::new();
        }
        let target = page.effective_path().to_path_buf();
        let detached: Vec<PathBuf> = if target == page.main_file() {
            page.variants.iter().skip(1).cloned().collect()
        } else {
            vec![target.clone()]
        };
        info!(file = %target.display(), "Unlinking file from group");
        self.store
            .unlink_page(&self.series_path, &chapter_name, &target);
        for file in &detached {
            if let Err(err) = detach_alternate(file) {
                warn!(file = %file.display(), "Failed to rename detached file: {err:#}");
            }
        }
        self.update_page_variants(page_index)
    }

    /// Attach files as new alternates of a page.
    ///
    /// Files next to the page's main file are moved into `alts/`, anything else
    /// is copied there. Taking a page out of the chapter rebuilds it; otherwise
    /// only the one page is updated.
    pub fn add_alternates(&mut self, page_index: usize, files: &[PathBuf]) -> Vec<ReaderEvent> {
        let (Some(chapter_dir), Some(chapter_name)) =
            (self.chapter_dir().map(Path::to_path_buf), self.chapter_name())
        else {
            return Vec::new();
        };
        if is_archive(&chapter_dir) {
            warn!(chapter = %chapter_dir.display(), "Archive chapters cannot take new alternates");
            return Vec::new();
        }
        let Some(page) = self.pages.get(page_index) else {
            return Vec::new();
        };
        let main = page.main_file().to_path_buf();
        let first_number = page.variants.len().max(1);
        let main_dir = main.parent().map(Path::to_path_buf);

        let mut stored = Vec::new();
        for (offset, file) in files.iter().enumerate() {
            if !file.is_file() {
                debug!(file = %file.display(), "Skipping missing alternate");
                continue;
            }
            let mode = if file.parent() == main_dir.as_deref() {
                Transfer::Move
            } else {
                Transfer::Copy
            };
            match stash_alternate(&chapter_dir, &main, file, first_number + offset, mode) {
                Ok(path) => stored.push(path),
                Err(err) => warn!(file = %file.display(), "Failed to store alternate: {err:#}"),
            }
        }
        if stored.is_empty() {
            return Vec::new();
        }
        self.store
            .link_pages(&self.series_path, &chapter_name, &main, &stored);
        info!(page = page_index, added = stored.len(), "Added alternates");

        let alts_dir = chapter_dir.join(ALTS_DIR);
        let took_chapter_page = files
            .iter()
            .any(|file| file.starts_with(&chapter_dir) && file.parent() != Some(alts_dir.as_path()));
        if took_chapter_page {
            self.refresh()
        } else {
            self.update_page_variants(page_index)
        }
    }

    /// Record a translation for a page of the open chapter and rebuild.
    pub fn add_translation(
        &mut self,
        page_index: usize,
        lang: &str,
        file: &Path,
    ) -> Vec<ReaderEvent> {
        let Some(chapter_name) = self.chapter_name() else {
            return Vec::new();
        };
        let Some(page) = self.pages.get(page_index) else {
            return Vec::new();
        };
        let main = page.main_file().to_path_buf();
        self.store
            .link_translation(&self.series_path, &chapter_name, &main, lang, file);
        self.refresh()
    }

    /// Entry point for an external translation pipeline. Results for pages of
    /// other chapters are stored and picked up when that chapter opens.
    pub fn on_translation_ready(
        &mut self,
        main_file: &Path,
        lang: &str,
        file: &Path,
    ) -> Vec<ReaderEvent> {
        if let Some(index) = self.page_index_of(main_file) {
            let is_main = self
                .pages
                .get(index)
                .is_some_and(|page| page.main_file() == main_file);
            if is_main {
                return self.add_translation(index, lang, file);
            }
        }
        let Some(chapter_name) = main_file.parent().map(file_name_lossy) else {
            warn!(file = %main_file.display(), "Translation result has no chapter");
            return Vec::new();
        };
        self.store
            .link_translation(&self.series_path, &chapter_name, main_file, lang, file);
        Vec::new()
    }
}
