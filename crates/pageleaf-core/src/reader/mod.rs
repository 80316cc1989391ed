//! Reader state machine over one series.
//!
//! The model owns the current chapter's pages, the reading position and the
//! view mode. Every mutating call returns the [`ReaderEvent`]s a view needs to
//! react to, in the order they happened.

mod build;
mod commands;
mod editing;
mod navigation;

pub use build::{CatalogBuild, CatalogRequest, StartPosition, build_catalog, spawn_build};
pub use commands::{PageView, ReaderCommand, ReaderSnapshot, ReaderUpdate};
pub use navigation::Navigation;

use crate::catalog::{FsProbe, MediaProbe, Page, scan_series};
use crate::config::{AppConfig, ViewMode};
use crate::generation::BuildGeneration;
use crate::layout::Layout;
use crate::ordering::{file_name_lossy, normalize_path, sort_by_number};
use crate::sidecar::SidecarStore;
use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Notifications for whoever renders the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReaderEvent {
    /// Pages or their presentation changed wholesale.
    Refreshed,
    PageChanged { index: usize },
    ImageLoaded { path: PathBuf },
    /// Right is read first; either half may be blank.
    DoubleImageLoaded {
        right: Option<PathBuf>,
        left: Option<PathBuf>,
    },
    LayoutUpdated { mode: ViewMode },
    ChapterChanged { index: usize, name: String },
    /// The loaded chapter has no media files.
    NoImages,
}

pub struct ReaderModel {
    series_path: PathBuf,
    chapters: Vec<PathBuf>,
    chapter_index: usize,
    chapter_files: Vec<PathBuf>,
    pages: Vec<Page>,
    path_index: HashMap<String, usize>,
    view_mode: ViewMode,
    current_index: usize,
    layout: Option<Layout>,
    preferred_language: Option<String>,
    generation: BuildGeneration,
    config: AppConfig,
    store: SidecarStore,
    probe: Arc<dyn MediaProbe + Send + Sync>,
}

impl ReaderModel {
    /// Model over an explicit chapter list. Nothing is loaded until a chapter
    /// is opened.
    pub fn new(
        series_path: PathBuf,
        mut chapters: Vec<PathBuf>,
        config: AppConfig,
        probe: Arc<dyn MediaProbe + Send + Sync>,
    ) -> Self {
        sort_by_number(&mut chapters);
        let store = SidecarStore::new(config.sidecar_file_name.clone());
        Self {
            series_path,
            chapters,
            chapter_index: 0,
            chapter_files: Vec::new(),
            pages: Vec::new(),
            path_index: HashMap::new(),
            view_mode: config.default_view_mode,
            current_index: 0,
            layout: None,
            preferred_language: config.preferred_language.clone(),
            generation: BuildGeneration::new(),
            config,
            store,
            probe,
        }
    }

    /// Model over a series directory on disk.
    pub fn open(series_path: &Path, config: AppConfig) -> Result<Self> {
        let chapters = scan_series(series_path)?;
        info!(
            series = %series_path.display(),
            chapters = chapters.len(),
            "Opened series"
        );
        Ok(Self::new(
            series_path.to_path_buf(),
            chapters,
            config,
            Arc::new(FsProbe),
        ))
    }

    pub fn series_path(&self) -> &Path {
        &self.series_path
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub fn has_images(&self) -> bool {
        !self.pages.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn layout(&self) -> Option<&Layout> {
        self.layout.as_ref()
    }

    pub fn chapters(&self) -> &[PathBuf] {
        &self.chapters
    }

    pub fn chapter_index(&self) -> usize {
        self.chapter_index
    }

    pub fn chapter_dir(&self) -> Option<&Path> {
        self.chapters.get(self.chapter_index).map(PathBuf::as_path)
    }

    /// Sidecar key of the current chapter: its directory name.
    pub fn chapter_name(&self) -> Option<String> {
        self.chapter_dir().map(file_name_lossy)
    }

    pub fn preferred_language(&self) -> Option<&str> {
        self.preferred_language.as_deref()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &SidecarStore {
        &self.store
    }

    pub fn probe(&self) -> Arc<dyn MediaProbe + Send + Sync> {
        Arc::clone(&self.probe)
    }

    /// Page owning `path` as a variant or translation.
    pub fn page_index_of(&self, path: &Path) -> Option<usize> {
        self.path_index.get(&normalize_path(path)).copied()
    }

    fn rebuild_path_index(&mut self) {
        self.path_index.clear();
        for (index, page) in self.pages.iter().enumerate() {
            for file in page.files() {
                self.path_index.insert(normalize_path(file), index);
            }
        }
    }

    /// Forget `files` where they still point at page `index`.
    fn unindex_files(&mut self, index: usize, files: &[PathBuf]) {
        for file in files {
            let key = normalize_path(file);
            if self.path_index.get(&key) == Some(&index) {
                self.path_index.remove(&key);
            }
        }
    }

    /// Additive update after one page changed in place.
    fn patch_path_index(&mut self, index: usize) {
        if let Some(page) = self.pages.get(index) {
            for file in page.files() {
                self.path_index.insert(normalize_path(file), index);
            }
        }
    }

    fn rebuild_layout(&mut self) {
        self.layout = match self.view_mode {
            ViewMode::Double => Some(Layout::build(&self.pages)),
            ViewMode::Single | ViewMode::Strip => None,
        };
    }

    /// Pages currently on screen.
    pub fn visible_pages(&self) -> Vec<usize> {
        if self.pages.is_empty() {
            return Vec::new();
        }
        match (&self.layout, self.view_mode) {
            (Some(layout), ViewMode::Double) => layout
                .pair_of(self.current_index)
                .map(|pair| pair.pages().collect())
                .unwrap_or_default(),
            _ => vec![self.current_index],
        }
    }

    /// Image events for the current position.
    pub fn load_image(&self) -> Vec<ReaderEvent> {
        let Some(page) = self.pages.get(self.current_index) else {
            return vec![ReaderEvent::NoImages];
        };
        match self.view_mode {
            ViewMode::Single => vec![ReaderEvent::ImageLoaded {
                path: page.effective_path().to_path_buf(),
            }],
            ViewMode::Double => {
                let Some(pair) = self
                    .layout
                    .as_ref()
                    .and_then(|layout| layout.pair_of(self.current_index))
                else {
                    return Vec::new();
                };
                let path_of = |slot: crate::layout::Slot| {
                    slot.page()
                        .and_then(|index| self.pages.get(index))
                        .map(|page| page.effective_path().to_path_buf())
                };
                vec![ReaderEvent::DoubleImageLoaded {
                    right: path_of(pair.right),
                    left: path_of(pair.left),
                }]
            }
            // Strip views render every page and only follow `PageChanged`.
            ViewMode::Strip => Vec::new(),
        }
    }

    /// Events after a wholesale change of pages or presentation.
    fn refresh_events(&mut self) -> Vec<ReaderEvent> {
        self.rebuild_layout();
        if self.pages.is_empty() {
            return vec![ReaderEvent::Refreshed, ReaderEvent::NoImages];
        }
        let mut events = vec![ReaderEvent::Refreshed];
        events.extend(self.load_image());
        events
    }
}
