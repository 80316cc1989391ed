use super::{ReaderEvent, ReaderModel};
use crate::catalog::{CatalogBuilder, MediaProbe, Page};
use crate::generation::BuildGeneration;
use crate::ordering::file_name_lossy;
use crate::sidecar::SidecarStore;
use crate::spread::{SpreadSettings, detect_spreads};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::{Arc, mpsc};
use std::thread;
use tracing::{debug, info, warn};

/// Where the reading position lands once a build is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartPosition {
    First,
    Last,
    Index(usize),
    /// The page owning this file, else the first page.
    File(PathBuf),
}

/// Everything a worker needs to build one chapter's catalog.
#[derive(Debug, Clone)]
pub struct CatalogRequest {
    pub id: u64,
    pub series_path: PathBuf,
    pub chapter_dir: PathBuf,
    pub chapter_name: String,
    pub spreads: SpreadSettings,
    pub start: StartPosition,
    generation: BuildGeneration,
}

#[derive(Debug, Clone)]
pub struct CatalogBuild {
    pub id: u64,
    pub chapter_dir: PathBuf,
    pub files: Vec<PathBuf>,
    pub pages: Vec<Page>,
    pub start: StartPosition,
}

/// Scan, group and detect spreads for one chapter.
///
/// Touches only the filesystem and the sidecar, so it can run on any thread.
/// Returns an error once the request has been superseded.
pub fn build_catalog(
    request: &CatalogRequest,
    store: &SidecarStore,
    probe: &dyn MediaProbe,
) -> Result<CatalogBuild> {
    let files = match probe.chapter_files(&request.chapter_dir) {
        Ok(files) => files,
        Err(err) => {
            warn!(chapter = %request.chapter_dir.display(), "Treating unreadable chapter as empty: {err:#}");
            Vec::new()
        }
    };
    request.generation.check_current(request.id, "scan")?;

    let sidecar = store.load(&request.series_path);
    let groups = sidecar.chapter_or_empty(&request.chapter_name);
    let mut pages = CatalogBuilder::new(&request.chapter_dir, &files, &groups, probe).build();
    request.generation.check_current(request.id, "group")?;

    let changed = detect_spreads(&mut pages, probe, &request.spreads);
    if !changed.is_empty() {
        let marks: Vec<(String, bool)> = changed
            .iter()
            .map(|&index| (pages[index].main_file_name(), pages[index].is_spread))
            .collect();
        store.set_spreads(&request.series_path, &request.chapter_name, &marks, false);
    }

    info!(
        request_id = request.id,
        chapter = %request.chapter_name,
        files = files.len(),
        pages = pages.len(),
        spreads_changed = changed.len(),
        "Catalog build finished"
    );
    Ok(CatalogBuild {
        id: request.id,
        chapter_dir: request.chapter_dir.clone(),
        files,
        pages,
        start: request.start.clone(),
    })
}

/// Run [`build_catalog`] on a worker thread.
pub fn spawn_build(
    request: CatalogRequest,
    store: SidecarStore,
    probe: Arc<dyn MediaProbe + Send + Sync>,
) -> mpsc::Receiver<Result<CatalogBuild>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = build_catalog(&request, &store, probe.as_ref());
        if tx.send(result).is_err() {
            debug!(request_id = request.id, "Catalog build receiver dropped");
        }
    });
    rx
}

impl ReaderModel {
    /// Start a new build generation for the current chapter. Results of any
    /// earlier request will be ignored by [`ReaderModel::apply_build`].
    pub fn begin_reload(&mut self, start: StartPosition) -> Option<CatalogRequest> {
        let chapter_dir = self.chapter_dir()?.to_path_buf();
        let id = self.generation.bump();
        debug!(request_id = id, chapter = %chapter_dir.display(), "Queued catalog build");
        Some(CatalogRequest {
            id,
            series_path: self.series_path.clone(),
            chapter_name: file_name_lossy(&chapter_dir),
            chapter_dir,
            spreads: self.config.spread_settings(),
            start,
            generation: self.generation.clone(),
        })
    }

    /// Install a finished build, unless a newer one has been requested since.
    pub fn apply_build(&mut self, build: CatalogBuild) -> Vec<ReaderEvent> {
        if !self.generation.is_current(build.id) {
            debug!(
                request_id = build.id,
                current = self.generation.current(),
                "Ignoring stale catalog build"
            );
            return Vec::new();
        }

        self.chapter_files = build.files;
        self.pages = build.pages;
        let language = self.preferred_language.clone();
        for page in &mut self.pages {
            page.apply_language(language.as_deref());
        }
        self.rebuild_path_index();

        let last = self.pages.len().saturating_sub(1);
        self.current_index = match build.start {
            StartPosition::First => 0,
            StartPosition::Last => last,
            StartPosition::Index(index) => index.min(last),
            StartPosition::File(path) => self.page_index_of(&path).unwrap_or(0),
        };

        let mut events = self.refresh_events();
        if self.has_images() {
            events.insert(
                1,
                ReaderEvent::PageChanged {
                    index: self.current_index,
                },
            );
        }
        events
    }

    /// Build the current chapter on this thread and apply it.
    pub fn reload(&mut self, start: StartPosition) -> Vec<ReaderEvent> {
        let Some(request) = self.begin_reload(start) else {
            self.chapter_files.clear();
            self.pages.clear();
            self.rebuild_path_index();
            self.current_index = 0;
            return self.refresh_events();
        };
        match build_catalog(&request, &self.store, self.probe.as_ref()) {
            Ok(build) => self.apply_build(build),
            Err(err) => {
                debug!(request_id = request.id, "Catalog build abandoned: {err:#}");
                Vec::new()
            }
        }
    }

    /// Reload in place, keeping the reader on the page it was showing.
    pub fn refresh(&mut self) -> Vec<ReaderEvent> {
        let start = self
            .pages
            .get(self.current_index)
            .map(|page| StartPosition::File(page.main_file().to_path_buf()))
            .unwrap_or(StartPosition::Index(self.current_index));
        self.reload(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::tests::{Fixture, WIDE, portrait_pages};
    use std::path::Path;

    #[test]
    fn stale_build_is_discarded() {
        let fixture = Fixture::new("stale");
        let model_files = portrait_pages(&["01.jpg", "02.jpg", "03.jpg"]);
        let mut model = fixture.model(&[("Ch.1", model_files)]);

        let first = model.begin_reload(StartPosition::First).expect("chapter exists");
        let second = model.begin_reload(StartPosition::Last).expect("chapter exists");

        let store = model.store().clone();
        let probe = model.probe();
        assert!(build_catalog(&first, &store, probe.as_ref()).is_err());
        let fresh = build_catalog(&second, &store, probe.as_ref()).expect("current build runs");

        let stale = CatalogBuild {
            id: first.id,
            chapter_dir: first.chapter_dir.clone(),
            files: Vec::new(),
            pages: Vec::new(),
            start: StartPosition::First,
        };
        assert!(model.apply_build(stale).is_empty());
        assert!(!model.has_images());

        let events = model.apply_build(fresh);
        assert_eq!(model.pages().len(), 3);
        assert_eq!(model.current_index(), 2);
        assert_eq!(events.first(), Some(&ReaderEvent::Refreshed));
        assert!(events.contains(&ReaderEvent::PageChanged { index: 2 }));
    }

    #[test]
    fn spawned_build_is_applied_when_current() {
        let fixture = Fixture::new("spawn");
        let mut model = fixture.model(&[("Ch.1", portrait_pages(&["1.png", "2.png"]))]);

        let request = model.begin_reload(StartPosition::First).expect("chapter exists");
        let rx = spawn_build(request, model.store().clone(), model.probe());
        let build = rx
            .recv()
            .expect("worker should reply")
            .expect("build should succeed");

        let events = model.apply_build(build);
        assert_eq!(model.pages().len(), 2);
        assert!(events.contains(&ReaderEvent::ImageLoaded {
            path: fixture.chapter("Ch.1").join("1.png"),
        }));
    }

    #[test]
    fn detected_spreads_are_persisted_to_sidecar() {
        let fixture = Fixture::new("persist_spread");
        // Seven pages sample indices 0, 1, 2, 4 and 5.
        let mut files =
            portrait_pages(&["1.jpg", "2.jpg", "3.jpg", "4.jpg", "5.jpg", "6.jpg", "7.jpg"]);
        files[3].1 = WIDE;
        let mut model = fixture.model(&[("Ch.1", files)]);

        model.open_chapter(0, StartPosition::First);

        assert!(model.page(3).is_some_and(|page| page.is_spread));
        let sidecar = model.store().load(&fixture.series);
        let entry = sidecar
            .chapter("Ch.1")
            .and_then(|groups| groups.get("4.jpg"))
            .cloned()
            .expect("spread should be stored");
        assert_eq!(entry.spread, Some(true));
        assert!(!entry.spread_explicit);
    }

    #[test]
    fn refresh_keeps_reader_on_same_page() {
        let fixture = Fixture::new("refresh");
        let mut model = fixture.model(&[("Ch.1", portrait_pages(&["1.jpg", "2.jpg", "3.jpg"]))]);
        model.open_chapter(0, StartPosition::Index(1));
        assert_eq!(model.current_index(), 1);

        model.store().link_pages(
            &fixture.series,
            "Ch.1",
            Path::new("1.jpg"),
            &[Path::new("2.jpg")],
        );
        model.refresh();

        assert_eq!(model.pages().len(), 2);
        assert_eq!(model.current_index(), 0);
        assert_eq!(model.page(0).map(|page| page.variants.len()), Some(2));
    }
}
