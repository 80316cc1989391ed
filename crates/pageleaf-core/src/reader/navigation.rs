use super::{ReaderEvent, ReaderModel, StartPosition};
use crate::config::ViewMode;
use crate::ordering::file_name_lossy;
use tracing::{debug, info};

/// Result of a page step inside the current chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Moved(Vec<ReaderEvent>),
    /// The step would leave the chapter; the caller decides what happens next.
    Boundary,
}

impl ReaderModel {
    /// Step by `direction` pages, or by layout slots in double mode.
    pub fn navigate(&mut self, direction: isize) -> Navigation {
        if self.pages.is_empty() {
            return Navigation::Boundary;
        }
        let target = match (self.view_mode, &self.layout) {
            (ViewMode::Double, Some(layout)) => {
                let Some(slot) = layout.slot_of(self.current_index) else {
                    return Navigation::Boundary;
                };
                slot.checked_add_signed(direction)
                    .and_then(|slot| layout.pair(slot))
                    .and_then(|pair| pair.primary_page())
            }
            _ => self
                .current_index
                .checked_add_signed(direction)
                .filter(|&index| index < self.pages.len()),
        };
        match target {
            Some(index) => Navigation::Moved(self.move_to(index)),
            None => {
                debug!(
                    current = self.current_index,
                    direction, "Navigation reached chapter boundary"
                );
                Navigation::Boundary
            }
        }
    }

    fn move_to(&mut self, index: usize) -> Vec<ReaderEvent> {
        self.current_index = index;
        let mut events = vec![ReaderEvent::PageChanged { index }];
        events.extend(self.load_image());
        events
    }

    /// Next page, crossing into the next chapter at the end.
    pub fn next(&mut self) -> Vec<ReaderEvent> {
        match self.navigate(1) {
            Navigation::Moved(events) => events,
            Navigation::Boundary => self.change_chapter(1, false),
        }
    }

    /// Previous page; crossing back opens the previous chapter at its end.
    pub fn previous(&mut self) -> Vec<ReaderEvent> {
        match self.navigate(-1) {
            Navigation::Moved(events) => events,
            Navigation::Boundary => self.change_chapter(-1, true),
        }
    }

    /// Jump to a page, clamped to the chapter.
    pub fn go_to_page(&mut self, index: usize) -> Vec<ReaderEvent> {
        if self.pages.is_empty() {
            return vec![ReaderEvent::NoImages];
        }
        let index = index.min(self.pages.len() - 1);
        self.move_to(index)
    }

    /// Cycle Single -> Double -> Strip -> Single.
    pub fn toggle_layout(&mut self) -> Vec<ReaderEvent> {
        self.set_view_mode(self.view_mode.next())
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) -> Vec<ReaderEvent> {
        let entering_double = mode == ViewMode::Double && self.view_mode != ViewMode::Double;
        self.view_mode = mode;
        // Parity snap toward a pair start. Not spread-aware, so after a spread
        // it can land on the second page of a pair.
        if entering_double && self.current_index % 2 == 1 {
            self.current_index -= 1;
        }
        self.rebuild_layout();
        info!(mode = %mode, index = self.current_index, "View mode changed");

        let mut events = vec![ReaderEvent::LayoutUpdated { mode }];
        if self.has_images() {
            events.push(ReaderEvent::PageChanged {
                index: self.current_index,
            });
        }
        events.extend(self.load_image());
        events
    }

    /// Point the model at chapter `index` without building it. Pair with
    /// [`ReaderModel::begin_reload`] to build on a worker.
    pub fn select_chapter(&mut self, index: usize) -> Option<ReaderEvent> {
        let name = file_name_lossy(self.chapters.get(index)?);
        self.chapter_index = index;
        info!(chapter = %name, index, "Opening chapter");
        Some(ReaderEvent::ChapterChanged { index, name })
    }

    /// Load chapter `index` and place the reader according to `start`.
    pub fn open_chapter(&mut self, index: usize, start: StartPosition) -> Vec<ReaderEvent> {
        let Some(changed) = self.select_chapter(index) else {
            return Vec::new();
        };
        let mut events = vec![changed];
        events.extend(self.reload(start));
        events
    }

    /// Select a chapter by its 1-based number, clamped to the chapter list.
    /// Nothing happens if that chapter is already open.
    pub fn set_chapter(&mut self, number: usize) -> Vec<ReaderEvent> {
        if self.chapters.is_empty() {
            return Vec::new();
        }
        let index = number.saturating_sub(1).min(self.chapters.len() - 1);
        if index == self.chapter_index && !self.pages.is_empty() {
            return Vec::new();
        }
        self.open_chapter(index, StartPosition::First)
    }

    /// Move to the adjacent chapter. `from_end` opens it at its last page.
    pub fn change_chapter(&mut self, direction: isize, from_end: bool) -> Vec<ReaderEvent> {
        let Some(index) = self
            .chapter_index
            .checked_add_signed(direction)
            .filter(|&index| index < self.chapters.len() && index != self.chapter_index)
        else {
            debug!(chapter = self.chapter_index, direction, "No chapter in that direction");
            return Vec::new();
        };
        let start = if from_end {
            StartPosition::Last
        } else {
            StartPosition::First
        };
        self.open_chapter(index, start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::MockProbe;
    use crate::config::AppConfig;
    use crate::reader::tests::{Fixture, WIDE, portrait_pages};

    fn five_pages() -> Vec<(&'static str, (u32, u32))> {
        portrait_pages(&["a1.jpg", "a2.jpg", "a3.jpg", "a4.jpg", "a5.jpg"])
    }

    #[test]
    fn single_mode_steps_pages_and_signals_boundaries() {
        let fixture = Fixture::new("single_nav");
        let mut model = fixture.model(&[("Ch.1", five_pages())]);
        model.open_chapter(0, StartPosition::First);

        assert_eq!(model.navigate(-1), Navigation::Boundary);
        let Navigation::Moved(events) = model.navigate(1) else {
            panic!("expected a move");
        };
        assert_eq!(events[0], ReaderEvent::PageChanged { index: 1 });
        assert_eq!(
            events[1],
            ReaderEvent::ImageLoaded {
                path: fixture.chapter("Ch.1").join("a2.jpg"),
            }
        );
        model.go_to_page(99);
        assert_eq!(model.current_index(), 4);
        assert_eq!(model.navigate(1), Navigation::Boundary);
    }

    #[test]
    fn double_mode_steps_by_slot_and_prefers_right_page() {
        let fixture = Fixture::new("double_nav");
        let mut model = fixture.model(&[("Ch.1", five_pages())]);
        model.open_chapter(0, StartPosition::First);
        model.set_view_mode(ViewMode::Double);

        let mut visited = vec![model.current_index()];
        while let Navigation::Moved(_) = model.navigate(1) {
            visited.push(model.current_index());
        }
        assert_eq!(visited, vec![0, 2, 4]);

        let Navigation::Moved(events) = model.navigate(-1) else {
            panic!("expected a move");
        };
        let dir = fixture.chapter("Ch.1");
        assert_eq!(
            events.last(),
            Some(&ReaderEvent::DoubleImageLoaded {
                right: Some(dir.join("a3.jpg")),
                left: Some(dir.join("a4.jpg")),
            })
        );
    }

    #[test]
    fn double_mode_spread_occupies_its_own_slot() {
        let fixture = Fixture::new("double_spread");
        fixture.write_sidecar(
            r#"{"Ch.1": {"a3.jpg": {"alts": [], "translations": {}, "spread": true, "spread_explicit": true}}}"#,
        );
        let mut model = fixture.model(&[("Ch.1", five_pages())]);
        model.open_chapter(0, StartPosition::First);
        model.set_view_mode(ViewMode::Double);

        let mut visited = vec![model.current_index()];
        while let Navigation::Moved(_) = model.navigate(1) {
            visited.push(model.current_index());
        }
        assert_eq!(visited, vec![0, 2, 3]);
        assert_eq!(model.visible_pages(), vec![3, 4]);
    }

    #[test]
    fn toggle_layout_cycles_and_snaps_odd_index_entering_double() {
        let fixture = Fixture::new("toggle");
        let mut model = fixture.model(&[("Ch.1", five_pages())]);
        model.open_chapter(0, StartPosition::Index(3));

        let events = model.toggle_layout();
        assert_eq!(model.view_mode(), ViewMode::Double);
        assert_eq!(model.current_index(), 2);
        assert_eq!(
            events[0],
            ReaderEvent::LayoutUpdated {
                mode: ViewMode::Double
            }
        );
        assert!(model.layout().is_some());

        model.toggle_layout();
        assert_eq!(model.view_mode(), ViewMode::Strip);
        assert!(model.layout().is_none());
        model.go_to_page(3);
        model.toggle_layout();
        assert_eq!(model.view_mode(), ViewMode::Single);
        assert_eq!(model.current_index(), 3);
    }

    #[test]
    fn paging_across_chapters_enters_previous_at_its_end() {
        let fixture = Fixture::new("cross");
        let mut model = fixture.model(&[
            ("Chapter 2", portrait_pages(&["b1.jpg", "b2.jpg"])),
            ("Chapter 1", portrait_pages(&["a1.jpg", "a2.jpg", "a3.jpg"])),
        ]);
        model.open_chapter(0, StartPosition::First);
        assert_eq!(model.chapter_name().as_deref(), Some("Chapter 1"));

        model.go_to_page(2);
        let events = model.next();
        assert_eq!(
            events[0],
            ReaderEvent::ChapterChanged {
                index: 1,
                name: "Chapter 2".to_string()
            }
        );
        assert_eq!(model.current_index(), 0);

        model.previous();
        assert_eq!(model.chapter_index(), 0);
        assert_eq!(model.current_index(), 2);

        model.go_to_page(0);
        assert!(model.previous().is_empty());
        assert_eq!(model.chapter_index(), 0);
    }

    #[test]
    fn set_chapter_clamps_one_based_number() {
        let fixture = Fixture::new("set_chapter");
        let mut model = fixture.model(&[
            ("Ch.1", portrait_pages(&["1.jpg"])),
            ("Ch.2", portrait_pages(&["1.jpg", "2.jpg"])),
        ]);
        model.set_chapter(0);
        assert_eq!(model.chapter_index(), 0);
        assert!(model.has_images());
        assert!(model.set_chapter(1).is_empty());

        model.set_chapter(40);
        assert_eq!(model.chapter_index(), 1);
        assert_eq!(model.pages().len(), 2);
    }

    #[test]
    fn default_view_mode_comes_from_config() {
        let fixture = Fixture::new("default_mode");
        let config = AppConfig {
            default_view_mode: ViewMode::Double,
            ..AppConfig::default()
        };
        let mut files =
            portrait_pages(&["1.jpg", "2.jpg", "3.jpg", "4.jpg", "5.jpg", "6.jpg", "7.jpg"]);
        files[3].1 = WIDE;
        let mut model = fixture.model_with(&[("Ch.1", files)], config, MockProbe::default());
        model.open_chapter(0, StartPosition::First);

        assert_eq!(model.view_mode(), ViewMode::Double);
        assert!(model.page(3).is_some_and(|page| page.is_spread));
        // (1,0) (ph,2) (3,-) (5,4) (ph,6)
        assert_eq!(model.layout().map(|layout| layout.len()), Some(5));
    }
}
