use super::{ReaderEvent, ReaderModel, StartPosition};
use crate::config::ViewMode;
use crate::layout::LayoutPair;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub index: usize,
    pub main_file: String,
    pub effective_path: String,
    pub variant_count: usize,
    pub current_variant_index: usize,
    pub languages: Vec<String>,
    pub active_translation: Option<String>,
    pub is_spread: bool,
    pub is_spread_explicit: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReaderSnapshot {
    pub series_path: String,
    pub chapter_index: usize,
    pub chapter_count: usize,
    pub chapter_name: Option<String>,
    pub view_mode: ViewMode,
    pub current_index: usize,
    pub total_pages: usize,
    pub has_images: bool,
    pub preferred_language: Option<String>,
    pub visible_pages: Vec<usize>,
    pub pages: Vec<PageView>,
    /// Double-page slots; empty outside double mode.
    pub layout: Vec<LayoutPair>,
}

#[derive(Debug, Clone)]
pub enum ReaderCommand {
    GetSnapshot,
    NextPage,
    PrevPage,
    GoToPage { index: usize },
    ToggleLayout,
    SetViewMode { mode: ViewMode },
    SetPreferredLanguage { lang: Option<String> },
    ChangeVariant { page: usize, variant: usize },
    UpdatePageVariants { page: usize },
    SetChapter { number: usize },
    ChangeChapter { direction: isize },
    SetPageSpread { page: usize, is_spread: bool },
    LinkPages { pages: Vec<usize> },
    UnlinkCurrentVariant { page: usize },
    AddAlternates { page: usize, files: Vec<PathBuf> },
    AddTranslation { page: usize, lang: String, file: PathBuf },
    Reload,
}

impl ReaderCommand {
    pub fn action(&self) -> &'static str {
        match self {
            Self::GetSnapshot => "reader_get_snapshot",
            Self::NextPage => "reader_next_page",
            Self::PrevPage => "reader_prev_page",
            Self::GoToPage { .. } => "reader_go_to_page",
            Self::ToggleLayout => "reader_toggle_layout",
            Self::SetViewMode { .. } => "reader_set_view_mode",
            Self::SetPreferredLanguage { .. } => "reader_set_preferred_language",
            Self::ChangeVariant { .. } => "reader_change_variant",
            Self::UpdatePageVariants { .. } => "reader_update_page_variants",
            Self::SetChapter { .. } => "reader_set_chapter",
            Self::ChangeChapter { .. } => "reader_change_chapter",
            Self::SetPageSpread { .. } => "reader_set_page_spread",
            Self::LinkPages { .. } => "reader_link_pages",
            Self::UnlinkCurrentVariant { .. } => "reader_unlink_current_variant",
            Self::AddAlternates { .. } => "reader_add_alternates",
            Self::AddTranslation { .. } => "reader_add_translation",
            Self::Reload => "reader_reload",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReaderUpdate {
    pub action: &'static str,
    pub events: Vec<ReaderEvent>,
    pub snapshot: ReaderSnapshot,
}

impl ReaderModel {
    pub fn snapshot(&self) -> ReaderSnapshot {
        let pages = self
            .pages
            .iter()
            .enumerate()
            .map(|(index, page)| PageView {
                index,
                main_file: page.main_file_name(),
                effective_path: page.effective_path().to_string_lossy().to_string(),
                variant_count: page.variants.len(),
                current_variant_index: page.current_variant_index,
                languages: page.translations.keys().cloned().collect(),
                active_translation: page.active_translation.clone(),
                is_spread: page.is_spread,
                is_spread_explicit: page.is_spread_explicit,
            })
            .collect();
        ReaderSnapshot {
            series_path: self.series_path.to_string_lossy().to_string(),
            chapter_index: self.chapter_index,
            chapter_count: self.chapters.len(),
            chapter_name: self.chapter_name(),
            view_mode: self.view_mode,
            current_index: self.current_index,
            total_pages: self.pages.len(),
            has_images: self.has_images(),
            preferred_language: self.preferred_language.clone(),
            visible_pages: self.visible_pages(),
            pages,
            layout: self
                .layout
                .as_ref()
                .map(|layout| layout.pairs().to_vec())
                .unwrap_or_default(),
        }
    }

    pub fn apply_command(&mut self, command: ReaderCommand) -> ReaderUpdate {
        let action = command.action();
        let events = match command {
            ReaderCommand::GetSnapshot => Vec::new(),
            ReaderCommand::NextPage => self.next(),
            ReaderCommand::PrevPage => self.previous(),
            ReaderCommand::GoToPage { index } => self.go_to_page(index),
            ReaderCommand::ToggleLayout => self.toggle_layout(),
            ReaderCommand::SetViewMode { mode } => self.set_view_mode(mode),
            ReaderCommand::SetPreferredLanguage { lang } => {
                self.set_preferred_language(lang.as_deref())
            }
            ReaderCommand::ChangeVariant { page, variant } => self.change_variant(page, variant),
            ReaderCommand::UpdatePageVariants { page } => self.update_page_variants(page),
            ReaderCommand::SetChapter { number } => self.set_chapter(number),
            ReaderCommand::ChangeChapter { direction } => self.change_chapter(direction, false),
            ReaderCommand::SetPageSpread { page, is_spread } => {
                self.set_page_spread(page, is_spread)
            }
            ReaderCommand::LinkPages { pages } => self.link_pages(&pages),
            ReaderCommand::UnlinkCurrentVariant { page } => self.unlink_current_variant(page),
            ReaderCommand::AddAlternates { page, files } => self.add_alternates(page, &files),
            ReaderCommand::AddTranslation { page, lang, file } => {
                self.add_translation(page, &lang, &file)
            }
            ReaderCommand::Reload => self.reload(StartPosition::Index(self.current_index)),
        };
        ReaderUpdate {
            action,
            events,
            snapshot: self.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Slot;
    use crate::reader::tests::{Fixture, portrait_pages};

    #[test]
    fn commands_drive_model_and_report_snapshot() {
        let fixture = Fixture::new("commands");
        let files = portrait_pages(&["1.jpg", "2.jpg", "3.jpg"]);
        let mut model = fixture.model(&[("Ch.1", files)]);
        model.open_chapter(0, StartPosition::First);

        let update = model.apply_command(ReaderCommand::NextPage);
        assert_eq!(update.action, "reader_next_page");
        assert_eq!(update.snapshot.current_index, 1);
        assert_eq!(update.events[0], ReaderEvent::PageChanged { index: 1 });

        let update = model.apply_command(ReaderCommand::SetViewMode {
            mode: ViewMode::Double,
        });
        assert_eq!(update.snapshot.current_index, 0);
        assert_eq!(update.snapshot.layout.len(), 2);
        assert_eq!(update.snapshot.layout[1].left, Slot::Placeholder);
        assert_eq!(update.snapshot.visible_pages, vec![0, 1]);

        let update = model.apply_command(ReaderCommand::GetSnapshot);
        assert!(update.events.is_empty());
        assert_eq!(update.snapshot.total_pages, 3);
        assert_eq!(update.snapshot.chapter_name.as_deref(), Some("Ch.1"));
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let fixture = Fixture::new("snapshot_json");
        let mut model = fixture.model(&[("Ch.1", portrait_pages(&["1.jpg", "2.jpg"]))]);
        model.open_chapter(0, StartPosition::First);
        model.set_view_mode(ViewMode::Double);

        let value = serde_json::to_value(model.snapshot()).expect("snapshot should serialize");
        assert_eq!(value["view_mode"], "double");
        assert_eq!(value["pages"][1]["main_file"], "2.jpg");
        assert_eq!(value["layout"][0]["right"]["kind"], "page");
        assert_eq!(value["layout"][0]["right"]["page"], 0);
    }
}
