//! Page catalog and layout engine for a manga reader.
//!
//! A chapter directory plus the series sidecar (`info.json`) become an ordered
//! list of [`catalog::Page`]s, each with interchangeable variants and
//! translation overlays. [`reader::ReaderModel`] drives navigation over those
//! pages in single, double-page (right-to-left) and strip modes. Chapters may
//! be plain directories or `.zip` archives.

pub mod alt_files;
pub mod archive;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod generation;
pub mod layout;
pub mod media;
pub mod ordering;
pub mod reader;
pub mod sidecar;
pub mod spread;

pub use catalog::{FsProbe, MediaProbe, Page};
pub use config::{AppConfig, ViewMode};
pub use reader::{ReaderCommand, ReaderEvent, ReaderModel};
pub use sidecar::SidecarStore;
