//! Configuration loading for the page engine.
//!
//! Settings are read from `conf/config.toml` when present. The file is split
//! into tables (`[reader]`, `[spreads]`, `[library]`, `[logging]`) that are
//! flattened into one [`AppConfig`]. Missing or invalid entries fall back to
//! defaults so a reader can always open.

mod defaults;
mod io;
mod models;
mod tables;

pub use io::{load_config, parse_config, serialize_config};
pub use models::{AppConfig, LogLevel, ViewMode};
