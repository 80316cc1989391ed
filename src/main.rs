//! Headless front end for the page engine.
//!
//! - Parse command-line arguments.
//! - Load user configuration from `conf/config.toml`.
//! - Open the series, build the requested chapter on a worker thread.
//! - Print a JSON snapshot of pages and layout, then remember the position.

use anyhow::{Context, Result, anyhow};
use pageleaf_core::cache::{Bookmark, load_bookmark, save_bookmark};
use pageleaf_core::config::{ViewMode, load_config};
use pageleaf_core::ordering::file_name_lossy;
use pageleaf_core::reader::{ReaderModel, StartPosition, spawn_build};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const USAGE: &str =
    "Usage: pageleaf <series-dir> [--chapter N] [--page N] [--mode single|double|strip] [--lang CODE]";

#[derive(Debug, Default)]
struct Args {
    series: PathBuf,
    chapter: Option<usize>,
    page: Option<usize>,
    mode: Option<ViewMode>,
    lang: Option<String>,
}

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let args = parse_args(env::args().skip(1))?;
    let config = load_config(Path::new("conf/config.toml"));
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        series = %args.series.display(),
        level = %config.log_level,
        "Starting page reader"
    );

    let cache_dir = PathBuf::from(&config.cache_dir);
    let mut model = ReaderModel::open(&args.series, config)?;
    if model.chapters().is_empty() {
        return Err(anyhow!("No chapters found in {}", args.series.display()));
    }

    let bookmark = load_bookmark(&cache_dir, &args.series);
    let (chapter_index, start) = resolve_start(&model, &args, bookmark.as_ref());
    model.select_chapter(chapter_index);
    let request = model
        .begin_reload(start)
        .ok_or_else(|| anyhow!("Chapter {} is not available", chapter_index + 1))?;
    let rx = spawn_build(request, model.store().clone(), model.probe());
    let build = rx
        .recv()
        .context("Catalog worker exited without a result")??;
    for event in model.apply_build(build) {
        debug!(?event, "Reader event");
    }

    if let Some(lang) = args.lang.as_deref() {
        model.set_preferred_language(Some(lang));
    }
    if let Some(mode) = args.mode {
        model.set_view_mode(mode);
    }
    if !model.has_images() {
        warn!(chapter = ?model.chapter_name(), "Chapter has no images");
    }

    let snapshot = model.snapshot();
    println!(
        "{}",
        serde_json::to_string_pretty(&snapshot).context("Failed to serialize snapshot")?
    );

    if let Some(chapter) = model.chapter_name() {
        save_bookmark(
            &cache_dir,
            &args.series,
            &Bookmark {
                chapter,
                page: model.current_index(),
            },
        );
    }
    Ok(())
}

/// Chapter and start position from the arguments, else the bookmark, else the
/// first page of the first chapter.
fn resolve_start(
    model: &ReaderModel,
    args: &Args,
    bookmark: Option<&Bookmark>,
) -> (usize, StartPosition) {
    let last = model.chapters().len().saturating_sub(1);
    if let Some(number) = args.chapter {
        let index = number.saturating_sub(1).min(last);
        let start = args
            .page
            .map(|page| StartPosition::Index(page.saturating_sub(1)))
            .unwrap_or(StartPosition::First);
        return (index, start);
    }
    if let Some(bookmark) = bookmark {
        let found = model
            .chapters()
            .iter()
            .position(|dir| file_name_lossy(dir) == bookmark.chapter);
        if let Some(index) = found {
            info!(chapter = %bookmark.chapter, page = bookmark.page, "Resuming from bookmark");
            return (index, StartPosition::Index(bookmark.page));
        }
        warn!(chapter = %bookmark.chapter, "Bookmarked chapter no longer exists");
    }
    (0, StartPosition::First)
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut series = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--chapter" => parsed.chapter = Some(parse_number(&mut args, "--chapter")?),
            "--page" => parsed.page = Some(parse_number(&mut args, "--page")?),
            "--mode" => {
                let value = args.next().ok_or_else(|| anyhow!(USAGE))?;
                parsed.mode = Some(value.parse()?);
            }
            "--lang" => parsed.lang = Some(args.next().ok_or_else(|| anyhow!(USAGE))?),
            other if other.starts_with("--") => {
                return Err(anyhow!("Unknown option {other}\n{USAGE}"));
            }
            other => series = Some(PathBuf::from(other)),
        }
    }

    let series = series.ok_or_else(|| anyhow!(USAGE))?;
    if !series.is_dir() {
        return Err(anyhow!("Series directory not found: {}", series.display()));
    }
    parsed.series = series;
    Ok(parsed)
}

fn parse_number(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<usize> {
    let value = args
        .next()
        .ok_or_else(|| anyhow!("{flag} needs a value\n{USAGE}"))?;
    value
        .parse()
        .with_context(|| format!("{flag} expects a number, got {value:?}"))
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    warn!("Logging initialized; override level with config.log_level or RUST_LOG");
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("debug"));
    if let Err(err) = handle.modify(|filter| *filter = parsed.clone()) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter()
            .map(|arg| arg.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn parses_flags_around_series_path() {
        let dir = env::temp_dir();
        let dir_arg = dir.to_string_lossy().to_string();
        let parsed = parse_args(args(&[
            "--mode", "double", &dir_arg, "--chapter", "3", "--lang", "ENG",
        ]))
        .expect("arguments should parse");
        assert_eq!(parsed.series, dir);
        assert_eq!(parsed.chapter, Some(3));
        assert_eq!(parsed.mode, Some(ViewMode::Double));
        assert_eq!(parsed.lang.as_deref(), Some("ENG"));
    }

    #[test]
    fn rejects_missing_series_and_bad_numbers() {
        assert!(parse_args(args(&[])).is_err());
        let dir_arg = env::temp_dir().to_string_lossy().to_string();
        assert!(parse_args(args(&[&dir_arg, "--chapter", "three"])).is_err());
        assert!(parse_args(args(&[&dir_arg, "--mode", "sideways"])).is_err());
        assert!(parse_args(args(&[&dir_arg, "--verbose"])).is_err());
    }
}
