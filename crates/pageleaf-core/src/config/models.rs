use crate::config::defaults;
use crate::spread::SpreadSettings;
use serde::{Deserialize, Serialize};

/// Flattened engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppConfig {
    pub default_view_mode: ViewMode,
    pub preferred_language: Option<String>,
    pub detect_spreads: bool,
    pub spread_sample_count: usize,
    pub small_chapter_pages: usize,
    pub consistency_tolerance: f64,
    pub spread_ratio_multiplier: f64,
    pub sidecar_file_name: String,
    pub cache_dir: String,
    pub log_level: LogLevel,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            default_view_mode: defaults::default_view_mode(),
            preferred_language: None,
            detect_spreads: defaults::default_detect_spreads(),
            spread_sample_count: defaults::default_sample_count(),
            small_chapter_pages: defaults::default_small_chapter_pages(),
            consistency_tolerance: defaults::default_consistency_tolerance(),
            spread_ratio_multiplier: defaults::default_spread_ratio_multiplier(),
            sidecar_file_name: defaults::default_sidecar_file_name(),
            cache_dir: defaults::default_cache_dir(),
            log_level: defaults::default_log_level(),
        }
    }
}

impl AppConfig {
    /// Pull numeric settings back into ranges the detector can work with.
    pub(crate) fn clamp(&mut self) {
        self.spread_sample_count = self.spread_sample_count.clamp(1, 50);
        self.small_chapter_pages = self.small_chapter_pages.clamp(1, 1000);
        self.consistency_tolerance = sanitize(self.consistency_tolerance, 0.0, 1.0, 0.10);
        self.spread_ratio_multiplier = sanitize(self.spread_ratio_multiplier, 1.0, 10.0, 1.5);
        if self.sidecar_file_name.trim().is_empty() {
            self.sidecar_file_name = defaults::default_sidecar_file_name();
        }
        if self
            .preferred_language
            .as_deref()
            .is_some_and(|lang| lang.trim().is_empty())
        {
            self.preferred_language = None;
        }
    }

    pub fn spread_settings(&self) -> SpreadSettings {
        SpreadSettings {
            enabled: self.detect_spreads,
            sample_count: self.spread_sample_count,
            small_chapter_pages: self.small_chapter_pages,
            consistency_tolerance: self.consistency_tolerance,
            ratio_multiplier: self.spread_ratio_multiplier,
        }
    }
}

fn sanitize(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// How pages are presented. Cycles Single -> Double -> Strip -> Single.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Single,
    Double,
    Strip,
}

impl ViewMode {
    pub fn next(self) -> Self {
        match self {
            ViewMode::Single => ViewMode::Double,
            ViewMode::Double => ViewMode::Strip,
            ViewMode::Strip => ViewMode::Single,
        }
    }
}

impl std::fmt::Display for ViewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ViewMode::Single => "single",
            ViewMode::Double => "double",
            ViewMode::Strip => "strip",
        };
        write!(f, "{}", label)
    }
}

impl std::str::FromStr for ViewMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(ViewMode::Single),
            "double" => Ok(ViewMode::Double),
            "strip" => Ok(ViewMode::Strip),
            other => Err(anyhow::anyhow!("unknown view mode: {other}")),
        }
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    #[default]
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
