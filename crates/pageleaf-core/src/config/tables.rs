use super::defaults;
use super::models::{AppConfig, LogLevel, ViewMode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    reader: ReaderConfig,
    #[serde(default)]
    spreads: SpreadsConfig,
    #[serde(default)]
    library: LibraryConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            default_view_mode: tables.reader.default_view_mode,
            preferred_language: tables.reader.preferred_language,
            detect_spreads: tables.spreads.detect_spreads,
            spread_sample_count: tables.spreads.sample_count,
            small_chapter_pages: tables.spreads.small_chapter_pages,
            consistency_tolerance: tables.spreads.consistency_tolerance,
            spread_ratio_multiplier: tables.spreads.spread_ratio_multiplier,
            sidecar_file_name: tables.library.sidecar_file_name,
            cache_dir: tables.library.cache_dir,
            log_level: tables.logging.log_level,
        }
    }
}

impl From<&AppConfig> for ConfigTables {
    fn from(config: &AppConfig) -> Self {
        ConfigTables {
            reader: ReaderConfig {
                default_view_mode: config.default_view_mode,
                preferred_language: config.preferred_language.clone(),
            },
            spreads: SpreadsConfig {
                detect_spreads: config.detect_spreads,
                sample_count: config.spread_sample_count,
                small_chapter_pages: config.small_chapter_pages,
                consistency_tolerance: config.consistency_tolerance,
                spread_ratio_multiplier: config.spread_ratio_multiplier,
            },
            library: LibraryConfig {
                sidecar_file_name: config.sidecar_file_name.clone(),
                cache_dir: config.cache_dir.clone(),
            },
            logging: LoggingConfig {
                log_level: config.log_level,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ReaderConfig {
    #[serde(default = "defaults::default_view_mode")]
    default_view_mode: ViewMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preferred_language: Option<String>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            default_view_mode: defaults::default_view_mode(),
            preferred_language: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct SpreadsConfig {
    #[serde(default = "defaults::default_detect_spreads")]
    detect_spreads: bool,
    #[serde(default = "defaults::default_sample_count")]
    sample_count: usize,
    #[serde(default = "defaults::default_small_chapter_pages")]
    small_chapter_pages: usize,
    #[serde(default = "defaults::default_consistency_tolerance")]
    consistency_tolerance: f64,
    #[serde(default = "defaults::default_spread_ratio_multiplier")]
    spread_ratio_multiplier: f64,
}

impl Default for SpreadsConfig {
    fn default() -> Self {
        SpreadsConfig {
            detect_spreads: defaults::default_detect_spreads(),
            sample_count: defaults::default_sample_count(),
            small_chapter_pages: defaults::default_small_chapter_pages(),
            consistency_tolerance: defaults::default_consistency_tolerance(),
            spread_ratio_multiplier: defaults::default_spread_ratio_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct LibraryConfig {
    #[serde(default = "defaults::default_sidecar_file_name")]
    sidecar_file_name: String,
    #[serde(default = "defaults::default_cache_dir")]
    cache_dir: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        LibraryConfig {
            sidecar_file_name: defaults::default_sidecar_file_name(),
            cache_dir: defaults::default_cache_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}
