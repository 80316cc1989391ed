pub(crate) fn default_view_mode() -> crate::config::ViewMode {
    crate::config::ViewMode::Single
}

pub(crate) fn default_detect_spreads() -> bool {
    true
}

pub(crate) fn default_sample_count() -> usize {
    5
}

pub(crate) fn default_small_chapter_pages() -> usize {
    10
}

pub(crate) fn default_consistency_tolerance() -> f64 {
    0.10
}

pub(crate) fn default_spread_ratio_multiplier() -> f64 {
    1.5
}

pub(crate) fn default_sidecar_file_name() -> String {
    crate::sidecar::DEFAULT_SIDECAR_FILE_NAME.to_string()
}

pub(crate) fn default_cache_dir() -> String {
    ".cache".to_string()
}

pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Debug
}
