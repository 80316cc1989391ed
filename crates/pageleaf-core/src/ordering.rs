//! Ordering keys for chapters and pages, plus path normalization.

use crate::archive::split_virtual;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

static RE_CHAPTER_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:chapter|ch\.)\s*(\d+)").unwrap());
static RE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// Number used to order a chapter or page by its file name.
///
/// An explicit `Ch.<N>` / `Chapter <N>` marker wins; otherwise the first run
/// of digits anywhere in the name. `None` means "no number" and sorts last.
pub fn chapter_number(name: &str) -> Option<u64> {
    if let Some(caps) = RE_CHAPTER_MARKER.captures(name) {
        return Some(parse_digits(&caps[1]));
    }
    RE_DIGITS.find(name).map(|m| parse_digits(m.as_str()))
}

fn parse_digits(digits: &str) -> u64 {
    digits.parse().unwrap_or(u64::MAX)
}

/// Full sort key for a path: numbered names first (ascending), then the
/// lowercase file name as a tie break.
pub fn sort_key(path: &Path) -> (u8, u64, String) {
    let name = file_name_lossy(path);
    match chapter_number(&name) {
        Some(n) => (0, n, name.to_lowercase()),
        None => (1, 0, name.to_lowercase()),
    }
}

pub fn sort_by_number<P: AsRef<Path>>(paths: &mut [P]) {
    paths.sort_by_cached_key(|path| sort_key(path.as_ref()));
}

/// Last path component; for archive entries, the entry's own file name.
pub fn file_name_lossy(path: &Path) -> String {
    if let Some((_, entry)) = split_virtual(path) {
        return entry.rsplit('/').next().unwrap_or_default().to_string();
    }
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Key used by the reader's path index: forward slashes, NFC.
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").nfc().collect()
}
