//! Statistical detection of two-page spreads.
//!
//! A handful of pages from the middle of the chapter give a typical aspect
//! ratio. If those samples disagree with each other the chapter is treated as
//! visually inconsistent and nothing is marked. Otherwise any page much wider
//! than the typical page is a spread.

use crate::catalog::{MediaProbe, Page};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadSettings {
    pub enabled: bool,
    pub sample_count: usize,
    /// Chapters this short are sampled whole instead of from the middle half.
    pub small_chapter_pages: usize,
    /// Largest relative distance of a sample from the median.
    pub consistency_tolerance: f64,
    pub ratio_multiplier: f64,
}

impl Default for SpreadSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_count: 5,
            small_chapter_pages: 10,
            consistency_tolerance: 0.10,
            ratio_multiplier: 1.5,
        }
    }
}

/// Evenly spaced page indices to sample.
pub fn sample_indices(len: usize, settings: &SpreadSettings) -> Vec<usize> {
    if len == 0 || settings.sample_count == 0 {
        return Vec::new();
    }
    let (start, end) = if len <= settings.small_chapter_pages {
        (0, len)
    } else {
        (len / 4, (len * 3 / 4).max(len / 4 + 1))
    };
    let span = end - start;
    let count = settings.sample_count.min(span);
    (0..count).map(|i| start + i * span / count).collect()
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn aspect_ratio(page: &Page, probe: &dyn MediaProbe) -> Option<f64> {
    let (width, height) = probe.dimensions(page.effective_path())?;
    if height == 0 {
        return None;
    }
    Some(f64::from(width) / f64::from(height))
}

/// Mark spreads in place and return the indices whose flag changed.
///
/// Pages pinned by a person (`is_spread_explicit`) are never touched, and a
/// page whose size cannot be read keeps its current flag.
pub fn detect_spreads(
    pages: &mut [Page],
    probe: &dyn MediaProbe,
    settings: &SpreadSettings,
) -> Vec<usize> {
    if !settings.enabled || pages.is_empty() {
        return Vec::new();
    }

    let samples: Vec<f64> = sample_indices(pages.len(), settings)
        .into_iter()
        .filter_map(|index| aspect_ratio(&pages[index], probe))
        .collect();
    let Some(typical) = median(&samples) else {
        debug!("No readable samples for spread detection");
        return Vec::new();
    };
    if typical <= 0.0 {
        return Vec::new();
    }

    let inconsistent = samples
        .iter()
        .any(|ratio| (ratio - typical).abs() / typical > settings.consistency_tolerance);
    if inconsistent {
        debug!(
            samples = samples.len(),
            median = typical,
            "Chapter page sizes are inconsistent; skipping spread detection"
        );
        return Vec::new();
    }

    let threshold = typical * settings.ratio_multiplier;
    let mut changed = Vec::new();
    for (index, page) in pages.iter_mut().enumerate() {
        if page.is_spread_explicit {
            continue;
        }
        let Some(ratio) = aspect_ratio(page, probe) else {
            continue;
        };
        let is_spread = ratio > threshold;
        if page.is_spread != is_spread {
            page.is_spread = is_spread;
            changed.push(index);
        }
    }
    debug!(median = typical, changed = changed.len(), "Spread detection finished");
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::MockProbe;
    use std::path::PathBuf;

    fn pages_with_sizes(sizes: &[(u32, u32)]) -> (Vec<Page>, MockProbe) {
        let mut probe = MockProbe::default();
        let pages = sizes
            .iter()
            .enumerate()
            .map(|(i, size)| {
                let path = PathBuf::from(format!("/s/Ch.1/{i:03}.jpg"));
                probe = std::mem::take(&mut probe).with_size(path.clone(), *size);
                Page::single(path)
            })
            .collect();
        (pages, probe)
    }

    #[test]
    fn small_chapters_are_sampled_whole() {
        let settings = SpreadSettings::default();
        assert_eq!(sample_indices(3, &settings), vec![0, 1, 2]);
        assert_eq!(sample_indices(10, &settings), vec![0, 2, 4, 6, 8]);
        assert!(sample_indices(0, &settings).is_empty());
    }

    #[test]
    fn large_chapters_are_sampled_from_the_middle_half() {
        let settings = SpreadSettings::default();
        let indices = sample_indices(40, &settings);
        assert_eq!(indices.len(), 5);
        assert!(indices.iter().all(|i| (10..30).contains(i)));
    }

    #[test]
    fn median_handles_even_and_odd_counts() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn wide_page_in_consistent_chapter_becomes_spread() {
        // Samples land on 0, 2 and 4.
        let (mut pages, probe) = pages_with_sizes(&[
            (700, 1000),
            (1400, 1000),
            (700, 1000),
            (710, 1000),
            (700, 1000),
            (700, 1000),
            (700, 1000),
        ]);
        let settings = SpreadSettings {
            sample_count: 3,
            ..SpreadSettings::default()
        };

        let changed = detect_spreads(&mut pages, &probe, &settings);

        assert_eq!(changed, vec![1]);
        assert!(pages[1].is_spread);
        assert!(pages.iter().filter(|p| p.is_spread).count() == 1);
    }

    #[test]
    fn inconsistent_samples_abort_detection() {
        let (mut pages, probe) =
            pages_with_sizes(&[(700, 1000), (900, 1000), (1400, 1000), (700, 1000)]);

        let changed = detect_spreads(&mut pages, &probe, &SpreadSettings::default());

        assert!(changed.is_empty());
        assert!(pages.iter().all(|p| !p.is_spread));
    }

    #[test]
    fn pinned_pages_are_left_alone() {
        let (mut pages, probe) = pages_with_sizes(&[(700, 1000); 6]);
        pages[1].is_spread = true;
        pages[1].is_spread_explicit = true;
        pages[4].is_spread = true;

        let changed = detect_spreads(&mut pages, &probe, &SpreadSettings::default());

        assert_eq!(changed, vec![4]);
        assert!(pages[1].is_spread);
        assert!(!pages[4].is_spread);
    }

    #[test]
    fn disabled_detection_changes_nothing() {
        let (mut pages, probe) = pages_with_sizes(&[(700, 1000), (1400, 1000)]);
        let settings = SpreadSettings {
            enabled: false,
            ..SpreadSettings::default()
        };
        assert!(detect_spreads(&mut pages, &probe, &settings).is_empty());
    }
}
