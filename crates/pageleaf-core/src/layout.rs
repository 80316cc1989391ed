//! Double-page pairing for right-to-left reading.
//!
//! Pages are scanned once with a one-page buffer. Two consecutive single
//! pages share a slot, the earlier one on the right. A spread always gets a
//! slot to itself, and a single page left without a partner is shown beside
//! a placeholder.

use crate::catalog::Page;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "page", rename_all = "snake_case")]
pub enum Slot {
    Page(usize),
    /// Blank half beside an orphaned page.
    Placeholder,
    /// Unused half of a spread slot.
    Empty,
}

impl Slot {
    pub fn page(self) -> Option<usize> {
        match self {
            Slot::Page(index) => Some(index),
            Slot::Placeholder | Slot::Empty => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayoutPair {
    pub left: Slot,
    pub right: Slot,
}

impl LayoutPair {
    /// The page read first in this slot: right if present, else left.
    pub fn primary_page(&self) -> Option<usize> {
        self.right.page().or_else(|| self.left.page())
    }

    pub fn contains(&self, page: usize) -> bool {
        self.left.page() == Some(page) || self.right.page() == Some(page)
    }

    pub fn pages(&self) -> impl Iterator<Item = usize> {
        [self.right.page(), self.left.page()].into_iter().flatten()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Layout {
    pairs: Vec<LayoutPair>,
    #[serde(skip)]
    page_to_slot: Vec<usize>,
}

impl Layout {
    pub fn build(pages: &[Page]) -> Self {
        let flags: Vec<bool> = pages.iter().map(|page| page.is_spread).collect();
        Self::from_spread_flags(&flags)
    }

    pub fn from_spread_flags(spreads: &[bool]) -> Self {
        let mut pairs = Vec::with_capacity(spreads.len() / 2 + 1);
        let mut page_to_slot = vec![0; spreads.len()];
        let mut pending: Option<usize> = None;

        let mut push = |pair: LayoutPair, pairs: &mut Vec<LayoutPair>| {
            let slot = pairs.len();
            for page in pair.pages() {
                page_to_slot[page] = slot;
            }
            pairs.push(pair);
        };

        for (index, &is_spread) in spreads.iter().enumerate() {
            if is_spread {
                if let Some(orphan) = pending.take() {
                    push(
                        LayoutPair {
                            left: Slot::Placeholder,
                            right: Slot::Page(orphan),
                        },
                        &mut pairs,
                    );
                }
                push(
                    LayoutPair {
                        left: Slot::Page(index),
                        right: Slot::Empty,
                    },
                    &mut pairs,
                );
            } else if let Some(previous) = pending.take() {
                push(
                    LayoutPair {
                        left: Slot::Page(index),
                        right: Slot::Page(previous),
                    },
                    &mut pairs,
                );
            } else {
                pending = Some(index);
            }
        }
        if let Some(orphan) = pending {
            push(
                LayoutPair {
                    left: Slot::Placeholder,
                    right: Slot::Page(orphan),
                },
                &mut pairs,
            );
        }

        Self {
            pairs,
            page_to_slot,
        }
    }

    pub fn pairs(&self) -> &[LayoutPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pair(&self, slot: usize) -> Option<&LayoutPair> {
        self.pairs.get(slot)
    }

    /// Slot index holding `page`.
    pub fn slot_of(&self, page: usize) -> Option<usize> {
        self.page_to_slot.get(page).copied()
    }

    pub fn pair_of(&self, page: usize) -> Option<&LayoutPair> {
        self.slot_of(page).and_then(|slot| self.pairs.get(slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: usize = 0;
    const B: usize = 1;
    const C: usize = 2;
    const D: usize = 3;
    const E: usize = 4;

    fn pair(left: Slot, right: Slot) -> LayoutPair {
        LayoutPair { left, right }
    }

    #[test]
    fn five_single_pages_leave_last_page_orphaned() {
        let layout = Layout::from_spread_flags(&[false; 5]);
        assert_eq!(
            layout.pairs(),
            &[
                pair(Slot::Page(B), Slot::Page(A)),
                pair(Slot::Page(D), Slot::Page(C)),
                pair(Slot::Placeholder, Slot::Page(E)),
            ]
        );
        let reading_order: Vec<usize> = layout.pairs().iter().flat_map(LayoutPair::pages).collect();
        assert_eq!(reading_order, vec![A, B, C, D, E]);
    }

    #[test]
    fn spread_gets_its_own_slot() {
        let layout = Layout::from_spread_flags(&[false, false, true, false, false]);
        assert_eq!(
            layout.pairs(),
            &[
                pair(Slot::Page(B), Slot::Page(A)),
                pair(Slot::Page(C), Slot::Empty),
                pair(Slot::Page(E), Slot::Page(D)),
            ]
        );
        assert_eq!(layout.slot_of(C), Some(1));
        assert_eq!(layout.pair_of(C).and_then(LayoutPair::primary_page), Some(C));
    }

    #[test]
    fn page_before_spread_is_flushed_with_placeholder() {
        let layout = Layout::from_spread_flags(&[false, true, false]);
        assert_eq!(
            layout.pairs(),
            &[
                pair(Slot::Placeholder, Slot::Page(A)),
                pair(Slot::Page(B), Slot::Empty),
                pair(Slot::Placeholder, Slot::Page(C)),
            ]
        );
    }

    #[test]
    fn pairing_invariants_hold_for_every_spread_pattern() {
        for len in 0..=8usize {
            for mask in 0u32..(1 << len) {
                let flags: Vec<bool> = (0..len).map(|i| mask & (1 << i) != 0).collect();
                let layout = Layout::from_spread_flags(&flags);

                let mut seen = vec![0usize; len];
                for (slot, pair) in layout.pairs().iter().enumerate() {
                    let pages: Vec<usize> = pair.pages().collect();
                    assert!(!pages.is_empty());
                    if pages.len() == 2 {
                        assert!(pages.iter().all(|&p| !flags[p]), "spread paired: {flags:?}");
                    }
                    for page in pages {
                        seen[page] += 1;
                        assert_eq!(layout.slot_of(page), Some(slot));
                    }
                }
                assert!(seen.iter().all(|&count| count == 1), "{flags:?}");
                assert!(layout.len() <= len);
                assert!(layout.len() >= len.div_ceil(2));
            }
        }
    }

    #[test]
    fn empty_chapter_has_no_slots() {
        let layout = Layout::from_spread_flags(&[]);
        assert!(layout.is_empty());
        assert_eq!(layout.slot_of(0), None);
    }
}
