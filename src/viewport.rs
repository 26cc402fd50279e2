//! The boundary between the engine and whatever surface renders the
//! timeline.
//!
//! The engine never draws anything itself: it issues rendering commands and
//! geometry queries through the [`TimelineViewport`] trait, and tracks what
//! it last applied in a [`RenderedSnapshot`]. Any list surface that can
//! report row frames and adjust its scroll offset can implement the trait.
//!
//! Coordinate convention: display index 0 (the newest item) renders at the
//! top of the content, y grows toward older content, and the content offset
//! is the distance from the top of the content to the viewport's leading
//! edge. How a particular rendering surface realizes that (e.g. by flipping
//! a bottom-anchored list) is its own business.

use std::ops::Range;

use rangemap::RangeSet;

use crate::items::ItemId;

/// The decorative section always exists and always holds exactly one slot
/// (the typing-indicator row), rendered adjacent to the newest item.
pub const DECORATIVE_SLOT_COUNT: usize = 1;

/// The on-screen frame of a single rendered row, relative to the viewport's
/// leading (top) edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ItemFrame {
    pub origin_y: f64,
    pub height: f64,
}

impl ItemFrame {
    /// The row's trailing edge.
    pub fn max_y(&self) -> f64 {
        self.origin_y + self.height
    }
}

/// Where a scroll-to command should place the target row in the viewport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollAlignment {
    /// Align the row's top with the viewport's leading edge.
    Leading,
    /// Center the row in the viewport.
    Center,
}

/// Rendering commands and geometry queries the engine issues to the
/// rendering surface.
///
/// All methods are invoked on the single logical UI thread. Query methods
/// must reflect the result of any command issued earlier in the same cycle:
/// the anchor tracker scrolls an item to the leading edge and immediately
/// re-reads its frame to compute the correcting offset delta.
pub trait TimelineViewport {
    fn viewport_height(&self) -> f64;

    fn content_height(&self) -> f64;

    /// Distance from the top of the content (the newest edge) to the
    /// viewport's leading edge.
    fn content_offset(&self) -> f64;

    /// Identifiers of the currently visible rows in viewport-top-to-bottom
    /// order, including the decorative slot.
    fn visible_items(&self) -> Vec<ItemId>;

    /// The viewport-relative frame of the given row, if it is laid out.
    fn frame_of_item(&self, item_id: &ItemId) -> Option<ItemFrame>;

    /// Applies a new rendered snapshot.
    ///
    /// The surface should diff against its current row set however it likes;
    /// `animated` is only ever `true` for the live-mode new-message case.
    fn apply_snapshot(&mut self, snapshot: &RenderedSnapshot, animated: bool);

    fn scroll_to_item(&mut self, item_id: &ItemId, alignment: ScrollAlignment, animated: bool);

    /// Scrolls to the newest edge of the content (offset zero), bringing the
    /// decorative slot and the newest item into view.
    fn scroll_to_newest(&mut self, animated: bool);

    /// Adds `delta` to the content offset, without animation.
    fn adjust_offset(&mut self, delta: f64);
}

/// The collection state most recently applied to the view, partitioned into
/// the fixed decorative section and the main section.
///
/// Also carries the drawn-rows cache: the set of main-section indices whose
/// content the view layer has populated since the last restructuring update.
/// The view layer marks rows drawn; the engine only invalidates. The policy
/// is conservative: any update that changes the top item or shrinks the list
/// clears the whole cache, while in-place updates only invalidate from the
/// first changed index onward. Big invalidations therefore only occur on
/// back-pagination or timeline resets, which are rare and slow anyway.
#[derive(Clone, Debug)]
pub struct RenderedSnapshot {
    main: Vec<ItemId>,
    content_drawn: RangeSet<usize>,
}

impl Default for RenderedSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderedSnapshot {
    pub fn new() -> Self {
        Self {
            main: Vec::new(),
            content_drawn: RangeSet::new(),
        }
    }

    /// The main section in display order (newest first).
    pub fn main_order(&self) -> &[ItemId] {
        &self.main
    }

    /// Total row count, including the decorative slot.
    pub fn row_count(&self) -> usize {
        DECORATIVE_SLOT_COUNT + self.main.len()
    }

    /// Replaces the main section, invalidating the drawn-rows cache as
    /// described above.
    pub(crate) fn set_main_order(&mut self, next: Vec<ItemId>, restructured: bool) {
        if restructured {
            self.content_drawn.clear();
        } else {
            let first_changed = self
                .main
                .iter()
                .zip(&next)
                .position(|(previous, new)| previous != new)
                .unwrap_or_else(|| self.main.len().min(next.len()));
            self.content_drawn.remove(first_changed..usize::MAX);
        }
        self.main = next;
    }

    /// Marks a range of main-section rows as drawn. Called by the view layer
    /// after it populates row content.
    pub fn mark_drawn(&mut self, range: Range<usize>) {
        if range.start < range.end {
            self.content_drawn.insert(range);
        }
    }

    /// Whether the main-section row at `index` is still drawn from a
    /// previous pass and need not be re-populated.
    pub fn is_drawn(&self, index: usize) -> bool {
        self.content_drawn.contains(&index)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn ids(ids: &[&str]) -> Vec<ItemId> {
        ids.iter().copied().map(ItemId::from).collect()
    }

    #[test]
    fn drawn_cache_survives_pure_appends() {
        let mut snapshot = RenderedSnapshot::new();
        snapshot.set_main_order(ids(&["c", "b", "a"]), false);
        snapshot.mark_drawn(0..3);

        // Older items appended at the historical end do not disturb the
        // already-drawn newer rows.
        snapshot.set_main_order(ids(&["c", "b", "a", "z", "y"]), false);
        assert!(snapshot.is_drawn(0));
        assert!(snapshot.is_drawn(2));
        assert!(!snapshot.is_drawn(3));
    }

    #[test]
    fn drawn_cache_cleared_on_restructure() {
        let mut snapshot = RenderedSnapshot::new();
        snapshot.set_main_order(ids(&["c", "b", "a"]), false);
        snapshot.mark_drawn(0..3);

        snapshot.set_main_order(ids(&["d", "c", "b", "a"]), true);
        assert!(!snapshot.is_drawn(0));
        assert!(!snapshot.is_drawn(3));
    }

    #[test]
    fn drawn_cache_trimmed_from_first_change() {
        let mut snapshot = RenderedSnapshot::new();
        snapshot.set_main_order(ids(&["c", "b", "a"]), false);
        snapshot.mark_drawn(0..3);

        // An in-place replacement of "b" invalidates it and everything after.
        snapshot.set_main_order(ids(&["c", "b2", "a"]), false);
        assert!(snapshot.is_drawn(0));
        assert!(!snapshot.is_drawn(1));
        assert!(!snapshot.is_drawn(2));
    }

    #[test]
    fn row_count_includes_decorative_slot() {
        let mut snapshot = RenderedSnapshot::new();
        assert_eq!(snapshot.row_count(), 1);
        snapshot.set_main_order(ids(&["a"]), false);
        assert_eq!(snapshot.row_count(), 2);
    }
}
