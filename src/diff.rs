//! Order diffing between the last rendered snapshot and an incoming
//! collection state.
//!
//! The view layer is expected to run its own positional diffing when a
//! snapshot is applied; the engine only needs the two facts that drive the
//! apply-cycle, so that is all this computes.

use crate::items::ItemId;

/// The result of comparing two main-section display orders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// The two orders are exactly identical.
    ///
    /// When set, the apply-cycle is a no-op: no animation, no anchor work,
    /// no re-apply of the snapshot.
    pub identical: bool,
    /// The topmost (newest) main-section item changed identity.
    ///
    /// This single fact drives the animate-vs-silent decision: a new top
    /// item while live animates, a new top item while historical triggers
    /// anchor preservation, and anything else needs no repositioning at all.
    pub top_item_changed: bool,
}

impl SnapshotDiff {
    /// Compares the previously rendered order against the next one.
    ///
    /// Transitions through an empty order never count as a top change, so
    /// they are never animated.
    pub fn between(previous: &[ItemId], next: &[ItemId]) -> Self {
        let identical = previous == next;
        let top_item_changed = match (previous.first(), next.first()) {
            (Some(previous_top), Some(next_top)) => previous_top != next_top,
            _ => false,
        };
        Self { identical, top_item_changed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(ids: &[&str]) -> Vec<ItemId> {
        ids.iter().copied().map(ItemId::from).collect()
    }

    #[test]
    fn identical_orders() {
        let diff = SnapshotDiff::between(&ids(&["c", "b", "a"]), &ids(&["c", "b", "a"]));
        assert!(diff.identical);
        assert!(!diff.top_item_changed);
    }

    #[test]
    fn new_top_item() {
        let diff = SnapshotDiff::between(&ids(&["c", "b", "a"]), &ids(&["d", "c", "b", "a"]));
        assert!(!diff.identical);
        assert!(diff.top_item_changed);
    }

    #[test]
    fn append_at_historical_end_keeps_top() {
        let diff = SnapshotDiff::between(&ids(&["c", "b"]), &ids(&["c", "b", "a"]));
        assert!(!diff.identical);
        assert!(!diff.top_item_changed);
    }

    #[test]
    fn transitions_through_empty_are_not_top_changes() {
        let diff = SnapshotDiff::between(&[], &ids(&["a"]));
        assert!(!diff.identical);
        assert!(!diff.top_item_changed);

        let diff = SnapshotDiff::between(&ids(&["a"]), &[]);
        assert!(!diff.identical);
        assert!(!diff.top_item_changed);

        let diff = SnapshotDiff::between(&[], &[]);
        assert!(diff.identical);
        assert!(!diff.top_item_changed);
    }
}
