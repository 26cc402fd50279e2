//! Preserving the user's reading position across content mutations.
//!
//! When the timeline is pinned to a historical position and items are
//! inserted or removed at the opposite end of where the user is looking, the
//! viewport must be repositioned so the content under their eyes does not
//! move. The anchor is captured immediately before the mutation is applied
//! and restored immediately after; it never outlives one apply-cycle.

use tracing::{debug, trace};

use crate::items::{ItemId, TimelineItems};
use crate::viewport::{ItemFrame, ScrollAlignment, TimelineViewport};

/// One item's on-screen position, captured immediately before a mutation.
#[derive(Clone, Debug)]
pub struct ScrollAnchor {
    /// The anchor item.
    pub item_id: ItemId,
    /// The item's viewport-relative frame at capture time.
    pub frame: ItemFrame,
}

/// Captures the current visual anchor: the first visible row, top to bottom,
/// that is a real content item with a reported frame.
///
/// Returns `None` when only decorative rows are visible. Rows that do not
/// resolve in `items` are skipped too: `items` is the incoming collection,
/// and an item absent from it could never be restored anyway, so the next
/// surviving row makes the better anchor.
pub fn capture<V: TimelineViewport>(viewport: &V, items: &TimelineItems) -> Option<ScrollAnchor> {
    for row_id in viewport.visible_items() {
        let is_content = items
            .get_by_id(&row_id)
            .is_some_and(|item| !item.is_decorative());
        if !is_content {
            continue;
        }
        if let Some(frame) = viewport.frame_of_item(&row_id) {
            trace!(item = %row_id, origin_y = frame.origin_y, "captured scroll anchor");
            return Some(ScrollAnchor { item_id: row_id, frame });
        }
    }
    None
}

/// Restores a previously captured anchor after the new snapshot was applied.
///
/// Scrolls the anchor item to the viewport's leading edge, then corrects the
/// offset by the delta between its new trailing edge and the recorded one,
/// leaving the item's pixel position unchanged. If the item is gone from the
/// new collection this does nothing.
pub fn restore<V: TimelineViewport>(
    viewport: &mut V,
    items: &TimelineItems,
    anchor: &ScrollAnchor,
) {
    if items.get_by_id(&anchor.item_id).is_none() {
        debug!(item = %anchor.item_id, "anchor item no longer present, skipping restore");
        return;
    }
    viewport.scroll_to_item(&anchor.item_id, ScrollAlignment::Leading, false);
    let Some(new_frame) = viewport.frame_of_item(&anchor.item_id) else {
        return;
    };
    let delta = new_frame.max_y() - anchor.frame.max_y();
    if delta != 0.0 {
        viewport.adjust_offset(delta);
    }
}
