//! Determining the newest visible content item for read receipts.

use crossbeam_channel::Sender;
use tracing::trace;

use crate::items::{EventId, TimelineItems};
use crate::timeline_view::{TimelineRequest, TimelineViewError};
use crate::viewport::TimelineViewport;

/// Finds the read-receipt candidate whenever a snapshot is applied or a
/// scroll settles, and reports it to the data source.
///
/// The candidate is the first visible row, in viewport-top-to-bottom order
/// (newest to oldest), that is a real content item with an underlying event
/// identifier. Decorative rows and unsent local echoes are skipped. The same
/// candidate is never reported twice in a row, so re-applying an identical
/// snapshot or settling twice in the same place emits nothing new.
#[derive(Debug, Default)]
pub struct ReadReceiptNotifier {
    last_candidate: Option<EventId>,
}

impl ReadReceiptNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-evaluates visibility, emitting at most one request.
    pub fn evaluate<V: TimelineViewport>(
        &mut self,
        viewport: &V,
        items: &TimelineItems,
        requests: &Sender<TimelineRequest>,
    ) -> Result<(), TimelineViewError> {
        for row_id in viewport.visible_items() {
            // The fixed decorative slot has no collection entry at all.
            let Some(item) = items.get_by_id(&row_id) else { continue };
            if item.is_decorative() {
                continue;
            }
            let Some(event_id) = item.event_id() else { continue };

            if self.last_candidate.as_ref() == Some(event_id) {
                return Ok(());
            }
            trace!(event = %event_id, "read receipt candidate");
            self.last_candidate = Some(event_id.clone());
            requests.send(TimelineRequest::ReadReceipt { event_id: event_id.clone() })?;
            return Ok(());
        }
        Ok(())
    }

    /// Forgets the last reported candidate, so the next evaluation reports
    /// again even if the same item is topmost. Used after the view jumps to
    /// a different part of the timeline.
    pub fn reset(&mut self) {
        self.last_candidate = None;
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::{Receiver, unbounded};
    use imbl::Vector;

    use super::*;
    use crate::items::{ItemId, TimelineItem, VirtualItemKind};
    use crate::viewport::RenderedSnapshot;
    use crate::viewport::mock::FixedViewport;

    fn viewport_showing(ids_newest_first: &[&str]) -> FixedViewport {
        // Tall enough that every row is visible.
        let mut viewport = FixedViewport::new(100.0, 1000.0);
        let mut snapshot = RenderedSnapshot::new();
        snapshot.set_main_order(
            ids_newest_first.iter().copied().map(ItemId::from).collect(),
            true,
        );
        viewport.apply_snapshot(&snapshot, false);
        viewport
    }

    fn drain(receiver: &Receiver<TimelineRequest>) -> Vec<TimelineRequest> {
        receiver.try_iter().collect()
    }

    #[test]
    fn newest_visible_content_item_wins() {
        let viewport = viewport_showing(&["spinner", "b", "a"]);
        let mut items = TimelineItems::new();
        items.set(Vector::from_iter([
            TimelineItem::event("a", Some("$a".into()), 1),
            TimelineItem::event("b", Some("$b".into()), 2),
            TimelineItem::virtual_item("spinner", VirtualItemKind::PaginationSpinner),
        ]));

        let (sender, receiver) = unbounded();
        let mut notifier = ReadReceiptNotifier::new();
        notifier.evaluate(&viewport, &items, &sender).unwrap();

        assert_eq!(
            drain(&receiver),
            vec![TimelineRequest::ReadReceipt { event_id: "$b".into() }],
        );
    }

    #[test]
    fn local_echo_is_skipped() {
        let viewport = viewport_showing(&["echo", "a"]);
        let mut items = TimelineItems::new();
        items.set(Vector::from_iter([
            TimelineItem::event("a", Some("$a".into()), 1),
            TimelineItem::event("echo", None, 2),
        ]));

        let (sender, receiver) = unbounded();
        let mut notifier = ReadReceiptNotifier::new();
        notifier.evaluate(&viewport, &items, &sender).unwrap();

        assert_eq!(
            drain(&receiver),
            vec![TimelineRequest::ReadReceipt { event_id: "$a".into() }],
        );
    }

    #[test]
    fn no_signal_with_only_decorative_rows() {
        let viewport = viewport_showing(&["divider"]);
        let mut items = TimelineItems::new();
        items.set(Vector::from_iter([
            TimelineItem::virtual_item("divider", VirtualItemKind::DateDivider),
        ]));

        let (sender, receiver) = unbounded();
        let mut notifier = ReadReceiptNotifier::new();
        notifier.evaluate(&viewport, &items, &sender).unwrap();
        assert!(drain(&receiver).is_empty());
    }

    #[test]
    fn same_candidate_not_reported_twice() {
        let viewport = viewport_showing(&["a"]);
        let mut items = TimelineItems::new();
        items.set(Vector::from_iter([TimelineItem::event("a", Some("$a".into()), 1)]));

        let (sender, receiver) = unbounded();
        let mut notifier = ReadReceiptNotifier::new();
        notifier.evaluate(&viewport, &items, &sender).unwrap();
        notifier.evaluate(&viewport, &items, &sender).unwrap();
        assert_eq!(drain(&receiver).len(), 1);

        notifier.reset();
        notifier.evaluate(&viewport, &items, &sender).unwrap();
        assert_eq!(drain(&receiver).len(), 1);
    }
}
