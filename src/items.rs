//! The timeline item model and the keyed ordered collection that holds it.
//!
//! Items are opaque to the engine: all it cares about is each item's stable
//! identifier, whether the item is real content or a decorative row, and the
//! identifier of the underlying room event (used for permalink lookups and
//! read receipts).

use std::fmt;
use std::sync::Arc;

use eyeball_im::VectorDiff;
use imbl::Vector;
use indexmap::IndexMap;

/// A stable identifier for a single timeline item.
///
/// Unique within a timeline and assigned by the data source. A local echo
/// keeps its `ItemId` when the server-assigned event arrives; only the
/// underlying [`EventId`] changes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(Arc<str>);

impl ItemId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", self.0)
    }
}

/// The identifier of the room event underlying a timeline item.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(Arc<str>);

impl EventId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

/// The kind of a decorative (non-content) timeline row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VirtualItemKind {
    /// A spinner shown while a pagination request is in flight.
    PaginationSpinner,
    /// A divider between messages sent on different days.
    DateDivider,
    /// The user's own read marker.
    ReadMarker,
}

/// What a timeline item is: real event content, or a decorative row.
///
/// Decorative rows are excluded from scroll-anchor and read-receipt
/// selection; the engine never inspects item content beyond this split.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimelineItemKind {
    /// A real content item backed by a room event.
    Event {
        /// The underlying event identifier. `None` for an unsent local echo.
        event_id: Option<EventId>,
        /// The event's origin timestamp, in milliseconds since the Unix epoch.
        timestamp_millis: u64,
    },
    /// A decorative row.
    Virtual(VirtualItemKind),
}

/// A single item in the timeline.
///
/// Immutable once placed in the collection; the data source replaces items
/// wholesale on update, so they are shared as `Arc<TimelineItem>` between
/// collection snapshots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimelineItem {
    id: ItemId,
    kind: TimelineItemKind,
}

impl TimelineItem {
    /// Creates a real content item.
    pub fn event(
        id: impl Into<ItemId>,
        event_id: Option<EventId>,
        timestamp_millis: u64,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            kind: TimelineItemKind::Event { event_id, timestamp_millis },
        })
    }

    /// Creates a decorative item.
    pub fn virtual_item(id: impl Into<ItemId>, kind: VirtualItemKind) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            kind: TimelineItemKind::Virtual(kind),
        })
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn kind(&self) -> &TimelineItemKind {
        &self.kind
    }

    /// Returns the underlying event identifier, if this item is real content
    /// that has one. Decorative rows and unsent local echoes return `None`.
    pub fn event_id(&self) -> Option<&EventId> {
        match &self.kind {
            TimelineItemKind::Event { event_id, .. } => event_id.as_ref(),
            TimelineItemKind::Virtual(_) => None,
        }
    }

    /// Returns the event's origin timestamp, for content items.
    pub fn timestamp_millis(&self) -> Option<u64> {
        match &self.kind {
            TimelineItemKind::Event { timestamp_millis, .. } => Some(*timestamp_millis),
            TimelineItemKind::Virtual(_) => None,
        }
    }

    /// `true` for rows that must be skipped by anchor and read-receipt logic.
    pub fn is_decorative(&self) -> bool {
        matches!(self.kind, TimelineItemKind::Virtual(_))
    }
}

/// The authoritative working collection of timeline items.
///
/// Producer order is oldest-first; [`display_order()`] reverses it because
/// the viewport renders newest-at-top. There is deliberately no partial
/// mutation API: the collection is replaced wholesale on every update, and
/// diff batches are folded into a replacement before the controller diffs it
/// against the rendered snapshot. The backing `imbl::Vector` makes each
/// replacement a cheap structurally-shared snapshot.
///
/// Invariant: item identifiers are unique. A collection violating this is a
/// data-source bug, caught by a debug assertion on replacement.
///
/// [`display_order()`]: TimelineItems::display_order
#[derive(Clone, Debug, Default)]
pub struct TimelineItems {
    items: Vector<Arc<TimelineItem>>,
    index_by_id: IndexMap<ItemId, usize>,
}

impl TimelineItems {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the working collection wholesale.
    pub fn set(&mut self, new_items: Vector<Arc<TimelineItem>>) {
        self.index_by_id = new_items
            .iter()
            .enumerate()
            .map(|(index, item)| (item.id().clone(), index))
            .collect();
        debug_assert_eq!(
            self.index_by_id.len(),
            new_items.len(),
            "timeline collection contained duplicate item identifiers",
        );
        self.items = new_items;
    }

    /// Folds a batch of diffs into the collection.
    ///
    /// This is an ingestion convenience for data sources that publish
    /// [`VectorDiff`] batches; the result is indistinguishable from a
    /// wholesale [`set()`](TimelineItems::set) of the final state.
    pub fn apply_diffs(&mut self, diffs: Vec<VectorDiff<Arc<TimelineItem>>>) {
        let mut items = self.items.clone();
        for diff in diffs {
            diff.apply(&mut items);
        }
        self.set(items);
    }

    pub fn as_vector(&self) -> &Vector<Arc<TimelineItem>> {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the item at `index` in producer (oldest-first) order.
    pub fn get(&self, index: usize) -> Option<&Arc<TimelineItem>> {
        self.items.get(index)
    }

    pub fn get_by_id(&self, id: &ItemId) -> Option<&Arc<TimelineItem>> {
        self.index_of(id).and_then(|index| self.items.get(index))
    }

    /// Returns the item's index in producer order.
    pub fn index_of(&self, id: &ItemId) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    /// Keys in the order the view must render them: newest first.
    pub fn display_order(&self) -> Vec<ItemId> {
        self.items.iter().rev().map(|item| item.id().clone()).collect()
    }

    /// Linear scan for the first item whose underlying event identifier
    /// matches, returning its producer-order index.
    pub fn find_by_event_id(&self, event_id: &EventId) -> Option<(usize, &Arc<TimelineItem>)> {
        self.items
            .iter()
            .enumerate()
            .find(|(_, item)| item.event_id() == Some(event_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, event_id: &str) -> Arc<TimelineItem> {
        TimelineItem::event(id, Some(EventId::from(event_id)), 0)
    }

    #[test]
    fn display_order_is_newest_first() {
        let mut items = TimelineItems::new();
        items.set(Vector::from_iter([
            event("a", "$a"),
            event("b", "$b"),
            event("c", "$c"),
        ]));
        assert_eq!(
            items.display_order(),
            vec![ItemId::from("c"), ItemId::from("b"), ItemId::from("a")],
        );
    }

    #[test]
    fn lookup_by_id_and_event_id() {
        let mut items = TimelineItems::new();
        items.set(Vector::from_iter([
            TimelineItem::virtual_item("divider", VirtualItemKind::DateDivider),
            event("a", "$a"),
            TimelineItem::event("echo", None, 10),
            event("b", "$b"),
        ]));

        assert_eq!(items.index_of(&ItemId::from("a")), Some(1));
        assert!(items.get_by_id(&ItemId::from("divider")).unwrap().is_decorative());
        assert!(items.get_by_id(&ItemId::from("missing")).is_none());

        let (index, item) = items.find_by_event_id(&EventId::from("$b")).unwrap();
        assert_eq!(index, 3);
        assert_eq!(item.id(), &ItemId::from("b"));
        assert!(items.find_by_event_id(&EventId::from("$nope")).is_none());
    }

    #[test]
    fn local_echo_has_no_event_id() {
        let echo = TimelineItem::event("echo", None, 42);
        assert!(echo.event_id().is_none());
        assert!(!echo.is_decorative());
        assert_eq!(echo.timestamp_millis(), Some(42));
    }

    #[test]
    fn diff_batch_matches_wholesale_replacement() {
        let initial = Vector::from_iter([event("a", "$a"), event("b", "$b")]);

        let mut by_diffs = TimelineItems::new();
        by_diffs.set(initial.clone());
        by_diffs.apply_diffs(vec![
            VectorDiff::PushBack { value: event("c", "$c") },
            VectorDiff::Remove { index: 0 },
        ]);

        let mut wholesale = TimelineItems::new();
        wholesale.set(Vector::from_iter([event("b", "$b"), event("c", "$c")]));

        assert_eq!(by_diffs.display_order(), wholesale.display_order());
        assert_eq!(by_diffs.len(), 2);
    }
}
