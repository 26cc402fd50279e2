//! A headless view-synchronization engine for continuously-updating,
//! bidirectionally-paginated chat timelines.
//!
//! The engine keeps a scrollable timeline view consistent with an
//! externally-owned stream of collection updates: it diffs each incoming
//! state against what was last rendered, decides whether to animate or
//! silently reposition the viewport so the user's reading position is never
//! disturbed, throttles and gates pagination requests in both directions,
//! and reports the newest visible item for read receipts.
//!
//! It renders nothing itself. The hosting UI implements
//! [`TimelineViewport`] for its list surface, drives a [`TimelineView`]
//! from its event loop, and wires the two channel endpoints to its data
//! source: updates in, requests out. Everything runs on a single logical
//! thread; see the `timeline_view` module docs for the wiring details.

/// Preserving the user's reading position across content mutations.
pub mod anchor;
/// Order diffing between rendered and incoming collection states.
pub mod diff;
/// The timeline item model and the keyed ordered collection.
pub mod items;
/// Scroll-driven pagination gating and throttling.
pub mod pagination;
/// The view synchronization controller.
pub mod timeline_view;
/// The boundary between the engine and the rendering surface.
pub mod viewport;
/// Read-receipt visibility tracking.
pub mod visibility;

pub use items::{EventId, ItemId, TimelineItem, TimelineItemKind, TimelineItems, VirtualItemKind};
pub use pagination::{PaginationDirection, PaginationState};
pub use timeline_view::{
    SavedState, ScrollEvent, TimelineEndpoints, TimelineRequest, TimelineUpdate, TimelineView,
    TimelineViewConfig, TimelineViewError,
};
pub use viewport::{ItemFrame, RenderedSnapshot, ScrollAlignment, TimelineViewport};
