//! The view synchronization controller.
//!
//! [`TimelineView`] owns the working collection and all mode flags, and
//! orchestrates diffing, anchoring, pagination, and read receipts on every
//! collection mutation and every scroll event. Everything runs on the single
//! logical UI thread: the data source pushes [`TimelineUpdate`]s over a
//! channel, the host drains them with [`process_updates`] whenever it is
//! signaled, and forwards scroll signals as [`ScrollEvent`]s. The engine
//! talks back through the [`TimelineViewport`] trait for rendering and an
//! outbound [`TimelineRequest`] channel for everything else.
//!
//! [`process_updates`]: TimelineView::process_updates

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use eyeball_im::VectorDiff;
use imbl::Vector;
use thiserror::Error;
use tracing::{debug, trace};

use crate::anchor::{self, ScrollAnchor};
use crate::diff::SnapshotDiff;
use crate::items::{EventId, ItemId, TimelineItem, TimelineItems};
use crate::pagination::{
    PaginationCoordinator, PaginationDirection, PaginationState, ScrollGeometry,
};
use crate::viewport::{RenderedSnapshot, ScrollAlignment, TimelineViewport};
use crate::visibility::ReadReceiptNotifier;

/// Tunables for a timeline view.
#[derive(Clone, Debug)]
pub struct TimelineViewConfig {
    /// How many events to ask for per pagination request.
    pub pagination_batch_size: u16,
    /// The window over which rapid scroll signals are coalesced into a
    /// single pagination eligibility check.
    pub scroll_coalesce_window: Duration,
    /// Backward pagination triggers while the viewport is within this many
    /// viewport-heights of the historical end.
    pub backward_trigger_screens: f64,
    /// Forward pagination triggers while the viewport is within this many
    /// viewport-heights of the newest end.
    pub forward_trigger_screens: f64,
    /// The content offset at or below which the view counts as scrolled to
    /// the bottom, i.e. the newest edge.
    pub scrolled_to_bottom_threshold: f64,
}

impl Default for TimelineViewConfig {
    fn default() -> Self {
        Self {
            pagination_batch_size: 50,
            scroll_coalesce_window: Duration::from_millis(100),
            backward_trigger_screens: 2.0,
            forward_trigger_screens: 1.0,
            scrolled_to_bottom_threshold: 1.0,
        }
    }
}

/// Errors surfaced by the engine.
///
/// The engine has no fallible I/O of its own; both variants mean the other
/// end of a channel is gone, i.e. the data source or host has shut down.
#[derive(Debug, Error)]
pub enum TimelineViewError {
    /// The data source dropped its sender for timeline updates.
    #[error("timeline update sender disconnected")]
    UpdateChannelDisconnected,
    /// The host dropped the receiver for outbound timeline requests.
    #[error("timeline request receiver disconnected")]
    RequestChannelDisconnected,
}

impl<T> From<crossbeam_channel::SendError<T>> for TimelineViewError {
    fn from(_: crossbeam_channel::SendError<T>) -> Self {
        Self::RequestChannelDisconnected
    }
}

/// A message from the background data source to a timeline view.
pub enum TimelineUpdate {
    /// The very first collection this timeline receives.
    ///
    /// Resets pagination assumptions and positions the viewport at the
    /// newest item. Never animated and never deferred: nothing the user
    /// could be scrolling through has been rendered yet.
    FirstUpdate {
        initial_items: Vector<Arc<TimelineItem>>,
    },
    /// The collection was replaced wholesale.
    NewItems {
        new_items: Vector<Arc<TimelineItem>>,
    },
    /// The collection changed as a batch of diffs against the previous
    /// state, for data sources that publish [`VectorDiff`] streams.
    Diffs(Vec<VectorDiff<Arc<TimelineItem>>>),
    /// A pagination request in the given direction is now in flight.
    PaginationRunning(PaginationDirection),
    /// Pagination in the given direction has completed.
    PaginationIdle {
        /// `true` when the timeline end in this direction was reached,
        /// meaning no further requests in this direction are useful.
        fully_paginated: bool,
        direction: PaginationDirection,
    },
}

/// Requests and notifications emitted by the engine.
///
/// `Paginate` and `ReadReceipt` are fire-and-forget requests for the data
/// source, which owns pagination state and is expected to ignore a request
/// it is already serving. `ScrolledToBottomChanged` is a notification for
/// the host UI (e.g. a jump-to-bottom button), emitted only on actual
/// change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimelineRequest {
    Paginate {
        direction: PaginationDirection,
        num_events: u16,
    },
    ReadReceipt {
        event_id: EventId,
    },
    ScrolledToBottomChanged {
        at_bottom: bool,
    },
}

/// A scroll signal forwarded from the rendering surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollEvent {
    /// The content offset changed, for any reason.
    OffsetChanged,
    /// The user started a drag gesture.
    DragBegan,
    /// The user lifted their finger; deceleration may follow.
    DragEnded { will_decelerate: bool },
    /// A deceleration that followed a drag came to rest.
    DecelerationEnded,
    /// A programmatic (animated) scroll finished.
    ScrollAnimationEnded,
}

/// The channel endpoints connecting a data source to a [`TimelineView`].
pub struct TimelineEndpoints {
    pub update_receiver: Receiver<TimelineUpdate>,
    pub request_sender: Sender<TimelineRequest>,
}

impl TimelineEndpoints {
    /// Creates both channels, returning the engine-side endpoints along with
    /// the source-side update sender and the host-side request receiver.
    ///
    /// The channels are unbounded: senders run in async contexts and must
    /// never block, while both receivers are drained in sync contexts.
    pub fn new() -> (Self, Sender<TimelineUpdate>, Receiver<TimelineRequest>) {
        let (update_sender, update_receiver) = crossbeam_channel::unbounded();
        let (request_sender, request_receiver) = crossbeam_channel::unbounded();
        (
            Self { update_receiver, request_sender },
            update_sender,
            request_receiver,
        )
    }
}

/// The visual state saved when the hosting surface hides a timeline and
/// restored when it is shown again.
#[derive(Clone, Debug, Default)]
pub struct SavedState {
    /// The first visible content row and its viewport-relative y origin at
    /// save time. `None` means the user never scrolled away; restoring
    /// positions the view at the newest edge.
    first_visible_item: Option<(ItemId, f64)>,
}

/// The engine-internal state of one timeline.
struct TimelineUiState {
    /// The working collection, replaced wholesale on every update.
    items: TimelineItems,

    /// Whether the timeline is anchored to newest real-time content, as
    /// opposed to pinned to a historical event.
    is_live: bool,

    /// Whether a drag gesture or its deceleration is in progress.
    is_dragging_or_decelerating: bool,

    /// A collection update arrived while the user was dragging and is
    /// queued to be applied once the gesture settles. The working collection
    /// already holds the new state; only the view work is deferred.
    has_pending_update: bool,

    /// The event the view must scroll to and highlight once available.
    focused_event_id: Option<EventId>,

    /// Set while the focused event has not yet been scrolled to. Left set
    /// when the event is not in the collection yet, so the next apply-cycle
    /// retries automatically.
    focused_event_needs_display: bool,

    /// Whether the viewport was at the newest edge at the last check, used
    /// to emit `ScrolledToBottomChanged` only on actual changes.
    scrolled_to_bottom: bool,

    saved_state: SavedState,
}

/// A single timeline's view synchronization engine.
///
/// Owns the viewport handle and all mutable state. The host drives it from
/// its event loop:
///
/// * [`process_updates()`](Self::process_updates) after the data source
///   signals that updates are queued,
/// * [`handle_scroll_event()`](Self::handle_scroll_event) for every scroll
///   signal from the rendering surface,
/// * the mode setters and lifecycle hooks as the surrounding UI changes.
pub struct TimelineView<V: TimelineViewport> {
    viewport: V,
    config: TimelineViewConfig,
    state: TimelineUiState,
    rendered: RenderedSnapshot,
    pagination: PaginationCoordinator,
    read_receipts: ReadReceiptNotifier,
    update_receiver: Receiver<TimelineUpdate>,
    request_sender: Sender<TimelineRequest>,
}

impl<V: TimelineViewport> TimelineView<V> {
    pub fn new(viewport: V, endpoints: TimelineEndpoints) -> Self {
        Self::with_config(viewport, endpoints, TimelineViewConfig::default())
    }

    pub fn with_config(
        viewport: V,
        endpoints: TimelineEndpoints,
        config: TimelineViewConfig,
    ) -> Self {
        Self {
            viewport,
            pagination: PaginationCoordinator::new(&config),
            config,
            state: TimelineUiState {
                items: TimelineItems::new(),
                // A fresh timeline starts live, showing the newest content.
                is_live: true,
                is_dragging_or_decelerating: false,
                has_pending_update: false,
                focused_event_id: None,
                focused_event_needs_display: false,
                scrolled_to_bottom: true,
                saved_state: SavedState::default(),
            },
            rendered: RenderedSnapshot::new(),
            read_receipts: ReadReceiptNotifier::new(),
            update_receiver: endpoints.update_receiver,
            request_sender: endpoints.request_sender,
        }
    }

    pub fn viewport(&self) -> &V {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut V {
        &mut self.viewport
    }

    pub fn items(&self) -> &TimelineItems {
        &self.state.items
    }

    /// The collection state last applied to the view. The view layer may
    /// mark rows drawn through [`rendered_mut()`](Self::rendered_mut).
    pub fn rendered(&self) -> &RenderedSnapshot {
        &self.rendered
    }

    pub fn rendered_mut(&mut self) -> &mut RenderedSnapshot {
        &mut self.rendered
    }

    pub fn is_live(&self) -> bool {
        self.state.is_live
    }

    pub fn is_scrolled_to_bottom(&self) -> bool {
        self.state.scrolled_to_bottom
    }

    pub fn has_pending_update(&self) -> bool {
        self.state.has_pending_update
    }

    pub fn pagination_state(&self, direction: PaginationDirection) -> PaginationState {
        self.pagination.state(direction)
    }

    /// Drains all queued updates from the data source, then runs at most one
    /// apply-cycle reflecting the latest collection state. Returns the
    /// number of updates processed.
    pub fn process_updates(&mut self) -> Result<usize, TimelineViewError> {
        let mut num_updates = 0;
        let mut collection_changed = false;
        let mut is_first_update = false;
        let mut pagination_changed = false;

        loop {
            match self.update_receiver.try_recv() {
                Ok(TimelineUpdate::FirstUpdate { initial_items }) => {
                    num_updates += 1;
                    debug!(len = initial_items.len(), "received first timeline update");
                    self.state.items.set(initial_items);
                    self.pagination.reset();
                    collection_changed = true;
                    is_first_update = true;
                }
                Ok(TimelineUpdate::NewItems { new_items }) => {
                    num_updates += 1;
                    self.state.items.set(new_items);
                    collection_changed = true;
                }
                Ok(TimelineUpdate::Diffs(diffs)) => {
                    num_updates += 1;
                    self.state.items.apply_diffs(diffs);
                    collection_changed = true;
                }
                Ok(TimelineUpdate::PaginationRunning(direction)) => {
                    num_updates += 1;
                    if self.pagination.set_state(direction, PaginationState::Paginating) {
                        pagination_changed = true;
                    }
                }
                Ok(TimelineUpdate::PaginationIdle { fully_paginated, direction }) => {
                    num_updates += 1;
                    let state = if fully_paginated {
                        PaginationState::EndReached
                    } else {
                        PaginationState::Idle
                    };
                    if self.pagination.set_state(direction, state) {
                        pagination_changed = true;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return Err(TimelineViewError::UpdateChannelDisconnected);
                }
            }
        }

        if is_first_update {
            self.apply_collection(true)?;
        } else if collection_changed {
            self.collection_did_change()?;
        }

        if pagination_changed {
            // A direction finishing back to idle may find the scroll
            // position already satisfies its trigger, so re-check now
            // rather than waiting for the next scroll signal.
            let geometry = self.scroll_geometry();
            self.pagination.evaluate(
                geometry,
                self.state.has_pending_update,
                self.state.is_live,
                &self.request_sender,
            )?;
        }

        Ok(num_updates)
    }

    /// Switches between live mode (anchored to newest content) and
    /// historical mode (pinned to a fixed event).
    pub fn set_live_mode(&mut self, is_live: bool) -> Result<(), TimelineViewError> {
        if self.state.is_live == is_live {
            return Ok(());
        }
        debug!(is_live, "timeline mode switched");
        self.state.is_live = is_live;
        // Live mode never defers, so entering it flushes anything queued.
        if is_live && self.state.has_pending_update {
            self.state.has_pending_update = false;
            self.apply_collection(false)?;
        }
        Ok(())
    }

    /// Sets (or clears) the event the view should scroll to and highlight.
    ///
    /// If the event is not yet loaded, the request stays pending and is
    /// retried on each following apply-cycle; a newer request supersedes an
    /// older one.
    pub fn set_focused_event_id(
        &mut self,
        event_id: Option<EventId>,
    ) -> Result<(), TimelineViewError> {
        self.state.focused_event_needs_display = event_id.is_some();
        self.state.focused_event_id = event_id;
        if self.state.focused_event_needs_display {
            self.try_scroll_to_focused_event()?;
        }
        Ok(())
    }

    /// Handles one scroll signal from the rendering surface.
    pub fn handle_scroll_event(&mut self, event: ScrollEvent) -> Result<(), TimelineViewError> {
        match event {
            ScrollEvent::OffsetChanged => {
                let geometry = self.scroll_geometry();
                self.pagination.on_scroll(
                    geometry,
                    self.state.has_pending_update,
                    self.state.is_live,
                    &self.request_sender,
                )?;
                self.emit_scrolled_to_bottom_if_changed()?;
            }
            ScrollEvent::DragBegan => {
                self.state.is_dragging_or_decelerating = true;
            }
            ScrollEvent::DragEnded { will_decelerate } => {
                if !will_decelerate {
                    self.scroll_settled()?;
                }
            }
            ScrollEvent::DecelerationEnded | ScrollEvent::ScrollAnimationEnded => {
                self.scroll_settled()?;
            }
        }
        Ok(())
    }

    /// The hosting app returned to the foreground; re-check visibility.
    pub fn handle_app_resumed(&mut self) -> Result<(), TimelineViewError> {
        self.read_receipts
            .evaluate(&self.viewport, &self.state.items, &self.request_sender)
    }

    /// Captures the visual state before the hosting surface hides this view.
    pub fn save_state(&mut self) {
        let first_visible_item = self
            .viewport
            .visible_items()
            .into_iter()
            .find(|id| self.state.items.get_by_id(id).is_some())
            .and_then(|id| {
                let frame = self.viewport.frame_of_item(&id)?;
                Some((id, frame.origin_y))
            });
        self.state.saved_state = SavedState { first_visible_item };
    }

    /// Restores the state captured by [`save_state()`](Self::save_state).
    ///
    /// With no saved position (or a saved item that has since disappeared),
    /// the view is positioned at the newest edge instead.
    pub fn restore_state(&mut self) -> Result<(), TimelineViewError> {
        match self.state.saved_state.first_visible_item.take() {
            Some((item_id, origin_y)) if self.state.items.get_by_id(&item_id).is_some() => {
                self.viewport.scroll_to_item(&item_id, ScrollAlignment::Leading, false);
                if origin_y != 0.0 {
                    self.viewport.adjust_offset(-origin_y);
                }
            }
            _ => {
                self.viewport.scroll_to_newest(false);
            }
        }
        self.emit_scrolled_to_bottom_if_changed()?;
        self.read_receipts
            .evaluate(&self.viewport, &self.state.items, &self.request_sender)
    }

    /// A collection update arrived: defer it if it would disturb an active
    /// scroll gesture, otherwise run one apply-cycle now.
    fn collection_did_change(&mut self) -> Result<(), TimelineViewError> {
        if !self.state.is_live && self.state.is_dragging_or_decelerating {
            debug!("deferring timeline update until the scroll gesture settles");
            self.state.has_pending_update = true;
            return Ok(());
        }
        self.apply_collection(false)
    }

    /// One apply-cycle: diff against the rendered snapshot, capture the
    /// anchor if needed, apply, reposition, and re-check visibility.
    fn apply_collection(&mut self, jump_to_newest: bool) -> Result<(), TimelineViewError> {
        let next_order = self.state.items.display_order();
        let diff = SnapshotDiff::between(self.rendered.main_order(), &next_order);
        if diff.identical && !jump_to_newest {
            trace!("collection order unchanged, skipping apply");
            return Ok(());
        }

        // Animation is reserved for the common "new message arrives while
        // already at the bottom" case. Historical loads never animate, and
        // neither do transitions through an empty collection.
        let animated = self.state.is_live && diff.top_item_changed;

        let anchor: Option<ScrollAnchor> = if !self.state.is_live && diff.top_item_changed {
            anchor::capture(&self.viewport, &self.state.items)
        } else {
            None
        };

        let restructured =
            diff.top_item_changed || next_order.len() < self.rendered.main_order().len();
        self.rendered.set_main_order(next_order, restructured);
        self.viewport.apply_snapshot(&self.rendered, animated);

        if jump_to_newest || (self.state.is_live && diff.top_item_changed) {
            self.viewport.scroll_to_newest(animated);
        }

        if self.state.focused_event_needs_display {
            // The focus request takes priority; anchor restoration is
            // skipped for this cycle even if the event is not yet loaded.
            self.try_scroll_to_focused_event()?;
        } else if let Some(anchor) = &anchor {
            anchor::restore(&mut self.viewport, &self.state.items, anchor);
        }

        self.read_receipts
            .evaluate(&self.viewport, &self.state.items, &self.request_sender)?;

        // An emptied timeline is a signal to fetch more, not an error.
        if self.state.items.is_empty() {
            debug!("timeline is empty, requesting backwards pagination");
            self.request_sender.send(TimelineRequest::Paginate {
                direction: PaginationDirection::Backwards,
                num_events: self.config.pagination_batch_size,
            })?;
        }

        self.emit_scrolled_to_bottom_if_changed()?;
        Ok(())
    }

    /// Linear scan for the focused event; on success scrolls it to the
    /// viewport center and clears the needs-display flag, on a miss leaves
    /// the flag set so a later apply-cycle retries.
    fn try_scroll_to_focused_event(&mut self) -> Result<(), TimelineViewError> {
        let Some(event_id) = self.state.focused_event_id.clone() else {
            self.state.focused_event_needs_display = false;
            return Ok(());
        };
        let found = self
            .state
            .items
            .find_by_event_id(&event_id)
            .map(|(_, item)| item.id().clone());
        match found {
            Some(item_id) => {
                debug!(event = %event_id, item = %item_id, "scrolling to focused event");
                self.viewport.scroll_to_item(&item_id, ScrollAlignment::Center, true);
                self.state.focused_event_needs_display = false;
                // The view jumped somewhere else entirely, so the next
                // settle should report a fresh read-receipt candidate.
                self.read_receipts.reset();
                self.emit_scrolled_to_bottom_if_changed()?;
            }
            None => {
                trace!(event = %event_id, "focused event not yet loaded, will retry");
            }
        }
        Ok(())
    }

    /// The scroll came to rest: flush a deferred update, or failing that,
    /// re-check read-receipt visibility.
    fn scroll_settled(&mut self) -> Result<(), TimelineViewError> {
        self.state.is_dragging_or_decelerating = false;
        if self.state.has_pending_update {
            self.state.has_pending_update = false;
            debug!("applying deferred timeline update after scroll settled");
            self.apply_collection(false)?;
        } else {
            self.read_receipts
                .evaluate(&self.viewport, &self.state.items, &self.request_sender)?;
        }
        self.emit_scrolled_to_bottom_if_changed()
    }

    fn scroll_geometry(&self) -> ScrollGeometry {
        ScrollGeometry {
            content_offset: self.viewport.content_offset(),
            content_height: self.viewport.content_height(),
            viewport_height: self.viewport.viewport_height(),
        }
    }

    fn emit_scrolled_to_bottom_if_changed(&mut self) -> Result<(), TimelineViewError> {
        let at_bottom =
            self.viewport.content_offset() <= self.config.scrolled_to_bottom_threshold;
        if at_bottom != self.state.scrolled_to_bottom {
            self.state.scrolled_to_bottom = at_bottom;
            self.request_sender
                .send(TimelineRequest::ScrolledToBottomChanged { at_bottom })?;
        }
        Ok(())
    }
}
