//! Scroll-driven pagination gating and throttling.
//!
//! The coordinator observes scroll geometry and the externally-owned
//! pagination state, and decides when to ask the data source for more items
//! in either direction. It only ever emits fire-and-forget requests: the
//! data source owns the actual pagination state and is responsible for
//! ignoring a request it is already serving.

use std::fmt;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use tracing::debug;

use crate::timeline_view::{TimelineRequest, TimelineViewConfig, TimelineViewError};

/// The direction of a pagination request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaginationDirection {
    /// Loading older content, toward the start of the timeline.
    Backwards,
    /// Loading newer content, toward the present. Only relevant while the
    /// timeline is pinned to a historical position.
    Forwards,
}

impl fmt::Display for PaginationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backwards => f.write_str("backwards"),
            Self::Forwards => f.write_str("forwards"),
        }
    }
}

/// The state of one pagination direction, owned by the external data source
/// and mirrored here from its update notifications.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PaginationState {
    #[default]
    Idle,
    /// A request in this direction is in flight.
    Paginating,
    /// The timeline end in this direction has been reached; no further
    /// requests in this direction will ever be eligible.
    EndReached,
}

/// Viewport geometry sampled at evaluation time.
#[derive(Clone, Copy, Debug)]
pub struct ScrollGeometry {
    pub content_offset: f64,
    pub content_height: f64,
    pub viewport_height: f64,
}

/// Gates and throttles bidirectional pagination requests.
///
/// Scroll-driven checks are coalesced over a fixed window so that a single
/// continuous gesture, or two nearly-simultaneous update/scroll events,
/// produce one evaluation rather than ten. A pagination-state change
/// bypasses the window and re-evaluates immediately: a direction returning
/// to idle may find the scroll position already satisfies its trigger, and
/// waiting out a debounce would only add latency.
pub struct PaginationCoordinator {
    backward_state: PaginationState,
    forward_state: PaginationState,
    last_scroll_evaluation: Option<Instant>,
    coalesce_window: Duration,
    batch_size: u16,
    backward_trigger_screens: f64,
    forward_trigger_screens: f64,
}

impl PaginationCoordinator {
    pub fn new(config: &TimelineViewConfig) -> Self {
        Self {
            backward_state: PaginationState::Idle,
            forward_state: PaginationState::Idle,
            last_scroll_evaluation: None,
            coalesce_window: config.scroll_coalesce_window,
            batch_size: config.pagination_batch_size,
            backward_trigger_screens: config.backward_trigger_screens,
            forward_trigger_screens: config.forward_trigger_screens,
        }
    }

    pub fn state(&self, direction: PaginationDirection) -> PaginationState {
        match direction {
            PaginationDirection::Backwards => self.backward_state,
            PaginationDirection::Forwards => self.forward_state,
        }
    }

    /// Records an externally-reported state change. Returns `true` if the
    /// mirrored state actually changed, in which case the caller should
    /// re-evaluate eligibility.
    pub fn set_state(&mut self, direction: PaginationDirection, state: PaginationState) -> bool {
        let slot = match direction {
            PaginationDirection::Backwards => &mut self.backward_state,
            PaginationDirection::Forwards => &mut self.forward_state,
        };
        if *slot == state {
            return false;
        }
        debug!(%direction, ?state, "pagination state changed");
        *slot = state;
        true
    }

    /// Resets both mirrored directions to idle, e.g. when a timeline is
    /// rebuilt from scratch and earlier end-reached knowledge is stale.
    pub fn reset(&mut self) {
        self.backward_state = PaginationState::Idle;
        self.forward_state = PaginationState::Idle;
    }

    /// Handles a (possibly rapid-fire) scroll signal.
    ///
    /// Checks are suppressed entirely while an update is deferred behind an
    /// active drag, to avoid racing the imminent re-layout.
    pub fn on_scroll(
        &mut self,
        geometry: ScrollGeometry,
        suppressed: bool,
        is_live: bool,
        requests: &Sender<TimelineRequest>,
    ) -> Result<(), TimelineViewError> {
        if suppressed {
            return Ok(());
        }
        if let Some(last) = self.last_scroll_evaluation
            && last.elapsed() < self.coalesce_window
        {
            return Ok(());
        }
        self.last_scroll_evaluation = Some(Instant::now());
        self.evaluate(geometry, false, is_live, requests)
    }

    /// Evaluates both directions immediately, emitting at most one request
    /// per eligible direction.
    ///
    /// Backward pagination triggers while the viewport is still within two
    /// screen-heights of the historical end, to hide network latency behind
    /// the remaining scroll distance. Forward pagination triggers near the
    /// newest end, and only while not live (live timelines receive new
    /// content as pushes, not pulls).
    pub fn evaluate(
        &mut self,
        geometry: ScrollGeometry,
        suppressed: bool,
        is_live: bool,
        requests: &Sender<TimelineRequest>,
    ) -> Result<(), TimelineViewError> {
        if suppressed {
            return Ok(());
        }

        let backward_threshold =
            geometry.content_height - geometry.viewport_height * self.backward_trigger_screens;
        if self.backward_state == PaginationState::Idle
            && geometry.content_offset > backward_threshold
        {
            debug!(
                offset = geometry.content_offset,
                threshold = backward_threshold,
                "requesting backwards pagination"
            );
            requests.send(TimelineRequest::Paginate {
                direction: PaginationDirection::Backwards,
                num_events: self.batch_size,
            })?;
        }

        if !is_live
            && self.forward_state == PaginationState::Idle
            && geometry.content_offset < geometry.viewport_height * self.forward_trigger_screens
        {
            debug!(offset = geometry.content_offset, "requesting forwards pagination");
            requests.send(TimelineRequest::Paginate {
                direction: PaginationDirection::Forwards,
                num_events: self.batch_size,
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossbeam_channel::{Receiver, unbounded};

    use super::*;

    fn coordinator(window: Duration) -> PaginationCoordinator {
        let config = TimelineViewConfig {
            scroll_coalesce_window: window,
            ..TimelineViewConfig::default()
        };
        PaginationCoordinator::new(&config)
    }

    fn near_historical_end() -> ScrollGeometry {
        // Content 1000, viewport 200: backward triggers above offset 600.
        ScrollGeometry {
            content_offset: 700.0,
            content_height: 1000.0,
            viewport_height: 200.0,
        }
    }

    fn mid_timeline() -> ScrollGeometry {
        ScrollGeometry {
            content_offset: 400.0,
            content_height: 1000.0,
            viewport_height: 200.0,
        }
    }

    fn drain(receiver: &Receiver<TimelineRequest>) -> Vec<TimelineRequest> {
        receiver.try_iter().collect()
    }

    #[test]
    fn rapid_scroll_events_coalesce_to_one_request() {
        let (sender, receiver) = unbounded();
        let mut coordinator = coordinator(Duration::from_millis(100));

        for _ in 0..10 {
            coordinator
                .on_scroll(near_historical_end(), false, true, &sender)
                .unwrap();
        }

        assert_eq!(
            drain(&receiver),
            vec![TimelineRequest::Paginate {
                direction: PaginationDirection::Backwards,
                num_events: 50,
            }],
        );
    }

    #[test]
    fn no_request_while_already_paginating() {
        let (sender, receiver) = unbounded();
        let mut coordinator = coordinator(Duration::ZERO);
        coordinator.set_state(PaginationDirection::Backwards, PaginationState::Paginating);

        coordinator
            .on_scroll(near_historical_end(), false, true, &sender)
            .unwrap();
        assert!(drain(&receiver).is_empty());
    }

    #[test]
    fn no_request_after_end_reached() {
        let (sender, receiver) = unbounded();
        let mut coordinator = coordinator(Duration::ZERO);
        coordinator.set_state(PaginationDirection::Backwards, PaginationState::EndReached);

        coordinator
            .on_scroll(near_historical_end(), false, true, &sender)
            .unwrap();
        assert!(drain(&receiver).is_empty());
    }

    #[test]
    fn forward_pagination_only_when_not_live() {
        let near_newest_end = ScrollGeometry {
            content_offset: 50.0,
            content_height: 1000.0,
            viewport_height: 200.0,
        };

        let (sender, receiver) = unbounded();
        let mut coordinator = coordinator(Duration::ZERO);
        coordinator.on_scroll(near_newest_end, false, true, &sender).unwrap();
        assert!(drain(&receiver).is_empty());

        coordinator.on_scroll(near_newest_end, false, false, &sender).unwrap();
        assert_eq!(
            drain(&receiver),
            vec![TimelineRequest::Paginate {
                direction: PaginationDirection::Forwards,
                num_events: 50,
            }],
        );
    }

    #[test]
    fn checks_suppressed_while_update_deferred() {
        let (sender, receiver) = unbounded();
        let mut coordinator = coordinator(Duration::ZERO);

        coordinator
            .on_scroll(near_historical_end(), true, true, &sender)
            .unwrap();
        assert!(drain(&receiver).is_empty());
    }

    #[test]
    fn state_change_reevaluation_is_not_throttled() {
        let (sender, receiver) = unbounded();
        let mut coordinator = coordinator(Duration::from_millis(100));

        // The scroll check consumed the window without finding an eligible
        // direction.
        coordinator.on_scroll(mid_timeline(), false, true, &sender).unwrap();
        assert!(drain(&receiver).is_empty());

        // A direction finishing back to idle re-checks immediately.
        assert!(coordinator.set_state(PaginationDirection::Backwards, PaginationState::Paginating));
        assert!(coordinator.set_state(PaginationDirection::Backwards, PaginationState::Idle));
        coordinator
            .evaluate(near_historical_end(), false, true, &sender)
            .unwrap();
        assert_eq!(drain(&receiver).len(), 1);
    }

    #[test]
    fn set_state_reports_actual_changes_only() {
        let mut coordinator = coordinator(Duration::ZERO);
        assert!(!coordinator.set_state(PaginationDirection::Forwards, PaginationState::Idle));
        assert!(coordinator.set_state(PaginationDirection::Forwards, PaginationState::Paginating));
        assert!(!coordinator.set_state(PaginationDirection::Forwards, PaginationState::Paginating));
    }
}
