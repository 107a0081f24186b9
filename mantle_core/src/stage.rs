// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pipeline stage ordering and request coalescing.
//!
//! Producer-side requests (`animate`, `update layers`, `commit`) are expressed
//! as a target [`PipelineStage`]. The [`StageTracker`] keeps three values:
//!
//! - **current**: the stage a running frame attempt has reached. It only
//!   moves forward within an attempt and is reset to [`PipelineStage::None`]
//!   between attempts.
//! - **max requested**: the highest stage requested since the last attempt
//!   latched its work. Non-decreasing until latched.
//! - **final**: latched from max requested when an attempt starts, and only
//!   raised afterwards by requests that the running attempt can still honor.
//!
//! A request made while an attempt is running, for a stage the attempt has
//! not reached yet, is folded into that attempt. Any other request raises
//! max requested, and only the first such request since the last latch asks
//! for a new begin-frame.

/// One stage of the producer-side pipeline, in execution order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineStage {
    /// No stage: idle, or nothing requested.
    #[default]
    None,
    /// Run animations and apply consumer-side scroll/scale deltas.
    Animate,
    /// Run layout and update layer contents.
    UpdateLayers,
    /// Hand the scene snapshot to the consumer.
    Commit,
}

impl PipelineStage {
    /// Returns a short lowercase label, used by diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Animate => "animate",
            Self::UpdateLayers => "update_layers",
            Self::Commit => "commit",
        }
    }
}

/// What the caller must do after [`StageTracker::request`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageRequest {
    /// The running attempt will reach the requested stage; nothing to schedule.
    HonoredInCurrentFrame,
    /// First request of a new batch: ask the scheduler for a begin-frame.
    ScheduleBeginFrame,
    /// A begin-frame is already pending and will cover this request.
    AlreadyPending,
}

/// Snapshot of all three tracked stages, for queries and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageSnapshot {
    /// Stage reached by the running attempt.
    pub current: PipelineStage,
    /// Highest stage requested since the last latch.
    pub max_requested: PipelineStage,
    /// Stage the running (or last) attempt is going to.
    pub final_stage: PipelineStage,
}

/// Request coalescing and forward-only stage progression.
#[derive(Clone, Copy, Debug, Default)]
pub struct StageTracker {
    current: PipelineStage,
    max_requested: PipelineStage,
    final_stage: PipelineStage,
}

impl StageTracker {
    /// Creates an idle tracker.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: PipelineStage::None,
            max_requested: PipelineStage::None,
            final_stage: PipelineStage::None,
        }
    }

    /// Records a request for `stage`.
    ///
    /// Requesting [`PipelineStage::None`] is a no-op.
    pub fn request(&mut self, stage: PipelineStage) -> StageRequest {
        if stage == PipelineStage::None {
            return StageRequest::AlreadyPending;
        }
        if self.current != PipelineStage::None && self.current < stage {
            self.final_stage = self.final_stage.max(stage);
            return StageRequest::HonoredInCurrentFrame;
        }
        let already_pending = self.max_requested != PipelineStage::None;
        self.max_requested = self.max_requested.max(stage);
        if already_pending {
            StageRequest::AlreadyPending
        } else {
            StageRequest::ScheduleBeginFrame
        }
    }

    /// Latches the final stage for a new attempt and clears max requested.
    ///
    /// Returns the latched final stage.
    pub fn begin_attempt(&mut self) -> PipelineStage {
        debug_assert_eq!(
            self.current,
            PipelineStage::None,
            "a frame attempt is already running"
        );
        self.final_stage = self.max_requested;
        self.max_requested = PipelineStage::None;
        self.final_stage
    }

    /// Moves the running attempt to `stage`.
    ///
    /// # Panics
    ///
    /// Panics if `stage` is behind the current stage.
    pub fn advance(&mut self, stage: PipelineStage) {
        assert!(
            stage >= self.current,
            "pipeline stage moved backwards: {:?} -> {:?}",
            self.current,
            stage
        );
        self.current = stage;
    }

    /// Ends the running attempt.
    pub fn finish(&mut self) {
        self.current = PipelineStage::None;
    }

    /// Re-raises max requested after an abort that must replay its request.
    pub fn restore_request(&mut self, stage: PipelineStage) {
        self.max_requested = self.max_requested.max(stage);
    }

    /// Stage reached by the running attempt.
    #[must_use]
    pub const fn current(&self) -> PipelineStage {
        self.current
    }

    /// Highest stage requested since the last latch.
    #[must_use]
    pub const fn max_requested(&self) -> PipelineStage {
        self.max_requested
    }

    /// Stage the running attempt will go to.
    #[must_use]
    pub const fn final_stage(&self) -> PipelineStage {
        self.final_stage
    }

    /// Whether a frame attempt is running.
    #[must_use]
    pub fn in_attempt(&self) -> bool {
        self.current != PipelineStage::None
    }

    /// Whether any request is waiting for an attempt to latch it.
    #[must_use]
    pub fn has_pending_request(&self) -> bool {
        self.max_requested != PipelineStage::None
    }

    /// Returns all three stages at once.
    #[must_use]
    pub const fn snapshot(&self) -> StageSnapshot {
        StageSnapshot {
            current: self.current,
            max_requested: self.max_requested,
            final_stage: self.final_stage,
        }
    }
}

/// Request handle lent to the scene host while an attempt is running.
///
/// Requests made through it are folded into the running attempt when the
/// attempt has not yet reached the requested stage. Whether a new begin-frame
/// has to be scheduled afterwards is reported by
/// [`needs_begin_frame`](Self::needs_begin_frame).
#[derive(Debug)]
pub struct StageRequests<'a> {
    tracker: &'a mut StageTracker,
    needs_begin_frame: bool,
}

impl<'a> StageRequests<'a> {
    /// Wraps a tracker for the duration of one collaborator call.
    pub fn new(tracker: &'a mut StageTracker) -> Self {
        Self {
            tracker,
            needs_begin_frame: false,
        }
    }

    /// Requests another animation step.
    pub fn request_animate(&mut self) {
        self.request(PipelineStage::Animate);
    }

    /// Requests a layer update.
    pub fn request_update_layers(&mut self) {
        self.request(PipelineStage::UpdateLayers);
    }

    /// Requests a commit.
    pub fn request_commit(&mut self) {
        self.request(PipelineStage::Commit);
    }

    fn request(&mut self, stage: PipelineStage) {
        if self.tracker.request(stage) == StageRequest::ScheduleBeginFrame {
            self.needs_begin_frame = true;
        }
    }

    /// Whether any request could not be honored by the running attempt.
    #[must_use]
    pub fn needs_begin_frame(&self) -> bool {
        self.needs_begin_frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_during_update_fold_into_running_attempt() {
        let mut tracker = StageTracker::new();
        tracker.request(PipelineStage::UpdateLayers);
        tracker.begin_attempt();
        tracker.advance(PipelineStage::Animate);
        tracker.advance(PipelineStage::UpdateLayers);

        let mut requests = StageRequests::new(&mut tracker);
        requests.request_commit();
        requests.request_animate();
        assert!(
            requests.needs_begin_frame(),
            "animate was already passed and needs a new attempt"
        );
        assert_eq!(tracker.final_stage(), PipelineStage::Commit);
        assert_eq!(tracker.max_requested(), PipelineStage::Animate);
    }

    #[test]
    fn stages_are_ordered() {
        assert!(PipelineStage::None < PipelineStage::Animate);
        assert!(PipelineStage::Animate < PipelineStage::UpdateLayers);
        assert!(PipelineStage::UpdateLayers < PipelineStage::Commit);
    }

    #[test]
    fn coalesced_requests_schedule_once_and_latch_the_maximum() {
        let orders: [&[PipelineStage]; 3] = [
            &[
                PipelineStage::Animate,
                PipelineStage::Commit,
                PipelineStage::UpdateLayers,
            ],
            &[PipelineStage::UpdateLayers, PipelineStage::Animate],
            &[PipelineStage::Commit, PipelineStage::Commit],
        ];
        for order in orders {
            let mut tracker = StageTracker::new();
            let mut scheduled = 0;
            for &stage in order {
                if tracker.request(stage) == StageRequest::ScheduleBeginFrame {
                    scheduled += 1;
                }
            }
            let expected = order.iter().copied().max().unwrap();
            assert_eq!(scheduled, 1, "exactly one begin-frame for {order:?}");
            assert_eq!(tracker.begin_attempt(), expected);
            assert_eq!(tracker.max_requested(), PipelineStage::None);
        }
    }

    #[test]
    fn request_during_attempt_before_reaching_stage_is_folded_in() {
        let mut tracker = StageTracker::new();
        tracker.request(PipelineStage::Animate);
        assert_eq!(tracker.begin_attempt(), PipelineStage::Animate);
        tracker.advance(PipelineStage::Animate);

        assert_eq!(
            tracker.request(PipelineStage::Commit),
            StageRequest::HonoredInCurrentFrame
        );
        assert_eq!(tracker.final_stage(), PipelineStage::Commit);
        assert!(!tracker.has_pending_request());
    }

    #[test]
    fn request_after_reaching_stage_schedules_a_new_attempt() {
        let mut tracker = StageTracker::new();
        tracker.request(PipelineStage::Commit);
        tracker.begin_attempt();
        tracker.advance(PipelineStage::Animate);
        tracker.advance(PipelineStage::UpdateLayers);
        tracker.advance(PipelineStage::Commit);

        assert_eq!(
            tracker.request(PipelineStage::UpdateLayers),
            StageRequest::ScheduleBeginFrame
        );
        assert_eq!(tracker.max_requested(), PipelineStage::UpdateLayers);
        assert_eq!(
            tracker.request(PipelineStage::Commit),
            StageRequest::AlreadyPending
        );
    }

    #[test]
    fn animate_request_during_animate_goes_to_next_attempt() {
        let mut tracker = StageTracker::new();
        tracker.request(PipelineStage::Animate);
        tracker.begin_attempt();
        tracker.advance(PipelineStage::Animate);
        assert_eq!(
            tracker.request(PipelineStage::Animate),
            StageRequest::ScheduleBeginFrame
        );
    }

    #[test]
    #[should_panic(expected = "pipeline stage moved backwards")]
    fn advancing_backwards_panics() {
        let mut tracker = StageTracker::new();
        tracker.advance(PipelineStage::UpdateLayers);
        tracker.advance(PipelineStage::Animate);
    }

    #[test]
    fn restore_request_keeps_the_higher_stage() {
        let mut tracker = StageTracker::new();
        tracker.request(PipelineStage::Commit);
        let latched = tracker.begin_attempt();
        tracker.request(PipelineStage::Animate);
        tracker.restore_request(latched);
        assert_eq!(tracker.max_requested(), PipelineStage::Commit);
    }
}
