// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame scheduling: when each pipeline action runs.
//!
//! The [`FrameScheduler`] trait is the contract a proxy drives. The proxy
//! reports what happened (`set_needs_*`, `notify_*`, `did_*`) and then drains
//! [`FrameScheduler::next_action`] until it returns `None`, executing each
//! [`SchedulerAction`] as it goes. Selecting an action also records it, so the
//! proxy never has to call back in to say "I did what you asked" except where
//! the outcome is not known up front (`did_commit`, `did_draw`, aborts).
//!
//! [`Scheduler`] is a deterministic reference implementation. Embedders with
//! their own timing model implement the trait instead.
//!
//! # Usage
//!
//! ```rust,ignore
//! scheduler.begin_impl_frame(args);
//! while let Some(action) = scheduler.next_action() {
//!     proxy.run(action);
//! }
//! scheduler.on_begin_impl_frame_deadline();
//! while let Some(action) = scheduler.next_action() {
//!     proxy.run(action);
//! }
//! ```

use crate::abort::CommitEarlyOutReason;
use crate::host::DrawResult;
use crate::timing::BeginFrameArgs;

/// One action the scheduler asks the proxy to perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SchedulerAction {
    /// Start a begin-main-frame attempt on the producer.
    SendBeginMainFrame(BeginFrameArgs),
    /// Tick consumer-side animations.
    Animate(BeginFrameArgs),
    /// Adopt the producer's snapshot into the pending tree.
    Commit,
    /// Make the pending tree active.
    ActivateSyncTree,
    /// Draw and swap, unless the tree declines.
    DrawAndSwapIfPossible,
    /// Draw and swap even if the tree declines.
    DrawAndSwapForced,
    /// Schedule tile work.
    PrepareTiles,
    /// Ask the embedder for a new output surface.
    BeginOutputSurfaceCreation,
}

impl SchedulerAction {
    /// Short label for diagnostics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SendBeginMainFrame(_) => "send_begin_main_frame",
            Self::Animate(_) => "animate",
            Self::Commit => "commit",
            Self::ActivateSyncTree => "activate_sync_tree",
            Self::DrawAndSwapIfPossible => "draw_and_swap_if_possible",
            Self::DrawAndSwapForced => "draw_and_swap_forced",
            Self::PrepareTiles => "prepare_tiles",
            Self::BeginOutputSurfaceCreation => "begin_output_surface_creation",
        }
    }
}

/// Decides when pipeline actions run.
///
/// Implementations are authoritative for timing only. They never decide
/// whether an in-flight commit may be cancelled.
pub trait FrameScheduler {
    /// Output visibility changed.
    fn set_visible(&mut self, visible: bool);
    /// Whether the consumer has everything it needs to draw.
    fn set_can_draw(&mut self, can_draw: bool);
    /// The producer wants a begin-main-frame.
    fn set_needs_begin_main_frame(&mut self);
    /// The active tree must be drawn again.
    fn set_needs_redraw(&mut self);
    /// Consumer-side animations need another tick.
    fn set_needs_animate(&mut self);
    /// Tile work needs to be scheduled.
    fn set_needs_prepare_tiles(&mut self);
    /// The pending tree can be activated.
    fn notify_ready_to_activate(&mut self);
    /// The active tree can be drawn.
    fn notify_ready_to_draw(&mut self);
    /// The producer started running a begin-main-frame.
    fn notify_begin_main_frame_started(&mut self);
    /// The producer has a snapshot ready to commit.
    fn notify_ready_to_commit(&mut self);
    /// The consumer finished adopting a snapshot.
    fn did_commit(&mut self);
    /// The producer stopped an attempt early.
    fn begin_main_frame_aborted(&mut self, reason: CommitEarlyOutReason);
    /// The output surface is gone.
    fn did_lose_output_surface(&mut self);
    /// A new output surface is ready.
    fn did_create_and_initialize_output_surface(&mut self);
    /// Result of the last draw action.
    fn did_draw(&mut self, result: DrawResult);
    /// A new frame interval started.
    fn begin_impl_frame(&mut self, args: BeginFrameArgs);
    /// The current frame's deadline was reached.
    fn on_begin_impl_frame_deadline(&mut self);
    /// Whether the deadline can run now instead of waiting for the args
    /// deadline.
    fn deadline_ready(&self) -> bool;
    /// Whether the embedder should keep delivering begin-frames.
    fn needs_begin_frames(&self) -> bool;
    /// Selects and records the next action, if any.
    fn next_action(&mut self) -> Option<SchedulerAction>;
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the [`Scheduler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Failed draws in a row before the next draw is forced.
    pub max_consecutive_draw_failures: u32,
    /// Hold draws after activation until `notify_ready_to_draw`.
    pub wait_for_ready_to_draw: bool,
    /// Allow a begin-main-frame while a pending tree waits for activation.
    /// The commit itself still waits.
    pub main_frame_before_activation: bool,
}

impl SchedulerConfig {
    /// Default configuration: activation gates the next main frame.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            max_consecutive_draw_failures: 3,
            wait_for_ready_to_draw: false,
            main_frame_before_activation: false,
        }
    }

    /// Overlaps producer work with activation and waits for tiles before
    /// drawing.
    #[must_use]
    pub const fn throughput() -> Self {
        Self {
            max_consecutive_draw_failures: 3,
            wait_for_ready_to_draw: true,
            main_frame_before_activation: true,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::standard()
    }
}

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// Output surface lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputSurfaceState {
    /// No surface has been requested.
    None,
    /// Creation was requested from the embedder.
    Creating,
    /// A surface exists but nothing was committed to it.
    WaitingForFirstCommit,
    /// A commit happened but its tree is not active yet.
    WaitingForFirstActivation,
    /// Drawing is possible.
    Active,
    /// The surface was lost.
    Lost,
}

impl OutputSurfaceState {
    const fn accepts_main_frames(self) -> bool {
        matches!(
            self,
            Self::WaitingForFirstCommit | Self::WaitingForFirstActivation | Self::Active
        )
    }
}

/// Where the current begin-main-frame attempt is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BeginMainFrameState {
    /// No attempt in flight.
    Idle,
    /// Sent, producer has not started.
    Sent,
    /// Producer is running the attempt.
    Started,
    /// Producer has a snapshot waiting.
    ReadyToCommit,
    /// The commit action was issued and `did_commit` has not arrived.
    Committing,
}

/// Where the scheduler is within the current frame interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImplFramePhase {
    /// Between frames.
    Idle,
    /// After `begin_impl_frame`, before the deadline.
    InsideBeginFrame,
    /// After the deadline fired.
    InsideDeadline,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Reference [`FrameScheduler`].
///
/// # Priority
///
/// When several actions are possible, `next_action` picks the first of:
/// output surface creation, activation, commit, animate, draw, prepare tiles,
/// send begin-main-frame. Activation before commit keeps at most one pending
/// tree. Draw runs only inside the deadline, the begin-main-frame only inside
/// the begin-frame half of the interval.
///
/// # Draw failures
///
/// Draws that abort for checkerboarding or missing content count as
/// failures. After [`SchedulerConfig::max_consecutive_draw_failures`] in a
/// row the next draw is [`SchedulerAction::DrawAndSwapForced`].
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    visible: bool,
    can_draw: bool,
    output_surface: OutputSurfaceState,
    begin_main_frame: BeginMainFrameState,
    phase: ImplFramePhase,
    args: Option<BeginFrameArgs>,

    needs_begin_main_frame: bool,
    needs_redraw: bool,
    needs_animate: bool,
    needs_prepare_tiles: bool,

    has_pending_tree: bool,
    pending_tree_ready: bool,
    active_tree_ready_to_draw: bool,

    sent_begin_main_frame_this_frame: bool,
    animated_this_frame: bool,
    drew_this_frame: bool,
    prepared_tiles_this_frame: bool,

    consecutive_draw_failures: u32,
}

impl Scheduler {
    /// Creates an invisible scheduler with no output surface.
    #[must_use]
    pub const fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            visible: false,
            can_draw: true,
            output_surface: OutputSurfaceState::None,
            begin_main_frame: BeginMainFrameState::Idle,
            phase: ImplFramePhase::Idle,
            args: None,
            needs_begin_main_frame: false,
            needs_redraw: false,
            needs_animate: false,
            needs_prepare_tiles: false,
            has_pending_tree: false,
            pending_tree_ready: false,
            active_tree_ready_to_draw: true,
            sent_begin_main_frame_this_frame: false,
            animated_this_frame: false,
            drew_this_frame: false,
            prepared_tiles_this_frame: false,
            consecutive_draw_failures: 0,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Output surface lifecycle state.
    #[must_use]
    pub const fn output_surface_state(&self) -> OutputSurfaceState {
        self.output_surface
    }

    /// Begin-main-frame state.
    #[must_use]
    pub const fn begin_main_frame_state(&self) -> BeginMainFrameState {
        self.begin_main_frame
    }

    /// Position within the frame interval.
    #[must_use]
    pub const fn impl_frame_phase(&self) -> ImplFramePhase {
        self.phase
    }

    /// Whether a committed tree waits for activation.
    #[must_use]
    pub const fn has_pending_tree(&self) -> bool {
        self.has_pending_tree
    }

    /// Whether a redraw is outstanding.
    #[must_use]
    pub const fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    /// Whether a begin-main-frame is wanted but not sent.
    #[must_use]
    pub const fn needs_begin_main_frame(&self) -> bool {
        self.needs_begin_main_frame
    }

    /// Failed draws since the last success or forced draw.
    #[must_use]
    pub const fn consecutive_draw_failures(&self) -> u32 {
        self.consecutive_draw_failures
    }

    fn should_begin_output_surface_creation(&self) -> bool {
        self.visible
            && matches!(
                self.output_surface,
                OutputSurfaceState::None | OutputSurfaceState::Lost
            )
            && self.begin_main_frame == BeginMainFrameState::Idle
    }

    fn should_activate(&self) -> bool {
        self.has_pending_tree && self.pending_tree_ready
    }

    fn should_commit(&self) -> bool {
        self.begin_main_frame == BeginMainFrameState::ReadyToCommit && !self.has_pending_tree
    }

    fn should_animate(&self) -> bool {
        self.visible
            && self.needs_animate
            && !self.animated_this_frame
            && self.phase == ImplFramePhase::InsideBeginFrame
    }

    fn should_draw(&self) -> bool {
        self.phase == ImplFramePhase::InsideDeadline
            && self.needs_redraw
            && !self.drew_this_frame
            && self.visible
            && self.can_draw
            && self.output_surface == OutputSurfaceState::Active
            && (self.active_tree_ready_to_draw || self.must_force_draw())
    }

    fn must_force_draw(&self) -> bool {
        self.consecutive_draw_failures >= self.config.max_consecutive_draw_failures
    }

    fn should_prepare_tiles(&self) -> bool {
        self.needs_prepare_tiles
            && !self.prepared_tiles_this_frame
            && self.phase == ImplFramePhase::InsideDeadline
    }

    fn should_send_begin_main_frame(&self) -> bool {
        self.needs_begin_main_frame
            && self.visible
            && self.begin_main_frame == BeginMainFrameState::Idle
            && self.output_surface.accepts_main_frames()
            && self.phase == ImplFramePhase::InsideBeginFrame
            && !self.sent_begin_main_frame_this_frame
            && (!self.has_pending_tree || self.config.main_frame_before_activation)
    }
}

impl FrameScheduler for Scheduler {
    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn set_can_draw(&mut self, can_draw: bool) {
        self.can_draw = can_draw;
    }

    fn set_needs_begin_main_frame(&mut self) {
        self.needs_begin_main_frame = true;
    }

    fn set_needs_redraw(&mut self) {
        self.needs_redraw = true;
    }

    fn set_needs_animate(&mut self) {
        self.needs_animate = true;
    }

    fn set_needs_prepare_tiles(&mut self) {
        self.needs_prepare_tiles = true;
    }

    fn notify_ready_to_activate(&mut self) {
        if self.has_pending_tree {
            self.pending_tree_ready = true;
        }
    }

    fn notify_ready_to_draw(&mut self) {
        self.active_tree_ready_to_draw = true;
    }

    fn notify_begin_main_frame_started(&mut self) {
        if self.begin_main_frame == BeginMainFrameState::Sent {
            self.begin_main_frame = BeginMainFrameState::Started;
        }
    }

    fn notify_ready_to_commit(&mut self) {
        debug_assert!(
            matches!(
                self.begin_main_frame,
                BeginMainFrameState::Sent | BeginMainFrameState::Started
            ),
            "ready to commit without a begin-main-frame in flight: {:?}",
            self.begin_main_frame
        );
        self.begin_main_frame = BeginMainFrameState::ReadyToCommit;
    }

    fn did_commit(&mut self) {
        self.begin_main_frame = BeginMainFrameState::Idle;
        self.has_pending_tree = true;
        self.pending_tree_ready = false;
        if self.output_surface == OutputSurfaceState::WaitingForFirstCommit {
            self.output_surface = OutputSurfaceState::WaitingForFirstActivation;
        }
    }

    fn begin_main_frame_aborted(&mut self, reason: CommitEarlyOutReason) {
        self.begin_main_frame = BeginMainFrameState::Idle;
        if reason.needs_new_begin_main_frame() {
            self.needs_begin_main_frame = true;
        }
    }

    fn did_lose_output_surface(&mut self) {
        self.output_surface = OutputSurfaceState::Lost;
        self.needs_redraw = false;
        self.active_tree_ready_to_draw = true;
    }

    fn did_create_and_initialize_output_surface(&mut self) {
        debug_assert_eq!(
            self.output_surface,
            OutputSurfaceState::Creating,
            "output surface initialized without a creation request"
        );
        self.output_surface = OutputSurfaceState::WaitingForFirstCommit;
        self.needs_begin_main_frame = true;
        self.consecutive_draw_failures = 0;
    }

    fn did_draw(&mut self, result: DrawResult) {
        self.drew_this_frame = true;
        match result {
            DrawResult::Success => {
                self.needs_redraw = false;
                self.consecutive_draw_failures = 0;
            }
            DrawResult::AbortedCheckerboardAnimations | DrawResult::AbortedMissingHighResContent => {
                if self.must_force_draw() {
                    self.consecutive_draw_failures = 0;
                    self.needs_redraw = false;
                } else {
                    self.consecutive_draw_failures += 1;
                    self.needs_begin_main_frame = true;
                }
            }
            DrawResult::AbortedCantDraw | DrawResult::AbortedContextLost => {}
        }
    }

    fn begin_impl_frame(&mut self, args: BeginFrameArgs) {
        self.args = Some(args);
        self.phase = ImplFramePhase::InsideBeginFrame;
        self.sent_begin_main_frame_this_frame = false;
        self.animated_this_frame = false;
        self.drew_this_frame = false;
        self.prepared_tiles_this_frame = false;
    }

    fn on_begin_impl_frame_deadline(&mut self) {
        if self.phase == ImplFramePhase::InsideBeginFrame {
            self.phase = ImplFramePhase::InsideDeadline;
        }
    }

    fn deadline_ready(&self) -> bool {
        self.phase == ImplFramePhase::InsideBeginFrame
            && self.begin_main_frame == BeginMainFrameState::Idle
            && (!self.has_pending_tree || self.pending_tree_ready)
    }

    fn needs_begin_frames(&self) -> bool {
        self.visible
            && (self.needs_begin_main_frame
                || self.needs_redraw
                || self.needs_animate
                || self.needs_prepare_tiles
                || self.has_pending_tree
                || self.begin_main_frame != BeginMainFrameState::Idle)
    }

    fn next_action(&mut self) -> Option<SchedulerAction> {
        if self.should_begin_output_surface_creation() {
            self.output_surface = OutputSurfaceState::Creating;
            return Some(SchedulerAction::BeginOutputSurfaceCreation);
        }
        if self.should_activate() {
            self.has_pending_tree = false;
            self.pending_tree_ready = false;
            self.needs_redraw = true;
            self.active_tree_ready_to_draw = !self.config.wait_for_ready_to_draw;
            if self.output_surface == OutputSurfaceState::WaitingForFirstActivation {
                self.output_surface = OutputSurfaceState::Active;
            }
            return Some(SchedulerAction::ActivateSyncTree);
        }
        if self.should_commit() {
            self.begin_main_frame = BeginMainFrameState::Committing;
            return Some(SchedulerAction::Commit);
        }
        if self.should_animate()
            && let Some(args) = self.args
        {
            self.needs_animate = false;
            self.animated_this_frame = true;
            self.needs_redraw = true;
            return Some(SchedulerAction::Animate(args));
        }
        if self.should_draw() {
            self.drew_this_frame = true;
            return Some(if self.must_force_draw() {
                SchedulerAction::DrawAndSwapForced
            } else {
                SchedulerAction::DrawAndSwapIfPossible
            });
        }
        if self.should_prepare_tiles() {
            self.needs_prepare_tiles = false;
            self.prepared_tiles_this_frame = true;
            return Some(SchedulerAction::PrepareTiles);
        }
        if self.should_send_begin_main_frame()
            && let Some(args) = self.args
        {
            self.needs_begin_main_frame = false;
            self.sent_begin_main_frame_this_frame = true;
            self.begin_main_frame = BeginMainFrameState::Sent;
            return Some(SchedulerAction::SendBeginMainFrame(args));
        }
        if self.phase == ImplFramePhase::InsideDeadline {
            self.phase = ImplFramePhase::Idle;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::time::{Duration, HostTime};
    use crate::timing::BeginFrameIdSource;

    fn drain(sched: &mut Scheduler) -> Vec<SchedulerAction> {
        let mut actions = Vec::new();
        while let Some(action) = sched.next_action() {
            actions.push(action);
        }
        actions
    }

    fn ready_scheduler(config: SchedulerConfig) -> Scheduler {
        let mut sched = Scheduler::new(config);
        sched.set_visible(true);
        assert_eq!(
            sched.next_action(),
            Some(SchedulerAction::BeginOutputSurfaceCreation)
        );
        sched.did_create_and_initialize_output_surface();
        sched
    }

    /// Runs one begin-main-frame through commit and activation.
    fn commit_once(sched: &mut Scheduler, ids: &mut BeginFrameIdSource) {
        sched.set_needs_begin_main_frame();
        sched.begin_impl_frame(ids.next_args(HostTime(0), Duration(16)));
        assert!(matches!(
            sched.next_action(),
            Some(SchedulerAction::SendBeginMainFrame(_))
        ));
        sched.notify_begin_main_frame_started();
        sched.notify_ready_to_commit();
        assert_eq!(sched.next_action(), Some(SchedulerAction::Commit));
        sched.did_commit();
        sched.notify_ready_to_activate();
        assert_eq!(sched.next_action(), Some(SchedulerAction::ActivateSyncTree));
    }

    #[test]
    fn no_surface_creation_while_invisible() {
        let mut sched = Scheduler::new(SchedulerConfig::standard());
        assert_eq!(sched.next_action(), None);
        sched.set_visible(true);
        assert_eq!(
            sched.next_action(),
            Some(SchedulerAction::BeginOutputSurfaceCreation)
        );
        assert_eq!(sched.output_surface_state(), OutputSurfaceState::Creating);
        assert_eq!(sched.next_action(), None, "creation is requested once");
    }

    #[test]
    fn full_frame_runs_in_priority_order() {
        let mut sched = ready_scheduler(SchedulerConfig::standard());
        let mut ids = BeginFrameIdSource::new(0);
        commit_once(&mut sched, &mut ids);
        assert_eq!(sched.output_surface_state(), OutputSurfaceState::Active);

        sched.on_begin_impl_frame_deadline();
        assert_eq!(
            drain(&mut sched),
            [SchedulerAction::DrawAndSwapIfPossible]
        );
        sched.did_draw(DrawResult::Success);
        assert!(!sched.needs_redraw());
        assert_eq!(sched.impl_frame_phase(), ImplFramePhase::Idle);
    }

    #[test]
    fn one_begin_main_frame_per_interval() {
        let mut sched = ready_scheduler(SchedulerConfig::standard());
        let mut ids = BeginFrameIdSource::new(0);
        sched.set_needs_begin_main_frame();
        sched.begin_impl_frame(ids.next_args(HostTime(0), Duration(16)));
        let first = drain(&mut sched);
        assert_eq!(first.len(), 1);

        sched.begin_main_frame_aborted(CommitEarlyOutReason::DeferredCommit);
        assert!(sched.needs_begin_main_frame(), "aborts re-arm");
        assert_eq!(sched.next_action(), None, "but not in the same interval");

        sched.begin_impl_frame(ids.next_args(HostTime(16), Duration(16)));
        assert!(matches!(
            sched.next_action(),
            Some(SchedulerAction::SendBeginMainFrame(_))
        ));
    }

    #[test]
    fn finished_no_updates_does_not_rearm() {
        let mut sched = ready_scheduler(SchedulerConfig::standard());
        let mut ids = BeginFrameIdSource::new(0);
        sched.set_needs_begin_main_frame();
        sched.begin_impl_frame(ids.next_args(HostTime(0), Duration(16)));
        drain(&mut sched);
        sched.begin_main_frame_aborted(CommitEarlyOutReason::FinishedNoUpdates);
        assert!(!sched.needs_begin_main_frame());
        assert_eq!(
            sched.begin_main_frame_state(),
            BeginMainFrameState::Idle
        );
    }

    #[test]
    fn commit_waits_for_previous_activation() {
        let mut sched = ready_scheduler(SchedulerConfig::throughput());
        let mut ids = BeginFrameIdSource::new(0);
        sched.set_needs_begin_main_frame();
        sched.begin_impl_frame(ids.next_args(HostTime(0), Duration(16)));
        drain(&mut sched);
        sched.notify_ready_to_commit();
        assert_eq!(sched.next_action(), Some(SchedulerAction::Commit));
        sched.did_commit();
        assert!(sched.has_pending_tree());

        // Main frame before activation: a second attempt may start...
        sched.set_needs_begin_main_frame();
        sched.begin_impl_frame(ids.next_args(HostTime(16), Duration(16)));
        assert!(matches!(
            sched.next_action(),
            Some(SchedulerAction::SendBeginMainFrame(_))
        ));
        sched.notify_ready_to_commit();
        // ...but its commit waits for the pending tree.
        assert_eq!(sched.next_action(), None);

        sched.notify_ready_to_activate();
        assert_eq!(
            drain(&mut sched),
            [SchedulerAction::ActivateSyncTree, SchedulerAction::Commit]
        );
    }

    #[test]
    fn standard_config_holds_main_frame_until_activation() {
        let mut sched = ready_scheduler(SchedulerConfig::standard());
        let mut ids = BeginFrameIdSource::new(0);
        sched.set_needs_begin_main_frame();
        sched.begin_impl_frame(ids.next_args(HostTime(0), Duration(16)));
        drain(&mut sched);
        sched.notify_ready_to_commit();
        drain(&mut sched);
        sched.did_commit();

        sched.set_needs_begin_main_frame();
        sched.begin_impl_frame(ids.next_args(HostTime(16), Duration(16)));
        assert_eq!(sched.next_action(), None);
    }

    #[test]
    fn repeated_draw_failures_force_a_draw() {
        let mut config = SchedulerConfig::standard();
        config.max_consecutive_draw_failures = 2;
        let mut sched = ready_scheduler(config);
        let mut ids = BeginFrameIdSource::new(0);
        commit_once(&mut sched, &mut ids);

        let mut draw_once = |sched: &mut Scheduler, t: u64| {
            sched.begin_impl_frame(ids.next_args(HostTime(t), Duration(16)));
            sched.on_begin_impl_frame_deadline();
            let action = sched.next_action();
            sched.did_draw(DrawResult::AbortedMissingHighResContent);
            action
        };

        assert_eq!(
            draw_once(&mut sched, 16),
            Some(SchedulerAction::DrawAndSwapIfPossible)
        );
        assert_eq!(
            draw_once(&mut sched, 32),
            Some(SchedulerAction::DrawAndSwapIfPossible)
        );
        assert_eq!(
            draw_once(&mut sched, 48),
            Some(SchedulerAction::DrawAndSwapForced)
        );
        assert_eq!(sched.consecutive_draw_failures(), 0);
        assert!(!sched.needs_redraw(), "forced draw settles the redraw");
    }

    #[test]
    fn wait_for_ready_to_draw_holds_draws() {
        let mut sched = ready_scheduler(SchedulerConfig::throughput());
        let mut ids = BeginFrameIdSource::new(0);
        commit_once(&mut sched, &mut ids);
        sched.on_begin_impl_frame_deadline();
        assert_eq!(sched.next_action(), None);

        sched.begin_impl_frame(ids.next_args(HostTime(16), Duration(16)));
        sched.notify_ready_to_draw();
        sched.on_begin_impl_frame_deadline();
        assert_eq!(
            sched.next_action(),
            Some(SchedulerAction::DrawAndSwapIfPossible)
        );
    }

    #[test]
    fn lost_surface_is_recreated_before_anything_else() {
        let mut sched = ready_scheduler(SchedulerConfig::standard());
        let mut ids = BeginFrameIdSource::new(0);
        commit_once(&mut sched, &mut ids);
        sched.did_lose_output_surface();
        sched.set_needs_animate();
        sched.begin_impl_frame(ids.next_args(HostTime(16), Duration(16)));
        assert_eq!(
            sched.next_action(),
            Some(SchedulerAction::BeginOutputSurfaceCreation)
        );
        assert!(matches!(
            sched.next_action(),
            Some(SchedulerAction::Animate(_))
        ));
    }

    #[test]
    fn needs_begin_frames_tracks_outstanding_work() {
        let mut sched = ready_scheduler(SchedulerConfig::standard());
        assert!(sched.needs_begin_frames(), "first commit is wanted");
        sched.set_visible(false);
        assert!(!sched.needs_begin_frames());
    }

    #[test]
    fn deadline_is_ready_once_main_frame_settles() {
        let mut sched = ready_scheduler(SchedulerConfig::standard());
        let mut ids = BeginFrameIdSource::new(0);
        sched.set_needs_begin_main_frame();
        sched.begin_impl_frame(ids.next_args(HostTime(0), Duration(16)));
        drain(&mut sched);
        assert!(!sched.deadline_ready());
        sched.begin_main_frame_aborted(CommitEarlyOutReason::FinishedNoUpdates);
        assert!(sched.deadline_ready());
    }
}
