// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The producer side of one begin-main-frame attempt.
//!
//! [`run_begin_main_frame`] is the only place that drives a [`SceneHost`]
//! through the stages. It never touches the consumer: it returns a
//! [`MainFrameOutcome`] and the calling strategy delivers it, either by
//! calling the consumer directly or by posting a message.
//!
//! On [`MainFrameOutcome::ReadyToCommit`] the attempt is still open. The
//! strategy performs the commit hand-off and then calls [`complete_commit`],
//! which closes the attempt and notifies the host.

use mantle_core::abort::{CommitEarlyOutReason, SwapPromiseFailure, classify_early_out};
use mantle_core::history;
use mantle_core::host::SceneHost;
use mantle_core::stage::{PipelineStage, StageRequest, StageRequests, StageSnapshot, StageTracker};
use mantle_core::timing::{BeginMainFrameState, MainFrameTiming};
use mantle_core::trace::{MainFrameAbortedEvent, MainFrameSummaryBuilder, StageEvent, Tracer};

use crate::clock::HostClock;

/// Producer-side state owned by a proxy.
#[derive(Debug)]
pub struct MainFrameState {
    stages: StageTracker,
    defer_commits: bool,
    visible: bool,
    output_surface_lost: bool,
    input_throttled_until_commit: bool,
    commit_waits_for_activation: bool,
    commit_in_progress: bool,
    /// Whether the last attempt got far enough to latch a final stage.
    latched: bool,
    summary: Option<MainFrameSummaryBuilder>,
    tracer: Tracer,
}

impl Default for MainFrameState {
    fn default() -> Self {
        Self::new()
    }
}

impl MainFrameState {
    /// Idle and invisible, with a usable output surface.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stages: StageTracker::new(),
            defer_commits: false,
            visible: false,
            output_surface_lost: false,
            input_throttled_until_commit: false,
            commit_waits_for_activation: false,
            commit_in_progress: false,
            latched: false,
            summary: None,
            tracer: Tracer::none(),
        }
    }

    /// Replaces the producer-side tracer.
    pub fn set_tracer(&mut self, tracer: Tracer) {
        self.tracer = tracer;
    }

    /// Records a request for `stage`.
    pub fn request(&mut self, stage: PipelineStage) -> StageRequest {
        let outcome = self.stages.request(stage);
        tracing::trace!(stage = stage.as_str(), ?outcome, "stage requested");
        outcome
    }

    /// While set, attempts abort with `DeferredCommit`.
    pub fn set_defer_commits(&mut self, defer: bool) {
        if self.defer_commits != defer {
            tracing::debug!(defer, "commit deferral changed");
        }
        self.defer_commits = defer;
    }

    /// Holds the next commit's completion until activation.
    ///
    /// # Panics
    ///
    /// Panics while a commit handshake is in progress.
    pub fn set_commit_waits_for_activation(&mut self) {
        assert!(
            !self.commit_in_progress,
            "commit_waits_for_activation set during a commit handshake"
        );
        self.commit_waits_for_activation = true;
    }

    /// Returns and clears the one-shot wait-for-activation flag.
    pub fn take_commit_waits_for_activation(&mut self) -> bool {
        std::mem::take(&mut self.commit_waits_for_activation)
    }

    /// Producer-side view of output visibility.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Producer-side view of the output surface.
    pub fn set_output_surface_lost(&mut self, lost: bool) {
        self.output_surface_lost = lost;
    }

    /// Throttles input until the next commit completes or aborts.
    pub fn set_input_throttled_until_commit(&mut self, throttled: bool) {
        self.input_throttled_until_commit = throttled;
    }

    /// Whether input is throttled.
    #[must_use]
    pub fn input_throttled_until_commit(&self) -> bool {
        self.input_throttled_until_commit
    }

    /// Whether commits are deferred.
    #[must_use]
    pub fn defer_commits(&self) -> bool {
        self.defer_commits
    }

    /// Whether the producer believes output is visible.
    #[must_use]
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Whether the producer believes the output surface is lost.
    #[must_use]
    pub fn output_surface_lost(&self) -> bool {
        self.output_surface_lost
    }

    /// Whether a snapshot was produced and its commit has not completed.
    #[must_use]
    pub fn commit_in_progress(&self) -> bool {
        self.commit_in_progress
    }

    /// Whether a commit is requested or underway.
    #[must_use]
    pub fn commit_requested(&self) -> bool {
        self.stages.max_requested() == PipelineStage::Commit
            || (self.stages.in_attempt() && self.stages.final_stage() == PipelineStage::Commit)
    }

    /// Whether requests are waiting for another attempt.
    #[must_use]
    pub fn needs_another_begin_main_frame(&self) -> bool {
        self.stages.has_pending_request()
    }

    /// Final stage of the last attempt, or [`PipelineStage::None`] if it
    /// stopped before latching one.
    #[must_use]
    pub fn attempt_final_stage(&self) -> PipelineStage {
        if self.latched {
            self.stages.final_stage()
        } else {
            PipelineStage::None
        }
    }

    /// All three tracked stages.
    #[must_use]
    pub fn stage_snapshot(&self) -> StageSnapshot {
        self.stages.snapshot()
    }

    fn enter(&mut self, stage: PipelineStage, begin: &BeginMainFrameState, clock: &HostClock) {
        self.stages.advance(stage);
        let timestamp = clock.now();
        if let Some(summary) = &mut self.summary {
            summary.stage_begin(stage, timestamp);
        }
        self.tracer.stage(&StageEvent {
            id: begin.args.id,
            stage,
            final_stage: self.stages.final_stage(),
            timestamp,
        });
    }

    fn finish_summary(&mut self, outcome: history::MainFrameOutcome, clock: &HostClock) {
        if let Some(mut summary) = self.summary.take() {
            summary.set_final_stage(self.attempt_final_stage());
            self.tracer
                .main_frame_summary(&summary.finish(outcome, clock.now()));
        }
    }
}

/// What one attempt produced.
#[derive(Debug)]
pub enum MainFrameOutcome<S> {
    /// The attempt stopped early. It is already closed.
    Aborted {
        /// Why it stopped.
        reason: CommitEarlyOutReason,
        /// Send-to-finish timing for the consumer's history.
        timing: MainFrameTiming,
    },
    /// The attempt produced a snapshot. The caller must hand it off and then
    /// call [`complete_commit`].
    ReadyToCommit {
        /// Moved to the consumer.
        snapshot: S,
        /// Send-to-finish timing for the consumer's history.
        timing: MainFrameTiming,
    },
}

/// Runs one attempt against `host`.
///
/// `on_started` runs once the attempt passed its early-out checks, before
/// any stage. Strategies use it to tell the scheduler the begin-main-frame
/// started.
#[tracing::instrument(level = "trace", skip_all, fields(frame = ?begin.args.id))]
pub fn run_begin_main_frame<H: SceneHost>(
    state: &mut MainFrameState,
    host: &mut H,
    begin: &BeginMainFrameState,
    clock: &HostClock,
    on_started: impl FnOnce(),
) -> MainFrameOutcome<H::Snapshot> {
    debug_assert!(
        !state.stages.in_attempt(),
        "begin main frame re-entered while an attempt is running"
    );
    state.summary = Some(MainFrameSummaryBuilder::new(begin.args.id, clock.now()));
    state.latched = false;

    if state.defer_commits {
        return abort(state, host, CommitEarlyOutReason::DeferredCommit, begin, clock);
    }

    let latched = state.stages.begin_attempt();
    state.latched = true;
    if let Some(reason) = classify_early_out(false, state.visible, state.output_surface_lost) {
        if reason.retains_request() {
            state.stages.restore_request(latched);
        }
        return abort(state, host, reason, begin, clock);
    }
    on_started();

    host.will_begin_main_frame();
    host.begin_main_frame(&begin.args);

    state.enter(PipelineStage::Animate, begin, clock);
    host.apply_scroll_and_scale(&begin.scroll_info);
    host.animate_layers(
        begin.args.frame_time,
        &mut StageRequests::new(&mut state.stages),
    );

    state.enter(PipelineStage::UpdateLayers, begin, clock);
    let updated = state.stages.final_stage() >= PipelineStage::UpdateLayers && {
        host.layout();
        host.update_layers(&mut StageRequests::new(&mut state.stages))
    };
    if begin.evicted_ui_resources {
        host.recreate_ui_resources();
    }

    state.enter(PipelineStage::Commit, begin, clock);
    let can_cancel = state.stages.final_stage() < PipelineStage::Commit
        && !begin.evicted_ui_resources;
    if !updated && can_cancel {
        return abort(state, host, CommitEarlyOutReason::FinishedNoUpdates, begin, clock);
    }

    host.will_commit();
    let snapshot = host.finish_commit();
    state.commit_in_progress = true;
    tracing::debug!(final_stage = state.stages.final_stage().as_str(), "snapshot ready to commit");
    MainFrameOutcome::ReadyToCommit {
        snapshot,
        timing: timing(begin, clock),
    }
}

/// Closes an attempt whose snapshot the consumer has taken.
///
/// Runs after the commit hand-off; with a capture scope around the hand-off,
/// every task it captured has already run.
pub fn complete_commit<H: SceneHost>(state: &mut MainFrameState, host: &mut H, clock: &HostClock) {
    debug_assert!(state.commit_in_progress, "no commit to complete");
    state.commit_in_progress = false;
    state.stages.finish();
    state.input_throttled_until_commit = false;
    host.commit_complete();
    host.did_begin_main_frame();
    state.finish_summary(history::MainFrameOutcome::Committed, clock);
}

/// Closes an attempt whose snapshot never reached the consumer.
///
/// The latched stage goes back into the requests and the host's swap
/// promises are broken. No summary is emitted.
pub fn abandon_commit<H: SceneHost>(state: &mut MainFrameState, host: &mut H) {
    debug_assert!(state.commit_in_progress, "no commit to abandon");
    state.commit_in_progress = false;
    state.stages.finish();
    state.stages.restore_request(state.stages.final_stage());
    state.summary = None;
    host.break_swap_promises(SwapPromiseFailure::CommitFails);
    tracing::debug!("commit abandoned before the consumer took the snapshot");
}

fn abort<H: SceneHost>(
    state: &mut MainFrameState,
    host: &mut H,
    reason: CommitEarlyOutReason,
    begin: &BeginMainFrameState,
    clock: &HostClock,
) -> MainFrameOutcome<H::Snapshot> {
    let reached = state.stages.current();
    state.stages.finish();
    if reason.clears_input_throttle() {
        state.input_throttled_until_commit = false;
    }
    if reason.did_handle_commit() {
        host.commit_complete();
        host.did_begin_main_frame();
    }
    host.break_swap_promises(SwapPromiseFailure::from(reason));

    let timing = timing(begin, clock);
    state.tracer.main_frame_aborted(&MainFrameAbortedEvent {
        id: begin.args.id,
        reason,
        reached,
        timestamp: timing.finished_at,
    });
    state.finish_summary(history::MainFrameOutcome::Aborted(reason), clock);
    tracing::debug!(
        reason = reason.as_str(),
        reached = reached.as_str(),
        "begin main frame aborted"
    );
    MainFrameOutcome::Aborted { reason, timing }
}

fn timing(begin: &BeginMainFrameState, clock: &HostClock) -> MainFrameTiming {
    MainFrameTiming {
        id: begin.args.id,
        sent_at: begin.sent_at,
        finished_at: clock.now(),
    }
}

#[cfg(test)]
mod tests {
    use mantle_core::host::SceneHost;
    use mantle_core::time::{Duration, HostTime};
    use mantle_core::timing::{BeginFrameIdSource, ScrollAndScaleSet};

    use super::*;

    #[derive(Default)]
    struct Host {
        calls: Vec<&'static str>,
        updates: bool,
        commit_from_update: bool,
        swap_failures: Vec<SwapPromiseFailure>,
    }

    impl SceneHost for Host {
        type Snapshot = ();

        fn animate_layers(&mut self, _: HostTime, _: &mut StageRequests<'_>) {
            self.calls.push("animate_layers");
        }

        fn layout(&mut self) {
            self.calls.push("layout");
        }

        fn update_layers(&mut self, requests: &mut StageRequests<'_>) -> bool {
            self.calls.push("update_layers");
            if self.commit_from_update {
                requests.request_commit();
            }
            self.updates
        }

        fn recreate_ui_resources(&mut self) {
            self.calls.push("recreate_ui_resources");
        }

        fn finish_commit(&mut self) {
            self.calls.push("finish_commit");
        }

        fn commit_complete(&mut self) {
            self.calls.push("commit_complete");
        }

        fn did_begin_main_frame(&mut self) {
            self.calls.push("did_begin_main_frame");
        }

        fn break_swap_promises(&mut self, reason: SwapPromiseFailure) {
            self.swap_failures.push(reason);
        }
    }

    fn begin(evicted: bool) -> BeginMainFrameState {
        BeginMainFrameState {
            args: BeginFrameIdSource::new(0).next_args(HostTime(0), Duration(16)),
            scroll_info: ScrollAndScaleSet::default(),
            evicted_ui_resources: evicted,
            sent_at: HostTime(0),
        }
    }

    fn visible_state() -> MainFrameState {
        let mut state = MainFrameState::new();
        state.set_visible(true);
        state
    }

    fn run(state: &mut MainFrameState, host: &mut Host, evicted: bool) -> Option<CommitEarlyOutReason> {
        let clock = HostClock::new();
        match run_begin_main_frame(state, host, &begin(evicted), &clock, || {}) {
            MainFrameOutcome::Aborted { reason, .. } => Some(reason),
            MainFrameOutcome::ReadyToCommit { .. } => {
                complete_commit(state, host, &clock);
                None
            }
        }
    }

    #[test]
    fn full_commit_runs_every_stage() {
        let mut state = visible_state();
        state.request(PipelineStage::Commit);
        let mut host = Host::default();
        assert_eq!(run(&mut state, &mut host, false), None);
        assert_eq!(
            host.calls,
            [
                "animate_layers",
                "layout",
                "update_layers",
                "finish_commit",
                "commit_complete",
                "did_begin_main_frame"
            ]
        );
        assert_eq!(state.stage_snapshot().current, PipelineStage::None);
    }

    #[test]
    fn animate_only_attempt_finishes_with_no_updates() {
        let mut state = visible_state();
        state.request(PipelineStage::Animate);
        let mut host = Host::default();
        assert_eq!(
            run(&mut state, &mut host, false),
            Some(CommitEarlyOutReason::FinishedNoUpdates)
        );
        assert_eq!(
            host.calls,
            ["animate_layers", "commit_complete", "did_begin_main_frame"],
            "layout and update_layers are skipped below their stage"
        );
        assert_eq!(host.swap_failures, [SwapPromiseFailure::CommitNoUpdate]);
    }

    #[test]
    fn commit_requested_during_update_is_honored() {
        let mut state = visible_state();
        state.request(PipelineStage::UpdateLayers);
        let mut host = Host {
            commit_from_update: true,
            ..Host::default()
        };
        assert_eq!(run(&mut state, &mut host, false), None);
        assert!(host.calls.contains(&"finish_commit"));
        assert!(!state.needs_another_begin_main_frame());
    }

    #[test]
    fn evicted_resources_force_a_commit() {
        let mut state = visible_state();
        state.request(PipelineStage::Animate);
        let mut host = Host::default();
        assert_eq!(run(&mut state, &mut host, true), None);
        assert!(host.calls.contains(&"recreate_ui_resources"));
        assert!(host.calls.contains(&"finish_commit"));
    }

    #[test]
    fn deferred_attempt_keeps_requests_pending() {
        let mut state = visible_state();
        state.set_defer_commits(true);
        state.request(PipelineStage::Commit);
        let mut host = Host::default();
        assert_eq!(
            run(&mut state, &mut host, false),
            Some(CommitEarlyOutReason::DeferredCommit)
        );
        assert!(host.calls.is_empty());
        assert_eq!(host.swap_failures, [SwapPromiseFailure::CommitFails]);
        assert_eq!(state.stage_snapshot().max_requested, PipelineStage::Commit);
    }

    #[test]
    fn deferred_attempt_does_not_inherit_the_previous_final_stage() {
        let mut state = visible_state();
        state.request(PipelineStage::Commit);
        let mut host = Host::default();
        assert_eq!(run(&mut state, &mut host, false), None);
        assert_eq!(state.attempt_final_stage(), PipelineStage::Commit);

        state.set_defer_commits(true);
        state.request(PipelineStage::Commit);
        assert_eq!(
            run(&mut state, &mut host, false),
            Some(CommitEarlyOutReason::DeferredCommit)
        );
        assert_eq!(state.attempt_final_stage(), PipelineStage::None);
    }

    #[test]
    fn invisible_attempt_restores_its_request() {
        let mut state = MainFrameState::new();
        state.set_input_throttled_until_commit(true);
        state.request(PipelineStage::Commit);
        let mut host = Host::default();
        assert_eq!(
            run(&mut state, &mut host, false),
            Some(CommitEarlyOutReason::NotVisible)
        );
        assert!(state.needs_another_begin_main_frame());
        assert!(state.commit_requested());
        assert!(!state.input_throttled_until_commit());
    }

    #[test]
    fn abandoned_commit_keeps_its_request() {
        let mut state = visible_state();
        state.request(PipelineStage::Commit);
        let mut host = Host::default();
        let clock = HostClock::new();
        let outcome = run_begin_main_frame(&mut state, &mut host, &begin(false), &clock, || {});
        assert!(matches!(outcome, MainFrameOutcome::ReadyToCommit { .. }));

        abandon_commit(&mut state, &mut host);
        assert!(!state.commit_in_progress());
        assert_eq!(state.stage_snapshot().current, PipelineStage::None);
        assert!(state.commit_requested());
        assert_eq!(host.swap_failures, [SwapPromiseFailure::CommitFails]);
        assert!(!host.calls.contains(&"commit_complete"));
    }

    #[test]
    #[should_panic(expected = "during a commit handshake")]
    fn waits_for_activation_cannot_change_mid_handshake() {
        let mut state = visible_state();
        state.request(PipelineStage::Commit);
        let mut host = Host::default();
        let clock = HostClock::new();
        let outcome = run_begin_main_frame(&mut state, &mut host, &begin(false), &clock, || {});
        assert!(matches!(outcome, MainFrameOutcome::ReadyToCommit { .. }));
        state.set_commit_waits_for_activation();
    }
}
