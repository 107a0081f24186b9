// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Consumer-side work shared by both strategies.
//!
//! [`ConsumerState`] wraps the [`ConsumerTree`] with its timing history,
//! tracer and the frame currently being produced. It knows nothing about
//! threads or the scheduler; strategies feed it scheduler actions and route
//! what it returns.

use std::sync::Arc;

use mantle_core::abort::{CommitEarlyOutReason, SwapPromiseFailure};
use mantle_core::history::FrameTimingHistory;
use mantle_core::host::{ConsumerTree, DrawFrame, DrawResult, ReturnedResource};
use mantle_core::timing::{BeginFrameArgs, BeginFrameId, BeginMainFrameState, MainFrameTiming};
use mantle_core::trace::{ActivationEvent, BeginImplFrameEvent, CommitEvent, DrawEvent, Tracer};
use parking_lot::Mutex;

use crate::clock::HostClock;

/// Attempts kept in each proxy's timing history.
pub const HISTORY_LEN: usize = 64;

pub(crate) type SharedHistory = Arc<Mutex<FrameTimingHistory<HISTORY_LEN>>>;

/// What one draw action did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct DrawOutcome {
    pub(crate) result: DrawResult,
    pub(crate) drew: bool,
    pub(crate) swapped: bool,
}

impl DrawOutcome {
    /// Promise failure to report when a drawn frame never reached the screen.
    pub(crate) fn swap_failure(&self) -> Option<SwapPromiseFailure> {
        (self.drew && !self.swapped).then_some(SwapPromiseFailure::SwapFails)
    }

    pub(crate) fn context_lost(&self) -> bool {
        self.result == DrawResult::AbortedContextLost
    }
}

pub(crate) struct ConsumerState<T> {
    pub(crate) tree: T,
    history: SharedHistory,
    tracer: Tracer,
    clock: HostClock,
    current_frame: Option<BeginFrameId>,
    last_commit: Option<BeginFrameId>,
}

impl<T: ConsumerTree> ConsumerState<T> {
    pub(crate) fn new(tree: T, tracer: Tracer, clock: HostClock) -> Self {
        Self {
            tree,
            history: Arc::new(Mutex::new(FrameTimingHistory::default())),
            tracer,
            clock,
            current_frame: None,
            last_commit: None,
        }
    }

    pub(crate) fn history(&self) -> SharedHistory {
        Arc::clone(&self.history)
    }

    pub(crate) fn set_tracer(&mut self, tracer: Tracer) {
        self.tracer = tracer;
    }

    pub(crate) fn begin_impl_frame(&mut self, args: &BeginFrameArgs) {
        self.current_frame = Some(args.id);
        self.tracer.begin_impl_frame(&BeginImplFrameEvent::from(args));
    }

    /// Collects what the producer needs to start an attempt for `args`.
    pub(crate) fn begin_main_frame_state(&mut self, args: BeginFrameArgs) -> BeginMainFrameState {
        BeginMainFrameState {
            args,
            scroll_info: self.tree.process_scroll_deltas(),
            evicted_ui_resources: self.tree.evicted_ui_resources(),
            sent_at: self.clock.now(),
        }
    }

    /// Adopts a snapshot. Returns whether the pending tree can be activated
    /// right away.
    pub(crate) fn commit(
        &mut self,
        snapshot: T::Snapshot,
        timing: &MainFrameTiming,
        waits_for_activation: bool,
    ) -> bool {
        self.tree.begin_commit();
        self.tree.finish_commit(snapshot);
        self.tree.commit_complete();
        self.history.lock().record_commit(timing);
        self.last_commit = Some(timing.id);
        self.tracer.commit(&CommitEvent {
            id: timing.id,
            waits_for_activation,
            timestamp: self.clock.now(),
        });
        tracing::debug!(frame = ?timing.id, waits_for_activation, "commit adopted");
        self.tree.ready_to_activate_after_commit()
    }

    pub(crate) fn record_abort(&mut self, reason: CommitEarlyOutReason, timing: &MainFrameTiming) {
        self.history.lock().record_abort(timing, reason);
    }

    pub(crate) fn activate(&mut self) {
        self.tree.activate_sync_tree();
        self.tracer.activation(&ActivationEvent {
            id: self.last_commit,
            timestamp: self.clock.now(),
        });
    }

    pub(crate) fn animate(&mut self, args: &BeginFrameArgs) {
        self.tree.animate(args.frame_time);
    }

    pub(crate) fn prepare_tiles(&mut self) {
        self.tree.prepare_tiles();
    }

    /// Prepares, draws and swaps one frame.
    ///
    /// A checkerboarding or incomplete frame is drawn only when forced. A
    /// frame that cannot be drawn at all never is.
    pub(crate) fn draw(&mut self, forced: bool) -> DrawOutcome {
        let mut frame = DrawFrame::new(self.current_frame, forced);
        let result = self.tree.prepare_to_draw(&mut frame);
        let drawable = match result {
            DrawResult::Success => true,
            DrawResult::AbortedCheckerboardAnimations
            | DrawResult::AbortedMissingHighResContent => forced,
            DrawResult::AbortedCantDraw | DrawResult::AbortedContextLost => false,
        };
        let mut swapped = false;
        if drawable {
            self.tree.draw_layers(&frame);
            swapped = self.tree.swap_buffers(&frame);
        }
        self.tracer.draw(&DrawEvent {
            id: frame.frame_id,
            forced,
            result,
            swapped,
            timestamp: self.clock.now(),
        });
        if !result.is_success() {
            tracing::debug!(result = result.as_str(), forced, drew = drawable, "draw did not succeed");
        }
        DrawOutcome {
            result,
            drew: drawable,
            swapped,
        }
    }

    pub(crate) fn take_returned_resources(&mut self) -> Vec<ReturnedResource> {
        self.tree.take_returned_resources()
    }

    pub(crate) fn finish_all_rendering(&mut self) {
        self.tree.finish_all_rendering();
    }

    pub(crate) fn release_output_surface(&mut self) {
        self.tree.release_output_surface();
    }
}

#[cfg(test)]
mod tests {
    use mantle_core::time::{Duration, HostTime};
    use mantle_core::timing::BeginFrameIdSource;

    use super::*;

    struct Tree {
        prepare: DrawResult,
        draws: u32,
    }

    impl ConsumerTree for Tree {
        type Snapshot = ();

        fn finish_commit(&mut self, (): ()) {}

        fn prepare_to_draw(&mut self, _: &mut DrawFrame) -> DrawResult {
            self.prepare
        }

        fn draw_layers(&mut self, _: &DrawFrame) {
            self.draws += 1;
        }
    }

    fn state(prepare: DrawResult) -> ConsumerState<Tree> {
        ConsumerState::new(Tree { prepare, draws: 0 }, Tracer::none(), HostClock::new())
    }

    #[test]
    fn checkerboarded_frames_draw_only_when_forced() {
        let mut consumer = state(DrawResult::AbortedCheckerboardAnimations);
        assert!(!consumer.draw(false).drew);
        let forced = consumer.draw(true);
        assert!(forced.drew && forced.swapped);
        assert_eq!(consumer.tree.draws, 1);
    }

    #[test]
    fn lost_context_never_draws() {
        let mut consumer = state(DrawResult::AbortedContextLost);
        let outcome = consumer.draw(true);
        assert!(!outcome.drew);
        assert!(outcome.context_lost());
        assert_eq!(outcome.swap_failure(), None);
    }

    #[test]
    fn commits_and_aborts_reach_the_history() {
        let mut consumer = state(DrawResult::Success);
        let args = BeginFrameIdSource::new(3).next_args(HostTime(0), Duration(16));
        let begin = consumer.begin_main_frame_state(args);
        let timing = MainFrameTiming {
            id: args.id,
            sent_at: begin.sent_at,
            finished_at: begin.sent_at,
        };
        assert!(consumer.commit((), &timing, false));
        consumer.record_abort(CommitEarlyOutReason::NotVisible, &timing);

        let report = consumer.history().lock().report();
        assert_eq!(report.committed, 1);
        assert_eq!(report.aborted_for(CommitEarlyOutReason::NotVisible), 1);
    }
}
