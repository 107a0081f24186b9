// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-thread strategy.
//!
//! [`InlineProxy`] owns both collaborators and executes scheduler actions on
//! the calling thread. A begin-main-frame action runs the producer attempt
//! immediately; the commit that follows runs inside a capture scope so tasks
//! posted by the consumer's commit work are flushed before the host hears
//! "commit complete".
//!
//! Without a scheduler every request composites synchronously through
//! [`InlineProxy::composite_immediately`].
//!
//! Collaborator callbacks receive `&mut` to their own state only, so they
//! cannot call back into the proxy while it is executing an action.

use std::fmt;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use mantle_core::history::TimingReport;
use mantle_core::host::{ConsumerTree, SceneHost};
use mantle_core::scheduler::{FrameScheduler, SchedulerAction};
use mantle_core::stage::{PipelineStage, StageRequest, StageSnapshot};
use mantle_core::timing::{BeginFrameArgs, BeginFrameIdSource, BeginMainFrameState, MainFrameTiming};
use mantle_core::trace::Tracer;

use super::consumer::ConsumerState;
use super::main_frame::{MainFrameOutcome, MainFrameState, complete_commit, run_begin_main_frame};
use super::signals::{ConsumerSignal, ConsumerSignals};
use super::{PipelineProxy, ProducerContext, ProxySettings};
use crate::blocking::{BlockingTaskRunner, CapturePostTasks};
use crate::clock::HostClock;
use crate::error::ProxyError;
use crate::registry::{ProxyHandle, ProxyRegistry};

struct ReadyCommit<S> {
    snapshot: S,
    timing: MainFrameTiming,
}

/// Both pipeline sides on one thread.
pub struct InlineProxy<H, T>
where
    H: SceneHost,
    T: ConsumerTree<Snapshot = H::Snapshot>,
{
    host: H,
    consumer: ConsumerState<T>,
    scheduler: Option<Box<dyn FrameScheduler>>,
    main: MainFrameState,
    runner: Arc<BlockingTaskRunner>,
    registry: ProxyRegistry,
    handle: ProxyHandle,
    signals: ConsumerSignals,
    signal_rx: Receiver<ConsumerSignal>,
    ids: BeginFrameIdSource,
    clock: HostClock,
    settings: ProxySettings,
    ready_commit: Option<ReadyCommit<H::Snapshot>>,
    /// Capture scope of a commit whose completion waits for activation.
    awaiting_activation: Option<CapturePostTasks>,
    /// Begin-main-frame that arrived while a commit waited for activation.
    deferred_begin_main_frame: Option<BeginMainFrameState>,
    stopped: bool,
}

impl<H, T> fmt::Debug for InlineProxy<H, T>
where
    H: SceneHost,
    T: ConsumerTree<Snapshot = H::Snapshot>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineProxy")
            .field("handle", &self.handle)
            .field("scheduled", &self.scheduler.is_some())
            .field("stages", &self.main.stage_snapshot())
            .field("awaiting_activation", &self.awaiting_activation.is_some())
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl<H, T> InlineProxy<H, T>
where
    H: SceneHost,
    T: ConsumerTree<Snapshot = H::Snapshot>,
{
    /// Creates a proxy on the producer thread.
    ///
    /// Pass `None` as `scheduler` to composite synchronously on every
    /// request.
    #[must_use]
    pub fn new(
        host: H,
        tree: T,
        scheduler: Option<Box<dyn FrameScheduler>>,
        context: &ProducerContext,
        settings: ProxySettings,
    ) -> Self {
        debug_assert!(
            context.runner.belongs_to_current_thread(),
            "inline proxies live on the producer thread"
        );
        let handle = context.registry.register();
        let (signals, signal_rx) = ConsumerSignals::new(context.registry.clone(), handle);
        let clock = HostClock::new();
        tracing::debug!(?handle, scheduled = scheduler.is_some(), "inline proxy created");
        Self {
            host,
            consumer: ConsumerState::new(tree, Tracer::none(), clock),
            scheduler,
            main: MainFrameState::new(),
            runner: Arc::clone(&context.runner),
            registry: context.registry.clone(),
            handle,
            signals,
            signal_rx,
            ids: BeginFrameIdSource::new(handle.slot()),
            clock,
            settings,
            ready_commit: None,
            awaiting_activation: None,
            deferred_begin_main_frame: None,
            stopped: false,
        }
    }

    /// Registry handle of this proxy.
    #[must_use]
    pub fn handle(&self) -> ProxyHandle {
        self.handle
    }

    /// The producer collaborator.
    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The producer collaborator, mutably.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// The consumer collaborator.
    #[must_use]
    pub fn tree(&self) -> &T {
        &self.consumer.tree
    }

    /// The consumer collaborator, mutably.
    pub fn tree_mut(&mut self) -> &mut T {
        &mut self.consumer.tree
    }

    /// Replaces the tracer receiving stage and abort events.
    pub fn set_producer_tracer(&mut self, tracer: Tracer) {
        self.main.set_tracer(tracer);
    }

    /// Replaces the tracer receiving commit, activation and draw events.
    pub fn set_consumer_tracer(&mut self, tracer: Tracer) {
        self.consumer.set_tracer(tracer);
    }

    /// Applies pending consumer signals, then runs whatever the scheduler
    /// wants next.
    pub fn process_signals(&mut self) {
        self.apply_signals();
        self.drain_actions();
    }

    /// Runs one whole frame synchronously: begin-main-frame, commit,
    /// activation and draw.
    ///
    /// This is how requests are served when the proxy has no scheduler.
    /// Requests raised during the attempt that it could not honor wait for
    /// the next call.
    pub fn composite_immediately(&mut self) {
        debug_assert!(
            self.scheduler.is_none(),
            "composite_immediately bypasses the scheduler"
        );
        if self.stopped {
            return;
        }
        self.apply_signals();
        let args = self.next_begin_frame_args();
        self.consumer.begin_impl_frame(&args);
        let begin = self.consumer.begin_main_frame_state(args);
        self.begin_main_frame(begin);
        if self.ready_commit.is_some() {
            self.commit();
            self.activate();
        }
        if self.main.visible() && !self.main.output_surface_lost() {
            self.draw(false);
        }
    }

    fn scheduler(&mut self) -> Option<&mut (dyn FrameScheduler + 'static)> {
        self.scheduler.as_deref_mut()
    }

    fn request(&mut self, stage: PipelineStage) {
        if self.stopped {
            return;
        }
        let outcome = self.main.request(stage);
        match self.scheduler() {
            Some(scheduler) => {
                if outcome == StageRequest::ScheduleBeginFrame {
                    scheduler.set_needs_begin_main_frame();
                }
                self.drain_actions();
            }
            None => self.composite_immediately(),
        }
    }

    fn apply_signals(&mut self) {
        while let Ok(signal) = self.signal_rx.try_recv() {
            if signal == ConsumerSignal::OutputSurfaceLost {
                self.lose_output_surface(true);
            } else if let Some(scheduler) = self.scheduler() {
                signal.forward(scheduler);
            }
        }
    }

    fn drain_actions(&mut self) {
        if self.stopped {
            return;
        }
        while let Some(action) = self.scheduler().and_then(|s| s.next_action()) {
            tracing::trace!(action = action.as_str(), "running scheduler action");
            self.run_action(action);
        }
    }

    fn run_action(&mut self, action: SchedulerAction) {
        match action {
            SchedulerAction::SendBeginMainFrame(args) => {
                let begin = self.consumer.begin_main_frame_state(args);
                if self.awaiting_activation.is_some() {
                    self.deferred_begin_main_frame = Some(begin);
                } else {
                    self.begin_main_frame(begin);
                }
            }
            SchedulerAction::Animate(args) => self.consumer.animate(&args),
            SchedulerAction::Commit => self.commit(),
            SchedulerAction::ActivateSyncTree => self.activate(),
            SchedulerAction::DrawAndSwapIfPossible => self.draw(false),
            SchedulerAction::DrawAndSwapForced => self.draw(true),
            SchedulerAction::PrepareTiles => self.consumer.prepare_tiles(),
            SchedulerAction::BeginOutputSurfaceCreation => self.host.request_new_output_surface(),
        }
    }

    fn begin_main_frame(&mut self, begin: BeginMainFrameState) {
        let outcome = {
            let Self {
                main,
                host,
                scheduler,
                clock,
                ..
            } = self;
            run_begin_main_frame(main, host, &begin, clock, || {
                if let Some(scheduler) = scheduler.as_deref_mut() {
                    scheduler.notify_begin_main_frame_started();
                }
            })
        };
        match outcome {
            MainFrameOutcome::Aborted { reason, timing } => {
                self.consumer.record_abort(reason, &timing);
                if let Some(scheduler) = self.scheduler() {
                    scheduler.begin_main_frame_aborted(reason);
                }
            }
            MainFrameOutcome::ReadyToCommit { snapshot, timing } => {
                self.ready_commit = Some(ReadyCommit { snapshot, timing });
                if let Some(scheduler) = self.scheduler() {
                    scheduler.notify_ready_to_commit();
                }
            }
        }
        if self.main.needs_another_begin_main_frame()
            && let Some(scheduler) = self.scheduler()
        {
            scheduler.set_needs_begin_main_frame();
        }
    }

    fn commit(&mut self) {
        let Some(ReadyCommit { snapshot, timing }) = self.ready_commit.take() else {
            debug_assert!(false, "commit without a ready snapshot");
            return;
        };
        let waits_for_activation = self.main.take_commit_waits_for_activation();
        let capture = self.runner.capture();
        let ready = self.consumer.commit(snapshot, &timing, waits_for_activation);
        if let Some(scheduler) = self.scheduler() {
            scheduler.did_commit();
            if ready {
                scheduler.notify_ready_to_activate();
            }
        }
        if waits_for_activation {
            self.awaiting_activation = Some(capture);
        } else {
            drop(capture);
            self.finish_commit();
        }
    }

    fn finish_commit(&mut self) {
        complete_commit(&mut self.main, &mut self.host, &self.clock);
        if let Some(begin) = self.deferred_begin_main_frame.take() {
            self.begin_main_frame(begin);
        }
    }

    fn activate(&mut self) {
        self.consumer.activate();
        if let Some(capture) = self.awaiting_activation.take() {
            drop(capture);
            self.finish_commit();
        }
    }

    fn draw(&mut self, forced: bool) {
        let outcome = self.consumer.draw(forced);
        if let Some(scheduler) = self.scheduler() {
            scheduler.did_draw(outcome.result);
        }
        if outcome.swapped {
            self.host.did_complete_swap();
        } else if let Some(failure) = outcome.swap_failure() {
            self.host.break_swap_promises(failure);
        }
        self.return_resources();
        if outcome.context_lost() {
            self.lose_output_surface(true);
        }
    }

    fn return_resources(&mut self) {
        let returned = self.consumer.take_returned_resources();
        if !returned.is_empty() {
            self.host.resources_returned(returned);
        }
    }

    fn lose_output_surface(&mut self, notify_host: bool) {
        if self.main.output_surface_lost() {
            return;
        }
        tracing::warn!(handle = ?self.handle, "output surface lost");
        self.main.set_output_surface_lost(true);
        self.consumer.release_output_surface();
        if let Some(scheduler) = self.scheduler() {
            scheduler.did_lose_output_surface();
        }
        if notify_host {
            self.host.did_lose_output_surface();
        }
    }
}

impl<H, T> PipelineProxy for InlineProxy<H, T>
where
    H: SceneHost,
    T: ConsumerTree<Snapshot = H::Snapshot>,
{
    fn request_animate(&mut self) {
        self.request(PipelineStage::Animate);
    }

    fn request_update_layers(&mut self) {
        self.request(PipelineStage::UpdateLayers);
    }

    fn request_commit(&mut self) {
        self.request(PipelineStage::Commit);
    }

    fn set_defer_commits(&mut self, defer: bool) {
        self.main.set_defer_commits(defer);
    }

    fn set_commit_waits_for_activation(&mut self) {
        self.main.set_commit_waits_for_activation();
    }

    fn set_visible(&mut self, visible: bool) {
        self.main.set_visible(visible);
        if let Some(scheduler) = self.scheduler() {
            scheduler.set_visible(visible);
        }
        self.drain_actions();
    }

    fn set_can_draw(&mut self, can_draw: bool) {
        if let Some(scheduler) = self.scheduler() {
            scheduler.set_can_draw(can_draw);
        }
        self.drain_actions();
    }

    fn set_needs_redraw(&mut self) {
        if let Some(scheduler) = self.scheduler() {
            scheduler.set_needs_redraw();
            self.drain_actions();
        } else if self.main.visible() && !self.main.output_surface_lost() && !self.stopped {
            self.draw(false);
        }
    }

    fn notify_ready_to_activate(&mut self) {
        if let Some(scheduler) = self.scheduler() {
            scheduler.notify_ready_to_activate();
        }
        self.drain_actions();
    }

    fn notify_ready_to_draw(&mut self) {
        if let Some(scheduler) = self.scheduler() {
            scheduler.notify_ready_to_draw();
        }
        self.drain_actions();
    }

    fn did_lose_output_surface(&mut self) {
        self.lose_output_surface(false);
        self.drain_actions();
    }

    fn did_initialize_output_surface(&mut self, success: bool) {
        self.main.set_output_surface_lost(!success);
        if let Some(scheduler) = self.scheduler() {
            if success {
                scheduler.did_create_and_initialize_output_surface();
            } else {
                scheduler.did_lose_output_surface();
            }
        }
        if !success {
            tracing::warn!(handle = ?self.handle, "output surface initialization failed");
        }
        self.drain_actions();
    }

    fn set_input_throttled_until_commit(&mut self, throttled: bool) {
        self.main.set_input_throttled_until_commit(throttled);
    }

    fn input_throttled_until_commit(&self) -> bool {
        self.main.input_throttled_until_commit()
    }

    fn next_begin_frame_args(&mut self) -> BeginFrameArgs {
        self.ids.next_args(self.clock.now(), self.settings.interval)
    }

    fn begin_impl_frame(&mut self, args: BeginFrameArgs) {
        self.apply_signals();
        self.consumer.begin_impl_frame(&args);
        if let Some(scheduler) = self.scheduler() {
            scheduler.begin_impl_frame(args);
        }
        self.drain_actions();
    }

    fn on_begin_impl_frame_deadline(&mut self) {
        self.apply_signals();
        if let Some(scheduler) = self.scheduler() {
            scheduler.on_begin_impl_frame_deadline();
        }
        self.drain_actions();
    }

    fn finish_all_rendering(&mut self) -> Result<(), ProxyError> {
        if self.stopped {
            return Err(ProxyError::Stopped);
        }
        self.consumer.finish_all_rendering();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ProxyError> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        // Flush anything a held commit captured.
        self.awaiting_activation = None;
        self.deferred_begin_main_frame = None;
        self.consumer.release_output_surface();
        self.return_resources();
        self.registry.retire(self.handle);
        tracing::debug!(handle = ?self.handle, "inline proxy stopped");
        Ok(())
    }

    fn stage_snapshot(&self) -> StageSnapshot {
        self.main.stage_snapshot()
    }

    fn commit_requested(&self) -> bool {
        self.main.commit_requested()
    }

    fn consumer_signals(&self) -> ConsumerSignals {
        self.signals.clone()
    }

    fn timing_report(&self) -> TimingReport {
        self.consumer.history().lock().report()
    }
}

impl<H, T> Drop for InlineProxy<H, T>
where
    H: SceneHost,
    T: ConsumerTree<Snapshot = H::Snapshot>,
{
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::error!(%err, "failed to stop inline proxy");
        }
    }
}

#[cfg(test)]
mod tests {
    use mantle_core::abort::CommitEarlyOutReason;
    use mantle_core::host::{DrawResult, Mailbox, ResourceId, ReturnedResource, SyncToken};
    use mantle_core::scheduler::{Scheduler, SchedulerConfig};

    use super::super::testing::{Log, RecordingHost, RecordingTree};
    use super::*;
    use crate::resource::ResourceRefHolder;
    use crate::task_queue::TaskQueue;

    type Proxy = InlineProxy<RecordingHost, RecordingTree>;

    fn context(queue: &TaskQueue) -> ProducerContext {
        ProducerContext::new(BlockingTaskRunner::new(queue.handle()), ProxyRegistry::new())
    }

    fn scheduled(log: &Log, context: &ProducerContext) -> Proxy {
        let mut proxy = InlineProxy::new(
            RecordingHost::new(log),
            RecordingTree::new(log),
            Some(Box::new(Scheduler::new(SchedulerConfig::standard()))),
            context,
            ProxySettings::standard(),
        );
        proxy.set_visible(true);
        assert!(log.contains("host.request_new_output_surface"));
        proxy.did_initialize_output_surface(true);
        log.clear();
        proxy
    }

    fn unscheduled(log: &Log, context: &ProducerContext) -> Proxy {
        InlineProxy::new(
            RecordingHost::new(log),
            RecordingTree::new(log),
            None,
            context,
            ProxySettings::standard(),
        )
    }

    #[test]
    fn scheduled_frame_commits_activates_and_draws() {
        let queue = TaskQueue::new();
        let context = context(&queue);
        let log = Log::default();
        let mut proxy = scheduled(&log, &context);

        proxy.request_commit();
        assert!(proxy.commit_requested());
        proxy.run_frame();

        assert_eq!(
            log.entries(),
            [
                "host.will_begin_main_frame",
                "host.animate_layers",
                "host.layout",
                "host.update_layers",
                "host.finish_commit(1)",
                "tree.finish_commit(1)",
                "host.commit_complete",
                "host.did_begin_main_frame",
                "tree.activate",
                "tree.draw",
                "host.did_complete_swap",
            ]
        );
        assert!(!proxy.commit_requested());
        assert_eq!(proxy.timing_report().committed, 1);
    }

    #[test]
    fn requests_before_a_frame_coalesce_into_one_attempt() {
        let queue = TaskQueue::new();
        let context = context(&queue);
        let log = Log::default();
        let mut proxy = scheduled(&log, &context);

        proxy.request_animate();
        proxy.request_commit();
        proxy.request_update_layers();
        assert_eq!(proxy.stage_snapshot().max_requested, PipelineStage::Commit);
        proxy.run_frame();

        assert_eq!(log.count("host.will_begin_main_frame"), 1);
        assert_eq!(log.count("tree.finish_commit(1)"), 1);
        assert_eq!(proxy.stage_snapshot().final_stage, PipelineStage::Commit);

        proxy.run_frame();
        assert_eq!(
            log.count("host.will_begin_main_frame"),
            1,
            "nothing pending after the batch"
        );
    }

    #[test]
    fn deferred_commits_abort_until_resumed() {
        let queue = TaskQueue::new();
        let context = context(&queue);
        let log = Log::default();
        let mut proxy = scheduled(&log, &context);

        proxy.set_defer_commits(true);
        proxy.request_commit();
        proxy.run_frame();
        assert!(log.contains("host.break_swap_promises(CommitFails)"));
        assert!(!log.contains("host.will_begin_main_frame"));
        assert!(!log.contains("tree.finish_commit(1)"));
        assert_eq!(
            proxy.timing_report().aborted_for(CommitEarlyOutReason::DeferredCommit),
            1
        );
        assert!(proxy.commit_requested(), "deferral keeps the request");

        proxy.set_defer_commits(false);
        proxy.request_commit();
        proxy.run_frame();
        assert!(log.contains("tree.finish_commit(1)"));
        assert!(!proxy.commit_requested());
    }

    #[test]
    fn animate_only_attempt_reports_commit_complete_once() {
        let queue = TaskQueue::new();
        let context = context(&queue);
        let log = Log::default();
        let mut proxy = scheduled(&log, &context);

        proxy.request_animate();
        proxy.run_frame();

        assert_eq!(log.count("host.commit_complete"), 1);
        assert_eq!(log.count("host.did_begin_main_frame"), 1);
        assert!(log.contains("host.break_swap_promises(CommitNoUpdate)"));
        assert!(!log.contains("host.layout"));
        assert!(!log.contains("host.update_layers"));
        assert!(
            !log.entries().iter().any(|e| e.starts_with("tree.finish_commit")),
            "no snapshot reaches the consumer"
        );
        assert_eq!(
            proxy.timing_report().aborted_for(CommitEarlyOutReason::FinishedNoUpdates),
            1
        );
    }

    #[test]
    fn commit_raised_during_update_is_folded_into_the_attempt() {
        let queue = TaskQueue::new();
        let context = context(&queue);
        let log = Log::default();
        let mut proxy = scheduled(&log, &context);
        proxy.host_mut().updates = false;
        proxy.host_mut().commit_from_update = true;

        proxy.request_update_layers();
        proxy.run_frame();

        assert_eq!(log.count("host.will_begin_main_frame"), 1);
        assert!(log.contains("tree.finish_commit(1)"));
        assert!(!proxy.main.needs_another_begin_main_frame());
    }

    #[test]
    fn captured_releases_run_before_commit_complete() {
        let queue = TaskQueue::new();
        let context = context(&queue);
        let log = Log::default();
        let mut proxy = scheduled(&log, &context);

        let released = log.clone();
        let producer_ref = ResourceRefHolder::create(
            Mailbox(1),
            Box::new(move |_, _| released.push("released")),
            Arc::clone(&context.runner),
        );
        proxy.tree_mut().release_on_commit = Some(producer_ref.consumer_release_callback());
        drop(producer_ref);

        proxy.request_commit();
        proxy.run_frame();

        let released_at = log.position("released").expect("release ran");
        let completed_at = log.position("host.commit_complete").expect("commit completed");
        assert!(released_at < completed_at);
        assert!(queue.is_empty(), "the release never touched the task queue");
    }

    #[test]
    fn completion_waits_for_activation_when_asked() {
        let queue = TaskQueue::new();
        let context = context(&queue);
        let log = Log::default();
        let mut proxy = scheduled(&log, &context);
        proxy.tree_mut().ready_to_activate = false;

        let released = log.clone();
        let producer_ref = ResourceRefHolder::create(
            Mailbox(2),
            Box::new(move |_, _| released.push("released")),
            Arc::clone(&context.runner),
        );
        proxy.tree_mut().release_on_commit = Some(producer_ref.consumer_release_callback());
        drop(producer_ref);

        proxy.set_commit_waits_for_activation();
        proxy.request_commit();
        proxy.run_frame();
        assert!(log.contains("tree.finish_commit(1)"));
        assert!(!log.contains("host.commit_complete"));
        assert!(!log.contains("released"), "captured until activation");

        assert!(proxy.consumer_signals().ready_to_activate());
        proxy.process_signals();
        let activated_at = log.position("tree.activate").expect("activated");
        let released_at = log.position("released").expect("release ran");
        let completed_at = log.position("host.commit_complete").expect("commit completed");
        assert!(activated_at < released_at && released_at < completed_at);
    }

    #[test]
    #[should_panic(expected = "during a commit handshake")]
    fn waits_for_activation_is_rejected_while_a_commit_is_held() {
        let queue = TaskQueue::new();
        let context = context(&queue);
        let log = Log::default();
        let mut proxy = scheduled(&log, &context);
        proxy.tree_mut().ready_to_activate = false;

        proxy.set_commit_waits_for_activation();
        proxy.request_commit();
        proxy.run_frame();
        proxy.set_commit_waits_for_activation();
    }

    #[test]
    fn unscheduled_requests_composite_synchronously() {
        let queue = TaskQueue::new();
        let context = context(&queue);
        let log = Log::default();
        let mut proxy = unscheduled(&log, &context);
        proxy.set_visible(true);

        proxy.request_commit();
        assert_eq!(
            log.entries(),
            [
                "host.will_begin_main_frame",
                "host.animate_layers",
                "host.layout",
                "host.update_layers",
                "host.finish_commit(1)",
                "tree.finish_commit(1)",
                "host.commit_complete",
                "host.did_begin_main_frame",
                "tree.activate",
                "tree.draw",
                "host.did_complete_swap",
            ]
        );
    }

    #[test]
    fn invisible_attempt_keeps_its_request_for_later() {
        let queue = TaskQueue::new();
        let context = context(&queue);
        let log = Log::default();
        let mut proxy = unscheduled(&log, &context);

        proxy.set_input_throttled_until_commit(true);
        proxy.request_commit();
        assert!(log.contains("host.break_swap_promises(CommitFails)"));
        assert!(!log.contains("tree.draw"));
        assert_eq!(proxy.stage_snapshot().max_requested, PipelineStage::Commit);
        assert!(!proxy.input_throttled_until_commit());

        proxy.set_visible(true);
        proxy.request_animate();
        assert!(log.contains("tree.finish_commit(1)"), "restored commit request ran");
    }

    #[test]
    fn lost_context_during_draw_requests_a_new_surface() {
        let queue = TaskQueue::new();
        let context = context(&queue);
        let log = Log::default();
        let mut proxy = scheduled(&log, &context);
        proxy.tree_mut().prepare = DrawResult::AbortedContextLost;

        proxy.request_commit();
        proxy.run_frame();
        assert!(log.contains("tree.release_output_surface"));
        assert!(log.contains("host.did_lose_output_surface"));
        assert!(log.contains("host.request_new_output_surface"));
        assert!(!log.contains("host.did_complete_swap"));

        proxy.request_commit();
        proxy.run_frame();
        assert!(
            !log.contains("host.finish_commit(2)"),
            "no begin-main-frame without an output surface"
        );
    }

    #[test]
    fn returned_resources_reach_the_host_after_draw() {
        let queue = TaskQueue::new();
        let context = context(&queue);
        let log = Log::default();
        let mut proxy = scheduled(&log, &context);
        proxy.tree_mut().returned.push(ReturnedResource {
            id: ResourceId(7),
            sync_token: SyncToken(3),
            count: 2,
            lost: false,
        });

        proxy.request_commit();
        proxy.run_frame();
        assert_eq!(log.count("host.resources_returned(1)"), 1);
    }

    #[test]
    fn proxies_draw_ids_from_their_own_sources() {
        let queue = TaskQueue::new();
        let context = context(&queue);
        let log = Log::default();
        let mut a = unscheduled(&log, &context);
        let mut b = unscheduled(&log, &context);

        let a1 = a.next_begin_frame_args().id;
        let b1 = b.next_begin_frame_args().id;
        let a2 = a.next_begin_frame_args().id;
        assert_ne!(a1.source_id, b1.source_id);
        assert_eq!(a1.sequence, 1);
        assert_eq!(b1.sequence, 1);
        assert_eq!(a2.sequence, 2);
    }

    #[test]
    fn stopping_retires_the_signal_handle() {
        let queue = TaskQueue::new();
        let context = context(&queue);
        let log = Log::default();
        let mut proxy = scheduled(&log, &context);
        let signals = proxy.consumer_signals();
        assert!(signals.is_alive());

        proxy.stop().unwrap();
        assert!(!signals.needs_redraw());
        assert!(log.contains("tree.release_output_surface"));
        assert!(matches!(proxy.finish_all_rendering(), Err(ProxyError::Stopped)));
        proxy.stop().unwrap();
        assert_eq!(context.registry.live_count(), 0);
    }
}
