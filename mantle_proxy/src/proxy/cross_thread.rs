// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Two-thread strategy.
//!
//! [`CrossThreadProxy`] stays on the producer thread and owns the host. The
//! consumer tree and the scheduler move to a dedicated thread at
//! [`CrossThreadProxy::start`]. The two sides share nothing mutable: every
//! interaction is a message carrying values.
//!
//! ```text
//!  producer thread                         consumer thread
//!  ───────────────                         ───────────────
//!  request_commit ── SetNeedsBeginMainFrame ──▶ scheduler
//!                 ◀── BeginMainFrame(state) ── SendBeginMainFrame
//!  run attempt    ── BeginMainFrameStarted ──▶
//!  capture scope  ── StartCommit{snapshot} ──▶ Commit, [ActivateSyncTree]
//!    (blocked)    ◀──────────── done ──────────
//!  commit_complete
//! ```
//!
//! The producer only blocks at start-up, during the commit hand-off, in
//! `finish_all_rendering` and in `stop`. Messages from the consumer are
//! delivered when the embedder calls
//! [`process_main_messages`](CrossThreadProxy::process_main_messages).

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, never, select, unbounded};
use mantle_core::abort::{CommitEarlyOutReason, SwapPromiseFailure};
use mantle_core::history::TimingReport;
use mantle_core::host::{ConsumerTree, ReturnedResource, SceneHost};
use mantle_core::scheduler::{FrameScheduler, SchedulerAction};
use mantle_core::stage::{PipelineStage, StageRequest, StageSnapshot};
use mantle_core::timing::{BeginFrameArgs, BeginFrameIdSource, BeginMainFrameState, MainFrameTiming};
use mantle_core::trace::Tracer;

use super::consumer::{ConsumerState, SharedHistory};
use super::main_frame::{
    MainFrameOutcome, MainFrameState, abandon_commit, complete_commit, run_begin_main_frame,
};
use super::signals::{ConsumerSignal, ConsumerSignals};
use super::{PipelineProxy, ProducerContext, ProxySettings};
use crate::blocking::BlockingTaskRunner;
use crate::clock::HostClock;
use crate::error::ProxyError;
use crate::registry::{ProxyHandle, ProxyRegistry};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Producer → consumer.
enum ImplMessage<S> {
    SetVisible(bool),
    SetNeedsBeginMainFrame,
    Signal(ConsumerSignal),
    BeginImplFrame(BeginFrameArgs),
    Deadline,
    BeginMainFrameStarted,
    MainFrameAborted {
        reason: CommitEarlyOutReason,
        timing: MainFrameTiming,
    },
    StartCommit {
        snapshot: S,
        waits_for_activation: bool,
        timing: MainFrameTiming,
        done: Sender<()>,
    },
    LoseOutputSurface,
    OutputSurfaceInitialized(bool),
    FinishAllRendering(Sender<()>),
    Stop(Sender<()>),
}

/// Consumer → producer.
#[derive(Debug)]
enum MainMessage {
    BeginMainFrame(BeginMainFrameState),
    DidCompleteSwap,
    BreakSwapPromises(SwapPromiseFailure),
    RequestNewOutputSurface,
    DidLoseOutputSurface,
    ResourcesReturned(Vec<ReturnedResource>),
}

// ---------------------------------------------------------------------------
// Consumer parts
// ---------------------------------------------------------------------------

/// Everything that moves to the consumer thread.
pub struct ConsumerParts<T> {
    tree: T,
    scheduler: Box<dyn FrameScheduler + Send>,
    tracer: Tracer,
}

impl<T> fmt::Debug for ConsumerParts<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerParts").finish_non_exhaustive()
    }
}

impl<T> ConsumerParts<T> {
    /// Bundles a tree with the scheduler that drives it.
    #[must_use]
    pub fn new(tree: T, scheduler: Box<dyn FrameScheduler + Send>) -> Self {
        Self {
            tree,
            scheduler,
            tracer: Tracer::none(),
        }
    }

    /// Attaches a tracer for commit, activation and draw events.
    #[must_use]
    pub fn with_tracer(mut self, tracer: Tracer) -> Self {
        self.tracer = tracer;
        self
    }
}

// ---------------------------------------------------------------------------
// Producer side
// ---------------------------------------------------------------------------

/// Producer on the calling thread, consumer on its own thread.
pub struct CrossThreadProxy<H: SceneHost> {
    host: H,
    main: MainFrameState,
    to_consumer: Sender<ImplMessage<H::Snapshot>>,
    from_consumer: Receiver<MainMessage>,
    signals: ConsumerSignals,
    history: SharedHistory,
    runner: Arc<BlockingTaskRunner>,
    registry: ProxyRegistry,
    handle: ProxyHandle,
    ids: BeginFrameIdSource,
    clock: HostClock,
    settings: ProxySettings,
    consumer_thread: Option<JoinHandle<()>>,
    /// Set once `stop` begins. Begin-main-frames still queued are dropped.
    stopping: bool,
}

impl<H: SceneHost> fmt::Debug for CrossThreadProxy<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrossThreadProxy")
            .field("handle", &self.handle)
            .field("stages", &self.main.stage_snapshot())
            .field("running", &self.consumer_thread.is_some())
            .field("stopping", &self.stopping)
            .finish_non_exhaustive()
    }
}

impl<H: SceneHost> CrossThreadProxy<H> {
    /// Spawns the consumer thread and waits until it is running.
    pub fn start<T>(
        host: H,
        consumer: ConsumerParts<T>,
        context: &ProducerContext,
        settings: ProxySettings,
    ) -> Result<Self, ProxyError>
    where
        T: ConsumerTree<Snapshot = H::Snapshot> + Send + 'static,
    {
        debug_assert!(
            context.runner.belongs_to_current_thread(),
            "cross-thread proxies are driven from the producer thread"
        );
        let handle = context.registry.register();
        let (signals, signal_rx) = ConsumerSignals::new(context.registry.clone(), handle);
        let (to_consumer, messages) = unbounded();
        let (to_main, from_consumer) = unbounded();
        let (ready_tx, ready_rx) = bounded(1);

        let clock = HostClock::new();
        let state = ConsumerState::new(consumer.tree, consumer.tracer, clock);
        let history = state.history();
        let consumer_loop = ConsumerLoop {
            state,
            scheduler: consumer.scheduler,
            to_main,
            ready_commit: None,
            awaiting_activation: None,
        };

        let spawned = thread::Builder::new()
            .name(settings.consumer_thread_name.to_owned())
            .spawn(move || {
                if ready_tx.send(()).is_ok() {
                    consumer_loop.run(&messages, signal_rx);
                }
            });
        let join = match spawned {
            Ok(join) => join,
            Err(err) => {
                context.registry.retire(handle);
                return Err(ProxyError::Spawn(err));
            }
        };
        if ready_rx.recv().is_err() {
            context.registry.retire(handle);
            return Err(match join.join() {
                Ok(()) => ProxyError::ConsumerGone,
                Err(_) => ProxyError::ConsumerPanicked,
            });
        }
        tracing::debug!(?handle, thread = settings.consumer_thread_name, "cross-thread proxy started");

        Ok(Self {
            host,
            main: MainFrameState::new(),
            to_consumer,
            from_consumer,
            signals,
            history,
            runner: Arc::clone(&context.runner),
            registry: context.registry.clone(),
            handle,
            ids: BeginFrameIdSource::new(handle.slot()),
            clock,
            settings,
            consumer_thread: Some(join),
            stopping: false,
        })
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

    /// Replaces the tracer receiving stage and abort events.
    pub fn set_producer_tracer(&mut self, tracer: Tracer) {
        self.main.set_tracer(tracer);
    }

    /// Handles every message the consumer has sent so far. Returns how many
    /// were handled.
    pub fn process_main_messages(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.from_consumer.try_recv() {
            self.handle_main_message(message);
            handled += 1;
        }
        handled
    }

    /// Like [`process_main_messages`](Self::process_main_messages), but waits
    /// up to `timeout` for the first message.
    pub fn process_main_messages_timeout(&mut self, timeout: std::time::Duration) -> usize {
        match self.from_consumer.recv_timeout(timeout) {
            Ok(message) => {
                self.handle_main_message(message);
                1 + self.process_main_messages()
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => 0,
        }
    }

    fn post(&self, message: ImplMessage<H::Snapshot>) -> bool {
        if self.consumer_thread.is_none() {
            return false;
        }
        let sent = self.to_consumer.send(message).is_ok();
        if !sent {
            tracing::warn!(handle = ?self.handle, "consumer thread is gone; message dropped");
        }
        sent
    }

    fn request(&mut self, stage: PipelineStage) {
        if self.main.request(stage) == StageRequest::ScheduleBeginFrame {
            self.post(ImplMessage::SetNeedsBeginMainFrame);
        }
    }

    fn handle_main_message(&mut self, message: MainMessage) {
        match message {
            MainMessage::BeginMainFrame(begin) if self.stopping => {
                tracing::debug!(frame = ?begin.args.id, "begin main frame dropped during shutdown");
            }
            MainMessage::BeginMainFrame(begin) => self.begin_main_frame(&begin),
            MainMessage::DidCompleteSwap => self.host.did_complete_swap(),
            MainMessage::BreakSwapPromises(reason) => self.host.break_swap_promises(reason),
            MainMessage::RequestNewOutputSurface => self.host.request_new_output_surface(),
            MainMessage::DidLoseOutputSurface => {
                self.main.set_output_surface_lost(true);
                self.host.did_lose_output_surface();
            }
            MainMessage::ResourcesReturned(resources) => self.host.resources_returned(resources),
        }
    }

    fn begin_main_frame(&mut self, begin: &BeginMainFrameState) {
        let outcome = {
            let Self {
                main,
                host,
                to_consumer,
                clock,
                ..
            } = self;
            run_begin_main_frame(main, host, begin, clock, || {
                let _ = to_consumer.send(ImplMessage::BeginMainFrameStarted);
            })
        };
        match outcome {
            MainFrameOutcome::Aborted { reason, timing } => {
                self.post(ImplMessage::MainFrameAborted { reason, timing });
            }
            MainFrameOutcome::ReadyToCommit { snapshot, timing } => {
                self.commit_handshake(snapshot, timing);
            }
        }
        if self.main.needs_another_begin_main_frame() {
            self.post(ImplMessage::SetNeedsBeginMainFrame);
        }
    }

    /// Blocks until the consumer has adopted `snapshot`, with same-thread
    /// posts captured so they run before the host hears commit-complete.
    fn commit_handshake(&mut self, snapshot: H::Snapshot, timing: MainFrameTiming) {
        let waits_for_activation = self.main.take_commit_waits_for_activation();
        let capture = self.runner.capture();
        let (done, completed) = bounded(1);
        let posted = self.post(ImplMessage::StartCommit {
            snapshot,
            waits_for_activation,
            timing,
            done,
        });
        let adopted = posted && completed.recv().is_ok();
        drop(capture);
        if adopted {
            complete_commit(&mut self.main, &mut self.host, &self.clock);
        } else {
            tracing::error!(handle = ?self.handle, "consumer thread exited during a commit handshake");
            abandon_commit(&mut self.main, &mut self.host);
        }
    }

    fn round_trip(&self, message: impl FnOnce(Sender<()>) -> ImplMessage<H::Snapshot>) -> bool {
        let (done, answered) = bounded(1);
        self.post(message(done)) && answered.recv().is_ok()
    }
}

impl<H: SceneHost> PipelineProxy for CrossThreadProxy<H> {
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
        self.post(ImplMessage::SetVisible(visible));
    }

    fn set_can_draw(&mut self, can_draw: bool) {
        self.post(ImplMessage::Signal(ConsumerSignal::CanDraw(can_draw)));
    }

    fn set_needs_redraw(&mut self) {
        self.post(ImplMessage::Signal(ConsumerSignal::NeedsRedraw));
    }

    fn notify_ready_to_activate(&mut self) {
        self.post(ImplMessage::Signal(ConsumerSignal::ReadyToActivate));
    }

    fn notify_ready_to_draw(&mut self) {
        self.post(ImplMessage::Signal(ConsumerSignal::ReadyToDraw));
    }

    fn did_lose_output_surface(&mut self) {
        self.main.set_output_surface_lost(true);
        self.post(ImplMessage::LoseOutputSurface);
    }

    fn did_initialize_output_surface(&mut self, success: bool) {
        self.main.set_output_surface_lost(!success);
        if !success {
            tracing::warn!(handle = ?self.handle, "output surface initialization failed");
        }
        self.post(ImplMessage::OutputSurfaceInitialized(success));
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
        self.post(ImplMessage::BeginImplFrame(args));
    }

    fn on_begin_impl_frame_deadline(&mut self) {
        self.post(ImplMessage::Deadline);
    }

    fn finish_all_rendering(&mut self) -> Result<(), ProxyError> {
        if self.consumer_thread.is_none() {
            return Err(ProxyError::Stopped);
        }
        if self.round_trip(ImplMessage::FinishAllRendering) {
            Ok(())
        } else {
            Err(ProxyError::ConsumerGone)
        }
    }

    fn stop(&mut self) -> Result<(), ProxyError> {
        if self.consumer_thread.is_none() {
            return Ok(());
        }
        self.stopping = true;
        let answered = self.round_trip(ImplMessage::Stop);
        self.registry.retire(self.handle);
        let joined = self.consumer_thread.take().map(JoinHandle::join);
        // Returned resources and swap notifications sent before shutdown.
        // Begin-main-frames are dropped while stopping.
        self.process_main_messages();
        tracing::debug!(handle = ?self.handle, "cross-thread proxy stopped");
        match joined {
            Some(Err(_)) => Err(ProxyError::ConsumerPanicked),
            _ if !answered => Err(ProxyError::ConsumerGone),
            _ => Ok(()),
        }
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
        self.history.lock().report()
    }
}

impl<H: SceneHost> Drop for CrossThreadProxy<H> {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::error!(%err, "failed to stop cross-thread proxy");
        }
    }
}

// ---------------------------------------------------------------------------
// Consumer side
// ---------------------------------------------------------------------------

struct PendingCommit<S> {
    snapshot: S,
    waits_for_activation: bool,
    timing: MainFrameTiming,
    done: Sender<()>,
}

enum Event<S> {
    Message(Option<ImplMessage<S>>),
    Signal(Option<ConsumerSignal>),
}

enum Flow {
    Continue,
    Stop(Sender<()>),
}

struct ConsumerLoop<T: ConsumerTree> {
    state: ConsumerState<T>,
    scheduler: Box<dyn FrameScheduler + Send>,
    to_main: Sender<MainMessage>,
    ready_commit: Option<PendingCommit<T::Snapshot>>,
    /// Releases the blocked producer once the committed tree is active.
    awaiting_activation: Option<Sender<()>>,
}

impl<T: ConsumerTree> ConsumerLoop<T> {
    fn run(mut self, messages: &Receiver<ImplMessage<T::Snapshot>>, signals: Receiver<ConsumerSignal>) {
        let mut signals = signals;
        loop {
            let event = select! {
                recv(messages) -> message => Event::Message(message.ok()),
                recv(signals) -> signal => Event::Signal(signal.ok()),
            };
            match event {
                Event::Message(Some(message)) => {
                    if let Flow::Stop(done) = self.handle_message(message) {
                        self.shutdown();
                        let _ = done.send(());
                        return;
                    }
                }
                // Producer dropped without stopping.
                Event::Message(None) => break,
                Event::Signal(Some(signal)) => self.handle_signal(signal),
                Event::Signal(None) => signals = never(),
            }
            self.drain_actions();
        }
        self.shutdown();
    }

    fn send(&self, message: MainMessage) {
        if self.to_main.send(message).is_err() {
            tracing::trace!("producer side is gone");
        }
    }

    fn handle_message(&mut self, message: ImplMessage<T::Snapshot>) -> Flow {
        match message {
            ImplMessage::SetVisible(visible) => self.scheduler.set_visible(visible),
            ImplMessage::SetNeedsBeginMainFrame => self.scheduler.set_needs_begin_main_frame(),
            ImplMessage::Signal(signal) => self.handle_signal(signal),
            ImplMessage::BeginImplFrame(args) => {
                self.state.begin_impl_frame(&args);
                self.scheduler.begin_impl_frame(args);
            }
            ImplMessage::Deadline => self.scheduler.on_begin_impl_frame_deadline(),
            ImplMessage::BeginMainFrameStarted => self.scheduler.notify_begin_main_frame_started(),
            ImplMessage::MainFrameAborted { reason, timing } => {
                self.state.record_abort(reason, &timing);
                self.scheduler.begin_main_frame_aborted(reason);
            }
            ImplMessage::StartCommit {
                snapshot,
                waits_for_activation,
                timing,
                done,
            } => {
                self.ready_commit = Some(PendingCommit {
                    snapshot,
                    waits_for_activation,
                    timing,
                    done,
                });
                self.scheduler.notify_ready_to_commit();
            }
            ImplMessage::LoseOutputSurface => self.lose_output_surface(false),
            ImplMessage::OutputSurfaceInitialized(true) => {
                self.scheduler.did_create_and_initialize_output_surface();
            }
            ImplMessage::OutputSurfaceInitialized(false) => self.scheduler.did_lose_output_surface(),
            ImplMessage::FinishAllRendering(done) => {
                self.state.finish_all_rendering();
                let _ = done.send(());
            }
            ImplMessage::Stop(done) => return Flow::Stop(done),
        }
        Flow::Continue
    }

    fn handle_signal(&mut self, signal: ConsumerSignal) {
        if signal == ConsumerSignal::OutputSurfaceLost {
            self.lose_output_surface(true);
        } else {
            signal.forward(&mut *self.scheduler);
        }
    }

    fn drain_actions(&mut self) {
        while let Some(action) = self.scheduler.next_action() {
            tracing::trace!(action = action.as_str(), "running scheduler action");
            self.run_action(action);
        }
    }

    fn run_action(&mut self, action: SchedulerAction) {
        match action {
            SchedulerAction::SendBeginMainFrame(args) => {
                let begin = self.state.begin_main_frame_state(args);
                self.send(MainMessage::BeginMainFrame(begin));
            }
            SchedulerAction::Animate(args) => self.state.animate(&args),
            SchedulerAction::Commit => self.commit(),
            SchedulerAction::ActivateSyncTree => {
                self.state.activate();
                if let Some(done) = self.awaiting_activation.take() {
                    let _ = done.send(());
                }
            }
            SchedulerAction::DrawAndSwapIfPossible => self.draw(false),
            SchedulerAction::DrawAndSwapForced => self.draw(true),
            SchedulerAction::PrepareTiles => self.state.prepare_tiles(),
            SchedulerAction::BeginOutputSurfaceCreation => {
                self.send(MainMessage::RequestNewOutputSurface);
            }
        }
    }

    fn commit(&mut self) {
        let Some(pending) = self.ready_commit.take() else {
            debug_assert!(false, "commit without a ready snapshot");
            return;
        };
        let ready = self.state.commit(
            pending.snapshot,
            &pending.timing,
            pending.waits_for_activation,
        );
        self.scheduler.did_commit();
        if ready {
            self.scheduler.notify_ready_to_activate();
        }
        if pending.waits_for_activation {
            self.awaiting_activation = Some(pending.done);
        } else {
            let _ = pending.done.send(());
        }
    }

    fn draw(&mut self, forced: bool) {
        let outcome = self.state.draw(forced);
        self.scheduler.did_draw(outcome.result);
        if outcome.swapped {
            self.send(MainMessage::DidCompleteSwap);
        } else if let Some(failure) = outcome.swap_failure() {
            self.send(MainMessage::BreakSwapPromises(failure));
        }
        self.return_resources();
        if outcome.context_lost() {
            self.lose_output_surface(true);
        }
    }

    fn return_resources(&mut self) {
        let returned = self.state.take_returned_resources();
        if !returned.is_empty() {
            self.send(MainMessage::ResourcesReturned(returned));
        }
    }

    fn lose_output_surface(&mut self, notify_main: bool) {
        tracing::warn!("output surface lost");
        self.state.release_output_surface();
        self.scheduler.did_lose_output_surface();
        if notify_main {
            self.send(MainMessage::DidLoseOutputSurface);
        }
    }

    fn shutdown(&mut self) {
        // Unblock a producer still waiting on activation.
        if let Some(done) = self.awaiting_activation.take() {
            let _ = done.send(());
        }
        self.ready_commit = None;
        self.state.release_output_surface();
        self.return_resources();
        tracing::debug!("consumer thread shut down");
    }
}
