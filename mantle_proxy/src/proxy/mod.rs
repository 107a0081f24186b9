// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The pipeline proxy contract and its two strategies.
//!
//! A proxy sits between the producer (a [`SceneHost`]) and the consumer (a
//! [`ConsumerTree`]) and executes whatever its [`FrameScheduler`] asks for.
//!
//! - [`InlineProxy`] runs both sides on the calling thread. Its scheduler is
//!   optional; without one, every request composites synchronously.
//! - [`CrossThreadProxy`] owns a consumer thread and talks to it with
//!   value-carrying messages. The producer blocks only at start-up, at the
//!   commit hand-off, in `finish_all_rendering`, and in `stop`.
//!
//! Both strategies drive the producer side through the same free function,
//! [`run_begin_main_frame`], operating on a [`MainFrameState`] each strategy
//! owns.
//!
//! [`SceneHost`]: mantle_core::host::SceneHost
//! [`ConsumerTree`]: mantle_core::host::ConsumerTree
//! [`FrameScheduler`]: mantle_core::scheduler::FrameScheduler

mod consumer;
mod cross_thread;
mod inline;
mod main_frame;
mod signals;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use mantle_core::history::TimingReport;
use mantle_core::stage::StageSnapshot;
use mantle_core::time::Duration;
use mantle_core::timing::BeginFrameArgs;

use crate::blocking::BlockingTaskRunner;
use crate::error::ProxyError;
use crate::registry::ProxyRegistry;

pub use consumer::HISTORY_LEN;
pub use cross_thread::{ConsumerParts, CrossThreadProxy};
pub use inline::InlineProxy;
pub use main_frame::{MainFrameOutcome, MainFrameState, complete_commit, run_begin_main_frame};
pub use signals::{ConsumerSignal, ConsumerSignals};

/// The contract both proxy strategies implement.
///
/// Every method is called by the producer-side embedder. Scheduler actions
/// are not part of the contract: the proxy executes them internally as the
/// scheduler hands them out.
pub trait PipelineProxy {
    /// Requests an animation step.
    fn request_animate(&mut self);
    /// Requests a layer update.
    fn request_update_layers(&mut self);
    /// Requests a commit.
    fn request_commit(&mut self);
    /// While set, attempts abort with `DeferredCommit`.
    fn set_defer_commits(&mut self, defer: bool);
    /// Holds the next commit's completion until its tree is activated.
    ///
    /// # Panics
    ///
    /// Panics if a commit handshake is in progress.
    fn set_commit_waits_for_activation(&mut self);
    /// Output visibility changed.
    fn set_visible(&mut self, visible: bool);
    /// Whether the consumer may draw.
    fn set_can_draw(&mut self, can_draw: bool);
    /// The active tree must be drawn again.
    fn set_needs_redraw(&mut self);
    /// Forwarded to the scheduler.
    fn notify_ready_to_activate(&mut self);
    /// Forwarded to the scheduler.
    fn notify_ready_to_draw(&mut self);
    /// The embedder lost the output surface.
    fn did_lose_output_surface(&mut self);
    /// Answer to a new-output-surface request.
    fn did_initialize_output_surface(&mut self, success: bool);
    /// Throttles input until the next commit completes or aborts.
    fn set_input_throttled_until_commit(&mut self, throttled: bool);
    /// Whether input is throttled.
    fn input_throttled_until_commit(&self) -> bool;
    /// Args for the next frame, from the proxy's own id source.
    fn next_begin_frame_args(&mut self) -> BeginFrameArgs;
    /// Starts a frame interval.
    fn begin_impl_frame(&mut self, args: BeginFrameArgs);
    /// The current interval's deadline was reached.
    fn on_begin_impl_frame_deadline(&mut self);
    /// Blocks until the consumer finished all submitted rendering.
    fn finish_all_rendering(&mut self) -> Result<(), ProxyError>;
    /// Tears the consumer side down. Idempotent.
    fn stop(&mut self) -> Result<(), ProxyError>;
    /// Producer-side stage state.
    fn stage_snapshot(&self) -> StageSnapshot;
    /// Whether a commit is requested or underway.
    fn commit_requested(&self) -> bool;
    /// A sendable handle for the consumer tree's asynchronous signals.
    fn consumer_signals(&self) -> ConsumerSignals;
    /// Consumer-side timing counters.
    fn timing_report(&self) -> TimingReport;

    /// Runs one whole frame interval: begin-frame then deadline.
    fn run_frame(&mut self) {
        let args = self.next_begin_frame_args();
        self.begin_impl_frame(args);
        self.on_begin_impl_frame_deadline();
    }
}

/// Producer-thread services shared by every proxy the embedder creates.
#[derive(Clone, Debug)]
pub struct ProducerContext {
    /// Runner of the producer thread.
    pub runner: Arc<BlockingTaskRunner>,
    /// Liveness registry for consumer-side callbacks.
    pub registry: ProxyRegistry,
}

impl ProducerContext {
    /// Bundles a runner and a registry.
    #[must_use]
    pub fn new(runner: Arc<BlockingTaskRunner>, registry: ProxyRegistry) -> Self {
        Self { runner, registry }
    }
}

/// Configuration for either proxy strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProxySettings {
    /// Nominal frame interval in nanoseconds.
    pub interval: Duration,
    /// Name given to the consumer thread.
    pub consumer_thread_name: &'static str,
}

impl ProxySettings {
    /// 60 Hz.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            // ~16.67ms at 1ns tick resolution.
            interval: Duration::from_refresh_rate(60),
            consumer_thread_name: "mantle-consumer",
        }
    }

    /// 120 Hz.
    #[must_use]
    pub const fn high_refresh() -> Self {
        Self {
            interval: Duration::from_refresh_rate(120),
            consumer_thread_name: "mantle-consumer",
        }
    }
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self::standard()
    }
}
