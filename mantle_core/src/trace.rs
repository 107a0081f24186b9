// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structured instrumentation for the pipeline.
//!
//! This module provides a [`TraceSink`] trait with one method per pipeline
//! event. All method bodies default to no-ops, so implementing only the events
//! you care about is fine.
//!
//! [`Tracer`] owns an optional boxed sink. When the `trace` feature is
//! **off**, every `Tracer` method compiles to nothing. When **on**, each
//! method performs a single `Option` branch before dispatching. A tracer is
//! `Send`, so the consumer side of a cross-thread pipeline can own one.
//!
//! [`MainFrameSummaryBuilder`] collects stage timestamps during one
//! begin-main-frame attempt and produces a [`MainFrameSummary`] at the end,
//! whether the attempt committed or aborted.

use alloc::boxed::Box;

use crate::abort::CommitEarlyOutReason;
use crate::history::MainFrameOutcome;
use crate::host::DrawResult;
use crate::stage::PipelineStage;
use crate::time::{Duration, HostTime};
use crate::timing::{BeginFrameArgs, BeginFrameId};

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when the consumer starts a frame interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BeginImplFrameEvent {
    /// Frame identity.
    pub id: BeginFrameId,
    /// Logical frame time.
    pub frame_time: HostTime,
    /// Draw deadline.
    pub deadline: HostTime,
    /// Nominal interval.
    pub interval: Duration,
}

impl From<&BeginFrameArgs> for BeginImplFrameEvent {
    fn from(args: &BeginFrameArgs) -> Self {
        Self {
            id: args.id,
            frame_time: args.frame_time,
            deadline: args.deadline,
            interval: args.interval,
        }
    }
}

/// Emitted when the producer enters a stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageEvent {
    /// Frame the attempt belongs to.
    pub id: BeginFrameId,
    /// Stage being entered.
    pub stage: PipelineStage,
    /// Final stage latched for the attempt at the time of entry.
    pub final_stage: PipelineStage,
    /// When the stage was entered.
    pub timestamp: HostTime,
}

/// Emitted when an attempt stops early.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MainFrameAbortedEvent {
    /// Frame the attempt belonged to.
    pub id: BeginFrameId,
    /// Why it stopped.
    pub reason: CommitEarlyOutReason,
    /// Stage the attempt had reached.
    pub reached: PipelineStage,
    /// When it stopped.
    pub timestamp: HostTime,
}

/// Emitted when the consumer finishes adopting a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommitEvent {
    /// Frame the snapshot belongs to.
    pub id: BeginFrameId,
    /// Whether completion was held until activation.
    pub waits_for_activation: bool,
    /// When the consumer side finished.
    pub timestamp: HostTime,
}

/// Emitted when a pending tree becomes active.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActivationEvent {
    /// Frame of the most recent commit, if any.
    pub id: Option<BeginFrameId>,
    /// When the tree was activated.
    pub timestamp: HostTime,
}

/// Emitted after every draw action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawEvent {
    /// Frame being drawn, if known.
    pub id: Option<BeginFrameId>,
    /// Whether the scheduler forced the draw.
    pub forced: bool,
    /// Outcome of prepare-to-draw.
    pub result: DrawResult,
    /// Whether the frame was swapped.
    pub swapped: bool,
    /// When the draw finished.
    pub timestamp: HostTime,
}

/// Per-attempt timing summary produced by [`MainFrameSummaryBuilder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MainFrameSummary {
    /// Frame the attempt belonged to.
    pub id: BeginFrameId,
    /// Final stage latched for the attempt.
    pub final_stage: PipelineStage,
    /// How the attempt ended.
    pub outcome: MainFrameOutcome,
    /// Animate stage duration in ticks (0 if not reached).
    pub animate_ticks: u64,
    /// Update-layers stage duration in ticks (0 if not reached).
    pub update_ticks: u64,
    /// Commit stage duration in ticks (0 if not reached).
    pub commit_ticks: u64,
    /// Whole attempt in ticks.
    pub total_ticks: u64,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the pipeline.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when the consumer starts a frame interval.
    fn on_begin_impl_frame(&mut self, e: &BeginImplFrameEvent) {
        _ = e;
    }

    /// Called when the producer enters a stage.
    fn on_stage(&mut self, e: &StageEvent) {
        _ = e;
    }

    /// Called when an attempt aborts.
    fn on_main_frame_aborted(&mut self, e: &MainFrameAbortedEvent) {
        _ = e;
    }

    /// Called when the consumer finishes a commit.
    fn on_commit(&mut self, e: &CommitEvent) {
        _ = e;
    }

    /// Called when a pending tree is activated.
    fn on_activation(&mut self, e: &ActivationEvent) {
        _ = e;
    }

    /// Called after each draw.
    fn on_draw(&mut self, e: &DrawEvent) {
        _ = e;
    }

    /// Called with a per-attempt summary.
    fn on_main_frame_summary(&mut self, s: &MainFrameSummary) {
        _ = s;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional owned [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing and
/// [`Tracer::new`] drops the sink immediately.
#[derive(Default)]
pub struct Tracer {
    #[cfg(feature = "trace")]
    sink: Option<Box<dyn TraceSink + Send>>,
}

impl core::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl Tracer {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: Box<dyn TraceSink + Send>) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {}
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Removes and returns the sink, leaving the tracer disabled.
    #[inline]
    pub fn take_sink(&mut self) -> Option<Box<dyn TraceSink + Send>> {
        #[cfg(feature = "trace")]
        {
            self.sink.take()
        }
        #[cfg(not(feature = "trace"))]
        {
            None
        }
    }

    /// Emits a [`BeginImplFrameEvent`].
    #[inline]
    pub fn begin_impl_frame(&mut self, e: &BeginImplFrameEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_begin_impl_frame(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`StageEvent`].
    #[inline]
    pub fn stage(&mut self, e: &StageEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_stage(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`MainFrameAbortedEvent`].
    #[inline]
    pub fn main_frame_aborted(&mut self, e: &MainFrameAbortedEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_main_frame_aborted(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`CommitEvent`].
    #[inline]
    pub fn commit(&mut self, e: &CommitEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_commit(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`ActivationEvent`].
    #[inline]
    pub fn activation(&mut self, e: &ActivationEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_activation(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`DrawEvent`].
    #[inline]
    pub fn draw(&mut self, e: &DrawEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_draw(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`MainFrameSummary`].
    #[inline]
    pub fn main_frame_summary(&mut self, s: &MainFrameSummary) {
        #[cfg(feature = "trace")]
        if let Some(sink) = &mut self.sink {
            sink.on_main_frame_summary(s);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = s;
        }
    }
}

// ---------------------------------------------------------------------------
// MainFrameSummaryBuilder
// ---------------------------------------------------------------------------

/// Collects stage entry times during one attempt and produces a
/// [`MainFrameSummary`].
#[derive(Debug)]
pub struct MainFrameSummaryBuilder {
    id: BeginFrameId,
    started_at: HostTime,
    final_stage: PipelineStage,
    stage_starts: [Option<HostTime>; 3],
}

impl MainFrameSummaryBuilder {
    /// Starts a summary for the attempt belonging to `id`.
    #[must_use]
    pub fn new(id: BeginFrameId, started_at: HostTime) -> Self {
        Self {
            id,
            started_at,
            final_stage: PipelineStage::None,
            stage_starts: [None; 3],
        }
    }

    /// Records the latched final stage.
    pub fn set_final_stage(&mut self, stage: PipelineStage) {
        self.final_stage = stage;
    }

    /// Records entry into `stage`. Entering [`PipelineStage::None`] is
    /// ignored.
    pub fn stage_begin(&mut self, stage: PipelineStage, t: HostTime) {
        if let Some(idx) = stage_index(stage) {
            self.stage_starts[idx] = Some(t);
        }
    }

    /// Consumes the builder. Each stage lasts until the next recorded stage
    /// or `finished_at`.
    #[must_use]
    pub fn finish(self, outcome: MainFrameOutcome, finished_at: HostTime) -> MainFrameSummary {
        let mut durations = [0_u64; 3];
        for (idx, duration) in durations.iter_mut().enumerate() {
            let Some(start) = self.stage_starts[idx] else {
                continue;
            };
            let end = self.stage_starts[idx + 1..]
                .iter()
                .flatten()
                .next()
                .copied()
                .unwrap_or(finished_at);
            *duration = end.saturating_duration_since(start).ticks();
        }
        MainFrameSummary {
            id: self.id,
            final_stage: self.final_stage,
            outcome,
            animate_ticks: durations[0],
            update_ticks: durations[1],
            commit_ticks: durations[2],
            total_ticks: finished_at.saturating_duration_since(self.started_at).ticks(),
        }
    }
}

/// Maps a stage to an array index.
const fn stage_index(stage: PipelineStage) -> Option<usize> {
    match stage {
        PipelineStage::None => None,
        PipelineStage::Animate => Some(0),
        PipelineStage::UpdateLayers => Some(1),
        PipelineStage::Commit => Some(2),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
