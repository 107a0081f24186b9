// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Consumer-side frame timing bookkeeping.
//!
//! Every begin-main-frame attempt ends in exactly one record here, whether it
//! committed or aborted, so frame pacing statistics stay consistent even when
//! nothing was drawn.

use crate::abort::CommitEarlyOutReason;
use crate::time::Duration;
use crate::timing::{BeginFrameId, MainFrameTiming};

/// How an attempt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MainFrameOutcome {
    /// The snapshot reached the consumer.
    Committed,
    /// The attempt stopped early.
    Aborted(CommitEarlyOutReason),
}

/// One entry in the history ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MainFrameRecord {
    /// Frame the attempt belonged to.
    pub id: BeginFrameId,
    /// How it ended.
    pub outcome: MainFrameOutcome,
    /// Send-to-finish time.
    pub duration: Duration,
}

/// Exponential moving average tracker.
#[derive(Clone, Copy, Debug)]
struct Ema {
    value: f32,
    alpha: f32,
    initialized: bool,
}

impl Ema {
    const fn new(alpha: f32) -> Self {
        Self {
            value: 0.0,
            alpha,
            initialized: false,
        }
    }

    fn update(&mut self, sample: f32) {
        if self.initialized {
            self.value = self.alpha * sample + (1.0 - self.alpha) * self.value;
        } else {
            self.value = sample;
            self.initialized = true;
        }
    }

    const fn get(&self) -> f32 {
        self.value
    }
}

/// Aggregated counters returned by [`FrameTimingHistory::report`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimingReport {
    /// Attempts that committed.
    pub committed: u64,
    /// Aborted attempts, indexed by [`CommitEarlyOutReason::index`].
    pub aborted: [u64; 4],
    /// Smoothed send-to-commit latency.
    pub main_frame_latency: Duration,
}

impl TimingReport {
    /// Total attempts observed.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.committed + self.aborted.iter().sum::<u64>()
    }

    /// Aborts recorded for one reason.
    #[must_use]
    pub const fn aborted_for(&self, reason: CommitEarlyOutReason) -> u64 {
        self.aborted[reason.index()]
    }
}

/// Fixed-size history of recent attempts with running counters.
#[derive(Debug)]
pub struct FrameTimingHistory<const N: usize> {
    records: [Option<MainFrameRecord>; N],
    cursor: usize,
    committed: u64,
    aborted: [u64; 4],
    latency: Ema,
}

impl<const N: usize> Default for FrameTimingHistory<N> {
    fn default() -> Self {
        Self::new(0.2)
    }
}

impl<const N: usize> FrameTimingHistory<N> {
    /// Creates an empty history whose latency EMA uses `alpha` (0.0–1.0).
    #[must_use]
    pub const fn new(alpha: f32) -> Self {
        Self {
            records: [None; N],
            cursor: 0,
            committed: 0,
            aborted: [0; 4],
            latency: Ema::new(alpha),
        }
    }

    /// Records a committed attempt.
    pub fn record_commit(&mut self, timing: &MainFrameTiming) {
        self.committed = self.committed.saturating_add(1);
        #[expect(
            clippy::cast_precision_loss,
            reason = "latency samples are far below f32 precision limits"
        )]
        self.latency.update(timing.duration().ticks() as f32);
        self.push(timing, MainFrameOutcome::Committed);
    }

    /// Records an aborted attempt.
    pub fn record_abort(&mut self, timing: &MainFrameTiming, reason: CommitEarlyOutReason) {
        let slot = &mut self.aborted[reason.index()];
        *slot = slot.saturating_add(1);
        self.push(timing, MainFrameOutcome::Aborted(reason));
    }

    fn push(&mut self, timing: &MainFrameTiming, outcome: MainFrameOutcome) {
        if N == 0 {
            return;
        }
        self.records[self.cursor % N] = Some(MainFrameRecord {
            id: timing.id,
            outcome,
            duration: timing.duration(),
        });
        self.cursor = (self.cursor + 1) % N;
    }

    /// Smoothed send-to-commit latency. Aborts do not contribute.
    #[must_use]
    pub fn main_frame_latency_estimate(&self) -> Duration {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "EMA-smoothed latency in ticks fits in u64"
        )]
        Duration(self.latency.get() as u64)
    }

    /// Returns the retained records, oldest first.
    pub fn records(&self) -> impl Iterator<Item = &MainFrameRecord> + '_ {
        (0..N).filter_map(move |i| self.records[(self.cursor + i) % N].as_ref())
    }

    /// Returns the running counters.
    #[must_use]
    pub fn report(&self) -> TimingReport {
        TimingReport {
            committed: self.committed,
            aborted: self.aborted,
            main_frame_latency: self.main_frame_latency_estimate(),
        }
    }
}
