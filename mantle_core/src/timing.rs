// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Begin-frame identity and the values carried through one attempt.
//!
//! - [`BeginFrameId`] / [`BeginFrameIdSource`]: per-instance monotonic ids
//! - [`BeginFrameArgs`]: one scheduler-initiated frame interval
//! - [`ScrollAndScaleSet`]: consumer-side deltas applied at Animate
//! - [`BeginMainFrameState`]: everything the producer needs to start
//! - [`MainFrameTiming`]: bookkeeping forwarded back on commit or abort
//!
//! # Data flow
//!
//! 1. The embedder's tick source asks a [`BeginFrameIdSource`] for the next
//!    id and builds [`BeginFrameArgs`].
//! 2. When the scheduler decides to send a begin-main-frame, the consumer
//!    side packs the args with its pending scroll deltas into a
//!    [`BeginMainFrameState`] and posts it to the producer.
//! 3. The producer runs the attempt and reports a [`MainFrameTiming`] with
//!    either the commit or the abort, so the consumer's
//!    [`FrameTimingHistory`](crate::history::FrameTimingHistory) stays
//!    consistent.

use alloc::vec::Vec;
use core::fmt;

use crate::time::{Duration, HostTime};

/// Identifies one begin-frame: which source issued it and its sequence
/// number within that source.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BeginFrameId {
    /// Id of the issuing [`BeginFrameIdSource`].
    pub source_id: u32,
    /// Monotonically increasing sequence number, starting at 1.
    pub sequence: u64,
}

impl fmt::Debug for BeginFrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BeginFrameId({}:{})", self.source_id, self.sequence)
    }
}

/// Issues [`BeginFrameId`]s for one pipeline instance.
///
/// Each proxy owns its own source, so independent pipelines never share a
/// counter.
#[derive(Clone, Debug)]
pub struct BeginFrameIdSource {
    source_id: u32,
    last_sequence: u64,
}

impl BeginFrameIdSource {
    /// Creates a source that has not issued any id yet.
    #[must_use]
    pub const fn new(source_id: u32) -> Self {
        Self {
            source_id,
            last_sequence: 0,
        }
    }

    /// Returns the next id.
    pub fn next_id(&mut self) -> BeginFrameId {
        self.last_sequence += 1;
        BeginFrameId {
            source_id: self.source_id,
            sequence: self.last_sequence,
        }
    }

    /// Returns the most recently issued id, if any.
    #[must_use]
    pub fn last_id(&self) -> Option<BeginFrameId> {
        (self.last_sequence > 0).then_some(BeginFrameId {
            source_id: self.source_id,
            sequence: self.last_sequence,
        })
    }

    /// Builds args for the next frame starting at `frame_time`.
    pub fn next_args(&mut self, frame_time: HostTime, interval: Duration) -> BeginFrameArgs {
        BeginFrameArgs::new(self.next_id(), frame_time, interval)
    }
}

/// One frame interval, as delivered to the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BeginFrameArgs {
    /// Identity of this frame.
    pub id: BeginFrameId,
    /// Time the frame logically starts; animations sample at this time.
    pub frame_time: HostTime,
    /// Latest time by which the consumer should draw.
    pub deadline: HostTime,
    /// Nominal frame interval.
    pub interval: Duration,
}

impl BeginFrameArgs {
    /// Creates args whose deadline is one interval after `frame_time`.
    #[must_use]
    pub fn new(id: BeginFrameId, frame_time: HostTime, interval: Duration) -> Self {
        Self {
            id,
            frame_time,
            deadline: frame_time.checked_add(interval).unwrap_or(frame_time),
            interval,
        }
    }
}

/// A pending scroll offset change for one scroll layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollUpdate {
    /// Scene-graph id of the scrolling layer.
    pub layer_id: u64,
    /// Horizontal delta in layout pixels.
    pub dx: f32,
    /// Vertical delta in layout pixels.
    pub dy: f32,
}

/// Scroll and page-scale changes made on the consumer side since the last
/// begin-main-frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ScrollAndScaleSet {
    /// Per-layer scroll deltas.
    pub scrolls: Vec<ScrollUpdate>,
    /// Multiplicative page scale change; `1.0` means unchanged.
    pub page_scale_delta: f32,
}

impl Default for ScrollAndScaleSet {
    fn default() -> Self {
        Self {
            scrolls: Vec::new(),
            page_scale_delta: 1.0,
        }
    }
}

impl ScrollAndScaleSet {
    /// Whether applying this set would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scrolls.is_empty() && self.page_scale_delta == 1.0
    }
}

/// Everything the producer receives to start one begin-main-frame attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct BeginMainFrameState {
    /// Args of the frame that triggered the attempt.
    pub args: BeginFrameArgs,
    /// Deltas to apply during Animate.
    pub scroll_info: ScrollAndScaleSet,
    /// Whether the consumer evicted UI resources that only a commit can
    /// restore. When set, the attempt may not finish with no updates.
    pub evicted_ui_resources: bool,
    /// Consumer-side time at which the begin-main-frame was sent.
    pub sent_at: HostTime,
}

/// Timing of one attempt, forwarded to the consumer when it commits or
/// aborts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MainFrameTiming {
    /// Frame the attempt belonged to.
    pub id: BeginFrameId,
    /// When the consumer sent the begin-main-frame.
    pub sent_at: HostTime,
    /// When the producer finished (committed or aborted).
    pub finished_at: HostTime,
}

impl MainFrameTiming {
    /// Time from send to finish.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.finished_at.saturating_duration_since(self.sent_at)
    }
}
