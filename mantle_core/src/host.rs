// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collaborator contracts and the resource values that cross them.
//!
//! The pipeline drives two collaborators it does not own the internals of:
//!
//! - [`SceneHost`] lives on the producer side. It owns the authoritative
//!   scene, runs animations and layout, and hands a snapshot value to the
//!   pipeline at commit.
//! - [`ConsumerTree`] lives on the consumer side. It adopts committed
//!   snapshots, activates them, and draws.
//!
//! The snapshot is an associated type on both traits; a proxy requires the
//! two to agree. It is moved, never shared, so the consumer never reads
//! producer memory.

use alloc::vec::Vec;

use crate::abort::SwapPromiseFailure;
use crate::stage::StageRequests;
use crate::time::HostTime;
use crate::timing::{BeginFrameArgs, BeginFrameId, ScrollAndScaleSet};

// ---------------------------------------------------------------------------
// Resource values
// ---------------------------------------------------------------------------

/// Opaque handle for one externally allocated GPU-backed buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(pub u32);

/// Fence value that must be waited on before a returned resource is reused.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SyncToken(pub u64);

impl SyncToken {
    /// A token that needs no wait.
    pub const EMPTY: Self = Self(0);

    /// Whether the token needs no wait.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Name of an externally allocated texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Mailbox(pub u64);

/// A resource handed from producer to consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransferableResource {
    /// Collection-level id.
    pub id: ResourceId,
    /// Texture backing the resource.
    pub mailbox: Mailbox,
    /// Token the consumer waits on before reading.
    pub sync_token: SyncToken,
}

/// A resource given back to its producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReturnedResource {
    /// Collection-level id.
    pub id: ResourceId,
    /// Token the producer waits on before reusing the texture.
    pub sync_token: SyncToken,
    /// How many references this return releases.
    pub count: u32,
    /// Whether the contents are gone (context loss or forced return).
    pub lost: bool,
}

// ---------------------------------------------------------------------------
// Draw values
// ---------------------------------------------------------------------------

/// Why a draw was or was not performed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrawResult {
    /// The frame was drawn.
    Success,
    /// Animations would have shown checkerboard.
    AbortedCheckerboardAnimations,
    /// High-resolution content was not ready.
    AbortedMissingHighResContent,
    /// Drawing was not possible at all.
    AbortedCantDraw,
    /// The graphics context was lost mid-draw.
    AbortedContextLost,
}

impl DrawResult {
    /// Whether a frame was produced.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Short label for diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::AbortedCheckerboardAnimations => "checkerboard_animations",
            Self::AbortedMissingHighResContent => "missing_high_res_content",
            Self::AbortedCantDraw => "cant_draw",
            Self::AbortedContextLost => "context_lost",
        }
    }
}

/// Working state for one draw, filled in by [`ConsumerTree::prepare_to_draw`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawFrame {
    /// Frame being drawn, if the draw belongs to a begin-frame.
    pub frame_id: Option<BeginFrameId>,
    /// Whether the scheduler forced this draw.
    pub forced: bool,
    /// Resources referenced by the frame.
    pub resources: Vec<TransferableResource>,
    /// Set by the tree when nothing changed since the last swap.
    pub has_no_damage: bool,
}

impl DrawFrame {
    /// Creates an empty frame.
    #[must_use]
    pub fn new(frame_id: Option<BeginFrameId>, forced: bool) -> Self {
        Self {
            frame_id,
            forced,
            resources: Vec::new(),
            has_no_damage: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Producer-side scene-graph collaborator.
///
/// Methods are called in attempt order: `will_begin_main_frame`,
/// `begin_main_frame`, `apply_scroll_and_scale`, `animate_layers`, `layout`,
/// `update_layers`, then either `will_commit` + `finish_commit` or an abort.
/// Everything except [`update_layers`](Self::update_layers) and
/// [`finish_commit`](Self::finish_commit) has an empty default.
pub trait SceneHost {
    /// Value moved to the consumer at commit.
    type Snapshot: Send + 'static;

    /// An attempt is about to run.
    fn will_begin_main_frame(&mut self) {}

    /// The attempt has started for `args`.
    fn begin_main_frame(&mut self, args: &BeginFrameArgs) {
        let _ = args;
    }

    /// Applies deltas made on the consumer side since the last attempt.
    fn apply_scroll_and_scale(&mut self, info: &ScrollAndScaleSet) {
        let _ = info;
    }

    /// Ticks animations to `frame_time`.
    fn animate_layers(&mut self, frame_time: HostTime, requests: &mut StageRequests<'_>) {
        let _ = (frame_time, requests);
    }

    /// Runs layout.
    fn layout(&mut self) {}

    /// The consumer evicted UI resources; upload them again before commit.
    fn recreate_ui_resources(&mut self) {}

    /// Updates layer contents; returns whether anything changed.
    ///
    /// Requests raised through `requests` before the attempt reaches commit
    /// are honored by the same attempt.
    fn update_layers(&mut self, requests: &mut StageRequests<'_>) -> bool;

    /// A commit is about to start.
    fn will_commit(&mut self) {}

    /// Produces the snapshot for the consumer.
    fn finish_commit(&mut self) -> Self::Snapshot;

    /// The commit has completed, or the attempt finished with no updates.
    fn commit_complete(&mut self) {}

    /// The attempt has ended without being aborted.
    fn did_begin_main_frame(&mut self) {}

    /// A frame containing a committed snapshot was swapped.
    fn did_complete_swap(&mut self) {}

    /// Pending swap promises will not be kept.
    fn break_swap_promises(&mut self, reason: SwapPromiseFailure) {
        let _ = reason;
    }

    /// The pipeline needs a new output surface. The embedder answers through
    /// the proxy's `did_initialize_output_surface`.
    fn request_new_output_surface(&mut self) {}

    /// The output surface was lost.
    fn did_lose_output_surface(&mut self) {}

    /// Resources came back from the consumer.
    fn resources_returned(&mut self, resources: Vec<ReturnedResource>) {
        let _ = resources;
    }
}

/// Consumer-side tree collaborator.
///
/// Only [`finish_commit`](Self::finish_commit) and
/// [`draw_layers`](Self::draw_layers) are required.
pub trait ConsumerTree {
    /// Value received from the producer at commit.
    type Snapshot: Send + 'static;

    /// A commit is starting.
    fn begin_commit(&mut self) {}

    /// Adopts the producer's snapshot into the pending tree.
    fn finish_commit(&mut self, snapshot: Self::Snapshot);

    /// Consumer-side commit work is structurally complete.
    fn commit_complete(&mut self) {}

    /// Whether the pending tree can be activated right after commit. Trees
    /// that need more work return `false` and later report readiness through
    /// the proxy's consumer signals.
    fn ready_to_activate_after_commit(&self) -> bool {
        true
    }

    /// Makes the pending tree the active one.
    fn activate_sync_tree(&mut self) {}

    /// Ticks consumer-side animations.
    fn animate(&mut self, frame_time: HostTime) {
        let _ = frame_time;
    }

    /// Collects what the frame will draw.
    fn prepare_to_draw(&mut self, frame: &mut DrawFrame) -> DrawResult {
        let _ = frame;
        DrawResult::Success
    }

    /// Draws a prepared frame.
    fn draw_layers(&mut self, frame: &DrawFrame);

    /// Presents a drawn frame; returns whether a swap happened.
    fn swap_buffers(&mut self, frame: &DrawFrame) -> bool {
        let _ = frame;
        true
    }

    /// Schedules tile work.
    fn prepare_tiles(&mut self) {}

    /// Takes scroll and scale deltas accumulated since the last call.
    fn process_scroll_deltas(&mut self) -> ScrollAndScaleSet {
        ScrollAndScaleSet::default()
    }

    /// Whether UI resources were evicted and must be restored by a commit.
    fn evicted_ui_resources(&self) -> bool {
        false
    }

    /// Takes resources the consumer no longer uses.
    fn take_returned_resources(&mut self) -> Vec<ReturnedResource> {
        Vec::new()
    }

    /// Blocks until all submitted rendering has finished.
    fn finish_all_rendering(&mut self) {}

    /// Drops everything tied to the output surface.
    fn release_output_surface(&mut self) {}
}
