// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Begin-main-frame early-out classification.
//!
//! An attempt can stop at any stage boundary. Each stop is described by a
//! [`CommitEarlyOutReason`]; none of them is an error. Both proxy strategies
//! share [`classify_early_out`] so the precedence between reasons is defined
//! once.

/// Why a begin-main-frame attempt stopped before committing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommitEarlyOutReason {
    /// Commits are deferred by the producer's embedder.
    DeferredCommit,
    /// The output is not visible.
    NotVisible,
    /// The output surface was lost and has not been recreated yet.
    OutputSurfaceLost,
    /// Nothing changed and no commit was requested.
    FinishedNoUpdates,
}

impl CommitEarlyOutReason {
    /// All reasons, in classification order.
    pub const ALL: [Self; 4] = [
        Self::DeferredCommit,
        Self::NotVisible,
        Self::OutputSurfaceLost,
        Self::FinishedNoUpdates,
    ];

    /// Whether the embedder sees this attempt as a completed commit.
    ///
    /// Only [`FinishedNoUpdates`](Self::FinishedNoUpdates) counts: no
    /// information was lost, so commit-complete notifications still fire.
    #[must_use]
    pub const fn did_handle_commit(self) -> bool {
        matches!(self, Self::FinishedNoUpdates)
    }

    /// Whether an "input throttled until commit" condition is released.
    #[must_use]
    pub const fn clears_input_throttle(self) -> bool {
        true
    }

    /// Whether timing bookkeeping for the attempt is forwarded to the
    /// consumer.
    #[must_use]
    pub const fn updates_timing(self) -> bool {
        true
    }

    /// Whether the scheduler must arrange another begin-main-frame.
    #[must_use]
    pub const fn needs_new_begin_main_frame(self) -> bool {
        !self.did_handle_commit()
    }

    /// Whether the producer's latched request must be replayed by the next
    /// attempt.
    #[must_use]
    pub const fn retains_request(self) -> bool {
        matches!(self, Self::NotVisible | Self::OutputSurfaceLost)
    }

    /// Dense index for per-reason counters.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::DeferredCommit => 0,
            Self::NotVisible => 1,
            Self::OutputSurfaceLost => 2,
            Self::FinishedNoUpdates => 3,
        }
    }

    /// Short label for diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DeferredCommit => "deferred_commit",
            Self::NotVisible => "not_visible",
            Self::OutputSurfaceLost => "output_surface_lost",
            Self::FinishedNoUpdates => "finished_no_updates",
        }
    }
}

/// Returns the reason an attempt must stop before running any stage, if any.
///
/// Deferral is checked before visibility, and visibility before surface
/// loss.
#[must_use]
pub const fn classify_early_out(
    defer_commits: bool,
    visible: bool,
    output_surface_lost: bool,
) -> Option<CommitEarlyOutReason> {
    if defer_commits {
        Some(CommitEarlyOutReason::DeferredCommit)
    } else if !visible {
        Some(CommitEarlyOutReason::NotVisible)
    } else if output_surface_lost {
        Some(CommitEarlyOutReason::OutputSurfaceLost)
    } else {
        None
    }
}

/// Why a swap promise attached to a frame was broken.
///
/// The scene-graph collaborator owns the promises; the pipeline only forwards
/// the reason.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SwapPromiseFailure {
    /// The attempt aborted before committing.
    CommitFails,
    /// The attempt finished without anything to commit.
    CommitNoUpdate,
    /// The committed tree was dropped before activation.
    ActivationFails,
    /// The frame was drawn but never swapped.
    SwapFails,
}

impl From<CommitEarlyOutReason> for SwapPromiseFailure {
    fn from(reason: CommitEarlyOutReason) -> Self {
        match reason {
            CommitEarlyOutReason::FinishedNoUpdates => Self::CommitNoUpdate,
            _ => Self::CommitFails,
        }
    }
}
