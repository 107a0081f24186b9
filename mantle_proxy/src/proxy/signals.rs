// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Asynchronous notifications from the consumer tree's own workers.
//!
//! Raster workers, tile managers and the like report readiness from arbitrary
//! threads. They hold a [`ConsumerSignals`], which carries the proxy's
//! registry handle and checks liveness before posting; once the proxy stops,
//! every post is dropped.

use crossbeam_channel::{Receiver, Sender, unbounded};
use mantle_core::scheduler::FrameScheduler;

use crate::registry::{ProxyHandle, ProxyRegistry};

/// One notification for the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumerSignal {
    /// The pending tree can be activated.
    ReadyToActivate,
    /// The active tree can be drawn.
    ReadyToDraw,
    /// The active tree needs another draw.
    NeedsRedraw,
    /// Consumer-side animations need another tick.
    NeedsAnimate,
    /// Tile work needs to be scheduled.
    NeedsPrepareTiles,
    /// Whether drawing is possible at all.
    CanDraw(bool),
    /// The output surface was lost.
    OutputSurfaceLost,
}

impl ConsumerSignal {
    /// Applies the signal to `scheduler`.
    ///
    /// Surface loss also needs strategy-level handling; callers check for it.
    pub(crate) fn forward(self, scheduler: &mut dyn FrameScheduler) {
        match self {
            Self::ReadyToActivate => scheduler.notify_ready_to_activate(),
            Self::ReadyToDraw => scheduler.notify_ready_to_draw(),
            Self::NeedsRedraw => scheduler.set_needs_redraw(),
            Self::NeedsAnimate => scheduler.set_needs_animate(),
            Self::NeedsPrepareTiles => scheduler.set_needs_prepare_tiles(),
            Self::CanDraw(can_draw) => scheduler.set_can_draw(can_draw),
            Self::OutputSurfaceLost => scheduler.did_lose_output_surface(),
        }
    }
}

/// Sendable, cloneable poster of [`ConsumerSignal`]s for one proxy.
#[derive(Clone, Debug)]
pub struct ConsumerSignals {
    sender: Sender<ConsumerSignal>,
    registry: ProxyRegistry,
    handle: ProxyHandle,
}

impl ConsumerSignals {
    pub(crate) fn new(
        registry: ProxyRegistry,
        handle: ProxyHandle,
    ) -> (Self, Receiver<ConsumerSignal>) {
        let (sender, receiver) = unbounded();
        (
            Self {
                sender,
                registry,
                handle,
            },
            receiver,
        )
    }

    /// Registry handle of the owning proxy.
    #[must_use]
    pub fn handle(&self) -> ProxyHandle {
        self.handle
    }

    /// Whether the owning proxy is still live.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.registry.is_alive(self.handle)
    }

    /// Posts `signal`. Returns `false` if the proxy is gone.
    pub fn post(&self, signal: ConsumerSignal) -> bool {
        if !self.is_alive() {
            tracing::trace!(handle = ?self.handle, ?signal, "signal for a retired proxy dropped");
            return false;
        }
        self.sender.send(signal).is_ok()
    }

    /// Shorthand for [`ConsumerSignal::ReadyToActivate`].
    pub fn ready_to_activate(&self) -> bool {
        self.post(ConsumerSignal::ReadyToActivate)
    }

    /// Shorthand for [`ConsumerSignal::ReadyToDraw`].
    pub fn ready_to_draw(&self) -> bool {
        self.post(ConsumerSignal::ReadyToDraw)
    }

    /// Shorthand for [`ConsumerSignal::NeedsRedraw`].
    pub fn needs_redraw(&self) -> bool {
        self.post(ConsumerSignal::NeedsRedraw)
    }

    /// Shorthand for [`ConsumerSignal::OutputSurfaceLost`].
    pub fn output_surface_lost(&self) -> bool {
        self.post(ConsumerSignal::OutputSurfaceLost)
    }
}
