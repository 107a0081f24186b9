// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cross-thread reference holder for one externally produced texture.
//!
//! The producer hands a mailbox and a release callback to
//! [`ResourceRefHolder::create`] and gets back a [`ProducerRef`], which holds
//! one implicit reference. Every consumer that draws the texture takes a
//! [`ConsumerReleaseCallback`]; running it from any thread records the
//! return state and posts a decrement back to the producer thread.
//!
//! The original release callback runs exactly once, on the producer thread,
//! when the last reference is gone. It receives whatever sync token and loss
//! flag were recorded last.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use mantle_core::host::{Mailbox, SyncToken};
use parking_lot::Mutex;

use crate::blocking::BlockingTaskRunner;

/// Callback invoked once all references to a resource are released.
pub type ReleaseCallback = Box<dyn FnOnce(SyncToken, bool) + Send + 'static>;

#[derive(Clone, Copy, Debug, Default)]
struct ReturnState {
    sync_token: SyncToken,
    is_lost: bool,
}

/// Shared state of one held resource.
///
/// Only reachable through [`ProducerRef`] and [`ConsumerReleaseCallback`].
pub struct ResourceRefHolder {
    mailbox: Mailbox,
    release: Mutex<Option<ReleaseCallback>>,
    internal_references: AtomicU32,
    return_state: Mutex<ReturnState>,
    runner: Arc<BlockingTaskRunner>,
}

impl fmt::Debug for ResourceRefHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRefHolder")
            .field("mailbox", &self.mailbox)
            .field(
                "internal_references",
                &self.internal_references.load(Ordering::Acquire),
            )
            .field("return_state", &*self.return_state.lock())
            .finish_non_exhaustive()
    }
}

impl ResourceRefHolder {
    /// Wraps `mailbox` and `release`, returning the producer's reference.
    ///
    /// `runner` must belong to the producer thread; the final release runs
    /// there.
    pub fn create(
        mailbox: Mailbox,
        release: ReleaseCallback,
        runner: Arc<BlockingTaskRunner>,
    ) -> ProducerRef {
        debug_assert!(
            runner.belongs_to_current_thread(),
            "resource holders are created on the producer thread"
        );
        ProducerRef {
            holder: Arc::new(Self {
                mailbox,
                release: Mutex::new(Some(release)),
                internal_references: AtomicU32::new(1),
                return_state: Mutex::new(ReturnState::default()),
                runner,
            }),
        }
    }

    fn set_return_state(&self, sync_token: SyncToken, is_lost: bool) {
        *self.return_state.lock() = ReturnState {
            sync_token,
            is_lost,
        };
    }

    fn internal_release(&self) {
        debug_assert!(
            self.runner.belongs_to_current_thread(),
            "resource references are released on the producer thread"
        );
        let previous = self.internal_references.fetch_sub(1, Ordering::AcqRel);
        assert!(
            previous > 0,
            "resource holder released more times than it was referenced"
        );
        if previous > 1 {
            return;
        }
        let release = self.release.lock().take();
        let state = *self.return_state.lock();
        match release {
            Some(release) => {
                tracing::trace!(mailbox = ?self.mailbox, lost = state.is_lost, "releasing resource");
                release(state.sync_token, state.is_lost);
            }
            None => debug_assert!(false, "resource release callback already ran"),
        }
    }
}

impl Drop for ResourceRefHolder {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        debug_assert_eq!(
            self.internal_references.load(Ordering::Acquire),
            0,
            "resource holder destroyed while consumer references are outstanding"
        );
    }
}

/// The producer's implicit reference. Dropping it releases that reference.
#[derive(Debug)]
pub struct ProducerRef {
    holder: Arc<ResourceRefHolder>,
}

impl ProducerRef {
    /// The wrapped mailbox.
    #[must_use]
    pub fn mailbox(&self) -> Mailbox {
        self.holder.mailbox
    }

    /// Outstanding references, including this one.
    #[must_use]
    pub fn references(&self) -> u32 {
        self.holder.internal_references.load(Ordering::Acquire)
    }

    /// Adds a consumer reference and returns the callback that releases it.
    ///
    /// # Panics
    ///
    /// Panics if the holder was already fully released.
    #[must_use = "dropping the callback without running it leaks the reference"]
    pub fn consumer_release_callback(&self) -> ConsumerReleaseCallback {
        let previous = self
            .holder
            .internal_references
            .fetch_add(1, Ordering::AcqRel);
        assert!(previous > 0, "resource holder was already released");
        ConsumerReleaseCallback {
            holder: Some(Arc::clone(&self.holder)),
        }
    }
}

impl Drop for ProducerRef {
    fn drop(&mut self) {
        self.holder.internal_release();
    }
}

/// One consumer reference. Safe to send and run from any thread.
pub struct ConsumerReleaseCallback {
    holder: Option<Arc<ResourceRefHolder>>,
}

impl fmt::Debug for ConsumerReleaseCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerReleaseCallback")
            .field("mailbox", &self.holder.as_ref().map(|h| h.mailbox))
            .finish()
    }
}

impl ConsumerReleaseCallback {
    /// Records the return state and releases this reference on the producer
    /// thread.
    pub fn run(mut self, sync_token: SyncToken, is_lost: bool) {
        if let Some(holder) = self.holder.take() {
            holder.set_return_state(sync_token, is_lost);
            Self::post_release(holder);
        }
    }

    fn post_release(holder: Arc<ResourceRefHolder>) {
        let runner = Arc::clone(&holder.runner);
        runner.post_task(move || holder.internal_release());
    }
}

impl Drop for ConsumerReleaseCallback {
    fn drop(&mut self) {
        let Some(holder) = self.holder.take() else {
            return;
        };
        if !std::thread::panicking() {
            tracing::error!(mailbox = ?holder.mailbox, "consumer release callback dropped without running");
            debug_assert!(false, "consumer release callback dropped without running");
        }
        holder.set_return_state(SyncToken::EMPTY, true);
        Self::post_release(holder);
    }
}
