// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A task runner that can capture same-thread posts and flush them
//! synchronously.
//!
//! [`BlockingTaskRunner`] wraps the owner thread's [`TaskQueueHandle`].
//! Outside a capture scope it forwards every post. While a scope opened by
//! [`BlockingTaskRunner::capture`] is live, posts made *on the owner thread*
//! are held back instead, and run in FIFO order on the call stack that closes
//! the outermost scope. Posts from other threads are never captured.
//!
//! The pipeline wraps each commit in a capture scope so that resource
//! releases triggered by the commit are visible to the embedder before it
//! hears "commit complete", without an event-loop round trip.
//!
//! ```rust,ignore
//! {
//!     let _capture = runner.capture();
//!     runner.post_task(|| release_texture());   // held back
//! }                                              // runs here
//! notify_commit_complete();
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::task_queue::{Task, TaskQueueHandle};

#[derive(Default)]
struct CaptureState {
    depth: usize,
    captured: Vec<Task>,
}

/// Owner-thread task runner with re-entrant capture scopes.
pub struct BlockingTaskRunner {
    handle: TaskQueueHandle,
    owner: ThreadId,
    state: Mutex<CaptureState>,
}

impl fmt::Debug for BlockingTaskRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BlockingTaskRunner")
            .field("owner", &self.owner)
            .field("depth", &state.depth)
            .field("captured", &state.captured.len())
            .finish()
    }
}

impl BlockingTaskRunner {
    /// Creates a runner forwarding to `handle`.
    ///
    /// # Panics
    ///
    /// Panics if called on a thread other than the queue's owner.
    #[must_use]
    pub fn new(handle: TaskQueueHandle) -> Arc<Self> {
        let owner = handle.owner();
        assert_eq!(
            thread::current().id(),
            owner,
            "blocking task runner must be created on the queue's owner thread"
        );
        Arc::new(Self {
            handle,
            owner,
            state: Mutex::new(CaptureState::default()),
        })
    }

    /// Whether the calling thread is the owner.
    #[must_use]
    pub fn belongs_to_current_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Whether a capture scope is open.
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.state.lock().depth > 0
    }

    /// Posts `task` to the owner thread, capturing it if a scope is open and
    /// the caller is the owner.
    pub fn post_task(&self, task: impl FnOnce() + Send + 'static) {
        let task: Task = Box::new(task);
        if self.belongs_to_current_thread() {
            let mut state = self.state.lock();
            if state.depth > 0 {
                state.captured.push(task);
                return;
            }
        }
        self.handle.post_boxed(task);
    }

    /// Opens a capture scope. Scopes nest; only closing the outermost one
    /// flushes.
    ///
    /// # Panics
    ///
    /// Panics if called off the owner thread.
    #[must_use = "captured tasks flush when the scope is dropped"]
    pub fn capture(self: &Arc<Self>) -> CapturePostTasks {
        assert!(
            self.belongs_to_current_thread(),
            "capture scopes can only be opened on the owner thread"
        );
        self.state.lock().depth += 1;
        CapturePostTasks {
            runner: Arc::clone(self),
            _not_send: PhantomData,
        }
    }

    fn end_capture(&self) {
        let tasks = {
            let mut state = self.state.lock();
            debug_assert!(state.depth > 0, "capture scope closed twice");
            state.depth -= 1;
            if state.depth > 0 {
                return;
            }
            std::mem::take(&mut state.captured)
        };
        if !tasks.is_empty() {
            tracing::trace!(count = tasks.len(), "flushing captured tasks");
        }
        for task in tasks {
            task();
        }
    }
}

/// RAII capture scope returned by [`BlockingTaskRunner::capture`].
///
/// Dropping the outermost scope runs every captured task, in order, before
/// `drop` returns. The guard stays on the owner thread.
pub struct CapturePostTasks {
    runner: Arc<BlockingTaskRunner>,
    _not_send: PhantomData<*const ()>,
}

impl fmt::Debug for CapturePostTasks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturePostTasks").finish_non_exhaustive()
    }
}

impl Drop for CapturePostTasks {
    fn drop(&mut self) {
        self.runner.end_capture();
    }
}
