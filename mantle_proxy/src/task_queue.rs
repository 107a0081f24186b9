// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The owner thread's ordinary task queue.
//!
//! A [`TaskQueue`] stands in for one thread's event loop: anyone holding a
//! [`TaskQueueHandle`] can post from any thread, and the owner runs what is
//! queued with [`TaskQueue::run_pending`] at a point of its choosing.

use std::fmt;
use std::thread::{self, ThreadId};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Owner-thread task queue.
pub struct TaskQueue {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    owner: ThreadId,
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.receiver.len())
            .field("owner", &self.owner)
            .finish()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    /// Creates a queue owned by the current thread.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            sender,
            receiver,
            owner: thread::current().id(),
        }
    }

    /// Returns a handle that can post from any thread.
    #[must_use]
    pub fn handle(&self) -> TaskQueueHandle {
        TaskQueueHandle {
            sender: self.sender.clone(),
            owner: self.owner,
        }
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Runs the tasks queued at the time of the call, in FIFO order.
    ///
    /// Tasks posted by those tasks wait for the next call. Returns the
    /// number of tasks run.
    pub fn run_pending(&self) -> usize {
        self.assert_owner();
        let count = self.receiver.len();
        let mut ran = 0;
        for _ in 0..count {
            let Ok(task) = self.receiver.try_recv() else {
                break;
            };
            task();
            ran += 1;
        }
        ran
    }

    /// Runs tasks until the queue is empty, including tasks posted while
    /// running. Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        self.assert_owner();
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Waits up to `timeout` for one task and runs it. Returns whether a
    /// task ran.
    pub fn run_one_timeout(&self, timeout: Duration) -> bool {
        self.assert_owner();
        match self.receiver.recv_timeout(timeout) {
            Ok(task) => {
                task();
                true
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => false,
        }
    }

    fn assert_owner(&self) {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "task queue drained off its owner thread"
        );
    }
}

/// Sendable posting handle for a [`TaskQueue`].
#[derive(Clone)]
pub struct TaskQueueHandle {
    sender: Sender<Task>,
    owner: ThreadId,
}

impl fmt::Debug for TaskQueueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueueHandle")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl TaskQueueHandle {
    /// Queues `task` on the owner thread.
    ///
    /// Returns `false`, dropping the task, if the queue is gone.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> bool {
        self.post_boxed(Box::new(task))
    }

    /// Queues an already boxed task.
    pub fn post_boxed(&self, task: Task) -> bool {
        if self.sender.send(task).is_err() {
            tracing::warn!("task posted to a queue whose owner is gone");
            return false;
        }
        true
    }

    /// Thread that runs the posted tasks.
    #[must_use]
    pub fn owner(&self) -> ThreadId {
        self.owner
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[test]
    fn tasks_run_in_fifo_order_on_the_owner() {
        let queue = TaskQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let log = Arc::clone(&log);
            queue.handle().post(move || log.lock().push(i));
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.run_pending(), 3);
        assert_eq!(*log.lock(), [0, 1, 2]);
    }

    #[test]
    fn run_pending_leaves_tasks_posted_while_running() {
        let queue = TaskQueue::new();
        let handle = queue.handle();
        let inner = handle.clone();
        handle.post(move || {
            inner.post(|| {});
        });
        assert_eq!(queue.run_pending(), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.run_until_idle(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn posting_from_another_thread() {
        let queue = TaskQueue::new();
        let handle = queue.handle();
        let ran = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&ran);
        thread::spawn(move || {
            handle.post(move || *slot.lock() = Some(thread::current().id()));
        })
        .join()
        .unwrap();
        assert!(queue.run_one_timeout(Duration::from_secs(5)));
        assert_eq!(*ran.lock(), Some(thread::current().id()));
    }

    #[test]
    fn post_after_queue_dropped_reports_failure() {
        let handle = TaskQueue::new().handle();
        assert!(!handle.post(|| {}));
    }
}
