// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mantle Proxy: the threading half of the Mantle compositor pipeline.
//!
//! [`mantle_core`] holds the platform-free pieces (stages, abort reasons,
//! the scheduler). This crate adds what needs threads:
//!
//! - [`proxy`]: the [`PipelineProxy`] contract with its inline and
//!   cross-thread strategies.
//! - [`blocking`]: [`BlockingTaskRunner`] and its capture scopes.
//! - [`resource`]: texture reference holders and the per-id resource
//!   collection.
//! - [`registry`]: generational liveness handles for consumer-side callbacks.
//! - [`task_queue`]: the producer thread's ordinary task queue.
//! - [`clock`]: an [`Instant`](std::time::Instant)-backed host clock.
//!
//! # Example
//!
//! ```rust,ignore
//! let queue = TaskQueue::new();
//! let context = ProducerContext::new(BlockingTaskRunner::new(queue.handle()), ProxyRegistry::new());
//! let scheduler = Scheduler::new(SchedulerConfig::standard());
//! let mut proxy = CrossThreadProxy::start(
//!     host,
//!     ConsumerParts::new(tree, Box::new(scheduler)),
//!     &context,
//!     ProxySettings::standard(),
//! )?;
//!
//! proxy.set_visible(true);
//! proxy.request_commit();
//! loop {
//!     proxy.run_frame();
//!     proxy.process_main_messages();
//!     queue.run_pending();
//! }
//! ```

pub mod blocking;
pub mod clock;
pub mod error;
pub mod proxy;
pub mod registry;
pub mod resource;
pub mod task_queue;

pub use blocking::{BlockingTaskRunner, CapturePostTasks};
pub use clock::HostClock;
pub use error::ProxyError;
pub use proxy::{
    ConsumerParts, ConsumerSignal, ConsumerSignals, CrossThreadProxy, InlineProxy, PipelineProxy,
    ProducerContext, ProxySettings,
};
pub use registry::{ProxyHandle, ProxyRegistry};
pub use task_queue::{TaskQueue, TaskQueueHandle};
