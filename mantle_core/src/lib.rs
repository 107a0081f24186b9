// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pipeline stages, begin-frame timing, and scheduling state for compositor
//! pipelines.
//!
//! `mantle_core` holds the pure, thread-agnostic half of the compositor
//! pipeline coordinator. It is `no_std` compatible (with `alloc`) and owns no
//! threads, locks, or queues; those live in `mantle_proxy`, which drives the
//! types defined here from one or two execution contexts.
//!
//! # Architecture
//!
//! A frame attempt flows through the pipeline like this:
//!
//! ```text
//!   producer request ──► StageTracker::request() ──► FrameScheduler
//!                                                       │
//!                  ┌────────────── next_action() ◄──────┘
//!                  ▼
//!   SendBeginMainFrame ──► SceneHost (animate, update, commit)
//!                                 │
//!                                 ▼  snapshot value
//!   Commit ──► ConsumerTree::finish_commit() ──► ActivateSyncTree
//!                                                       │
//!                  ┌────────────────────────────────────┘
//!                  ▼
//!   DrawAndSwap ──► ConsumerTree (prepare, draw, swap) ──► resource returns
//! ```
//!
//! **[`stage`]**: The ordered [`PipelineStage`](stage::PipelineStage) and the
//! [`StageTracker`](stage::StageTracker) that coalesces requests into exactly
//! one begin-frame per batch.
//!
//! **[`abort`]**: [`CommitEarlyOutReason`](abort::CommitEarlyOutReason) and
//! the shared abort classification used by every proxy strategy.
//!
//! **[`timing`]**: Begin-frame ids, args, and the value types carried
//! between producer and consumer for one attempt.
//!
//! **[`history`]**: Consumer-side timing bookkeeping for committed and
//! aborted attempts.
//!
//! **[`host`]**: Collaborator contracts: the producer's
//! [`SceneHost`](host::SceneHost) and the consumer's
//! [`ConsumerTree`](host::ConsumerTree), plus resource value types.
//!
//! **[`scheduler`]**: The [`FrameScheduler`](scheduler::FrameScheduler)
//! contract and a deterministic reference [`Scheduler`](scheduler::Scheduler).
//!
//! **[`time`]**: Monotonic host time and timebase conversion.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! pipeline instrumentation, with a zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod abort;
pub mod history;
pub mod host;
pub mod scheduler;
pub mod stage;
pub mod time;
pub mod timing;
pub mod trace;
