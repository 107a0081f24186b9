// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resource lifecycle across the producer/consumer boundary.
//!
//! - [`holder`]: one texture's reference count, releasable from any thread.
//! - [`collection`]: per-id hand-off counts and the return list.

pub mod collection;
pub mod holder;

pub use collection::{ResourceCollection, ResourceCollectionClient};
pub use holder::{ConsumerReleaseCallback, ProducerRef, ReleaseCallback, ResourceRefHolder};
