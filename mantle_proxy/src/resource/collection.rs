// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Producer-side bookkeeping of resources handed to a consumer.
//!
//! Two counts are kept per [`ResourceId`]:
//!
//! - **refs to wait for**: consumer references still outstanding. Raised by
//!   [`ResourceCollection::ref_resources`], lowered by
//!   [`ResourceCollection::unref_resources`]. The entry exists exactly while
//!   this is above zero.
//! - **refs to return**: how many times the resource was received from its
//!   upstream owner, raised by [`ResourceCollection::received_resources`].
//!   This is the count reported back once the resource is fully released, not
//!   the count of the last unref batch.
//!
//! Received counts for an id that is not referenced yet are staged and folded
//! into the entry when it is created. An entry released before anything was
//! received is parked until its first receive, which returns it at once.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

use mantle_core::host::{ResourceId, ReturnedResource, SyncToken, TransferableResource};
use rustc_hash::FxHashMap;

use crate::blocking::BlockingTaskRunner;

/// Told when [`ResourceCollection::take_available`] has something to return.
pub trait ResourceCollectionClient: Send + Sync {
    /// Returned resources are waiting for pickup.
    fn on_resources_available(&self);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct RefCount {
    refs_to_wait_for: u32,
    refs_to_return: u32,
}

/// Reference counts for resources the producer handed out.
///
/// Every method must be called on the thread that created the collection.
pub struct ResourceCollection {
    owner: ThreadId,
    resources: FxHashMap<ResourceId, RefCount>,
    staged_returns: FxHashMap<ResourceId, u32>,
    /// Released by the consumer before the upstream owner handed them over.
    released_early: FxHashMap<ResourceId, ReturnedResource>,
    available: Vec<ReturnedResource>,
    /// Mirrors `!available.is_empty()` for posted notifications.
    has_available: Arc<AtomicBool>,
    lost: bool,
    client: Option<Arc<dyn ResourceCollectionClient>>,
    runner: Arc<BlockingTaskRunner>,
}

impl fmt::Debug for ResourceCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCollection")
            .field("resources", &self.resources.len())
            .field("staged_returns", &self.staged_returns.len())
            .field("released_early", &self.released_early.len())
            .field("available", &self.available.len())
            .field("lost", &self.lost)
            .finish_non_exhaustive()
    }
}

impl ResourceCollection {
    /// Creates an empty collection owned by the current thread.
    ///
    /// Client notifications are posted through `runner`.
    #[must_use]
    pub fn new(runner: Arc<BlockingTaskRunner>) -> Self {
        Self {
            owner: thread::current().id(),
            resources: FxHashMap::default(),
            staged_returns: FxHashMap::default(),
            released_early: FxHashMap::default(),
            available: Vec::new(),
            has_available: Arc::new(AtomicBool::new(false)),
            lost: false,
            client: None,
            runner,
        }
    }

    /// Registers (or clears) the listener for available returns.
    pub fn set_client(&mut self, client: Option<Arc<dyn ResourceCollectionClient>>) {
        self.check_thread();
        self.client = client;
    }

    /// Records that the resources were received from their upstream owner.
    pub fn received_resources(&mut self, resources: &[TransferableResource]) {
        self.check_thread();
        debug_assert!(!self.lost, "resources received by a lost collection");
        let was_empty = self.available.is_empty();
        for resource in resources {
            if let Some(count) = self.resources.get_mut(&resource.id) {
                count.refs_to_return += 1;
            } else if let Some(early) = self.released_early.remove(&resource.id) {
                self.available.push(ReturnedResource { count: 1, ..early });
            } else {
                *self.staged_returns.entry(resource.id).or_default() += 1;
            }
        }
        if was_empty {
            self.notify_if_available();
        }
    }

    /// Adds one consumer reference to each resource.
    pub fn ref_resources(&mut self, resources: &[TransferableResource]) {
        self.check_thread();
        debug_assert!(!self.lost, "resources referenced by a lost collection");
        for resource in resources {
            let staged = self.staged_returns.remove(&resource.id).unwrap_or(0);
            if self.released_early.remove(&resource.id).is_some() {
                tracing::trace!(id = ?resource.id, "early release superseded by a new reference");
            }
            let count = self.resources.entry(resource.id).or_default();
            count.refs_to_wait_for += 1;
            count.refs_to_return += staged;
        }
    }

    /// Releases consumer references.
    ///
    /// Entries that reach zero move to the available list with their
    /// original return count. Returns against a lost collection are ignored.
    pub fn unref_resources(&mut self, returned: &[ReturnedResource]) {
        self.check_thread();
        if self.lost {
            return;
        }
        let was_empty = self.available.is_empty();
        for resource in returned {
            let Some(count) = self.resources.get_mut(&resource.id) else {
                tracing::warn!(id = ?resource.id, "unref of a resource that is not referenced");
                continue;
            };
            debug_assert!(
                resource.count <= count.refs_to_wait_for,
                "resource {:?} returned more times than referenced",
                resource.id
            );
            count.refs_to_wait_for = count.refs_to_wait_for.saturating_sub(resource.count);
            if count.refs_to_wait_for > 0 {
                continue;
            }
            let refs_to_return = count.refs_to_return;
            self.resources.remove(&resource.id);
            let release = ReturnedResource {
                id: resource.id,
                sync_token: resource.sync_token,
                count: refs_to_return,
                lost: resource.lost,
            };
            if refs_to_return == 0 {
                tracing::debug!(id = ?resource.id, "resource released before it was received");
                self.released_early.insert(resource.id, release);
                continue;
            }
            self.available.push(release);
        }
        if was_empty {
            self.notify_if_available();
        }
    }

    /// Moves every available return into the result, leaving none behind.
    #[must_use]
    pub fn take_available(&mut self) -> Vec<ReturnedResource> {
        self.check_thread();
        self.has_available.store(false, Ordering::Release);
        std::mem::take(&mut self.available)
    }

    /// Force-returns every outstanding resource as lost and marks the
    /// collection lost.
    ///
    /// Referenced resources that were never received are returned with a
    /// count of zero. Resources the consumer already released are not
    /// outstanding and are dropped.
    ///
    /// Returns whether anything was enqueued; a second call always returns
    /// `false`.
    pub fn lose_all(&mut self) -> bool {
        self.check_thread();
        if self.lost {
            return false;
        }
        self.lost = true;
        self.released_early.clear();
        if self.resources.is_empty() && self.staged_returns.is_empty() {
            return false;
        }
        let was_empty = self.available.is_empty();
        let outstanding = self
            .resources
            .drain()
            .map(|(id, count)| (id, count.refs_to_return))
            .chain(self.staged_returns.drain());
        let mut lost: Vec<ReturnedResource> = outstanding
            .map(|(id, count)| ReturnedResource {
                id,
                sync_token: SyncToken::EMPTY,
                count,
                lost: true,
            })
            .collect();
        lost.sort_unstable_by_key(|r| r.id);
        tracing::debug!(count = lost.len(), "lost all resources");
        self.available.extend(lost);
        if was_empty {
            self.notify_if_available();
        }
        true
    }

    /// Whether [`lose_all`](Self::lose_all) has run.
    #[must_use]
    pub fn is_lost(&self) -> bool {
        self.lost
    }

    /// `(refs_to_wait_for, refs_to_return)` for a referenced resource.
    #[must_use]
    pub fn ref_count(&self, id: ResourceId) -> Option<(u32, u32)> {
        self.resources
            .get(&id)
            .map(|count| (count.refs_to_wait_for, count.refs_to_return))
    }

    /// Number of referenced resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether no resource is referenced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Posts one notification for a batch that made the list non-empty. The
    /// task skips the client if the list was drained before it ran.
    fn notify_if_available(&self) {
        if self.available.is_empty() {
            return;
        }
        self.has_available.store(true, Ordering::Release);
        if let Some(client) = &self.client {
            let client = Arc::clone(client);
            let has_available = Arc::clone(&self.has_available);
            self.runner.post_task(move || {
                if has_available.load(Ordering::Acquire) {
                    client.on_resources_available();
                }
            });
        }
    }

    fn check_thread(&self) {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "resource collection used off its producer thread"
        );
    }
}
