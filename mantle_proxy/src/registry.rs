// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Liveness registry for proxies.
//!
//! Consumer-side callbacks hold a [`ProxyHandle`] (slot + generation) instead
//! of a pointer to the proxy. Before acting they ask the [`ProxyRegistry`]
//! whether the handle is still live; once a proxy retires its handle, every
//! copy of it reads as dead, even if the slot is reused.
//!
//! The registry is an ordinary value owned by the embedder. Independent
//! registries never share state.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// A handle to a registered proxy.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProxyHandle {
    slot: u32,
    generation: u32,
}

impl ProxyHandle {
    /// Slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn slot(self) -> u32 {
        self.slot
    }

    /// Generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProxyHandle({}@gen{})", self.slot, self.generation)
    }
}

#[derive(Debug, Default)]
struct Slots {
    generation: Vec<u32>,
    live: Vec<bool>,
    free_list: Vec<u32>,
}

/// Shared slot table. Cloning shares the same table.
#[derive(Clone, Debug, Default)]
pub struct ProxyRegistry {
    slots: Arc<RwLock<Slots>>,
}

impl ProxyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new live proxy.
    pub fn register(&self) -> ProxyHandle {
        let mut slots = self.slots.write();
        let slot = if let Some(slot) = slots.free_list.pop() {
            slots.live[slot as usize] = true;
            slot
        } else {
            let slot = u32::try_from(slots.generation.len())
                .unwrap_or_else(|_| panic!("proxy registry exhausted"));
            slots.generation.push(0);
            slots.live.push(true);
            slot
        };
        ProxyHandle {
            slot,
            generation: slots.generation[slot as usize],
        }
    }

    /// Retires `handle`. Returns `false` if it was already dead.
    pub fn retire(&self, handle: ProxyHandle) -> bool {
        let mut slots = self.slots.write();
        let idx = handle.slot as usize;
        let live = idx < slots.generation.len()
            && slots.live[idx]
            && slots.generation[idx] == handle.generation;
        if !live {
            return false;
        }
        // Bump generation so copies of the handle fail validation.
        slots.generation[idx] = slots.generation[idx].wrapping_add(1);
        slots.live[idx] = false;
        slots.free_list.push(handle.slot);
        true
    }

    /// Whether `handle` refers to a live proxy.
    #[must_use]
    pub fn is_alive(&self, handle: ProxyHandle) -> bool {
        let slots = self.slots.read();
        let idx = handle.slot as usize;
        idx < slots.generation.len()
            && slots.live[idx]
            && slots.generation[idx] == handle.generation
    }

    /// Number of live proxies.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.slots.read().live.iter().filter(|&&live| live).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retired_handles_stay_dead_after_slot_reuse() {
        let registry = ProxyRegistry::new();
        let first = registry.register();
        assert!(registry.is_alive(first));
        assert!(registry.retire(first));
        assert!(!registry.is_alive(first));
        assert!(!registry.retire(first), "retire is idempotent");

        let second = registry.register();
        assert_eq!(second.slot(), first.slot());
        assert_ne!(second.generation(), first.generation());
        assert!(registry.is_alive(second));
        assert!(!registry.is_alive(first));
    }

    #[test]
    fn registries_are_independent() {
        let a = ProxyRegistry::new();
        let b = ProxyRegistry::new();
        let handle = a.register();
        assert!(!b.is_alive(handle));
        assert_eq!(a.live_count(), 1);
        assert_eq!(b.live_count(), 0);
    }

    #[test]
    fn clones_share_the_table() {
        let registry = ProxyRegistry::new();
        let handle = registry.register();
        let shared = registry.clone();
        shared.retire(handle);
        assert!(!registry.is_alive(handle));
    }
}
