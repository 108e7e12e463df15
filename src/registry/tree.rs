// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The subtree registry (spec §4.4): `(context, OID)`-indexed handler
//! dispatch with longest-prefix-then-lowest-priority-then-insertion-order
//! matching, backed by a flat arena rather than a pointer-linked tree
//! (spec §9 redesign note) so a registration can be addressed by a
//! stable, `Copy` id instead of a reference into the structure.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    RwLock,
};
use thiserror::Error;

use crate::{
    data::oid::Oid,
    registry::{
        cache::BoundedLru,
        node::{Entry, RegistrationId, SubtreeFlags},
    },
};

/// Entries above this count stop getting a cached lookup; small enough
/// to bound memory, large enough to cover a busy agent's working set.
const LOOKUP_CACHE_CAPACITY: usize = 512;

/// Failure from a registry mutation (spec §4.4: "`register` failures
/// ... are returned to the caller, not logged").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate registration for this (prefix, range, priority, context)")]
    Duplicate,
}

/// `H` is the handler payload a caller associates with a subtree; the
/// registry itself is handler-agnostic (the request pipeline supplies the
/// concrete dispatch type).
pub struct SubtreeRegistry<H: Clone> {
    // Kept sorted by `oid` ascending; mutation is rare (registration
    // happens at startup / via management SETs) relative to lookup, so a
    // `RwLock` over a sorted `Vec` favors read throughput over O(1)
    // mutation.
    entries: RwLock<Vec<Entry<H>>>,
    next_id: AtomicU64,
    next_insertion_order: AtomicU64,
    #[allow(clippy::type_complexity)]
    cache: BoundedLru<(String, Vec<u32>), Option<(Oid, H)>>,
}

impl<H: Clone> Default for SubtreeRegistry<H> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            next_insertion_order: AtomicU64::new(0),
            cache: BoundedLru::new(LOOKUP_CACHE_CAPACITY),
        }
    }
}

impl<H: Clone> SubtreeRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `oid` in `context`, owned by `session`
    /// (spec §4.4 `register`). `priority` arbitrates overlapping
    /// registrations — the lowest value wins. Rejects an exact duplicate
    /// of `(oid, range_ubound, priority, context)`. Returns an id stable
    /// across later mutation of the registry. `flags` records the
    /// session-local readable/writable/instance-vs-table bits spec §3
    /// attaches to every subtree node, queried by callers that need to
    /// reject a request before ever invoking the handler (e.g. a GET
    /// against a write-only node).
    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        &self,
        oid: Oid,
        range_ubound: Option<u32>,
        priority: i32,
        context: &str,
        session: u64,
        flags: SubtreeFlags,
        handler: H,
    ) -> Result<RegistrationId, RegistryError> {
        let mut entries = self.entries.write().expect("registry lock poisoned");
        let duplicate = entries.iter().any(|e| {
            e.oid == oid && e.range_ubound == range_ubound && e.priority == priority && e.context == context
        });
        if duplicate {
            return Err(RegistryError::Duplicate);
        }
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let insertion_order = self.next_insertion_order.fetch_add(1, Ordering::Relaxed);
        let entry = Entry {
            id,
            oid,
            range_ubound,
            priority,
            context: context.to_string(),
            session,
            insertion_order,
            flags,
            handler,
        };
        let pos = entries.partition_point(|e| e.oid < entry.oid);
        entries.insert(pos, entry);
        drop(entries);
        self.cache.clear();
        Ok(id)
    }

    pub fn remove(&self, id: RegistrationId) -> bool {
        let mut entries = self.entries.write().expect("registry lock poisoned");
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        drop(entries);
        if removed {
            self.cache.clear();
        }
        removed
    }

    /// Removes the exact registration `(oid, range_ubound, priority,
    /// context)` (spec §4.4 `unregister`); a no-op if not found.
    pub fn unregister(&self, oid: &Oid, range_ubound: Option<u32>, priority: i32, context: &str) -> bool {
        let mut entries = self.entries.write().expect("registry lock poisoned");
        let before = entries.len();
        entries.retain(|e| {
            !(&e.oid == oid && e.range_ubound == range_ubound && e.priority == priority && e.context == context)
        });
        let removed = entries.len() != before;
        drop(entries);
        if removed {
            self.cache.clear();
        }
        removed
    }

    /// Bulk removal of every registration owned by `session` (spec §4.4
    /// `unregister_session`, used on agent shutdown or subagent
    /// disconnection). Best-effort and cannot fail; returns the count
    /// removed.
    pub fn unregister_session(&self, session: u64) -> usize {
        let mut entries = self.entries.write().expect("registry lock poisoned");
        let before = entries.len();
        entries.retain(|e| e.session != session);
        let removed = before - entries.len();
        drop(entries);
        if removed > 0 {
            self.cache.clear();
        }
        removed
    }

    /// Exact-ownership lookup (spec §4.4 `lookup`) within `context`: the
    /// registered subtree covering `oid`, picking the longest matching
    /// prefix, then the lowest priority, then the earliest registration.
    /// Served from the bounded LRU cache when a prior lookup for the same
    /// `(context, oid)` is still resident.
    pub fn lookup(&self, context: &str, oid: &Oid) -> Option<(Oid, H)> {
        let key = (context.to_string(), oid.as_slice().to_vec());
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }
        let entries = self.entries.read().expect("registry lock poisoned");
        let mut best: Option<&Entry<H>> = None;
        for entry in entries.iter() {
            if entry.context != context || !entry.covers(oid) {
                continue;
            }
            let better = match best {
                None => true,
                Some(b) => {
                    (entry.oid.len(), std::cmp::Reverse(entry.priority), std::cmp::Reverse(entry.insertion_order))
                        > (b.oid.len(), std::cmp::Reverse(b.priority), std::cmp::Reverse(b.insertion_order))
                },
            };
            if better {
                best = Some(entry);
            }
        }
        let result = best.map(|e| (e.oid.clone(), e.handler.clone()));
        drop(entries);
        self.cache.insert(key, result.clone());
        result
    }

    /// Session-local flags of whichever registration [`lookup`](Self::lookup)
    /// would resolve for `(context, oid)`, without touching the lookup
    /// cache. Callers consult this before invoking a handler, so a GET
    /// against a write-only node or a SET against a read-only one is
    /// rejected without ever reaching the handler (spec §3's
    /// "session-local flags").
    pub fn flags_for(&self, context: &str, oid: &Oid) -> Option<SubtreeFlags> {
        let entries = self.entries.read().expect("registry lock poisoned");
        let mut best: Option<&Entry<H>> = None;
        for entry in entries.iter() {
            if entry.context != context || !entry.covers(oid) {
                continue;
            }
            let better = match best {
                None => true,
                Some(b) => {
                    (entry.oid.len(), std::cmp::Reverse(entry.priority), std::cmp::Reverse(entry.insertion_order))
                        > (b.oid.len(), std::cmp::Reverse(b.priority), std::cmp::Reverse(b.insertion_order))
                },
            };
            if better {
                best = Some(entry);
            }
        }
        best.map(|e| e.flags)
    }

    /// Lexicographic-successor lookup (spec §4.4 `lookup_next`, used by
    /// GETNEXT/GETBULK traversal once a subtree is exhausted) within
    /// `context`: the registered subtree whose root is the smallest
    /// strictly greater than `oid`. Callers first try
    /// [`lookup`](Self::lookup) to continue inside a subtree already
    /// containing `oid`; this is only reached once that subtree has no
    /// further instance to offer.
    pub fn lookup_next(&self, context: &str, oid: &Oid) -> Option<(Oid, H)> {
        let entries = self.entries.read().expect("registry lock poisoned");
        entries
            .iter()
            .filter(|entry| entry.context == context)
            .find(|entry| &entry.oid > oid)
            .map(|e| (e.oid.clone(), e.handler.clone()))
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
