// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! One registered subtree (spec §3 / §4.4): an OID prefix, an optional
//! range upper bound, a priority used to arbitrate overlapping
//! registrations, the context it is registered under, the session that
//! owns it, and the handler it dispatches to.

use crate::data::oid::Oid;

/// Opaque handle to a registered subtree, returned by
/// [`super::tree::SubtreeRegistry::insert`] and required by `remove`.
/// Indexes into the registry's arena rather than pointing at it, per
/// spec §9's "arena-indexed nodes" redesign note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(pub(crate) u64);

/// Whether a registration names one fixed instance (a scalar, or one
/// already-complete table row) or a whole table subtree that may hold
/// many instances under it (spec §3: "instance vs. table").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtreeKind {
    Instance,
    Table,
}

/// Session-local flags carried by every registration (spec §3:
/// "session-local flags (readable, writable, instance vs. table,
/// etc.)"), consulted before a handler is ever invoked so a read against
/// a write-only node (or vice versa) fails without reaching it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubtreeFlags {
    pub readable: bool,
    pub writable: bool,
    pub kind: SubtreeKind,
}

impl SubtreeFlags {
    pub fn read_only_instance() -> Self {
        Self { readable: true, writable: false, kind: SubtreeKind::Instance }
    }

    pub fn read_write_instance() -> Self {
        Self { readable: true, writable: true, kind: SubtreeKind::Instance }
    }

    pub fn read_only_table() -> Self {
        Self { readable: true, writable: false, kind: SubtreeKind::Table }
    }

    pub fn read_write_table() -> Self {
        Self { readable: true, writable: true, kind: SubtreeKind::Table }
    }
}

#[derive(Debug, Clone)]
pub struct Entry<H> {
    pub id: RegistrationId,
    pub oid: Oid,
    /// When set, this registration covers every `oid` whose sub-identifier
    /// at the position of `self.oid`'s last sub-id falls in
    /// `[self.oid.last(), range_ubound]` (spec §3: "the registration
    /// applies to `[prefix, prefix with last sub-id ≤ range_ubound]`"),
    /// rather than requiring an exact prefix match at that position.
    pub range_ubound: Option<u32>,
    pub priority: i32,
    /// Empty string is the default context (spec §3).
    pub context: String,
    /// Id of the session that registered this subtree, consulted by
    /// [`super::tree::SubtreeRegistry::unregister_session`] for bulk
    /// teardown.
    pub session: u64,
    pub insertion_order: u64,
    pub flags: SubtreeFlags,
    pub handler: H,
}

impl<H> Entry<H> {
    /// Whether `oid` falls under this registration: with no range, an
    /// ordinary prefix match; with a range, the prefix sans its last
    /// sub-id must match and `oid`'s sub-id at that position must lie in
    /// `[self.oid.last(), range_ubound]` (spec §3/§4.4).
    pub(crate) fn covers(&self, oid: &Oid) -> bool {
        match self.range_ubound {
            None => self.oid.is_prefix_of(oid),
            Some(ubound) => {
                let prefix = self.oid.as_slice();
                let Some((&last, head)) = prefix.split_last() else {
                    return false;
                };
                let candidate = oid.as_slice();
                candidate.len() > head.len()
                    && candidate[..head.len()] == *head
                    && candidate[head.len()] >= last
                    && candidate[head.len()] <= ubound
            },
        }
    }
}
