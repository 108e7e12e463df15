// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! View-based access control (spec §4.5): security-to-group mapping,
//! access entries, and view-tree-family masks, built on the shared
//! `RowStatus`/`StorageType` conventions.

pub mod access;
pub mod row_status;
pub mod view;

pub use access::{AccessEntry, AccessTable, ContextMatch, GroupEntry, GroupTable, ViewKind};
pub use view::{ViewEntry, ViewFamily, ViewTree};

use std::sync::Arc;

use crate::{data::oid::Oid, error::PriotError, security::Principal};

/// The three VACM tables bundled together, since every access decision
/// (spec §4.5) walks all three in sequence: group membership, then the
/// access row it grants, then the view that row names. `Arc`-wrapped so
/// a row-status-mutating handler (spec §4.6) can hold its own cheap
/// clone of the table it targets without borrowing the whole engine.
#[derive(Debug, Default)]
pub struct Vacm {
    pub groups: Arc<GroupTable>,
    pub access: Arc<AccessTable>,
    pub views: Arc<ViewTree>,
}

impl Vacm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full RFC 3415 §5 access check for one OID: unknown group, no
    /// matching access row, an unnamed view, and an excluded/unmatched
    /// OID are all indistinguishable `NoAccess` failures to the caller
    /// (spec §4.5's "no view configured" convention).
    pub fn check_access(&self, principal: &Principal, oid: &Oid, kind: ViewKind) -> Result<(), PriotError> {
        let group = self
            .groups
            .group_for(principal.security_model, &principal.security_name)
            .ok_or(PriotError::NoAccess)?;
        let view = self
            .access
            .resolve(&group, &principal.context_name, principal.security_model, principal.security_level, kind)
            .ok_or(PriotError::NoAccess)?;
        if !self.views.is_permitted(&view, oid) {
            return Err(PriotError::NoAccess);
        }
        Ok(())
    }
}
