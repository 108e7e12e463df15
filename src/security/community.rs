// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! v1/v2c community-string security (spec §4.3): the minimal
//! single-step variant of the USM pipeline shape — a table lookup that
//! either produces a principal or rejects the message outright.

use dashmap::DashMap;

use crate::{error::PriotError, security::Principal};

/// One row of the community table: which security-name (and VACM
/// context) a cleartext community string maps to.
#[derive(Debug, Clone)]
pub struct CommunityEntry {
    pub security_name: String,
    pub context_name: String,
}

/// `community string -> (security-name, context)`. Populated from
/// configuration or management SETs (spec §3's VACM-adjacent tables share
/// this lifecycle).
#[derive(Debug, Default)]
pub struct CommunityTable {
    entries: DashMap<Vec<u8>, CommunityEntry>,
}

impl CommunityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, community: impl Into<Vec<u8>>, entry: CommunityEntry) {
        self.entries.insert(community.into(), entry);
    }

    pub fn remove(&self, community: &[u8]) {
        self.entries.remove(community);
    }

    /// Resolves a cleartext community string to a principal. An unknown
    /// community is an authentication failure: the datagram is dropped,
    /// mirroring v3's "unknown user" rejection but without a report PDU
    /// (v1/v2c never emits reports).
    pub fn resolve(&self, community: &[u8]) -> Result<Principal, PriotError> {
        let entry = self
            .entries
            .get(community)
            .ok_or(PriotError::AuthenticationFailure)?;
        Ok(Principal::community(entry.security_name.clone(), entry.context_name.clone()))
    }
}
