// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The delegated-request cache (spec §4.6 "DELEGATED" outcome, spec §5
//! "suspension only at handler dispatch"): a parked request keeps its
//! original varbinds and deadline until a later `complete_delegated`
//! call resumes it, or the deadline/session teardown cancels it first.
//! Two independent cancellation signals: one fires on deadline expiry,
//! the other on session teardown, and either one wins.

use std::time::Instant;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::data::Varbind;

/// One parked request, keyed by `(session id, request id)` at the
/// caller (spec §4.6: delegation is per outstanding request, which
/// `pipeline::session` already identifies that way).
pub struct DelegatedEntry {
    pub requests: Vec<Varbind>,
    pub deadline: Instant,
    /// Fires when the deadline passes or the session is torn down,
    /// whichever comes first; a handler holding this across an `.await`
    /// observes cancellation without polling `deadline` itself.
    pub cancel: CancellationToken,
}

/// Outcome of sweeping the table for overdue entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegationOutcome {
    /// Resumed normally; the caller already has the handler's result.
    Completed,
    /// The deadline passed before the handler resumed it.
    TimedOut,
}

/// Delegated requests parked across handler suspension, keyed by a
/// caller-assigned id (spec §4.6 property: delegation is per-request).
#[derive(Default)]
pub struct DelegationTable {
    entries: DashMap<u64, DelegatedEntry>,
}

impl DelegationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks `requests` under `id` with the given `deadline`, returning
    /// the token a waiter can hold to learn about expiry or teardown.
    pub fn park(&self, id: u64, requests: Vec<Varbind>, deadline: Instant) -> CancellationToken {
        let cancel = CancellationToken::new();
        self.entries.insert(id, DelegatedEntry { requests, deadline, cancel: cancel.clone() });
        cancel
    }

    /// Removes and returns a parked entry (spec §4.6 "complete_delegated"),
    /// or `None` if it was never parked, already completed, or already
    /// cancelled.
    pub fn complete(&self, id: u64) -> Option<DelegatedEntry> {
        self.entries.remove(&id).map(|(_, entry)| entry)
    }

    /// Cancels and drops a parked entry without completing it (spec §9
    /// Open Question 2: session teardown drops a delegated entry
    /// silently, no response emitted).
    pub fn cancel(&self, id: u64) {
        if let Some((_, entry)) = self.entries.remove(&id) {
            entry.cancel.cancel();
        }
    }

    /// Cancels every entry still parked, for whole-session teardown.
    pub fn cancel_all(&self) {
        for entry in self.entries.iter() {
            entry.cancel.cancel();
        }
        self.entries.clear();
    }

    /// Sweeps entries whose deadline has passed as of `now`, cancelling
    /// and removing each; returns their ids so the caller can surface a
    /// `resourceUnavailable`/timeout response for each one.
    pub fn expire_overdue(&self, now: Instant) -> Vec<u64> {
        let overdue: Vec<u64> =
            self.entries.iter().filter(|e| e.deadline <= now).map(|e| *e.key()).collect();
        for id in &overdue {
            if let Some((_, entry)) = self.entries.remove(id) {
                entry.cancel.cancel();
            }
        }
        overdue
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
