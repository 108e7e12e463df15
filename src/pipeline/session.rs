// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Long-lived per-peer session state (spec §5: "per-session monotone
//! request-id/salt counters"): one `Session` per transport peer, holding
//! its own request-id generator and the map of requests still in
//! flight (waiting on a delegated handler or a SET transaction).
//! A `DashMap`-keyed table of `Arc`-shared per-peer state, each with its
//! own `AtomicU32` sequence generator.

use std::{
    sync::{
        atomic::{AtomicI32, AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

use dashmap::DashMap;

use crate::{data::pdu::Pdu, pipeline::delegation::DelegationTable};

/// A request this session has received but not yet fully answered
/// (parked pending a delegated handler, or mid-SET-transaction).
pub struct OutstandingRequest {
    pub pdu: Pdu,
    pub deadline: Instant,
}

/// Per-peer state: its own request-id counter (spec §5) and the set of
/// requests currently in flight.
pub struct Session {
    pub id: u64,
    next_request_id: AtomicI32,
    outstanding: DashMap<i32, OutstandingRequest>,
    pub delegated: DelegationTable,
}

impl Session {
    fn new(id: u64) -> Self {
        Self { id, next_request_id: AtomicI32::new(1), outstanding: DashMap::new(), delegated: DelegationTable::new() }
    }

    /// Next request id for a message this agent originates on this
    /// session (a notification, or a report); monotone, wraps on
    /// overflow since no single session lives long enough to matter.
    pub fn next_request_id(&self) -> i32 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Parks `pdu` as outstanding until [`complete`](Self::complete) or
    /// [`expire_overdue`](Self::expire_overdue) removes it.
    pub fn begin(&self, request_id: i32, pdu: Pdu, deadline: Instant) {
        self.outstanding.insert(request_id, OutstandingRequest { pdu, deadline });
    }

    /// Removes and returns a request this session finished answering.
    pub fn complete(&self, request_id: i32) -> Option<OutstandingRequest> {
        self.outstanding.remove(&request_id).map(|(_, r)| r)
    }

    /// Sweeps requests whose deadline has passed, removing each and
    /// cancelling any delegation parked under the same id. Returns the
    /// removed requests themselves (not just their ids) so a caller can
    /// synthesize a `genErr` response from the original PDU (spec §4.6
    /// "cancelled on deadline expiry").
    pub fn expire_overdue(&self, now: Instant) -> Vec<(i32, OutstandingRequest)> {
        let overdue: Vec<i32> =
            self.outstanding.iter().filter(|r| r.deadline <= now).map(|r| *r.key()).collect();
        let mut expired = Vec::with_capacity(overdue.len());
        for id in overdue {
            if let Some((_, request)) = self.outstanding.remove(&id) {
                expired.push((id, request));
            }
            self.delegated.cancel(id as u64);
        }
        expired
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    /// Tears the session down: cancels every delegated request without
    /// completing it (spec §9 Open Question 2) and drops all
    /// outstanding state.
    pub fn close(&self) {
        self.delegated.cancel_all();
        self.outstanding.clear();
    }
}

/// All sessions a transport layer currently has open, keyed by an
/// opaque id the transport assigns (e.g. a connection handle).
#[derive(Default)]
pub struct SessionTable {
    sessions: DashMap<u64, Arc<Session>>,
    next_session_id: AtomicU64,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) -> Arc<Session> {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(Session::new(id));
        self.sessions.insert(id, session.clone());
        session
    }

    pub fn get(&self, id: u64) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|e| e.clone())
    }

    pub fn close(&self, id: u64) {
        if let Some((_, session)) = self.sessions.remove(&id) {
            session.close();
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::data::{
        pdu::{PduKind, SecurityParams, SnmpVersion},
        Varbind,
    };

    fn sample_pdu() -> Pdu {
        Pdu::new_request(SnmpVersion::V2c, PduKind::Get, 1, Vec::<Varbind>::new(), SecurityParams::community("public"))
    }

    #[test]
    fn request_ids_are_monotone_per_session() {
        let session = Session::new(1);
        let ids: Vec<i32> = (0..3).map(|_| session.next_request_id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn complete_removes_a_parked_request() {
        let session = Session::new(1);
        session.begin(7, sample_pdu(), Instant::now() + Duration::from_secs(30));
        assert_eq!(session.outstanding_count(), 1);
        assert!(session.complete(7).is_some());
        assert_eq!(session.outstanding_count(), 0);
    }

    #[test]
    fn expire_overdue_drops_only_past_deadline_requests() {
        let session = Session::new(1);
        let now = Instant::now();
        session.begin(1, sample_pdu(), now - Duration::from_secs(1));
        session.begin(2, sample_pdu(), now + Duration::from_secs(60));

        let expired = session.expire_overdue(now);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, 1);
        assert_eq!(session.outstanding_count(), 1);
    }

    #[test]
    fn session_table_open_and_close_round_trip() {
        let table = SessionTable::new();
        let session = table.open();
        let id = session.id;
        assert!(table.get(id).is_some());
        table.close(id);
        assert!(table.get(id).is_none());
    }
}
