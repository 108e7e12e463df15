// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The request pipeline (spec §4.6): resolves a decoded, VACM-gated PDU
//! into a response, by way of the registry and the handler chain.

use std::{
    sync::atomic::Ordering,
    time::{Duration, Instant},
};

pub mod delegation;
pub mod dispatch;
pub mod handler;
pub mod session;
pub mod set_txn;

pub use delegation::{DelegatedEntry, DelegationOutcome, DelegationTable};
pub use dispatch::handle_read;
pub use handler::{Handler, HandlerKind, HandlerOutcome, RequestMode};
pub use session::{Session, SessionTable};
pub use set_txn::handle_set;

use crate::{data::pdu::Pdu, data::Varbind, engine::EngineContext, error::PriotError};

/// Deadline for a freshly delegated request, `ctx.pipeline.default_deadline_secs`
/// out from now (spec §4.6).
fn delegation_deadline(ctx: &EngineContext) -> Instant {
    Instant::now() + Duration::from_secs(ctx.pipeline.default_deadline_secs)
}

/// Parks `pdu` as outstanding on `session` instead of answering it, so a
/// later [`complete_delegated`] or [`expire_delegated`] finishes it
/// (spec §4.6 "DELEGATED ... suspends the request rather than
/// synthesizing a result").
pub(crate) fn park_request(ctx: &EngineContext, session: &Session, pdu: &Pdu) {
    session.begin(pdu.request_id, pdu.clone(), delegation_deadline(ctx));
}

/// Resumes a request a delegated handler has finished answering, per
/// spec §6: builds the response PDU from the original request and the
/// handler's final varbinds. Returns `None` if `request_id` is not
/// (or no longer) outstanding on this session — a duplicate or
/// already-expired completion, both silently dropped.
pub fn complete_delegated(session: &Session, request_id: i32, varbinds: Vec<Varbind>) -> Option<Pdu> {
    let outstanding = session.complete(request_id)?;
    Some(outstanding.pdu.response_to(varbinds, 0, 0))
}

/// Sweeps `session` for requests whose delegation deadline has passed
/// and synthesizes a `genErr` response for each (spec §4.6 "cancelled
/// on deadline expiry ... genErr + timeout counter").
pub fn expire_delegated(ctx: &EngineContext, session: &Session, now: Instant) -> Vec<Pdu> {
    session
        .expire_overdue(now)
        .into_iter()
        .map(|(_, outstanding)| {
            ctx.counters.pipeline_delegation_timeouts.fetch_add(1, Ordering::Relaxed);
            let varbinds = outstanding.pdu.varbinds.clone();
            outstanding.pdu.response_to(varbinds, PriotError::GenErr.to_error_status(), 0)
        })
        .collect()
}
