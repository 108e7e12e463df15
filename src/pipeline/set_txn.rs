// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The five-phase SET transaction (spec §4.6, RFC 1905 §4.2.5): every
//! varbind in one incoming SET PDU is grouped by the handler that owns
//! it, then walked through reserve-1, reserve-2, action and commit in
//! lockstep across handlers, with undo/free cleanup on any abort.
//! VACM's write view gates the whole PDU before any phase runs.

use crate::{
    data::{oid::Oid, pdu::Pdu, Varbind},
    engine::EngineContext,
    error::PriotError,
    pipeline::{
        handler::{Handler, HandlerKind, HandlerOutcome, RequestMode},
        park_request,
        session::Session,
    },
    security::Principal,
    vacm::ViewKind,
};

/// One handler's share of a SET PDU: its registered root, the concrete
/// handler, and the 0-based positions in `Pdu::varbinds` it owns.
struct Assignment {
    root: Oid,
    handler: HandlerKind,
    indices: Vec<usize>,
}

enum PhaseResult {
    Ok,
    Failed { status: PriotError, global_index: usize, completed: Vec<usize> },
    /// A handler suspended this phase (spec §4.6 "DELEGATED"); the
    /// caller parks the whole PDU rather than finishing the transaction.
    Delegated,
}

fn invoke_phase(assignments: &[Assignment], mode: RequestMode, txn_id: u64, pdu: &Pdu) -> PhaseResult {
    let mut completed = Vec::with_capacity(assignments.len());
    for (a_idx, assignment) in assignments.iter().enumerate() {
        let requests: Vec<Varbind> = assignment.indices.iter().map(|&i| pdu.varbinds[i].clone()).collect();
        match assignment.handler.invoke(mode, txn_id, &requests) {
            HandlerOutcome::Done(_) => completed.push(a_idx),
            HandlerOutcome::Error { status, index } => {
                let global_index = assignment.indices[index];
                return PhaseResult::Failed { status, global_index, completed };
            },
            HandlerOutcome::Delegated => return PhaseResult::Delegated,
        }
    }
    PhaseResult::Ok
}

fn free_all(assignments: &[Assignment], txn_id: u64, pdu: &Pdu) {
    invoke_phase(assignments, RequestMode::SetFree, txn_id, pdu);
}

fn undo_completed(assignments: &[Assignment], completed: &[usize], txn_id: u64, pdu: &Pdu) {
    for &a_idx in completed {
        let assignment = &assignments[a_idx];
        let requests: Vec<Varbind> = assignment.indices.iter().map(|&i| pdu.varbinds[i].clone()).collect();
        assignment.handler.invoke(RequestMode::SetUndo, txn_id, &requests);
    }
}

/// Answers a SET request (spec §4.6). `txn_id` is derived from the
/// PDU's own request id, which is already unique per outstanding
/// request on a session (spec §5 "per-session monotone request-id").
/// If any phase delegates, the whole PDU is freed from this attempt and
/// parked on `session` instead of answered, and `None` is returned
/// (spec §4.6 "DELEGATED"); resuming a mid-transaction SET is left to a
/// future delegating handler, so parking here restarts the transaction
/// from reserve-1 once `complete_delegated` resumes it rather than
/// continuing the phase it suspended in.
pub fn handle_set(ctx: &EngineContext, session: &Session, principal: &Principal, pdu: &Pdu) -> Option<Pdu> {
    for (index, vb) in pdu.varbinds.iter().enumerate() {
        if ctx.vacm.check_access(principal, &vb.oid, ViewKind::Write).is_err() {
            return Some(pdu.response_to(pdu.varbinds.clone(), PriotError::NoAccess.to_error_status(), (index + 1) as u32));
        }
    }

    let mut assignments: Vec<Assignment> = Vec::new();
    for (index, vb) in pdu.varbinds.iter().enumerate() {
        let Some((root, handler)) = ctx.registry.lookup(&principal.context_name, &vb.oid) else {
            return Some(pdu.response_to(pdu.varbinds.clone(), PriotError::NotWritable.to_error_status(), (index + 1) as u32));
        };
        if !ctx.registry.flags_for(&principal.context_name, &vb.oid).is_some_and(|f| f.writable) {
            return Some(pdu.response_to(pdu.varbinds.clone(), PriotError::NotWritable.to_error_status(), (index + 1) as u32));
        }
        match assignments.iter_mut().find(|a| a.root == root) {
            Some(a) => a.indices.push(index),
            None => assignments.push(Assignment { root, handler, indices: vec![index] }),
        }
    }

    let txn_id = pdu.request_id as u32 as u64;

    match invoke_phase(&assignments, RequestMode::SetReserve1, txn_id, pdu) {
        PhaseResult::Ok => {},
        PhaseResult::Delegated => {
            free_all(&assignments, txn_id, pdu);
            park_request(ctx, session, pdu);
            return None;
        },
        PhaseResult::Failed { status, global_index, .. } => {
            // Nothing has reserved resources yet at the point any
            // single handler fails its own reserve-1, but earlier
            // handlers in iteration order may have; free is a no-op on
            // a handler that never reserved anything.
            free_all(&assignments, txn_id, pdu);
            return Some(pdu.response_to(pdu.varbinds.clone(), status.to_error_status(), (global_index + 1) as u32));
        },
    }

    match invoke_phase(&assignments, RequestMode::SetReserve2, txn_id, pdu) {
        PhaseResult::Ok => {},
        PhaseResult::Delegated => {
            free_all(&assignments, txn_id, pdu);
            park_request(ctx, session, pdu);
            return None;
        },
        PhaseResult::Failed { status, global_index, .. } => {
            free_all(&assignments, txn_id, pdu);
            return Some(pdu.response_to(pdu.varbinds.clone(), status.to_error_status(), (global_index + 1) as u32));
        },
    }

    match invoke_phase(&assignments, RequestMode::SetAction, txn_id, pdu) {
        PhaseResult::Ok => {},
        PhaseResult::Delegated => {
            free_all(&assignments, txn_id, pdu);
            park_request(ctx, session, pdu);
            return None;
        },
        PhaseResult::Failed { status, global_index, completed } => {
            undo_completed(&assignments, &completed, txn_id, pdu);
            free_all(&assignments, txn_id, pdu);
            return Some(pdu.response_to(pdu.varbinds.clone(), status.to_error_status(), (global_index + 1) as u32));
        },
    }

    match invoke_phase(&assignments, RequestMode::SetCommit, txn_id, pdu) {
        PhaseResult::Ok => {},
        PhaseResult::Delegated => {
            free_all(&assignments, txn_id, pdu);
            park_request(ctx, session, pdu);
            return None;
        },
        PhaseResult::Failed { global_index, .. } => {
            // A commit failure this late leaves handlers that already
            // committed in their new state and has no general rollback
            // (RFC 1905 §4.2.5); report it and still release whatever
            // is left reserved.
            free_all(&assignments, txn_id, pdu);
            return Some(pdu.response_to(
                pdu.varbinds.clone(),
                PriotError::CommitFailed.to_error_status(),
                (global_index + 1) as u32,
            ));
        },
    }

    Some(pdu.response_to(pdu.varbinds.clone(), 0, 0))
}
