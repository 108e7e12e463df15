// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! GET / GETNEXT / GETBULK resolution (spec §4.6): single-pass
//! traversal over the subtree registry, gated by VACM at every step.
//! Codec and registry/VACM lookups are non-suspending (spec §5); only
//! the handler invocation itself may delegate.

use crate::{
    data::{
        pdu::{Pdu, PduKind, SnmpVersion},
        value::Value,
        Varbind,
    },
    engine::EngineContext,
    error::PriotError,
    pipeline::{
        handler::{Handler, HandlerOutcome, RequestMode},
        park_request,
        session::Session,
    },
    security::Principal,
    vacm::ViewKind,
};

/// Safety bound on VACM-excluded-instance skipping and cross-subtree
/// hops per GETNEXT step, so a misbehaving handler chain can't spin the
/// dispatcher forever; hit only by a pathological registration.
const MAX_TRAVERSAL_STEPS: usize = 4096;

/// One varbind's resolution: a value to return now, or a signal that a
/// handler delegated and the whole PDU must be parked instead (spec
/// §4.6 "DELEGATED").
enum Resolved {
    Value(Varbind),
    Delegated,
}

/// One step of GET: exact-instance lookup, gated by the read view.
fn resolve_get_one(ctx: &EngineContext, principal: &Principal, oid: &crate::data::oid::Oid) -> Resolved {
    if ctx.vacm.check_access(principal, oid, ViewKind::Read).is_err() {
        return Resolved::Value(Varbind::new(oid.clone(), Value::NoSuchObject));
    }
    let Some((_, handler)) = ctx.registry.lookup(&principal.context_name, oid) else {
        return Resolved::Value(Varbind::new(oid.clone(), Value::NoSuchObject));
    };
    if !ctx.registry.flags_for(&principal.context_name, oid).is_some_and(|f| f.readable) {
        return Resolved::Value(Varbind::new(oid.clone(), Value::NoSuchObject));
    }
    let request = [Varbind::new(oid.clone(), Value::Null)];
    match handler.invoke(RequestMode::Get, 0, &request) {
        HandlerOutcome::Done(mut vbs) => {
            Resolved::Value(vbs.pop().unwrap_or_else(|| Varbind::new(oid.clone(), Value::NoSuchInstance)))
        },
        HandlerOutcome::Delegated => Resolved::Delegated,
        HandlerOutcome::Error { .. } => Resolved::Value(Varbind::new(oid.clone(), Value::NoSuchInstance)),
    }
}

/// One step of GETNEXT: walks forward through the registry/handler
/// space until it finds an instance the principal's read view permits,
/// or runs off the end of the MIB tree.
fn resolve_get_next_one(ctx: &EngineContext, principal: &Principal, start: &crate::data::oid::Oid) -> Resolved {
    let mut cursor = start.clone();
    // Once a subtree reports `EndOfMibView`, `cursor` holds that
    // subtree's own root, which is a prefix of itself: plain `lookup`
    // would re-match the exhausted subtree forever. Forcing
    // `lookup_next` on the next step skips straight past it.
    let mut exhausted_root = false;
    for _ in 0..MAX_TRAVERSAL_STEPS {
        let found = if exhausted_root {
            ctx.registry.lookup_next(&principal.context_name, &cursor)
        } else {
            ctx.registry
                .lookup(&principal.context_name, &cursor)
                .or_else(|| ctx.registry.lookup_next(&principal.context_name, &cursor))
        };
        let Some((root, handler)) = found else {
            return Resolved::Value(Varbind::new(start.clone(), Value::EndOfMibView));
        };
        if !ctx.registry.flags_for(&principal.context_name, &root).is_some_and(|f| f.readable) {
            // A write-only registration has nothing to offer GETNEXT;
            // hop past it the same way an exhausted subtree is skipped.
            cursor = root;
            exhausted_root = true;
            continue;
        }
        // Every handler's GetNext/GetBulk arm answers "smallest instance
        // strictly greater than the given oid", so the cursor itself
        // (not the subtree root) is always the right search key.
        let request = [Varbind::new(cursor.clone(), Value::Null)];
        let candidate = match handler.invoke(RequestMode::GetNext, 0, &request) {
            HandlerOutcome::Done(mut vbs) => Some(vbs.pop()),
            HandlerOutcome::Delegated => return Resolved::Delegated,
            HandlerOutcome::Error { .. } => None,
        };
        match candidate.flatten() {
            Some(vb) if vb.value == Value::EndOfMibView => {
                // This subtree is exhausted; hop past it.
                cursor = root;
                exhausted_root = true;
            },
            Some(vb) => {
                if ctx.vacm.check_access(principal, &vb.oid, ViewKind::Read).is_ok() {
                    return Resolved::Value(vb);
                }
                cursor = vb.oid;
                exhausted_root = false;
            },
            None => return Resolved::Value(Varbind::new(start.clone(), Value::EndOfMibView)),
        }
    }
    Resolved::Value(Varbind::new(start.clone(), Value::EndOfMibView))
}

/// Answers a GET request (spec §4.6): every varbind resolved
/// independently; an unresolvable instance becomes an exception value,
/// never a whole-PDU error, for v2c/v3. v1 has no exception values
/// (RFC 1157): the first one found is promoted to a `noSuchName`
/// error-status instead. If any handler delegates, the whole PDU is
/// parked on `session` instead of answered, and `None` is returned
/// (spec §4.6 "DELEGATED").
pub fn handle_get(ctx: &EngineContext, session: &Session, principal: &Principal, pdu: &Pdu) -> Option<Pdu> {
    let mut resolved = Vec::with_capacity(pdu.varbinds.len());
    for vb in &pdu.varbinds {
        match resolve_get_one(ctx, principal, &vb.oid) {
            Resolved::Value(v) => resolved.push(v),
            Resolved::Delegated => {
                park_request(ctx, session, pdu);
                return None;
            },
        }
    }
    Some(finish_read_response(pdu, resolved))
}

/// Answers a GETNEXT request (spec §4.6).
pub fn handle_get_next(ctx: &EngineContext, session: &Session, principal: &Principal, pdu: &Pdu) -> Option<Pdu> {
    let mut resolved = Vec::with_capacity(pdu.varbinds.len());
    for vb in &pdu.varbinds {
        match resolve_get_next_one(ctx, principal, &vb.oid) {
            Resolved::Value(v) => resolved.push(v),
            Resolved::Delegated => {
                park_request(ctx, session, pdu);
                return None;
            },
        }
    }
    Some(finish_read_response(pdu, resolved))
}

/// Answers a GETBULK request (spec §4.6): the first `non_repeaters`
/// varbinds behave like GETNEXT once; the remainder are walked forward
/// `max_repetitions` times each, interleaved in request order, capped by
/// `max_varbinds` — itself the smaller of the configured GETBULK
/// response cap and the peer's advertised message-size budget (spec
/// §4.6 "capped by a configurable maximum varbind count ... and the
/// transport max-message-size, whichever is smaller"), which the caller
/// computes before calling in.
pub fn handle_get_bulk(ctx: &EngineContext, session: &Session, principal: &Principal, pdu: &Pdu, max_varbinds: u32) -> Option<Pdu> {
    let non_repeaters = (pdu.non_repeaters as usize).min(pdu.varbinds.len());
    let (single, repeated) = pdu.varbinds.split_at(non_repeaters);

    let mut out: Vec<Varbind> = Vec::with_capacity(single.len());
    for vb in single {
        match resolve_get_next_one(ctx, principal, &vb.oid) {
            Resolved::Value(v) => out.push(v),
            Resolved::Delegated => {
                park_request(ctx, session, pdu);
                return None;
            },
        }
    }

    let mut cursors: Vec<crate::data::oid::Oid> = repeated.iter().map(|vb| vb.oid.clone()).collect();
    let mut exhausted = vec![false; cursors.len()];
    let cap = max_varbinds as usize;

    'repeat: for _ in 0..pdu.max_repetitions {
        for (i, cursor) in cursors.iter_mut().enumerate() {
            if exhausted[i] {
                continue;
            }
            if out.len() >= cap {
                break 'repeat;
            }
            let vb = match resolve_get_next_one(ctx, principal, cursor) {
                Resolved::Value(v) => v,
                Resolved::Delegated => {
                    park_request(ctx, session, pdu);
                    return None;
                },
            };
            if vb.value == Value::EndOfMibView {
                exhausted[i] = true;
            } else {
                *cursor = vb.oid.clone();
            }
            out.push(vb);
        }
        if exhausted.iter().all(|e| *e) {
            break;
        }
    }

    Some(finish_read_response(pdu, out))
}

/// v1 has no per-varbind exception values; the first one found becomes
/// a whole-PDU `noSuchName` (RFC 1157 §4.1.2).
fn finish_read_response(pdu: &Pdu, varbinds: Vec<Varbind>) -> Pdu {
    if pdu.version == SnmpVersion::V1 {
        if let Some(index) = varbinds.iter().position(|vb| vb.value.is_exception()) {
            return pdu.response_to(pdu.varbinds.clone(), PriotError::NoSuchName.to_error_status(), (index + 1) as u32);
        }
    }
    pdu.response_to(varbinds, 0, 0)
}

/// Dispatches any read-mode PDU (`Get`/`GetNext`/`GetBulk`) to the
/// matching handler above. `max_varbinds` is the caller's already-capped
/// GETBULK budget (see [`handle_get_bulk`]); ignored by `Get`/`GetNext`.
pub fn handle_read(ctx: &EngineContext, session: &Session, principal: &Principal, pdu: &Pdu, max_varbinds: u32) -> Option<Pdu> {
    match pdu.kind {
        PduKind::Get => handle_get(ctx, session, principal, pdu),
        PduKind::GetNext => handle_get_next(ctx, session, principal, pdu),
        PduKind::GetBulk => handle_get_bulk(ctx, session, principal, pdu, max_varbinds),
        other => unreachable!("handle_read invoked for non-read kind {other:?}"),
    }
}
