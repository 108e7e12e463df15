// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Top-level SNMP message encode/decode (spec §4.1, §6): the v1/v2c
//! envelope, the v3 header/scopedPDU framing, and the PDU body shared by
//! every request/response/notification kind.

use crate::{
    codec::{
        ber::{build_tag_length, parse_header, Class, Encoder, Tag},
        primitives::{
            build_integer, build_ip_address, build_oid, build_octet_string, parse_integer,
            parse_integer32, parse_ip_address, parse_oid, parse_octet_string, parse_time_ticks,
            build_time_ticks, TAG_END_OF_MIB_VIEW, TAG_NO_SUCH_INSTANCE, TAG_NO_SUCH_OBJECT,
            TAG_NULL, TAG_OID,
        },
    },
    data::{
        oid::Oid,
        pdu::{Pdu, PduKind, SecurityParams, SnmpVersion, TrapV1Fields},
        value::Value,
        Varbind,
    },
    error::PriotError,
};

const TAG_GET: Tag = Tag::context(0, true);
const TAG_GET_NEXT: Tag = Tag::context(1, true);
const TAG_RESPONSE: Tag = Tag::context(2, true);
const TAG_SET: Tag = Tag::context(3, true);
const TAG_TRAP_V1: Tag = Tag::context(4, true);
const TAG_GET_BULK: Tag = Tag::context(5, true);
const TAG_INFORM: Tag = Tag::context(6, true);
const TAG_TRAP_V2: Tag = Tag::context(7, true);
const TAG_REPORT: Tag = Tag::context(8, true);

fn kind_to_tag(kind: PduKind) -> Tag {
    match kind {
        PduKind::Get => TAG_GET,
        PduKind::GetNext => TAG_GET_NEXT,
        PduKind::GetBulk => TAG_GET_BULK,
        PduKind::Set => TAG_SET,
        PduKind::Response => TAG_RESPONSE,
        PduKind::TrapV1 => TAG_TRAP_V1,
        PduKind::TrapV2 => TAG_TRAP_V2,
        PduKind::Inform => TAG_INFORM,
        PduKind::Report => TAG_REPORT,
    }
}

fn tag_to_kind(tag: Tag) -> Result<PduKind, PriotError> {
    Ok(match tag {
        TAG_GET => PduKind::Get,
        TAG_GET_NEXT => PduKind::GetNext,
        TAG_GET_BULK => PduKind::GetBulk,
        TAG_SET => PduKind::Set,
        TAG_RESPONSE => PduKind::Response,
        TAG_TRAP_V1 => PduKind::TrapV1,
        TAG_TRAP_V2 => PduKind::TrapV2,
        TAG_INFORM => PduKind::Inform,
        TAG_REPORT => PduKind::Report,
        _ => return Err(PriotError::InvalidTag(0)),
    })
}

/// Encodes one varbind's value at the wire `ANY` position.
fn build_value(value: &Value) -> Vec<u8> {
    match value {
        Value::Integer32(v) => build_integer(i64::from(*v)),
        Value::OctetString(s) => build_octet_string(s),
        Value::Null => build_tag_length(TAG_NULL, 0),
        Value::ObjectId(o) => build_oid(o),
        Value::IpAddress(a) => build_ip_address(*a),
        Value::Counter32(v) => crate::codec::primitives::build_counter32(*v),
        Value::Gauge32(v) => crate::codec::primitives::build_unsigned(*v),
        Value::TimeTicks(v) => build_time_ticks(*v),
        Value::Opaque(b) => crate::codec::primitives::build_opaque(b),
        Value::Counter64(v) => crate::codec::primitives::build_counter64(*v),
        Value::NoSuchObject => build_tag_length(TAG_NO_SUCH_OBJECT, 0),
        Value::NoSuchInstance => build_tag_length(TAG_NO_SUCH_INSTANCE, 0),
        Value::EndOfMibView => build_tag_length(TAG_END_OF_MIB_VIEW, 0),
    }
}

fn parse_value(buf: &[u8]) -> Result<(Value, &[u8]), PriotError> {
    let hdr = parse_header(buf)?;
    let tag = hdr.tag;
    Ok(match tag {
        crate::codec::primitives::TAG_INTEGER => {
            let (v, rest) = parse_integer32(buf)?;
            (Value::Integer32(v), rest)
        },
        crate::codec::primitives::TAG_OCTET_STRING => {
            let (v, rest) = parse_octet_string(buf)?;
            (Value::OctetString(v), rest)
        },
        TAG_NULL => {
            let (_, rest) = crate::codec::primitives::parse_null(buf)?;
            (Value::Null, rest)
        },
        TAG_OID => {
            let (v, rest) = parse_oid(buf)?;
            (Value::ObjectId(v), rest)
        },
        crate::codec::primitives::TAG_IP_ADDRESS => {
            let (v, rest) = parse_ip_address(buf)?;
            (Value::IpAddress(v), rest)
        },
        crate::codec::primitives::TAG_COUNTER32 => {
            let (v, rest) = crate::codec::primitives::parse_counter32(buf)?;
            (Value::Counter32(v), rest)
        },
        crate::codec::primitives::TAG_GAUGE32 => {
            let (v, rest) = crate::codec::primitives::parse_unsigned(buf)?;
            (Value::Gauge32(v), rest)
        },
        crate::codec::primitives::TAG_TIME_TICKS => {
            let (v, rest) = parse_time_ticks(buf)?;
            (Value::TimeTicks(v), rest)
        },
        crate::codec::primitives::TAG_OPAQUE => {
            let (v, rest) = crate::codec::primitives::parse_opaque(buf)?;
            (Value::Opaque(v), rest)
        },
        crate::codec::primitives::TAG_COUNTER64 => {
            let (v, rest) = crate::codec::primitives::parse_counter64(buf)?;
            (Value::Counter64(v), rest)
        },
        TAG_NO_SUCH_OBJECT => (Value::NoSuchObject, &buf[hdr.payload_start + hdr.length..]),
        TAG_NO_SUCH_INSTANCE => {
            (Value::NoSuchInstance, &buf[hdr.payload_start + hdr.length..])
        },
        TAG_END_OF_MIB_VIEW => (Value::EndOfMibView, &buf[hdr.payload_start + hdr.length..]),
        _ => return Err(PriotError::InvalidTag(buf[0])),
    })
}

fn build_varbind(vb: &Varbind) -> Vec<u8> {
    let oid_bytes = build_oid(&vb.oid);
    let value_bytes = build_value(&vb.value);
    let mut payload = Vec::with_capacity(oid_bytes.len() + value_bytes.len());
    payload.extend_from_slice(&oid_bytes);
    payload.extend_from_slice(&value_bytes);
    let mut out = build_tag_length(Tag::universal(0x10, true), payload.len());
    out.extend_from_slice(&payload);
    out
}

fn parse_varbind(buf: &[u8]) -> Result<(Varbind, &[u8]), PriotError> {
    let hdr = parse_header(buf)?;
    if hdr.tag != Tag::universal(0x10, true) {
        return Err(PriotError::InvalidTag(buf[0]));
    }
    let end = hdr.payload_start + hdr.length;
    let payload = &buf[hdr.payload_start..end];
    let (oid, after_oid) = parse_oid(payload)?;
    let (value, after_value) = parse_value(after_oid)?;
    if !after_value.is_empty() {
        return Err(PriotError::InvalidLength);
    }
    Ok((Varbind::new(oid, value), &buf[end..]))
}

fn build_varbind_list(varbinds: &[Varbind]) -> Vec<u8> {
    let mut payload = Vec::new();
    for vb in varbinds {
        payload.extend_from_slice(&build_varbind(vb));
    }
    let mut out = build_tag_length(Tag::universal(0x10, true), payload.len());
    out.extend_from_slice(&payload);
    out
}

fn parse_varbind_list(buf: &[u8]) -> Result<(Vec<Varbind>, &[u8]), PriotError> {
    let hdr = parse_header(buf)?;
    if hdr.tag != Tag::universal(0x10, true) {
        return Err(PriotError::InvalidTag(buf[0]));
    }
    let end = hdr.payload_start + hdr.length;
    let mut cursor = &buf[hdr.payload_start..end];
    let mut out = Vec::new();
    while !cursor.is_empty() {
        let (vb, rest) = parse_varbind(cursor)?;
        out.push(vb);
        cursor = rest;
    }
    Ok((out, &buf[end..]))
}

/// Encodes the PDU body (everything after the outer kind tag): the
/// generic request-id/int/int/varbinds shape for every kind except
/// `TrapV1`, which carries RFC 1157's fixed fields instead.
pub fn build_pdu_body(pdu: &Pdu) -> Vec<u8> {
    if pdu.kind == PduKind::TrapV1 {
        return build_trap_v1_body(pdu);
    }
    let (second, third) = if pdu.kind == PduKind::GetBulk {
        (pdu.non_repeaters as i64, pdu.max_repetitions as i64)
    } else {
        (i64::from(pdu.error_status), i64::from(pdu.error_index))
    };

    let mut payload = Vec::new();
    payload.extend_from_slice(&build_integer(i64::from(pdu.request_id)));
    payload.extend_from_slice(&build_integer(second));
    payload.extend_from_slice(&build_integer(third));
    payload.extend_from_slice(&build_varbind_list(&pdu.varbinds));

    let mut out = build_tag_length(kind_to_tag(pdu.kind), payload.len());
    out.extend_from_slice(&payload);
    out
}

fn build_trap_v1_body(pdu: &Pdu) -> Vec<u8> {
    let fields = pdu.trap_v1.as_ref().expect("TrapV1 pdu missing trap_v1 fields");
    let mut payload = Vec::new();
    payload.extend_from_slice(&build_oid(&fields.enterprise));
    payload.extend_from_slice(&build_ip_address(fields.agent_addr));
    payload.extend_from_slice(&build_integer(i64::from(fields.generic_trap)));
    payload.extend_from_slice(&build_integer(i64::from(fields.specific_trap)));
    payload.extend_from_slice(&build_time_ticks(fields.time_stamp));
    payload.extend_from_slice(&build_varbind_list(&pdu.varbinds));

    let mut out = build_tag_length(TAG_TRAP_V1, payload.len());
    out.extend_from_slice(&payload);
    out
}

/// Decodes a PDU body given the already-parsed outer tag (`header`'s tag
/// determines which shape to expect) and the envelope around it
/// (`version`/`security` are filled in by the caller, who knows them from
/// the outer message).
pub fn parse_pdu_body(
    buf: &[u8],
    version: SnmpVersion,
    security: SecurityParams,
) -> Result<Pdu, PriotError> {
    let hdr = parse_header(buf)?;
    if hdr.tag.class != Class::ContextSpecific || !hdr.tag.constructed {
        return Err(PriotError::InvalidTag(buf[0]));
    }
    let kind = tag_to_kind(hdr.tag)?;
    let end = hdr.payload_start + hdr.length;
    let body = &buf[hdr.payload_start..end];

    if kind == PduKind::TrapV1 {
        let (enterprise, rest) = parse_oid(body)?;
        let (agent_addr, rest) = parse_ip_address(rest)?;
        let (generic_trap, rest) = parse_integer32(rest)?;
        let (specific_trap, rest) = parse_integer32(rest)?;
        let (time_stamp, rest) = parse_time_ticks(rest)?;
        let (varbinds, rest) = parse_varbind_list(rest)?;
        if !rest.is_empty() {
            return Err(PriotError::InvalidLength);
        }
        let mut pdu = Pdu::new_request(version, kind, 0, varbinds, security);
        pdu.trap_v1 = Some(TrapV1Fields {
            enterprise,
            agent_addr,
            generic_trap: generic_trap as u32,
            specific_trap: specific_trap as u32,
            time_stamp,
        });
        return Ok(pdu);
    }

    let (request_id, rest) = parse_integer32(body)?;
    let (second, rest) = parse_integer32(rest)?;
    let (third, rest) = parse_integer32(rest)?;
    let (varbinds, rest) = parse_varbind_list(rest)?;
    if !rest.is_empty() {
        return Err(PriotError::InvalidLength);
    }

    let mut pdu = Pdu::new_request(version, kind, request_id, varbinds, security);
    if kind == PduKind::GetBulk {
        if second < 0 || third < 0 {
            return Err(PriotError::InvalidValue("negative non-repeaters/max-repetitions"));
        }
        pdu.non_repeaters = second as u32;
        pdu.max_repetitions = third as u32;
    } else {
        pdu.error_status = second as u32;
        pdu.error_index = third as u32;
    }
    Ok(pdu)
}

/// Encodes a complete v1/v2c message: `SEQUENCE { version, community,
/// pdu }`.
pub fn encode_v1v2c(pdu: &Pdu) -> Vec<u8> {
    let version_num: i64 = match pdu.version {
        SnmpVersion::V1 => 0,
        SnmpVersion::V2c => 1,
        SnmpVersion::V3 => unreachable!("v3 uses encode_v3_envelope"),
    };
    let body = build_pdu_body(pdu);
    let mut enc = Encoder::with_capacity(body.len() + 64);
    enc.prepend(&body).expect("reallocating encoder never fails to grow");
    enc.prepend(&build_octet_string(&pdu.security.community)).expect("grows");
    enc.prepend(&build_integer(version_num)).expect("grows");
    let payload = enc.finish();
    let mut out = build_tag_length(Tag::universal(0x10, true), payload.len());
    out.extend_from_slice(&payload);
    out
}

/// Decodes a complete v1/v2c message.
pub fn decode_v1v2c(buf: &[u8]) -> Result<Pdu, PriotError> {
    let hdr = parse_header(buf)?;
    if hdr.tag != Tag::universal(0x10, true) {
        return Err(PriotError::InvalidTag(buf[0]));
    }
    let end = hdr.payload_start + hdr.length;
    let body = &buf[hdr.payload_start..end];

    let (version_num, rest) = parse_integer32(body)?;
    let version = match version_num {
        0 => SnmpVersion::V1,
        1 => SnmpVersion::V2c,
        _ => return Err(PriotError::InvalidValue("unsupported snmp version")),
    };
    let (community, rest) = parse_octet_string(rest)?;
    let security = SecurityParams::community(community);
    parse_pdu_body(rest, version, security)
}

/// `scopedPDU ::= SEQUENCE { contextEngineID OCTET STRING, contextName
/// OCTET STRING, data PDU }` (RFC 3412 §6.1).
pub fn encode_scoped_pdu(context_engine_id: &[u8], context_name: &str, pdu: &Pdu) -> Vec<u8> {
    let body = build_pdu_body(pdu);
    let mut payload = Vec::new();
    payload.extend_from_slice(&build_octet_string(context_engine_id));
    payload.extend_from_slice(&build_octet_string(context_name.as_bytes()));
    payload.extend_from_slice(&body);
    let mut out = build_tag_length(Tag::universal(0x10, true), payload.len());
    out.extend_from_slice(&payload);
    out
}

pub struct ScopedPdu {
    pub context_engine_id: Vec<u8>,
    pub context_name: String,
    pub pdu: Pdu,
}

pub fn decode_scoped_pdu(buf: &[u8], security: SecurityParams) -> Result<ScopedPdu, PriotError> {
    let hdr = parse_header(buf)?;
    if hdr.tag != Tag::universal(0x10, true) {
        return Err(PriotError::InvalidTag(buf[0]));
    }
    let end = hdr.payload_start + hdr.length;
    let body = &buf[hdr.payload_start..end];
    let (context_engine_id, rest) = parse_octet_string(body)?;
    let (context_name_bytes, rest) = parse_octet_string(rest)?;
    let context_name = String::from_utf8(context_name_bytes)
        .map_err(|_| PriotError::InvalidValue("contextName is not valid utf-8"))?;
    let mut security = security;
    security.context_engine_id = context_engine_id.clone();
    security.context_name = context_name.clone();
    let pdu = parse_pdu_body(rest, SnmpVersion::V3, security)?;
    Ok(ScopedPdu { context_engine_id, context_name, pdu })
}

/// The v3 `msgGlobalData` plus the still-opaque `msgSecurityParameters`
/// and `msgData` blobs (spec §4.3); security-model-specific parsing of
/// `msgSecurityParameters` happens in `security::usm`.
pub struct V3Envelope {
    pub message_id: i32,
    pub max_size: u32,
    pub flags: u8,
    pub security_model: i32,
    pub security_params_blob: Vec<u8>,
    pub msg_data: Vec<u8>,
}

pub fn encode_v3_envelope(
    message_id: i32,
    max_size: u32,
    flags: u8,
    security_model: i32,
    security_params_blob: &[u8],
    msg_data: &[u8],
) -> Vec<u8> {
    let mut global = Vec::new();
    global.extend_from_slice(&build_integer(i64::from(message_id)));
    global.extend_from_slice(&build_integer(i64::from(max_size)));
    global.extend_from_slice(&build_octet_string(&[flags]));
    global.extend_from_slice(&build_integer(i64::from(security_model)));
    let global_seq = {
        let mut out = build_tag_length(Tag::universal(0x10, true), global.len());
        out.extend_from_slice(&global);
        out
    };

    let mut payload = Vec::new();
    payload.extend_from_slice(&build_integer(3)); // msgVersion
    payload.extend_from_slice(&global_seq);
    payload.extend_from_slice(&build_octet_string(security_params_blob));
    payload.extend_from_slice(msg_data);

    let mut out = build_tag_length(Tag::universal(0x10, true), payload.len());
    out.extend_from_slice(&payload);
    out
}

pub fn decode_v3_envelope(buf: &[u8]) -> Result<V3Envelope, PriotError> {
    let hdr = parse_header(buf)?;
    if hdr.tag != Tag::universal(0x10, true) {
        return Err(PriotError::InvalidTag(buf[0]));
    }
    let end = hdr.payload_start + hdr.length;
    let body = &buf[hdr.payload_start..end];

    let (version, rest) = parse_integer32(body)?;
    if version != 3 {
        return Err(PriotError::InvalidValue("expected snmp v3 message"));
    }

    let global_hdr = parse_header(rest)?;
    if global_hdr.tag != Tag::universal(0x10, true) {
        return Err(PriotError::InvalidTag(rest[0]));
    }
    let global_end = global_hdr.payload_start + global_hdr.length;
    let global_body = &rest[global_hdr.payload_start..global_end];
    let rest = &rest[global_end..];

    let (message_id, global_body) = parse_integer32(global_body)?;
    let (max_size, global_body) = parse_integer32(global_body)?;
    let (flags_bytes, global_body) = parse_octet_string(global_body)?;
    let (security_model, global_body) = parse_integer32(global_body)?;
    if !global_body.is_empty() {
        return Err(PriotError::InvalidLength);
    }
    let flags = *flags_bytes.first().ok_or(PriotError::InvalidLength)?;

    let (security_params_blob, rest) = parse_octet_string(rest)?;

    Ok(V3Envelope {
        message_id,
        max_size: max_size.max(0) as u32,
        flags,
        security_model,
        security_params_blob,
        msg_data: rest.to_vec(),
    })
}

/// Decodes just enough of a message to determine its version, without
/// committing to a full parse (used by `security::mp` to route to the
/// right security pipeline).
pub fn peek_version(buf: &[u8]) -> Result<SnmpVersion, PriotError> {
    let hdr = parse_header(buf)?;
    if hdr.tag != Tag::universal(0x10, true) {
        return Err(PriotError::InvalidTag(buf[0]));
    }
    let body = &buf[hdr.payload_start..hdr.payload_start + hdr.length];
    let (version_num, _) = parse_integer32(body)?;
    match version_num {
        0 => Ok(SnmpVersion::V1),
        1 => Ok(SnmpVersion::V2c),
        3 => Ok(SnmpVersion::V3),
        _ => Err(PriotError::InvalidValue("unsupported snmp version")),
    }
}
