// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-type `parse_*`/`build_*` pairs (spec §4.1).

use crate::{
    codec::ber::{build_tag_length, parse_header, Class, Tag},
    data::oid::{Oid, MAX_OID_LEN},
    error::PriotError,
};

pub const TAG_INTEGER: Tag = Tag::universal(0x02, false);
pub const TAG_BIT_STRING: Tag = Tag::universal(0x03, false);
pub const TAG_OCTET_STRING: Tag = Tag::universal(0x04, false);
pub const TAG_NULL: Tag = Tag::universal(0x05, false);
pub const TAG_OID: Tag = Tag::universal(0x06, false);
pub const TAG_SEQUENCE: Tag = Tag::universal(0x10, true);
pub const TAG_IP_ADDRESS: Tag = Tag::application(0);
pub const TAG_COUNTER32: Tag = Tag::application(1);
pub const TAG_GAUGE32: Tag = Tag::application(2);
pub const TAG_TIME_TICKS: Tag = Tag::application(3);
pub const TAG_OPAQUE: Tag = Tag::application(4);
pub const TAG_COUNTER64: Tag = Tag::application(6);
pub const TAG_NO_SUCH_OBJECT: Tag = Tag::context(0, false);
pub const TAG_NO_SUCH_INSTANCE: Tag = Tag::context(1, false);
pub const TAG_END_OF_MIB_VIEW: Tag = Tag::context(2, false);
/// Net-SNMP's "opaque special syntax" extended tag numbers, carried under
/// the context class with the base-128 extended tag form.
pub const TAG_OPAQUE_FLOAT: Tag = Tag::context(0x78, false);
pub const TAG_OPAQUE_DOUBLE: Tag = Tag::context(0x79, false);

const MAX_STRING_LEN: usize = 0xFFFF;

/// Splits a TLV whose tag matches `expected`, returning `(payload, rest)`.
fn take<'a>(buf: &'a [u8], expected: Tag) -> Result<(&'a [u8], &'a [u8]), PriotError> {
    let hdr = parse_header(buf)?;
    if hdr.tag != expected {
        return Err(PriotError::InvalidTag(buf[0]));
    }
    let end = hdr.payload_start + hdr.length;
    Ok((&buf[hdr.payload_start..end], &buf[end..]))
}

/// Decodes a minimal two's-complement big-endian integer of arbitrary
/// byte length (bounded to fit `i64`).
fn decode_twos_complement(bytes: &[u8]) -> Result<i64, PriotError> {
    if bytes.is_empty() {
        return Err(PriotError::InvalidLength);
    }
    if bytes.len() > 8 {
        return Err(PriotError::InvalidValue("integer wider than 64 bits"));
    }
    let negative = bytes[0] & 0x80 != 0;
    let mut value: i64 = if negative { -1 } else { 0 };
    for &b in bytes {
        value = (value << 8) | i64::from(b);
    }
    Ok(value)
}

fn encode_twos_complement(value: i64) -> Vec<u8> {
    let be = value.to_be_bytes();
    let mut start = 0;
    while start < be.len() - 1 {
        let b = be[start];
        let next_msb = be[start + 1] & 0x80;
        if (b == 0x00 && next_msb == 0) || (b == 0xFF && next_msb != 0) {
            start += 1;
        } else {
            break;
        }
    }
    be[start..].to_vec()
}

/// `INTEGER` (spec §4.1): minimal two's complement, decoder accepts any
/// well-formed form.
pub fn parse_integer(buf: &[u8]) -> Result<(i64, &[u8]), PriotError> {
    let (payload, rest) = take(buf, TAG_INTEGER)?;
    Ok((decode_twos_complement(payload)?, rest))
}

pub fn parse_integer32(buf: &[u8]) -> Result<(i32, &[u8]), PriotError> {
    let (v, rest) = parse_integer(buf)?;
    i32::try_from(v)
        .map(|v| (v, rest))
        .map_err(|_| PriotError::InvalidValue("integer does not fit in 32 bits"))
}

pub fn build_integer(value: i64) -> Vec<u8> {
    let payload = encode_twos_complement(value);
    let mut out = build_tag_length(TAG_INTEGER, payload.len());
    out.extend_from_slice(&payload);
    out
}

/// Unsigned 32-bit types (Counter32/Gauge32/Unsigned32/TimeTicks):
/// rejects a negative leading bit per spec §4.1.
fn parse_unsigned_tagged(buf: &[u8], tag: Tag) -> Result<(u32, &[u8]), PriotError> {
    let (payload, rest) = take(buf, tag)?;
    let v = decode_twos_complement(payload)?;
    if v < 0 {
        return Err(PriotError::InvalidValue("negative value for unsigned type"));
    }
    u32::try_from(v)
        .map(|v| (v, rest))
        .map_err(|_| PriotError::InvalidValue("unsigned value does not fit in 32 bits"))
}

fn build_unsigned_tagged(tag: Tag, value: u32) -> Vec<u8> {
    let payload = encode_twos_complement(i64::from(value));
    let mut out = build_tag_length(tag, payload.len());
    out.extend_from_slice(&payload);
    out
}

pub fn parse_unsigned(buf: &[u8]) -> Result<(u32, &[u8]), PriotError> {
    parse_unsigned_tagged(buf, TAG_GAUGE32)
}
pub fn build_unsigned(value: u32) -> Vec<u8> {
    build_unsigned_tagged(TAG_GAUGE32, value)
}

pub fn parse_counter32(buf: &[u8]) -> Result<(u32, &[u8]), PriotError> {
    parse_unsigned_tagged(buf, TAG_COUNTER32)
}
pub fn build_counter32(value: u32) -> Vec<u8> {
    build_unsigned_tagged(TAG_COUNTER32, value)
}

pub fn parse_time_ticks(buf: &[u8]) -> Result<(u32, &[u8]), PriotError> {
    parse_unsigned_tagged(buf, TAG_TIME_TICKS)
}
pub fn build_time_ticks(value: u32) -> Vec<u8> {
    build_unsigned_tagged(TAG_TIME_TICKS, value)
}

/// Counter64: same unsigned discipline, widened to 64 bits.
pub fn parse_counter64(buf: &[u8]) -> Result<(u64, &[u8]), PriotError> {
    let (payload, rest) = take(buf, TAG_COUNTER64)?;
    if payload.len() > 9 {
        return Err(PriotError::InvalidValue("counter64 wider than 64 bits"));
    }
    if payload[0] & 0x80 != 0 {
        return Err(PriotError::InvalidValue("negative value for counter64"));
    }
    let mut value: u64 = 0;
    for &b in payload {
        value = (value << 8) | u64::from(b);
    }
    Ok((value, rest))
}

pub fn build_counter64(value: u64) -> Vec<u8> {
    let be = value.to_be_bytes();
    let mut start = 0;
    while start < be.len() - 1 && be[start] == 0 && be[start + 1] & 0x80 == 0 {
        start += 1;
    }
    let mut payload = Vec::new();
    if be[start] & 0x80 != 0 {
        payload.push(0);
    }
    payload.extend_from_slice(&be[start..]);
    let mut out = build_tag_length(TAG_COUNTER64, payload.len());
    out.extend_from_slice(&payload);
    out
}

pub fn parse_null(buf: &[u8]) -> Result<((), &[u8]), PriotError> {
    let (payload, rest) = take(buf, TAG_NULL)?;
    if !payload.is_empty() {
        return Err(PriotError::InvalidLength);
    }
    Ok(((), rest))
}

pub fn build_null() -> Vec<u8> {
    build_tag_length(TAG_NULL, 0)
}

pub fn parse_octet_string(buf: &[u8]) -> Result<(Vec<u8>, &[u8]), PriotError> {
    let (payload, rest) = take(buf, TAG_OCTET_STRING)?;
    if payload.len() > MAX_STRING_LEN {
        return Err(PriotError::InvalidLength);
    }
    Ok((payload.to_vec(), rest))
}

pub fn build_octet_string(value: &[u8]) -> Vec<u8> {
    let mut out = build_tag_length(TAG_OCTET_STRING, value.len());
    out.extend_from_slice(value);
    out
}

pub fn parse_opaque(buf: &[u8]) -> Result<(Vec<u8>, &[u8]), PriotError> {
    let (payload, rest) = take(buf, TAG_OPAQUE)?;
    if payload.len() > MAX_STRING_LEN {
        return Err(PriotError::InvalidLength);
    }
    Ok((payload.to_vec(), rest))
}

pub fn build_opaque(value: &[u8]) -> Vec<u8> {
    let mut out = build_tag_length(TAG_OPAQUE, value.len());
    out.extend_from_slice(value);
    out
}

pub fn parse_ip_address(buf: &[u8]) -> Result<([u8; 4], &[u8]), PriotError> {
    let (payload, rest) = take(buf, TAG_IP_ADDRESS)?;
    let arr: [u8; 4] = payload
        .try_into()
        .map_err(|_| PriotError::InvalidLength)?;
    Ok((arr, rest))
}

pub fn build_ip_address(addr: [u8; 4]) -> Vec<u8> {
    let mut out = build_tag_length(TAG_IP_ADDRESS, 4);
    out.extend_from_slice(&addr);
    out
}

pub fn parse_bit_string(buf: &[u8]) -> Result<((u8, Vec<u8>), &[u8]), PriotError> {
    let (payload, rest) = take(buf, TAG_BIT_STRING)?;
    if payload.is_empty() {
        return Err(PriotError::InvalidLength);
    }
    let unused = payload[0];
    if unused > 7 {
        return Err(PriotError::InvalidValue("bit string unused-bit count > 7"));
    }
    Ok(((unused, payload[1..].to_vec()), rest))
}

pub fn build_bit_string(unused_bits: u8, octets: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(1 + octets.len());
    payload.push(unused_bits);
    payload.extend_from_slice(octets);
    let mut out = build_tag_length(TAG_BIT_STRING, payload.len());
    out.extend_from_slice(&payload);
    out
}

pub fn parse_float(buf: &[u8]) -> Result<(f32, &[u8]), PriotError> {
    let (payload, rest) = take(buf, TAG_OPAQUE_FLOAT)?;
    let arr: [u8; 4] = payload.try_into().map_err(|_| PriotError::InvalidLength)?;
    Ok((f32::from_be_bytes(arr), rest))
}

pub fn build_float(value: f32) -> Vec<u8> {
    let mut out = build_tag_length(TAG_OPAQUE_FLOAT, 4);
    out.extend_from_slice(&value.to_be_bytes());
    out
}

pub fn parse_double(buf: &[u8]) -> Result<(f64, &[u8]), PriotError> {
    let (payload, rest) = take(buf, TAG_OPAQUE_DOUBLE)?;
    let arr: [u8; 8] = payload.try_into().map_err(|_| PriotError::InvalidLength)?;
    Ok((f64::from_be_bytes(arr), rest))
}

pub fn build_double(value: f64) -> Vec<u8> {
    let mut out = build_tag_length(TAG_OPAQUE_DOUBLE, 8);
    out.extend_from_slice(&value.to_be_bytes());
    out
}

/// `OBJECT IDENTIFIER`: spec §4.1 requires the first two sub-identifiers
/// to be decodable from a single leading byte (`first < 40*2 + 40`), and
/// forbids a leading `0x80` continuation byte within any later
/// sub-identifier's varint (a non-minimal, zero-padded encoding).
pub fn parse_oid(buf: &[u8]) -> Result<(Oid, &[u8]), PriotError> {
    let (payload, rest) = take(buf, TAG_OID)?;
    if payload.is_empty() {
        return Err(PriotError::InvalidValue("empty oid"));
    }
    let first = payload[0];
    if first >= 120 {
        return Err(PriotError::InvalidValue("first oid octet out of range"));
    }
    let (x, y) = if first < 80 { (first / 40, first % 40) } else { (2, first - 80) };
    let mut subids = vec![u32::from(x), u32::from(y)];

    let mut i = 1usize;
    while i < payload.len() {
        if payload[i] == 0x80 {
            return Err(PriotError::InvalidValue("non-minimal oid sub-identifier"));
        }
        let mut value: u64 = 0;
        let mut consumed = 0usize;
        loop {
            if i + consumed >= payload.len() {
                return Err(PriotError::TruncatedInput {
                    needed: i + consumed + 1,
                    have: payload.len(),
                });
            }
            let b = payload[i + consumed];
            value = (value << 7) | u64::from(b & 0x7F);
            consumed += 1;
            if value > u64::from(u32::MAX) {
                return Err(PriotError::InvalidValue("oid sub-identifier exceeds 2^32-1"));
            }
            if b & 0x80 == 0 {
                break;
            }
        }
        subids.push(value as u32);
        i += consumed;
    }

    if subids.len() < 2 {
        return Err(PriotError::InvalidValue("oid shorter than 2 sub-ids"));
    }
    if subids.len() > MAX_OID_LEN {
        return Err(PriotError::InvalidValue("oid longer than 128 sub-ids"));
    }
    let oid = Oid::new(subids)?;
    Ok((oid, rest))
}

fn encode_subid(value: u32) -> Vec<u8> {
    if value == 0 {
        return vec![0];
    }
    let mut groups = Vec::new();
    let mut v = value;
    while v > 0 {
        groups.push((v & 0x7F) as u8);
        v >>= 7;
    }
    groups.reverse();
    let last = groups.len() - 1;
    for (idx, b) in groups.iter_mut().enumerate() {
        if idx != last {
            *b |= 0x80;
        }
    }
    groups
}

/// Mirrors [`parse_oid`]'s restriction: only encodable when the combined
/// first two sub-identifiers fit in one leading octet (`< 120`), which
/// holds for every OID rooted under 0, 1, or 2.x with x < 40 — i.e. every
/// OID this agent actually serves.
pub fn build_oid(oid: &Oid) -> Vec<u8> {
    let subids = oid.as_slice();
    let mut payload = Vec::new();
    if subids.len() >= 2 {
        payload.push((subids[0] * 40 + subids[1]) as u8);
        for &s in &subids[2..] {
            payload.extend(encode_subid(s));
        }
    }
    let mut out = build_tag_length(TAG_OID, payload.len());
    out.extend_from_slice(&payload);
    out
}

/// Header class re-exported for callers distinguishing exception markers
/// from data values at the outer `ANY` position of a varbind.
pub fn header_class(buf: &[u8]) -> Result<Class, PriotError> {
    Ok(parse_header(buf)?.tag.class)
}
