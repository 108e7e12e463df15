// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! BER/ASN.1 wire encoding (spec §4.1): header parsing, the per-type
//! primitives, and the full message envelope built on top of them.

pub mod ber;
pub mod message;
pub mod primitives;

pub use ber::{Class, Encoder, Header, Tag};
pub use message::{
    build_pdu_body, decode_scoped_pdu, decode_v1v2c, decode_v3_envelope, encode_scoped_pdu,
    encode_v1v2c, encode_v3_envelope, parse_pdu_body, peek_version, ScopedPdu, V3Envelope,
};
