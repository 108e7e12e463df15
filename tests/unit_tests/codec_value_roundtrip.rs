// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Black-box wire round trip through the public codec entry points only
//! (`encode_v1v2c`/`decode_v1v2c`), covering every `Value` variant a
//! GET response can carry in one PDU.

use priot_core::{
    codec::message::{decode_v1v2c, encode_v1v2c},
    data::{
        pdu::{PduKind, SecurityParams, SnmpVersion},
        value::Value,
        Varbind,
    },
    oid,
};

fn response_with(varbinds: Vec<Varbind>) -> priot_core::data::Pdu {
    let mut pdu = priot_core::data::Pdu::new_request(
        SnmpVersion::V2c,
        PduKind::Get,
        77,
        varbinds.clone(),
        SecurityParams::community("public"),
    );
    pdu.kind = PduKind::Response;
    pdu.varbinds = varbinds;
    pdu
}

#[test]
fn every_value_variant_survives_a_wire_round_trip() {
    let varbinds = vec![
        Varbind::new(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::OctetString(b"a test agent".to_vec())),
        Varbind::new(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(123_456)),
        Varbind::new(oid!(1, 3, 6, 1, 2, 1, 2, 1, 0), Value::Integer32(-7)),
        Varbind::new(oid!(1, 3, 6, 1, 2, 1, 4, 20, 1, 1), Value::IpAddress([192, 0, 2, 1])),
        Varbind::new(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 10, 1), Value::Counter32(u32::MAX)),
        Varbind::new(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 5, 1), Value::Gauge32(10)),
        Varbind::new(oid!(1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 6, 1), Value::Counter64(u64::MAX)),
        Varbind::new(oid!(1, 3, 6, 1, 2, 1, 1, 2, 0), Value::ObjectId(oid!(1, 3, 6, 1, 4, 1, 8072))),
        Varbind::new(oid!(1, 3, 6, 1, 4, 1, 1, 99, 0), Value::Opaque(vec![0xde, 0xad, 0xbe, 0xef])),
        Varbind::new(oid!(1, 3, 6, 1, 4, 1, 1, 1, 0), Value::Null),
        Varbind::new(oid!(1, 3, 6, 1, 4, 1, 1, 2, 0), Value::NoSuchObject),
        Varbind::new(oid!(1, 3, 6, 1, 4, 1, 1, 3, 0), Value::NoSuchInstance),
        Varbind::new(oid!(1, 3, 6, 1, 4, 1, 1, 4, 0), Value::EndOfMibView),
    ];
    let pdu = response_with(varbinds.clone());

    let bytes = encode_v1v2c(&pdu);
    let decoded = decode_v1v2c(&bytes).expect("decodes its own encoding");

    assert_eq!(decoded.request_id, 77);
    assert_eq!(decoded.varbinds, varbinds);
    assert_eq!(decoded.security.community, b"public".to_vec());
}

#[test]
fn negative_and_boundary_integers_round_trip() {
    let varbinds = vec![
        Varbind::new(oid!(1, 3, 6, 1, 4, 1, 2, 1, 0), Value::Integer32(i32::MIN)),
        Varbind::new(oid!(1, 3, 6, 1, 4, 1, 2, 2, 0), Value::Integer32(i32::MAX)),
        Varbind::new(oid!(1, 3, 6, 1, 4, 1, 2, 3, 0), Value::Integer32(0)),
        Varbind::new(oid!(1, 3, 6, 1, 4, 1, 2, 4, 0), Value::Integer32(-1)),
    ];
    let pdu = response_with(varbinds.clone());
    let bytes = encode_v1v2c(&pdu);
    let decoded = decode_v1v2c(&bytes).expect("decodes");
    assert_eq!(decoded.varbinds, varbinds);
}

#[test]
fn a_large_oid_sub_identifier_round_trips() {
    // A sub-id above 2^28 forces the varint encoder into its widest
    // (5-octet) form.
    let varbinds = vec![Varbind::new(
        oid!(1, 3, 6, 1, 4, 1, 3, 0),
        Value::ObjectId(oid!(1, 3, 6, 1, 4, 1, u32::MAX)),
    )];
    let pdu = response_with(varbinds.clone());
    let bytes = encode_v1v2c(&pdu);
    let decoded = decode_v1v2c(&bytes).expect("decodes");
    assert_eq!(decoded.varbinds, varbinds);
}

#[test]
fn v1_request_round_trips_without_exception_values() {
    // RFC 1157 carries no exception values, but the codec itself is
    // version-agnostic; it's the pipeline that restricts v1 output
    // (spec §4.6 `finish_read_response`), not the wire format.
    let pdu = priot_core::data::Pdu::new_request(
        SnmpVersion::V1,
        PduKind::Get,
        1,
        vec![Varbind::new(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::Null)],
        SecurityParams::community("public"),
    );
    let bytes = encode_v1v2c(&pdu);
    let decoded = decode_v1v2c(&bytes).expect("decodes");
    assert_eq!(decoded.version, SnmpVersion::V1);
    assert_eq!(decoded.kind, PduKind::Get);
}
