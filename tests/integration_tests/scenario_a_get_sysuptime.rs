// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario A (spec §8): a plain v2c GET of `sysUpTime.0` travels from
//! raw wire bytes, through message processing and the read pipeline,
//! back out to wire bytes, exercising the whole non-security request
//! path in one pass.

use priot_core::{
    codec::message::{decode_v1v2c, encode_v1v2c},
    data::{
        pdu::{PduKind, SecurityParams, SnmpVersion},
        value::Value,
        Pdu, Varbind,
    },
    oid,
    pipeline::{dispatch::handle_get, handler::{HandlerKind, ScalarHandler}},
    registry::node::SubtreeFlags,
    security::{community::CommunityEntry, mp::{Incoming, MessageProcessor}},
};

use crate::integration_tests::common::{engine_from_yaml, grant_full_access, open_session};

#[test]
fn v2c_get_of_sysuptime_round_trips_over_the_wire() {
    let ctx = engine_from_yaml(
        r#"
identity:
  EngineId: "80001f8880aabbccdd"
persistence:
  StateFile: "/tmp/priot-scenario-a.conf"
"#,
    );
    ctx.community.insert("public", CommunityEntry { security_name: "ro".into(), context_name: String::new() });
    grant_full_access(&ctx, priot_core::data::pdu::SecurityModel::Community, "ro");

    let sysuptime = oid!(1, 3, 6, 1, 2, 1, 1, 3, 0);
    ctx.registry
        .insert(
            sysuptime.clone(),
            None,
            0,
            "",
            0,
            SubtreeFlags::read_only_instance(),
            HandlerKind::Scalar(ScalarHandler::new(sysuptime.clone(), Value::TimeTicks(12_345))),
        )
        .expect("registers");

    let request = Pdu::new_request(
        SnmpVersion::V2c,
        PduKind::Get,
        1,
        vec![Varbind::new(sysuptime.clone(), Value::Null)],
        SecurityParams::community("public"),
    );
    let wire_request = encode_v1v2c(&request);

    let usm = ctx.usm();
    let mp = MessageProcessor { community: &ctx.community, usm: &usm, counters: &ctx.counters };
    let (pdu, principal) = match mp.process_incoming(&wire_request).expect("decodes") {
        Incoming::Accepted { pdu, principal, .. } => (pdu, principal),
        Incoming::Reply(_) => panic!("expected acceptance, got a reply"),
        Incoming::Drop => panic!("expected acceptance, got a drop"),
    };
    assert_eq!(principal.security_name, "ro");

    let session = open_session();
    let response = handle_get(&ctx, &session, &principal, &pdu).expect("not delegated");
    assert_eq!(response.request_id, 1);
    assert_eq!(response.error_status, 0);
    assert_eq!(response.error_index, 0);
    assert_eq!(response.varbinds, vec![Varbind::new(sysuptime, Value::TimeTicks(12_345))]);

    let wire_response = encode_v1v2c(&response);
    let decoded_response = decode_v1v2c(&wire_response).expect("response decodes");
    assert_eq!(decoded_response.kind, PduKind::Response);
    assert_eq!(decoded_response.varbinds, response.varbinds);
}
