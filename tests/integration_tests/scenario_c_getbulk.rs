// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario C (spec §8): GETBULK with `non-repeaters=0,
//! max-repetitions=3` over a five-row table returns exactly the first
//! three rows in order, leaving the remaining two for a follow-up walk.

use priot_core::{
    data::{
        pdu::{PduKind, SecurityLevel, SecurityModel, SecurityParams, SnmpVersion},
        value::Value,
        Pdu, Varbind,
    },
    oid,
    pipeline::{dispatch::handle_get_bulk, handler::{HandlerKind, InMemoryTableHandler}},
    registry::node::SubtreeFlags,
    security::Principal,
};

use crate::integration_tests::common::{engine_from_yaml, grant_full_access, open_session};

#[test]
fn getbulk_returns_the_first_max_repetitions_rows_in_order() {
    let ctx = engine_from_yaml(
        r#"
identity:
  EngineId: "80001f8880aabbccdd"
persistence:
  StateFile: "/tmp/priot-scenario-c.conf"
"#,
    );
    grant_full_access(&ctx, SecurityModel::Usm, "scanner");

    let table = InMemoryTableHandler::new();
    for n in 1..=5u32 {
        table.seed(oid!(1, 3, 6, 1, 2, 1, 1, n, 0), Value::Integer32(n as i32));
    }
    ctx.registry
        .insert(oid!(1, 3, 6, 1, 2, 1, 1), None, 0, "", 0, SubtreeFlags::read_only_table(), HandlerKind::Table(table))
        .expect("registers");

    let principal = Principal {
        security_model: SecurityModel::Usm,
        security_name: "scanner".into(),
        security_level: SecurityLevel::AuthPriv,
        context_engine_id: Vec::new(),
        context_name: String::new(),
    };
    let mut request = Pdu::new_request(
        SnmpVersion::V2c,
        PduKind::GetBulk,
        7,
        vec![Varbind::new(oid!(1, 3, 6, 1, 2, 1, 1), Value::Null)],
        SecurityParams::community("public"),
    );
    request.non_repeaters = 0;
    request.max_repetitions = 3;

    let session = open_session();
    let response = handle_get_bulk(&ctx, &session, &principal, &request, 1024).expect("not delegated");
    assert_eq!(response.error_status, 0);
    assert_eq!(
        response.varbinds,
        vec![
            Varbind::new(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::Integer32(1)),
            Varbind::new(oid!(1, 3, 6, 1, 2, 1, 1, 2, 0), Value::Integer32(2)),
            Varbind::new(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::Integer32(3)),
        ]
    );
}

#[test]
fn getbulk_caps_at_the_configured_response_size() {
    let ctx = engine_from_yaml(
        r#"
identity:
  EngineId: "80001f8880aabbccdd"
persistence:
  StateFile: "/tmp/priot-scenario-c-cap.conf"
"#,
    );
    grant_full_access(&ctx, SecurityModel::Usm, "scanner");

    let table = InMemoryTableHandler::new();
    for n in 1..=5u32 {
        table.seed(oid!(1, 3, 6, 1, 2, 1, 1, n, 0), Value::Integer32(n as i32));
    }
    ctx.registry
        .insert(oid!(1, 3, 6, 1, 2, 1, 1), None, 0, "", 0, SubtreeFlags::read_only_table(), HandlerKind::Table(table))
        .expect("registers");

    let principal = Principal {
        security_model: SecurityModel::Usm,
        security_name: "scanner".into(),
        security_level: SecurityLevel::AuthPriv,
        context_engine_id: Vec::new(),
        context_name: String::new(),
    };
    let mut request = Pdu::new_request(
        SnmpVersion::V2c,
        PduKind::GetBulk,
        8,
        vec![Varbind::new(oid!(1, 3, 6, 1, 2, 1, 1), Value::Null)],
        SecurityParams::community("public"),
    );
    request.non_repeaters = 0;
    request.max_repetitions = 5;

    let session = open_session();
    let response = handle_get_bulk(&ctx, &session, &principal, &request, 2).expect("not delegated");
    assert_eq!(response.varbinds.len(), 2);
    assert_eq!(response.varbinds[0].oid, oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));
    assert_eq!(response.varbinds[1].oid, oid!(1, 3, 6, 1, 2, 1, 1, 2, 0));
}
