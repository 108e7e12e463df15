// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario B (spec §8): a GETNEXT past the last instance of the only
//! registered subtree comes back `EndOfMibView` on the original
//! requested OID, not an error.

use priot_core::{
    data::{
        pdu::{PduKind, SecurityLevel, SecurityModel, SecurityParams, SnmpVersion},
        value::Value,
        Pdu, Varbind,
    },
    oid,
    pipeline::{dispatch::handle_get_next, handler::{HandlerKind, InMemoryTableHandler}},
    registry::node::SubtreeFlags,
    security::Principal,
};

use crate::integration_tests::common::{engine_from_yaml, grant_full_access, open_session};

#[test]
fn getnext_past_the_only_registered_subtree_returns_end_of_mib_view() {
    let ctx = engine_from_yaml(
        r#"
identity:
  EngineId: "80001f8880aabbccdd"
persistence:
  StateFile: "/tmp/priot-scenario-b.conf"
"#,
    );
    grant_full_access(&ctx, SecurityModel::Usm, "scanner");

    // Registrations cover only 1.3.6.1.2.1.1, with its single instance
    // well before the probed OID.
    let table = InMemoryTableHandler::new();
    table.seed(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::OctetString(b"agent".to_vec()));
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
    let request = Pdu::new_request(
        SnmpVersion::V2c,
        PduKind::GetNext,
        5,
        vec![Varbind::new(oid!(1, 3, 6, 1, 2, 1, 1, 99), Value::Null)],
        SecurityParams::community("public"),
    );

    let session = open_session();
    let response = handle_get_next(&ctx, &session, &principal, &request).expect("not delegated");
    assert_eq!(response.error_status, 0);
    assert_eq!(
        response.varbinds,
        vec![Varbind::new(oid!(1, 3, 6, 1, 2, 1, 1, 99), Value::EndOfMibView)]
    );
}
