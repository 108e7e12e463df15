// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario D (spec §8): a SET PDU touching two independently-owned
//! instances, where the second one fails before any handler mutates
//! state, leaves the first handler's value completely untouched and
//! reports the failing varbind's 1-based index.
//!
//! The built-in handler set has no way to fail reserve-2 specifically
//! with `resourceUnavailable` from outside `src/` (`HandlerKind` is a
//! closed `enum_dispatch` set), so this exercises the same atomicity
//! shape — A's reserve succeeds, B's reserve fails, nothing commits,
//! A is unchanged — via `InMemoryTableHandler`'s reserve-1 failure on an
//! unseeded instance (`noSuchName`) instead.

use priot_core::{
    data::{
        pdu::{PduKind, SecurityLevel, SecurityModel, SecurityParams, SnmpVersion},
        value::Value,
        Pdu, Varbind,
    },
    error::PriotError,
    oid,
    pipeline::{handler::{HandlerKind, InMemoryTableHandler}, set_txn::handle_set},
    registry::node::SubtreeFlags,
    security::Principal,
};

use crate::integration_tests::common::{engine_from_yaml, grant_full_access, open_session};

#[test]
fn a_failing_varbind_aborts_the_whole_set_and_leaves_the_others_untouched() {
    let ctx = engine_from_yaml(
        r#"
identity:
  EngineId: "80001f8880aabbccdd"
persistence:
  StateFile: "/tmp/priot-scenario-d.conf"
"#,
    );
    grant_full_access(&ctx, SecurityModel::Usm, "writer");

    let instance_a = oid!(1, 3, 6, 1, 4, 1, 1, 1, 0);
    let instance_b = oid!(1, 3, 6, 1, 4, 1, 1, 2, 0);
    let table_a = InMemoryTableHandler::new();
    table_a.seed(instance_a.clone(), Value::Integer32(7));
    ctx.registry
        .insert(instance_a.clone(), None, 0, "", 0, SubtreeFlags::read_write_table(), HandlerKind::Table(table_a.clone()))
        .expect("registers");

    // `instance_b` is never seeded, so its table handler fails
    // reserve-1 with `noSuchName` instead of reserving anything.
    let table_b = InMemoryTableHandler::new();
    ctx.registry
        .insert(instance_b.clone(), None, 0, "", 0, SubtreeFlags::read_write_table(), HandlerKind::Table(table_b))
        .expect("registers");

    let principal = Principal {
        security_model: SecurityModel::Usm,
        security_name: "writer".into(),
        security_level: SecurityLevel::AuthPriv,
        context_engine_id: Vec::new(),
        context_name: String::new(),
    };
    let request = Pdu::new_request(
        SnmpVersion::V2c,
        PduKind::Set,
        9,
        vec![
            Varbind::new(instance_a.clone(), Value::Integer32(99)),
            Varbind::new(instance_b.clone(), Value::Integer32(1)),
        ],
        SecurityParams::community("public"),
    );

    let session = open_session();
    let response = handle_set(&ctx, &session, &principal, &request).expect("not delegated");
    assert_eq!(response.error_status, PriotError::NoSuchName.to_error_status());
    assert_eq!(response.error_index, 2);
    assert_eq!(table_a.get(&instance_a), Some(Value::Integer32(7)));
}
