// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario F (spec §8): a v3 request whose `engineTime` (9000) is more
//! than RFC 3414 §2.3's 150-second window behind the agent's (10000)
//! never reaches the application pipeline — the agent reports
//! `usmStatsNotInTimeWindows` instead, and the counter advances.

use priot_core::{
    crypto::digest::AuthProtocol,
    data::{
        pdu::{PduKind, SecurityLevel, SnmpVersion},
        value::Value,
        Pdu, Varbind,
    },
    error::EngineCounters,
    oid,
    security::usm::{SaltCounter, UsmEngine, UsmIngress, UsmUser},
    vacm::row_status::{RowStatus, StorageType},
};

use crate::integration_tests::common::engine_from_yaml;

#[test]
fn a_clock_outside_the_time_window_yields_a_report_not_a_dispatch() {
    let ctx = engine_from_yaml(
        r#"
identity:
  EngineId: "80001f8880aabbccdd"
persistence:
  StateFile: "/tmp/priot-scenario-f.conf"
"#,
    );

    let auth_key = priot_core::crypto::kdf::localize_key(
        AuthProtocol::HmacMd5,
        &priot_core::crypto::kdf::password_to_key(AuthProtocol::HmacMd5, b"bob-auth-passphrase").expect("ok"),
        &ctx.engine_id,
    )
    .expect("ok");
    let user = UsmUser {
        engine_id: ctx.engine_id.clone(),
        user_name: "bob".into(),
        auth_protocol: Some(AuthProtocol::HmacMd5),
        auth_key,
        priv_protocol: None,
        priv_key: Vec::new(),
        clone_from: None,
        storage_type: StorageType::NonVolatile,
        row_status: RowStatus::Active,
    };
    ctx.usm_users.insert(user.clone());

    let client_counters = EngineCounters::new();
    let client = UsmEngine {
        local_engine_id: &ctx.engine_id,
        local_engine_boots: 4,
        // 1000 seconds behind the agent's clock: outside the 150s window.
        local_engine_time: 9_000,
        users: &ctx.usm_users,
        counters: &client_counters,
    };
    let salt = SaltCounter::new(0);
    let request_pdu = Pdu::new_request(
        SnmpVersion::V3,
        PduKind::Get,
        21,
        vec![Varbind::new(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::Null)],
        priot_core::data::pdu::SecurityParams::community(""),
    );
    let request_bytes = client
        .process_outgoing(&user, SecurityLevel::AuthNoPriv, 1, 1500, true, &ctx.engine_id, "", &request_pdu, &salt)
        .expect("client encodes");

    let agent = UsmEngine {
        local_engine_id: &ctx.engine_id,
        local_engine_boots: 4,
        local_engine_time: 10_000,
        users: &ctx.usm_users,
        counters: &ctx.counters,
    };
    let envelope = priot_core::codec::message::decode_v3_envelope(&request_bytes).expect("decodes");

    let before = ctx.counters.snapshot().usm_stats_not_in_time_windows;
    match agent.process_incoming(&envelope).expect("no codec error") {
        UsmIngress::Report(pdu) => {
            assert_eq!(pdu.kind, PduKind::Report);
            assert_eq!(pdu.varbinds.len(), 1);
            assert_eq!(pdu.varbinds[0].oid, oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 2, 0));
            assert_eq!(pdu.varbinds[0].value, Value::Counter32(before as u32 + 1));
        },
        UsmIngress::Accepted { .. } => panic!("expected a report, got acceptance"),
        UsmIngress::Drop => panic!("expected a report, got a drop"),
    }
    let after = ctx.counters.snapshot().usm_stats_not_in_time_windows;
    assert_eq!(after, before + 1);
}
