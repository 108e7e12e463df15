// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario E (spec §8): a v3 authPriv GET from a user whose clock
//! (`engineTime=9990`) sits a few seconds behind the agent's
//! (`engineTime=10000`, `engineBoots=4`) — inside RFC 3414 §2.3's
//! 150-second window — decodes, dispatches, and its response goes back
//! out re-encrypted under a fresh privacy salt, never the request's own.

use priot_core::{
    crypto::{digest::AuthProtocol, kdf::{localize_key, password_to_key, PrivProtocol}},
    data::{
        pdu::{PduKind, SecurityLevel, SnmpVersion},
        value::Value,
        Pdu, Varbind,
    },
    error::EngineCounters,
    oid,
    pipeline::{dispatch::handle_get, handler::{HandlerKind, ScalarHandler}},
    registry::node::SubtreeFlags,
    security::usm::{SaltCounter, UsmEngine, UsmIngress, UsmUser},
    vacm::row_status::{RowStatus, StorageType},
};

use crate::integration_tests::common::{engine_from_yaml, grant_full_access, open_session};

fn alice(engine_id: &[u8]) -> UsmUser {
    let auth_key = localize_key(
        AuthProtocol::HmacSha1,
        &password_to_key(AuthProtocol::HmacSha1, b"alice-auth-passphrase").expect("ok"),
        engine_id,
    )
    .expect("ok");
    let priv_key = localize_key(
        AuthProtocol::HmacSha1,
        &password_to_key(AuthProtocol::HmacSha1, b"alice-priv-passphrase").expect("ok"),
        engine_id,
    )
    .expect("ok");
    UsmUser {
        engine_id: engine_id.to_vec(),
        user_name: "alice".into(),
        auth_protocol: Some(AuthProtocol::HmacSha1),
        auth_key,
        priv_protocol: Some(PrivProtocol::AesCfb128),
        priv_key,
        clone_from: None,
        storage_type: StorageType::NonVolatile,
        row_status: RowStatus::Active,
    }
}

#[test]
fn stale_but_in_window_clock_is_accepted_and_the_reply_uses_a_fresh_salt() {
    let ctx = engine_from_yaml(
        r#"
identity:
  EngineId: "80001f8880aabbccdd"
persistence:
  StateFile: "/tmp/priot-scenario-e.conf"
"#,
    );
    grant_full_access(&ctx, priot_core::data::pdu::SecurityModel::Usm, "alice");

    let sysdescr = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
    ctx.registry
        .insert(
            sysdescr.clone(),
            None,
            0,
            "",
            0,
            SubtreeFlags::read_only_instance(),
            HandlerKind::Scalar(ScalarHandler::new(sysdescr.clone(), Value::OctetString(b"priot agent".to_vec()))),
        )
        .expect("registers");

    let user = alice(&ctx.engine_id);
    ctx.usm_users.insert(user.clone());

    // Client-side: same user, same engine-id, but a clock 10 seconds
    // behind the agent's.
    let client_counters = EngineCounters::new();
    let client = UsmEngine {
        local_engine_id: &ctx.engine_id,
        local_engine_boots: 4,
        local_engine_time: 9_990,
        users: &ctx.usm_users,
        counters: &client_counters,
    };
    let client_salt = SaltCounter::new(100);
    let request_pdu = Pdu::new_request(
        SnmpVersion::V3,
        PduKind::Get,
        11,
        vec![Varbind::new(sysdescr.clone(), Value::Null)],
        priot_core::data::pdu::SecurityParams::community(""),
    );
    let request_bytes = client
        .process_outgoing(&user, SecurityLevel::AuthPriv, 1, 1500, true, &ctx.engine_id, "", &request_pdu, &client_salt)
        .expect("client encodes");

    // Agent side: its own engine_time (4, 10_000), bound to the real
    // usm_users/counters tables so the rest of the pipeline sees them.
    let agent = UsmEngine {
        local_engine_id: &ctx.engine_id,
        local_engine_boots: 4,
        local_engine_time: 10_000,
        users: &ctx.usm_users,
        counters: &ctx.counters,
    };
    let envelope = priot_core::codec::message::decode_v3_envelope(&request_bytes).expect("decodes");
    let (scoped, principal) = match agent.process_incoming(&envelope).expect("no codec error") {
        UsmIngress::Accepted { scoped, principal } => (scoped, principal),
        UsmIngress::Report(_) => panic!("expected acceptance, got a report"),
        UsmIngress::Drop => panic!("expected acceptance, got a drop"),
    };
    assert_eq!(principal.security_name, "alice");
    assert_eq!(principal.security_level, SecurityLevel::AuthPriv);

    let session = open_session();
    let response_pdu = handle_get(&ctx, &session, &principal, &scoped.pdu).expect("not delegated");
    assert_eq!(response_pdu.error_status, 0);
    assert_eq!(response_pdu.varbinds, vec![Varbind::new(sysdescr, Value::OctetString(b"priot agent".to_vec()))]);

    let agent_salt = SaltCounter::new(0);
    let response_bytes = agent
        .process_outgoing(&user, SecurityLevel::AuthPriv, 1, 1500, false, &ctx.engine_id, "", &response_pdu, &agent_salt)
        .expect("agent encodes");

    let request_envelope = priot_core::codec::message::decode_v3_envelope(&request_bytes).expect("decodes");
    let response_envelope = priot_core::codec::message::decode_v3_envelope(&response_bytes).expect("decodes");
    let request_params =
        priot_core::security::usm::decode_usm_security_params(&request_envelope.security_params_blob).expect("ok");
    let response_params =
        priot_core::security::usm::decode_usm_security_params(&response_envelope.security_params_blob).expect("ok");
    assert_ne!(request_params.priv_parameters, response_params.priv_parameters);

    // The response decrypts and authenticates cleanly under the same
    // user, back at the client's (stale) clock.
    match client.process_incoming(&response_envelope).expect("no codec error") {
        UsmIngress::Accepted { scoped, .. } => {
            assert_eq!(scoped.pdu.request_id, 11);
        },
        UsmIngress::Report(_) => panic!("expected the client to accept its own reply, got a report"),
        UsmIngress::Drop => panic!("expected the client to accept its own reply, got a drop"),
    }
}
