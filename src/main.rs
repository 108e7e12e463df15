// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Demo binary: wires an `EngineContext` with a couple of built-in
//! instrumentation handlers (`sysDescr.0`/`sysUpTime.0`), then answers
//! one GET request end to end over the in-memory v1/v2c wire codec.
//! Real socket transports and config-file parsing are out of scope for
//! this core (spec §1) — this binary exists only to exercise the
//! library.

use std::env;

use anyhow::{bail, Context, Result};
use priot_core::{
    cfg::{cli::resolve_config_path, config::EngineConfig, logger::init_logger},
    codec::message::{decode_v1v2c, encode_v1v2c},
    data::{
        oid::Oid,
        pdu::{Pdu, PduKind, SecurityLevel, SecurityModel, SecurityParams, SnmpVersion},
        value::Value,
        Varbind,
    },
    engine::EngineContext,
    pipeline::{dispatch::handle_read, handler::ScalarHandler, session::SessionTable, HandlerKind},
    registry::node::SubtreeFlags,
    security::mp::{Incoming, MessageProcessor},
    vacm::{
        access::ContextMatch,
        row_status::{RowStatus, StorageType},
        AccessEntry, GroupEntry, ViewEntry,
    },
};

fn sys_descr_oid() -> Oid {
    Oid::new(vec![1, 3, 6, 1, 2, 1, 1, 1, 0]).expect("valid")
}

fn sys_up_time_oid() -> Oid {
    Oid::new(vec![1, 3, 6, 1, 2, 1, 1, 3, 0]).expect("valid")
}

/// Grants `security_name` read access over `1.3.6.1.2.1` so the demo
/// GET below actually resolves.
fn grant_demo_access(ctx: &EngineContext, security_name: &str) {
    ctx.vacm.groups.insert(
        SecurityModel::Community,
        security_name,
        GroupEntry { group_name: "demo".into(), storage_type: StorageType::Volatile, row_status: RowStatus::Active },
    );
    ctx.vacm.access.insert(AccessEntry {
        group_name: "demo".into(),
        context_prefix: String::new(),
        security_model: None,
        security_level: SecurityLevel::NoAuthNoPriv,
        context_match: ContextMatch::Exact,
        read_view: "demo-view".into(),
        write_view: String::new(),
        notify_view: String::new(),
        storage_type: StorageType::Volatile,
        row_status: RowStatus::Active,
    });
    ctx.vacm.views.insert(
        "demo-view",
        ViewEntry {
            subtree: Oid::new(vec![1, 3, 6, 1, 2, 1]).expect("valid"),
            mask: None,
            included: true,
            storage_type: StorageType::Volatile,
            row_status: RowStatus::Active,
        },
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let _logger_guard = init_logger("priot-demo-logger.yaml").context("initializing logger")?;

    let config_path = env::args().nth(1).unwrap_or_else(|| "priot-demo.yaml".to_string());
    let resolved_path = resolve_config_path(&config_path)
        .with_context(|| format!("resolving engine config path {config_path}"))?;
    let config = EngineConfig::load_from_file(&resolved_path)
        .with_context(|| format!("loading engine config from {}", resolved_path.display()))?;

    let ctx = EngineContext::load(&config).context("building engine context")?;

    ctx.registry
        .insert(
            sys_descr_oid(),
            None,
            0,
            "",
            0,
            SubtreeFlags::read_only_instance(),
            HandlerKind::Scalar(ScalarHandler::new(sys_descr_oid(), Value::OctetString(b"priot-core demo agent".to_vec()))),
        )
        .context("registering sysDescr")?;
    ctx.registry
        .insert(
            sys_up_time_oid(),
            None,
            0,
            "",
            0,
            SubtreeFlags::read_only_instance(),
            HandlerKind::Scalar(ScalarHandler::new(sys_up_time_oid(), Value::TimeTicks(0))),
        )
        .context("registering sysUpTime")?;

    let demo_community = config.communities.first().map(|c| c.community.clone()).unwrap_or_else(|| "public".to_string());
    let demo_security_name =
        config.communities.first().map(|c| c.security_name.clone()).unwrap_or_else(|| "demo".to_string());
    grant_demo_access(&ctx, &demo_security_name);

    let usm = ctx.usm();
    let mp = MessageProcessor { community: &ctx.community, usm: &usm, counters: &ctx.counters };
    let sessions = SessionTable::new();
    let session = sessions.open();

    let request = Pdu::new_request(
        SnmpVersion::V2c,
        PduKind::Get,
        1,
        vec![Varbind::new(sys_descr_oid(), Value::Null)],
        SecurityParams::community(demo_community.clone()),
    );
    let wire_request = encode_v1v2c(&request);

    let response = match mp.process_incoming(&wire_request)? {
        Incoming::Accepted { pdu, principal, max_size } => {
            // spec §4.6: capped by whichever of the configured GETBULK
            // response limit and the peer's advertised msgMaxSize is
            // smaller.
            let max_varbinds = ctx.pipeline.max_varbinds_per_response.min(max_size);
            match handle_read(&ctx, &session, &principal, &pdu, max_varbinds) {
                Some(response) => response,
                None => bail!("demo request delegated; no synchronous response available"),
            }
        },
        Incoming::Reply(bytes) => decode_v1v2c(&bytes).context("decoding report")?,
        Incoming::Drop => bail!("demo request dropped by message processing (community {demo_community:?} not recognized)"),
    };

    println!("{response:#?}");
    ctx.persist().context("persisting engine state")?;
    Ok(())
}
