// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use priot_core::{
    cfg::config::EngineConfig,
    data::pdu::{SecurityLevel, SecurityModel},
    engine::EngineContext,
    oid,
    pipeline::session::{Session, SessionTable},
    vacm::{
        access::ContextMatch,
        row_status::{RowStatus, StorageType},
        AccessEntry, GroupEntry, ViewEntry,
    },
};

/// Loads an `EngineContext` from an inline YAML snippet, the same
/// minimal shape every scenario below needs: an `EngineId` and a scratch
/// `StateFile` under `/tmp`.
pub fn engine_from_yaml(yaml: &str) -> EngineContext {
    let config: EngineConfig = serde_yaml::from_str(yaml).expect("test config parses");
    EngineContext::load(&config).expect("engine loads")
}

/// Grants `security_name` read and write access to the entire `1.3.6`
/// subtree under one VACM group — the minimal bootstrap every end-to-end
/// scenario needs before dispatching a request (spec §4.5).
pub fn grant_full_access(ctx: &EngineContext, security_model: SecurityModel, security_name: &str) {
    ctx.vacm.groups.insert(
        security_model,
        security_name,
        GroupEntry {
            group_name: "full-access".into(),
            storage_type: StorageType::NonVolatile,
            row_status: RowStatus::Active,
        },
    );
    ctx.vacm.access.insert(AccessEntry {
        group_name: "full-access".into(),
        context_prefix: String::new(),
        security_model: None,
        security_level: SecurityLevel::NoAuthNoPriv,
        context_match: ContextMatch::Exact,
        read_view: "all".into(),
        write_view: "all".into(),
        notify_view: String::new(),
        storage_type: StorageType::NonVolatile,
        row_status: RowStatus::Active,
    });
    ctx.vacm.views.insert(
        "all",
        ViewEntry {
            subtree: oid!(1, 3, 6),
            mask: None,
            included: true,
            storage_type: StorageType::NonVolatile,
            row_status: RowStatus::Active,
        },
    );
}

/// A fresh session for a scenario that doesn't care about session
/// identity, just somewhere for a delegated request to park.
pub fn open_session() -> Arc<Session> {
    SessionTable::new().open()
}
