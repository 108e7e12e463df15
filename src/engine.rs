// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The engine context (spec §9: "collects [agent state] into an explicit
//! engine context passed by reference" rather than ambient globals):
//! every table and counter a message-processing or pipeline call needs,
//! gathered in one place and handed around by `&EngineContext` instead
//! of threaded one field at a time.

use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicI32, Ordering},
        RwLock,
    },
};

use anyhow::{Context, Result};

use crate::{
    cfg::{
        config::{EngineConfig, PipelineLimits},
        persistence::StateFile,
    },
    error::EngineCounters,
    pipeline::handler::HandlerKind,
    registry::SubtreeRegistry,
    security::{
        community::{CommunityEntry, CommunityTable},
        engine_time::EngineTime,
        usm::{SaltCounter, UsmEngine, UsmUser, UsmUserTable},
    },
    vacm::{
        access::{AccessEntry, ContextMatch, GroupEntry},
        row_status::{RowStatus, StorageType},
        view::ViewEntry,
        Vacm,
    },
};

/// Every piece of agent-wide state a request needs, gathered behind one
/// reference (spec §9). Owns its persistence path so sessions can ask it
/// to checkpoint on clean shutdown.
pub struct EngineContext {
    pub engine_id: Vec<u8>,
    pub engine_time: EngineTime,
    pub counters: EngineCounters,
    pub community: CommunityTable,
    pub usm_users: UsmUserTable,
    pub salt: SaltCounter,
    pub vacm: Vacm,
    pub registry: SubtreeRegistry<HandlerKind>,
    /// GETBULK caps and delegation deadlines (spec §4.6), loaded once
    /// from config and read by every pipeline call.
    pub pipeline: PipelineLimits,
    pub persistence_path: std::path::PathBuf,
    next_message_id: AtomicI32,
    /// Registered context names (spec §9 supplement: the original keeps
    /// an explicit context table, not a bare string field per lookup).
    /// The empty string (the default context) is always a member.
    contexts: RwLock<BTreeSet<String>>,
}

impl EngineContext {
    /// Builds a fresh engine context from `config`, loading persisted
    /// state (engine-boots counter, non-volatile USM users and VACM
    /// rows) and bumping `snmpEngineBoots` for this process start (spec
    /// §4.3 "incremented on every agent start").
    pub fn load(config: &EngineConfig) -> Result<Self> {
        let engine_id = hex::decode(&config.identity.engine_id_hex).context("EngineId")?;
        let state = StateFile::load(&config.persistence.state_file)?;
        let engine_boots = state.engine_boots().wrapping_add(1);

        let mut ctx = Self {
            engine_id,
            engine_time: EngineTime::new(engine_boots),
            counters: EngineCounters::new(),
            community: CommunityTable::new(),
            usm_users: UsmUserTable::new(),
            salt: SaltCounter::new(0),
            vacm: Vacm::new(),
            registry: SubtreeRegistry::new(),
            pipeline: config.pipeline.clone(),
            persistence_path: config.persistence.state_file.clone(),
            next_message_id: AtomicI32::new(1),
            contexts: RwLock::new(BTreeSet::from([String::new()])),
        };

        for row in config.communities.iter() {
            ctx.add_context(&row.context_name);
            ctx.community.insert(
                row.community.clone(),
                CommunityEntry { security_name: row.security_name.clone(), context_name: row.context_name.clone() },
            );
        }

        for user in state.load_usm_users()? {
            ctx.usm_users.insert(user);
        }
        for user in config.usm_users.iter() {
            ctx.usm_users.insert(bootstrap_usm_user(&ctx.engine_id, user)?);
        }

        for (model, name, entry) in state.load_vacm_groups()? {
            ctx.vacm.groups.insert(model, &name, entry);
        }
        for group in config.vacm.groups.iter() {
            ctx.vacm.groups.insert(
                group.security_model.to_runtime(),
                &group.security_name,
                GroupEntry {
                    group_name: group.group_name.clone(),
                    storage_type: group.storage_type.to_runtime(),
                    row_status: RowStatus::Active,
                },
            );
        }

        for entry in state.load_vacm_access()? {
            ctx.vacm.access.insert(entry);
        }
        for access in config.vacm.access.iter() {
            ctx.add_context(&access.context_prefix);
            ctx.vacm.access.insert(AccessEntry {
                group_name: access.group_name.clone(),
                context_prefix: access.context_prefix.clone(),
                security_model: access.security_model.map(|m| m.to_runtime()),
                security_level: access.security_level.to_runtime(),
                context_match: if access.context_prefix_match { ContextMatch::Prefix } else { ContextMatch::Exact },
                read_view: access.read_view.clone(),
                write_view: access.write_view.clone(),
                notify_view: access.notify_view.clone(),
                storage_type: access.storage_type.to_runtime(),
                row_status: RowStatus::Active,
            });
        }

        for (name, entry) in state.load_vacm_views()? {
            ctx.vacm.views.insert(&name, entry);
        }
        for view in config.vacm.views.iter() {
            let mask = view.mask_hex.as_deref().map(hex::decode).transpose().context("view mask")?;
            ctx.vacm.views.insert(
                &view.view_name,
                ViewEntry {
                    subtree: crate::data::oid::Oid::new(view.subtree.clone())?,
                    mask,
                    included: view.included,
                    storage_type: view.storage_type.to_runtime(),
                    row_status: RowStatus::Active,
                },
            );
        }

        Ok(ctx)
    }

    /// A `UsmEngine` view over this context's current identity and
    /// clock, fresh on every call since `snmpEngineTime` advances (spec
    /// §9's explicit-context pattern: borrow the shared state, don't
    /// clone it).
    pub fn usm(&self) -> UsmEngine<'_> {
        UsmEngine {
            local_engine_id: &self.engine_id,
            local_engine_boots: self.engine_time.engine_boots(),
            local_engine_time: self.engine_time.engine_time(),
            users: &self.usm_users,
            counters: &self.counters,
        }
    }

    /// Registers a context name, a no-op if already known. The empty
    /// string (default context) is always registered.
    pub fn add_context(&self, name: &str) {
        if name.is_empty() {
            return;
        }
        self.contexts.write().expect("contexts lock poisoned").insert(name.to_string());
    }

    /// Every context name this engine currently recognizes, including
    /// the default (empty) one.
    pub fn contexts(&self) -> Vec<String> {
        self.contexts.read().expect("contexts lock poisoned").iter().cloned().collect()
    }

    /// Next v3 `msgID`, monotone per engine (wraps; message ids are not
    /// subject to the salt's no-wrap rule since replay is already
    /// guarded by the time window).
    pub fn next_message_id(&self) -> i32 {
        self.next_message_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Checkpoints engine-boots, non-volatile USM users and VACM rows to
    /// the state file (spec §6: "written on clean shutdown/on-demand").
    pub fn persist(&self) -> Result<()> {
        let mut state = StateFile::load(&self.persistence_path)?;
        state.set_engine_boots(self.engine_time.engine_boots());
        state.save_usm_users(&self.usm_users);
        state.save_vacm_groups(&self.vacm.groups);
        state.save_vacm_access(&self.vacm.access);
        state.save_vacm_views(&self.vacm.views);
        state.save(&self.persistence_path)
    }
}

fn bootstrap_usm_user(
    engine_id: &[u8],
    row: &crate::cfg::config::UsmUserBootstrap,
) -> Result<UsmUser> {
    use crate::crypto::kdf::{localize_key, password_to_key};

    let auth_protocol = row.auth_protocol.to_runtime();
    let priv_protocol = row.priv_protocol.to_runtime();
    // RFC 3414 §2.6: the privacy key is derived with the user's auth
    // digest algorithm, defaulting to HMAC-SHA1 for an auth-less,
    // priv-only user (not a real USM combination, but keeps derivation
    // total rather than partial).
    let digest_for_priv = auth_protocol.unwrap_or(crate::crypto::digest::AuthProtocol::HmacSha1);

    let auth_key = match (auth_protocol, &row.auth_passphrase) {
        (Some(proto), Some(pass)) => {
            localize_key(proto, &password_to_key(proto, pass.as_bytes())?, engine_id)?
        },
        _ => Vec::new(),
    };
    let priv_key = match (priv_protocol, &row.priv_passphrase) {
        (Some(_), Some(pass)) => localize_key(
            digest_for_priv,
            &password_to_key(digest_for_priv, pass.as_bytes())?,
            engine_id,
        )?,
        _ => Vec::new(),
    };

    Ok(UsmUser {
        engine_id: engine_id.to_vec(),
        user_name: row.user_name.clone(),
        auth_protocol,
        auth_key,
        priv_protocol,
        priv_key,
        clone_from: None,
        storage_type: row.storage_type.to_runtime(),
        row_status: RowStatus::Active,
    })
}
