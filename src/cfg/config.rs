// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Engine configuration (spec §6/§9): everything the engine needs at
//! startup to bootstrap its identity, community table, USM users, VACM
//! rows, registry tuning, and persistence path. Grouped by logical
//! domain and loaded from YAML as a nested struct tree.

use std::{fs, path::PathBuf};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::cfg::enums::{
    AuthProtocolConfig, PrivProtocolConfig, SecurityLevelConfig, SecurityModelConfig,
    StorageTypeConfig,
};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct EngineConfig {
    /// Engine identity and clock bookkeeping.
    pub identity: Identity,
    /// Cleartext v1/v2c community bootstrap rows.
    #[serde(default)]
    pub communities: Vec<CommunityBootstrap>,
    /// v3 USM user bootstrap rows.
    #[serde(default)]
    pub usm_users: Vec<UsmUserBootstrap>,
    /// VACM security-to-group / access / view-tree-family bootstrap rows.
    #[serde(default)]
    pub vacm: VacmBootstrap,
    /// Registry lookup-cache tuning.
    #[serde(default)]
    pub registry: RegistryTuning,
    /// GETBULK caps and delegation deadlines.
    #[serde(default)]
    pub pipeline: PipelineLimits,
    /// Persistent state-file path.
    pub persistence: PersistenceConfig,
    /// Transport hints consumed opaquely by the out-of-scope transport
    /// layer (spec §1); never interpreted by the core itself.
    #[serde(default)]
    pub transport: TransportHints,
}

/// Engine-id and boot bookkeeping (spec §4.3 "clock maintenance").
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Identity {
    #[serde(rename = "EngineId")]
    /// Hex-encoded `snmpEngineID`.
    pub engine_id_hex: String,
}

/// Transport hints that are stored but never sent or interpreted.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct TransportHints {
    #[serde(default, rename = "ListenAddress")]
    pub listen_address: String,
    #[serde(default, rename = "MaxMessageSize")]
    /// `snmpEngineMaxMessageSize`: clamps outgoing message size to the
    /// smaller of this and the peer's advertised `msgMaxSize`.
    pub max_message_size: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CommunityBootstrap {
    pub community: String,
    pub security_name: String,
    #[serde(default)]
    pub context_name: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct UsmUserBootstrap {
    pub user_name: String,
    #[serde(default = "AuthProtocolConfig_none")]
    pub auth_protocol: AuthProtocolConfig,
    /// Consumed once at key-derivation time (spec §3: "raw passphrases
    /// are not stored after key derivation").
    #[serde(default)]
    pub auth_passphrase: Option<String>,
    #[serde(default = "PrivProtocolConfig_none")]
    pub priv_protocol: PrivProtocolConfig,
    #[serde(default)]
    pub priv_passphrase: Option<String>,
    #[serde(default)]
    pub storage_type: StorageTypeConfig,
}

// serde's `default = "path"` wants a plain function path; these are
// named to read naturally at the call site above.
#[allow(non_snake_case)]
fn AuthProtocolConfig_none() -> AuthProtocolConfig {
    AuthProtocolConfig::None
}
#[allow(non_snake_case)]
fn PrivProtocolConfig_none() -> PrivProtocolConfig {
    PrivProtocolConfig::None
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct VacmBootstrap {
    #[serde(default)]
    pub groups: Vec<GroupBootstrap>,
    #[serde(default)]
    pub access: Vec<AccessBootstrap>,
    #[serde(default)]
    pub views: Vec<ViewBootstrap>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GroupBootstrap {
    pub security_model: SecurityModelConfig,
    pub security_name: String,
    pub group_name: String,
    #[serde(default)]
    pub storage_type: StorageTypeConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AccessBootstrap {
    pub group_name: String,
    #[serde(default)]
    pub context_prefix: String,
    /// `None` is the VACM wildcard security model.
    #[serde(default)]
    pub security_model: Option<SecurityModelConfig>,
    pub security_level: SecurityLevelConfig,
    /// Exact context match unless `true`.
    #[serde(default)]
    pub context_prefix_match: bool,
    #[serde(default)]
    pub read_view: String,
    #[serde(default)]
    pub write_view: String,
    #[serde(default)]
    pub notify_view: String,
    #[serde(default)]
    pub storage_type: StorageTypeConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ViewBootstrap {
    pub view_name: String,
    pub subtree: Vec<u32>,
    /// Hex-encoded mask, MSB-first, one bit per subtree sub-identifier
    /// (spec §4.5); omitted means "all sub-ids significant".
    #[serde(default)]
    pub mask_hex: Option<String>,
    pub included: bool,
    #[serde(default)]
    pub storage_type: StorageTypeConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RegistryTuning {
    #[serde(default = "default_lookup_cache_size")]
    pub lookup_cache_size: usize,
}

impl Default for RegistryTuning {
    fn default() -> Self {
        Self { lookup_cache_size: default_lookup_cache_size() }
    }
}

fn default_lookup_cache_size() -> usize {
    512
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PipelineLimits {
    /// GETBULK response cap (spec §4.6); default `2^16-1`.
    #[serde(default = "default_max_varbinds")]
    pub max_varbinds_per_response: u32,
    /// Default delegated-request deadline, overridable per request.
    #[serde(default = "default_deadline_secs")]
    pub default_deadline_secs: u64,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self {
            max_varbinds_per_response: default_max_varbinds(),
            default_deadline_secs: default_deadline_secs(),
        }
    }
}

fn default_max_varbinds() -> u32 {
    u16::MAX as u32
}

fn default_deadline_secs() -> u64 {
    30
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PersistenceConfig {
    #[serde(rename = "StateFile")]
    pub state_file: PathBuf,
}

impl EngineConfig {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let cfg: EngineConfig =
            serde_yaml::from_str(&s).context("failed to parse engine config YAML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.identity.engine_id_hex.is_empty(), "EngineId must not be empty");
        hex::decode(&self.identity.engine_id_hex).context("EngineId is not valid hex")?;
        for view in &self.vacm.views {
            if let Some(mask_hex) = &view.mask_hex {
                hex::decode(mask_hex)
                    .with_context(|| format!("view {} has invalid mask_hex", view.view_name))?;
            }
        }
        Ok(())
    }
}
