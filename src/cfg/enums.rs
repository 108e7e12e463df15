// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Small wire-facing enums used only at the configuration boundary:
//! YAML-friendly spellings that map onto the runtime types used
//! everywhere else in the crate (`crypto::digest::AuthProtocol`,
//! `crypto::kdf::PrivProtocol`, `data::pdu::{SecurityModel,
//! SecurityLevel}`, `vacm::row_status::{RowStatus, StorageType}`).
//! Those runtime types carry no `serde` impls of their own since they
//! are never read from or written to the wire; `EngineConfig` needs a
//! textual spelling to bootstrap them from, which is all this module
//! provides.

use serde::{Deserialize, Serialize};

use crate::{
    crypto::{digest::AuthProtocol, kdf::PrivProtocol},
    data::pdu::{SecurityLevel, SecurityModel},
    vacm::row_status::StorageType,
};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AuthProtocolConfig {
    None,
    HmacMd5,
    HmacSha1,
}

impl AuthProtocolConfig {
    pub fn to_runtime(self) -> Option<AuthProtocol> {
        match self {
            AuthProtocolConfig::None => None,
            AuthProtocolConfig::HmacMd5 => Some(AuthProtocol::HmacMd5),
            AuthProtocolConfig::HmacSha1 => Some(AuthProtocol::HmacSha1),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PrivProtocolConfig {
    None,
    DesCbc,
    AesCfb128,
}

impl PrivProtocolConfig {
    pub fn to_runtime(self) -> Option<PrivProtocol> {
        match self {
            PrivProtocolConfig::None => None,
            PrivProtocolConfig::DesCbc => Some(PrivProtocol::DesCbc),
            PrivProtocolConfig::AesCfb128 => Some(PrivProtocol::AesCfb128),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SecurityModelConfig {
    Community,
    Usm,
}

impl SecurityModelConfig {
    pub fn to_runtime(self) -> SecurityModel {
        match self {
            SecurityModelConfig::Community => SecurityModel::Community,
            SecurityModelConfig::Usm => SecurityModel::Usm,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SecurityLevelConfig {
    NoAuthNoPriv,
    AuthNoPriv,
    AuthPriv,
}

impl SecurityLevelConfig {
    pub fn to_runtime(self) -> SecurityLevel {
        match self {
            SecurityLevelConfig::NoAuthNoPriv => SecurityLevel::NoAuthNoPriv,
            SecurityLevelConfig::AuthNoPriv => SecurityLevel::AuthNoPriv,
            SecurityLevelConfig::AuthPriv => SecurityLevel::AuthPriv,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum StorageTypeConfig {
    Other,
    Volatile,
    #[default]
    NonVolatile,
    Permanent,
    ReadOnly,
}

impl StorageTypeConfig {
    pub fn to_runtime(self) -> StorageType {
        match self {
            StorageTypeConfig::Other => StorageType::Other,
            StorageTypeConfig::Volatile => StorageType::Volatile,
            StorageTypeConfig::NonVolatile => StorageType::NonVolatile,
            StorageTypeConfig::Permanent => StorageType::Permanent,
            StorageTypeConfig::ReadOnly => StorageType::ReadOnly,
        }
    }
}
