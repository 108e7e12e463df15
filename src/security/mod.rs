// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Message processing & security (spec §4.3): demultiplexes an incoming
//! octet stream into a canonical PDU plus an authenticated principal, and
//! performs the inverse on egress.

pub mod community;
pub mod engine_time;
pub mod mp;
pub mod usm;

use crate::data::pdu::{SecurityLevel, SecurityModel};

/// The authenticated identity plus security level of a request (spec §3,
/// §4.3 step 6), consumed by VACM (spec §4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub security_model: SecurityModel,
    pub security_name: String,
    pub security_level: SecurityLevel,
    pub context_engine_id: Vec<u8>,
    pub context_name: String,
}

impl Principal {
    /// The principal for an unauthenticated v1/v2c community-string
    /// request, mapped to a security-name by `community::map_to_security_name`.
    pub fn community(security_name: String, context_name: String) -> Self {
        Self {
            security_model: SecurityModel::Community,
            security_name,
            security_level: SecurityLevel::NoAuthNoPriv,
            context_engine_id: Vec::new(),
            context_name,
        }
    }
}
