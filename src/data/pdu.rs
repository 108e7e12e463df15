// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The PDU envelope (spec §3): request/response kind, error fields,
//! varbinds, and the v3 security envelope.

use crate::data::{oid::Oid, value::Value};

/// PDU operation kind (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduKind {
    Get,
    GetNext,
    GetBulk,
    Set,
    Response,
    TrapV1,
    TrapV2,
    Inform,
    Report,
}

impl PduKind {
    /// True for PDUs that read (GET/GETNEXT/GETBULK): VACM consults the
    /// read-view for these (spec §4.5 step 3).
    pub fn is_read(&self) -> bool {
        matches!(self, PduKind::Get | PduKind::GetNext | PduKind::GetBulk)
    }

    pub fn is_write(&self) -> bool {
        matches!(self, PduKind::Set)
    }

    pub fn is_notify(&self) -> bool {
        matches!(self, PduKind::TrapV1 | PduKind::TrapV2 | PduKind::Inform)
    }
}

/// One `(OID, value)` pair (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Varbind {
    pub oid: Oid,
    pub value: Value,
}

impl Varbind {
    pub fn new(oid: Oid, value: Value) -> Self {
        Self { oid, value }
    }
}

/// SNMP protocol version carried by the outer message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnmpVersion {
    V1,
    V2c,
    V3,
}

/// Security level negotiated for a v3 message (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SecurityLevel {
    NoAuthNoPriv,
    AuthNoPriv,
    AuthPriv,
}

impl SecurityLevel {
    pub fn requires_auth(&self) -> bool {
        !matches!(self, SecurityLevel::NoAuthNoPriv)
    }

    pub fn requires_priv(&self) -> bool {
        matches!(self, SecurityLevel::AuthPriv)
    }
}

/// Security model identifying which pipeline validated a message (spec
/// §4.3: community for v1/v2c, USM/TSM for v3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityModel {
    Community,
    Usm,
    Tsm,
}

/// The v3 security envelope carried on every message (spec §3's "security
/// envelope" fields); `None` on the envelope's `Option` fields when the
/// message is v1/v2c.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityParams {
    pub message_id: i32,
    pub max_size: u32,
    pub reportable: bool,
    pub security_model: SecurityModel,
    pub security_level: SecurityLevel,
    pub engine_id: Vec<u8>,
    pub engine_boots: u32,
    pub engine_time: u32,
    pub user_name: String,
    pub auth_parameters: Vec<u8>,
    pub priv_parameters: Vec<u8>,
    pub context_engine_id: Vec<u8>,
    pub context_name: String,
    /// Cleartext community string for v1/v2c; empty for v3.
    pub community: Vec<u8>,
}

impl SecurityParams {
    /// A bare, unauthenticated v1/v2c envelope carrying only a community
    /// string.
    pub fn community(community: impl Into<Vec<u8>>) -> Self {
        Self {
            message_id: 0,
            max_size: 0,
            reportable: false,
            security_model: SecurityModel::Community,
            security_level: SecurityLevel::NoAuthNoPriv,
            engine_id: Vec::new(),
            engine_boots: 0,
            engine_time: 0,
            user_name: String::new(),
            auth_parameters: Vec::new(),
            priv_parameters: Vec::new(),
            context_engine_id: Vec::new(),
            context_name: String::new(),
            community: community.into(),
        }
    }
}

/// The RFC 1157 Trap-PDU's fixed fields, carried only when `kind ==
/// PduKind::TrapV1`; every other kind shares the generic
/// request-id/error-status/error-index/varbinds shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapV1Fields {
    pub enterprise: Oid,
    pub agent_addr: [u8; 4],
    pub generic_trap: u32,
    pub specific_trap: u32,
    pub time_stamp: u32,
}

/// A request or response envelope (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub version: SnmpVersion,
    pub kind: PduKind,
    pub request_id: i32,
    pub error_status: u32,
    /// 1-based into `varbinds`; 0 means "no error" / not applicable.
    pub error_index: u32,
    pub non_repeaters: u32,
    pub max_repetitions: u32,
    pub varbinds: Vec<Varbind>,
    pub security: SecurityParams,
    pub trap_v1: Option<TrapV1Fields>,
}

impl Pdu {
    pub fn new_request(
        version: SnmpVersion,
        kind: PduKind,
        request_id: i32,
        varbinds: Vec<Varbind>,
        security: SecurityParams,
    ) -> Self {
        Self {
            version,
            kind,
            request_id,
            error_status: 0,
            error_index: 0,
            non_repeaters: 0,
            max_repetitions: 0,
            varbinds,
            security,
            trap_v1: None,
        }
    }

    /// Builds a `response` PDU that mirrors `self`'s request-id and
    /// security envelope, carrying the supplied varbinds and error fields.
    pub fn response_to(
        &self,
        varbinds: Vec<Varbind>,
        error_status: u32,
        error_index: u32,
    ) -> Pdu {
        Pdu {
            version: self.version,
            kind: PduKind::Response,
            request_id: self.request_id,
            error_status,
            error_index,
            non_repeaters: 0,
            max_repetitions: 0,
            varbinds,
            security: self.security.clone(),
            trap_v1: None,
        }
    }

    pub fn is_bulk(&self) -> bool {
        matches!(self.kind, PduKind::GetBulk)
    }
}
