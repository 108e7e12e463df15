// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Shared wire-independent data model (spec §3): OIDs, typed values, and
//! the PDU envelope.

pub mod oid;
pub mod pdu;
pub mod value;

pub use oid::Oid;
pub use pdu::{Pdu, PduKind, SecurityLevel, SecurityModel, SecurityParams, SnmpVersion, Varbind};
pub use value::Value;
