// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The varbind payload (spec §3): a tagged union over every SNMP wire type,
//! including the three endpoint markers that may only appear in responses.

use crate::data::oid::Oid;

/// One varbind's typed value.
///
/// `NoSuchObject`, `NoSuchInstance` and `EndOfMibView` are exception
/// values, not data: spec §3 requires they "may only appear in
/// responses" — nothing in this crate constructs them as request input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer32(i32),
    OctetString(Vec<u8>),
    Null,
    ObjectId(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl Value {
    /// True for the three exception markers spec §3 restricts to
    /// responses.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    /// Short name used in tracing/log output and counter labels.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer32(_) => "Integer32",
            Value::OctetString(_) => "OctetString",
            Value::Null => "Null",
            Value::ObjectId(_) => "ObjectId",
            Value::IpAddress(_) => "IpAddress",
            Value::Counter32(_) => "Counter32",
            Value::Gauge32(_) => "Gauge32",
            Value::TimeTicks(_) => "TimeTicks",
            Value::Opaque(_) => "Opaque",
            Value::Counter64(_) => "Counter64",
            Value::NoSuchObject => "NoSuchObject",
            Value::NoSuchInstance => "NoSuchInstance",
            Value::EndOfMibView => "EndOfMibView",
        }
    }
}
