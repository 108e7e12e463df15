// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Error kinds produced by the core (spec §7) plus the per-cause counters
//! that every distinct failure increments.

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

/// Every distinct way the core can reject a message or a varbind.
///
/// Codec errors never cross into the pipeline (the PDU is dropped);
/// security errors are handled entirely inside `security::mp` and never
/// leak past it; everything else is surfaced as `error-status` on a
/// varbind, following the propagation policy in spec §7.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PriotError {
    // §4.1 codec
    #[error("truncated input: needed {needed} bytes, had {have}")]
    TruncatedInput { needed: usize, have: usize },
    #[error("invalid tag: 0x{0:02x}")]
    InvalidTag(u8),
    #[error("invalid length encoding")]
    InvalidLength,
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),
    #[error("buffer full")]
    BufferFull,

    // §4.2 / §4.3 security
    #[error("authentication failure")]
    AuthenticationFailure,
    #[error("decryption error")]
    DecryptionError,
    #[error("not in time window")]
    NotInTimeWindow,
    #[error("unknown engine id")]
    UnknownEngineId,
    #[error("unknown user")]
    UnknownUser,
    #[error("unsupported security level")]
    UnsupportedSecLevel,
    #[error("unsupported security model")]
    UnsupportedSecModel,

    // §4.4 / §4.6 resolution
    #[error("no such name")]
    NoSuchName,
    #[error("no such object")]
    NoSuchObject,
    #[error("no such instance")]
    NoSuchInstance,
    #[error("end of mib view")]
    EndOfMibView,

    // §4.5 VACM
    #[error("no access")]
    NoAccess,
    #[error("not writable")]
    NotWritable,
    #[error("authorization error")]
    AuthorizationError,

    // §4.6 SET reserve phases
    #[error("wrong type")]
    WrongType,
    #[error("wrong length")]
    WrongLength,
    #[error("wrong value")]
    WrongValue,
    #[error("wrong encoding")]
    WrongEncoding,
    #[error("inconsistent name")]
    InconsistentName,
    #[error("inconsistent value")]
    InconsistentValue,
    #[error("resource unavailable")]
    ResourceUnavailable,

    // §4.6 later phases
    #[error("commit failed")]
    CommitFailed,
    #[error("undo failed")]
    UndoFailed,
    #[error("general error")]
    GenErr,
}

impl PriotError {
    /// Maps a reserve/commit-phase error onto the matching SNMPv2
    /// `error-status` code (RFC 1905 §3).
    pub fn to_error_status(&self) -> u32 {
        match self {
            PriotError::NoSuchName => 2,
            PriotError::NoAccess => 6,
            PriotError::WrongType => 7,
            PriotError::WrongLength => 8,
            PriotError::WrongEncoding => 9,
            PriotError::WrongValue => 10,
            PriotError::InconsistentValue => 12,
            PriotError::ResourceUnavailable => 13,
            PriotError::CommitFailed => 14,
            PriotError::UndoFailed => 15,
            PriotError::AuthorizationError => 16,
            PriotError::NotWritable => 17,
            PriotError::InconsistentName => 18,
            _ => 5, // genErr
        }
    }
}

/// Readable MIB counters named in spec §6, each incremented exactly once
/// per matching failure (property 2 in spec §8).
#[derive(Debug, Default)]
pub struct EngineCounters {
    pub snmp_in_pkts: AtomicU64,
    pub snmp_out_pkts: AtomicU64,
    pub snmp_in_bad_versions: AtomicU64,
    pub snmp_in_asn_parse_errs: AtomicU64,
    pub usm_stats_unsupported_sec_levels: AtomicU64,
    pub usm_stats_not_in_time_windows: AtomicU64,
    pub usm_stats_unknown_user_names: AtomicU64,
    pub usm_stats_unknown_engine_ids: AtomicU64,
    pub usm_stats_wrong_digests: AtomicU64,
    pub usm_stats_decryption_errors: AtomicU64,
    pub snmp_unknown_security_models: AtomicU64,
    pub snmp_invalid_msgs: AtomicU64,
    pub snmp_unknown_pdu_handlers: AtomicU64,
    /// Requests whose delegated handler never completed before its
    /// deadline (spec §4.6 "cancelled on deadline expiry"). No RFC names
    /// this one; it is local instrumentation, not a wire-visible MIB
    /// counter.
    pub pipeline_delegation_timeouts: AtomicU64,
}

impl EngineCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes a codec/security failure to its matching counter. Pipeline
    /// (§4.4+) errors have no dedicated counter and are not tallied here.
    pub fn record(&self, err: &PriotError) {
        let counter = match err {
            PriotError::TruncatedInput { .. }
            | PriotError::InvalidTag(_)
            | PriotError::InvalidLength
            | PriotError::InvalidValue(_) => &self.snmp_in_asn_parse_errs,
            PriotError::UnsupportedSecLevel => &self.usm_stats_unsupported_sec_levels,
            PriotError::NotInTimeWindow => &self.usm_stats_not_in_time_windows,
            PriotError::UnknownUser => &self.usm_stats_unknown_user_names,
            PriotError::UnknownEngineId => &self.usm_stats_unknown_engine_ids,
            PriotError::AuthenticationFailure => &self.usm_stats_wrong_digests,
            PriotError::DecryptionError => &self.usm_stats_decryption_errors,
            PriotError::UnsupportedSecModel => &self.snmp_unknown_security_models,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Like [`record`](Self::record), but also returns the counter's new
    /// value, for embedding in a report PDU's varbind (spec §4.3 step 2's
    /// "respond with a report PDU" and scenario F's `previous + 1`).
    /// Panics if `err` has no associated counter; callers only invoke this
    /// for the subset of errors that reach a report path.
    pub fn record_and_get(&self, err: &PriotError) -> u64 {
        let counter = match err {
            PriotError::UnsupportedSecLevel => &self.usm_stats_unsupported_sec_levels,
            PriotError::NotInTimeWindow => &self.usm_stats_not_in_time_windows,
            PriotError::UnknownUser => &self.usm_stats_unknown_user_names,
            PriotError::UnknownEngineId => &self.usm_stats_unknown_engine_ids,
            PriotError::AuthenticationFailure => &self.usm_stats_wrong_digests,
            PriotError::DecryptionError => &self.usm_stats_decryption_errors,
            PriotError::UnsupportedSecModel => &self.snmp_unknown_security_models,
            other => unreachable!("no usm report counter for {other:?}"),
        };
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> EngineCountersSnapshot {
        EngineCountersSnapshot {
            snmp_in_pkts: self.snmp_in_pkts.load(Ordering::Relaxed),
            snmp_out_pkts: self.snmp_out_pkts.load(Ordering::Relaxed),
            snmp_in_bad_versions: self.snmp_in_bad_versions.load(Ordering::Relaxed),
            snmp_in_asn_parse_errs: self.snmp_in_asn_parse_errs.load(Ordering::Relaxed),
            usm_stats_unsupported_sec_levels: self
                .usm_stats_unsupported_sec_levels
                .load(Ordering::Relaxed),
            usm_stats_not_in_time_windows: self
                .usm_stats_not_in_time_windows
                .load(Ordering::Relaxed),
            usm_stats_unknown_user_names: self
                .usm_stats_unknown_user_names
                .load(Ordering::Relaxed),
            usm_stats_unknown_engine_ids: self
                .usm_stats_unknown_engine_ids
                .load(Ordering::Relaxed),
            usm_stats_wrong_digests: self.usm_stats_wrong_digests.load(Ordering::Relaxed),
            usm_stats_decryption_errors: self
                .usm_stats_decryption_errors
                .load(Ordering::Relaxed),
            snmp_unknown_security_models: self
                .snmp_unknown_security_models
                .load(Ordering::Relaxed),
            snmp_invalid_msgs: self.snmp_invalid_msgs.load(Ordering::Relaxed),
            snmp_unknown_pdu_handlers: self
                .snmp_unknown_pdu_handlers
                .load(Ordering::Relaxed),
            pipeline_delegation_timeouts: self
                .pipeline_delegation_timeouts
                .load(Ordering::Relaxed),
        }
    }
}

/// Plain-data snapshot of [`EngineCounters`], handed out to instrumentation
/// (e.g. a handler backing the `snmp` MIB group) without exposing atomics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineCountersSnapshot {
    pub snmp_in_pkts: u64,
    pub snmp_out_pkts: u64,
    pub snmp_in_bad_versions: u64,
    pub snmp_in_asn_parse_errs: u64,
    pub usm_stats_unsupported_sec_levels: u64,
    pub usm_stats_not_in_time_windows: u64,
    pub usm_stats_unknown_user_names: u64,
    pub usm_stats_unknown_engine_ids: u64,
    pub usm_stats_wrong_digests: u64,
    pub usm_stats_decryption_errors: u64,
    pub snmp_unknown_security_models: u64,
    pub snmp_invalid_msgs: u64,
    pub snmp_unknown_pdu_handlers: u64,
    pub pipeline_delegation_timeouts: u64,
}
