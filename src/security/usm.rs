// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! User-based security model (spec §4.3, RFC 3414): the user table plus
//! the ingress/egress pipelines and their report-PDU generation.
//!
//! The ingress pipeline is a short, ordered sequence of checks, any one
//! of which can reject outright: engine-id discovery, user lookup,
//! time-window check, digest verification, then decryption.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::{
    codec::{
        ber::{build_tag_length, parse_header, Tag},
        message::{decode_scoped_pdu, encode_scoped_pdu, encode_v3_envelope, ScopedPdu, V3Envelope},
        primitives::{build_integer, build_octet_string, parse_integer32, parse_octet_string},
    },
    crypto::{
        cipher::{aes_cfb_decrypt, aes_cfb_encrypt, aes_iv, des_cbc_decrypt, des_cbc_encrypt, des_iv},
        digest::{hmac_md5_96, hmac_sha1_96, verify, AuthProtocol},
        kdf::PrivProtocol,
    },
    data::{
        oid::Oid,
        pdu::{Pdu, PduKind, SecurityLevel, SecurityModel, SecurityParams, SnmpVersion},
        value::Value,
        Varbind,
    },
    error::{EngineCounters, PriotError},
    oid,
    security::{engine_time::check_time_window, Principal},
    vacm::row_status::{RowStatus, StorageType},
};

/// RFC 3412 §6.3 `msgFlags` bit positions.
const FLAG_AUTH: u8 = 0x01;
const FLAG_PRIV: u8 = 0x02;
const FLAG_REPORTABLE: u8 = 0x04;

fn security_level_from_flags(flags: u8) -> SecurityLevel {
    if flags & FLAG_PRIV != 0 {
        SecurityLevel::AuthPriv
    } else if flags & FLAG_AUTH != 0 {
        SecurityLevel::AuthNoPriv
    } else {
        SecurityLevel::NoAuthNoPriv
    }
}

fn flags_from_level(level: SecurityLevel, reportable: bool) -> u8 {
    let mut flags = 0u8;
    if level.requires_auth() {
        flags |= FLAG_AUTH;
    }
    if level.requires_priv() {
        flags |= FLAG_PRIV;
    }
    if reportable {
        flags |= FLAG_REPORTABLE;
    }
    flags
}

/// RFC 3414 §2.4 `UsmSecurityParameters`, the BER SEQUENCE carried inside
/// `msgSecurityParameters`.
#[derive(Debug, Clone, Default)]
pub struct UsmSecurityParams {
    pub engine_id: Vec<u8>,
    pub engine_boots: u32,
    pub engine_time: u32,
    pub user_name: String,
    pub auth_parameters: Vec<u8>,
    pub priv_parameters: Vec<u8>,
}

fn seq_wrap(payload: Vec<u8>) -> Vec<u8> {
    let mut out = build_tag_length(Tag::universal(0x10, true), payload.len());
    out.extend_from_slice(&payload);
    out
}

pub fn encode_usm_security_params(p: &UsmSecurityParams) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend(build_octet_string(&p.engine_id));
    payload.extend(build_integer(i64::from(p.engine_boots)));
    payload.extend(build_integer(i64::from(p.engine_time)));
    payload.extend(build_octet_string(p.user_name.as_bytes()));
    payload.extend(build_octet_string(&p.auth_parameters));
    payload.extend(build_octet_string(&p.priv_parameters));
    seq_wrap(payload)
}

pub fn decode_usm_security_params(blob: &[u8]) -> Result<UsmSecurityParams, PriotError> {
    let hdr = parse_header(blob)?;
    if hdr.tag != Tag::universal(0x10, true) {
        return Err(PriotError::InvalidTag(blob[0]));
    }
    let body = &blob[hdr.payload_start..hdr.payload_start + hdr.length];
    let (engine_id, rest) = parse_octet_string(body)?;
    let (engine_boots, rest) = parse_integer32(rest)?;
    let (engine_time, rest) = parse_integer32(rest)?;
    let (user_name_bytes, rest) = parse_octet_string(rest)?;
    let (auth_parameters, rest) = parse_octet_string(rest)?;
    let (priv_parameters, rest) = parse_octet_string(rest)?;
    if !rest.is_empty() {
        return Err(PriotError::InvalidLength);
    }
    if engine_boots < 0 || engine_time < 0 {
        return Err(PriotError::InvalidValue("negative engine-boots/engine-time"));
    }
    let user_name = String::from_utf8(user_name_bytes)
        .map_err(|_| PriotError::InvalidValue("user-name is not valid utf-8"))?;
    Ok(UsmSecurityParams {
        engine_id,
        engine_boots: engine_boots as u32,
        engine_time: engine_time as u32,
        user_name,
        auth_parameters,
        priv_parameters,
    })
}

/// One row of the USM user table (spec §3 "USM user"). Keys are stored
/// with the row for lookup convenience; the table indexes on
/// `(engine_id, user_name)`.
#[derive(Debug, Clone)]
pub struct UsmUser {
    pub engine_id: Vec<u8>,
    pub user_name: String,
    pub auth_protocol: Option<AuthProtocol>,
    /// Localized (not raw passphrase) per spec §3: "raw passphrases are
    /// not stored after key derivation".
    pub auth_key: Vec<u8>,
    pub priv_protocol: Option<PrivProtocol>,
    pub priv_key: Vec<u8>,
    pub clone_from: Option<(Vec<u8>, String)>,
    pub storage_type: StorageType,
    pub row_status: RowStatus,
}

/// `(engine-id, user-name) -> USM user` (spec §3).
#[derive(Debug, Default)]
pub struct UsmUserTable {
    users: DashMap<(Vec<u8>, String), UsmUser>,
}

impl UsmUserTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: UsmUser) {
        self.users.insert((user.engine_id.clone(), user.user_name.clone()), user);
    }

    pub fn remove(&self, engine_id: &[u8], user_name: &str) {
        self.users.remove(&(engine_id.to_vec(), user_name.to_string()));
    }

    /// Looks up a usable (`Active`) row; `NotReady`/`NotInService` rows
    /// are invisible to authorization per spec §4.5/§5.
    pub fn get(&self, engine_id: &[u8], user_name: &str) -> Option<UsmUser> {
        self.users
            .get(&(engine_id.to_vec(), user_name.to_string()))
            .filter(|u| u.row_status.is_usable())
            .map(|u| u.clone())
    }

    /// Drives a USM user row through a SET-requested `RowStatus`
    /// transition, creating it via `make_default` when absent and `next`
    /// is `CreateAndGo`/`CreateAndWait` (spec §4.3's `usmUserTable`,
    /// managed by the same RFC 2579 convention as VACM). Returns the
    /// row's previous status, or `None` if it was just created.
    pub fn set_row_status(
        &self,
        engine_id: &[u8],
        user_name: &str,
        next: RowStatus,
        prerequisites_met: bool,
        make_default: impl FnOnce() -> UsmUser,
    ) -> Result<Option<RowStatus>, PriotError> {
        let key = (engine_id.to_vec(), user_name.to_string());
        if let Some(mut row) = self.users.get_mut(&key) {
            let previous = row.row_status;
            row.row_status = row.row_status.transition(next, row.storage_type, prerequisites_met)?;
            return Ok(Some(previous));
        }
        match next {
            RowStatus::CreateAndGo | RowStatus::CreateAndWait => {
                let mut user = make_default();
                user.row_status = RowStatus::initial(next == RowStatus::CreateAndGo, prerequisites_met);
                self.users.insert(key, user);
                Ok(None)
            },
            _ => Err(PriotError::InconsistentName),
        }
    }

    /// All rows whose `storage_type` survives a restart, for persistence
    /// (spec §6: "non-volatile USM users").
    pub fn snapshot_non_volatile(&self) -> Vec<UsmUser> {
        self.users
            .iter()
            .filter(|e| e.value().storage_type.is_persistent())
            .map(|e| e.value().clone())
            .collect()
    }
}

/// A per-session, monotone-increasing salt for v3 privacy (spec §3, §5):
/// "forbidden [to wrap] for salt (session is rotated before wrap...)".
#[derive(Debug, Default)]
pub struct SaltCounter(AtomicU64);

impl SaltCounter {
    pub fn new(initial: u64) -> Self {
        Self(AtomicU64::new(initial))
    }

    pub fn next(&self) -> [u8; 8] {
        self.0.fetch_add(1, Ordering::Relaxed).to_be_bytes()
    }
}

// RFC 3414 §11 usmStats* OIDs, used both as counters and as the varbind
// an outgoing report PDU carries.
fn oid_unsupported_sec_levels() -> Oid {
    oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 1)
}
fn oid_not_in_time_windows() -> Oid {
    oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 2)
}
fn oid_unknown_user_names() -> Oid {
    oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 3)
}
fn oid_unknown_engine_ids() -> Oid {
    oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 4)
}
fn oid_wrong_digests() -> Oid {
    oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 5)
}
fn oid_decryption_errors() -> Oid {
    oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 6)
}

fn counter_oid(err: &PriotError) -> Oid {
    match err {
        PriotError::UnsupportedSecLevel => oid_unsupported_sec_levels(),
        PriotError::NotInTimeWindow => oid_not_in_time_windows(),
        PriotError::UnknownUser => oid_unknown_user_names(),
        PriotError::UnknownEngineId => oid_unknown_engine_ids(),
        PriotError::AuthenticationFailure => oid_wrong_digests(),
        PriotError::DecryptionError => oid_decryption_errors(),
        other => unreachable!("no usmStats counter for {other:?}"),
    }
}

/// Outcome of [`UsmEngine::process_incoming`].
pub enum UsmIngress {
    Accepted { scoped: ScopedPdu, principal: Principal },
    Report(Pdu),
    Drop,
}

/// Read-only view of the agent's identity, handed to every USM call
/// (spec §9: "collects them into an explicit engine context passed by
/// reference").
pub struct UsmEngine<'a> {
    pub local_engine_id: &'a [u8],
    pub local_engine_boots: u32,
    pub local_engine_time: u32,
    pub users: &'a UsmUserTable,
    pub counters: &'a EngineCounters,
}

impl<'a> UsmEngine<'a> {
    /// RFC 3414 §3.2 inbound pipeline (spec §4.3 steps 1-6).
    pub fn process_incoming(&self, envelope: &V3Envelope) -> Result<UsmIngress, PriotError> {
        let reportable = envelope.flags & FLAG_REPORTABLE != 0;
        let level = security_level_from_flags(envelope.flags);
        let params = decode_usm_security_params(&envelope.security_params_blob)?;

        // Engine-id discovery (spec §4.3 step 3's special case): an
        // unrecognized remote engine-id always gets a report so the
        // client can retry, regardless of the reportable flag.
        if params.engine_id.is_empty() || params.engine_id != self.local_engine_id {
            self.counters.record(&PriotError::UnknownEngineId);
            return Ok(UsmIngress::Report(self.build_discovery_report(envelope, &params)));
        }

        if !level.requires_auth() {
            let security = self.security_params_for(&params, level, None);
            let scoped = decode_scoped_pdu(&envelope.msg_data, security)?;
            let principal = Principal {
                security_model: SecurityModel::Usm,
                security_name: params.user_name.clone(),
                security_level: level,
                context_engine_id: scoped.context_engine_id.clone(),
                context_name: scoped.context_name.clone(),
            };
            return Ok(UsmIngress::Accepted { scoped, principal });
        }

        let user = match self.users.get(&params.engine_id, &params.user_name) {
            Some(u) => u,
            None => {
                self.counters.record(&PriotError::UnknownUser);
                return Ok(self.report_or_drop(reportable, envelope, &params, PriotError::UnknownUser));
            },
        };
        let auth_protocol = match user.auth_protocol {
            Some(p) => p,
            None => {
                self.counters.record(&PriotError::UnsupportedSecLevel);
                return Ok(self.report_or_drop(
                    reportable,
                    envelope,
                    &params,
                    PriotError::UnsupportedSecLevel,
                ));
            },
        };
        if level.requires_priv() && user.priv_protocol.is_none() {
            self.counters.record(&PriotError::UnsupportedSecLevel);
            return Ok(self.report_or_drop(reportable, envelope, &params, PriotError::UnsupportedSecLevel));
        }

        if let Err(e) =
            check_time_window(self.local_engine_boots, self.local_engine_time, params.engine_boots, params.engine_time)
        {
            self.counters.record(&e);
            return Ok(self.report_or_drop(reportable, envelope, &params, e));
        }

        let zeroed_message = self.zeroed_auth_message(envelope, &params);
        if verify(auth_protocol, &user.auth_key, &zeroed_message, &params.auth_parameters).is_err() {
            self.counters.record(&PriotError::AuthenticationFailure);
            return Ok(self.report_or_drop(
                reportable,
                envelope,
                &params,
                PriotError::AuthenticationFailure,
            ));
        }

        let scoped_bytes = if level.requires_priv() {
            match decrypt_scoped_pdu(&envelope.msg_data, &user, &params) {
                Ok(b) => b,
                Err(e) => {
                    self.counters.record(&e);
                    return Ok(self.report_or_drop(reportable, envelope, &params, e));
                },
            }
        } else {
            envelope.msg_data.clone()
        };

        let security = self.security_params_for(&params, level, Some(&user));
        let scoped = decode_scoped_pdu(&scoped_bytes, security)?;
        let principal = Principal {
            security_model: SecurityModel::Usm,
            security_name: params.user_name.clone(),
            security_level: level,
            context_engine_id: scoped.context_engine_id.clone(),
            context_name: scoped.context_name.clone(),
        };
        Ok(UsmIngress::Accepted { scoped, principal })
    }

    /// Encodes a report PDU built by [`process_incoming`](Self::process_incoming)
    /// into wire bytes. Reports travel unauthenticated (RFC 3414 §3.2's
    /// discovery/error paths never assume the peer's key material is
    /// usable), so this bypasses [`process_outgoing`](Self::process_outgoing)'s
    /// signing step entirely.
    pub fn encode_report(
        &self,
        message_id: i32,
        max_size: u32,
        user_name: &str,
        context_engine_id: &[u8],
        pdu: &Pdu,
    ) -> Vec<u8> {
        let scoped_bytes = encode_scoped_pdu(context_engine_id, "", pdu);
        let params = UsmSecurityParams {
            engine_id: self.local_engine_id.to_vec(),
            engine_boots: self.local_engine_boots,
            engine_time: self.local_engine_time,
            user_name: user_name.to_string(),
            auth_parameters: Vec::new(),
            priv_parameters: Vec::new(),
        };
        let blob = encode_usm_security_params(&params);
        encode_v3_envelope(message_id, max_size, 0, 3, &blob, &scoped_bytes)
    }

    fn security_params_for(
        &self,
        params: &UsmSecurityParams,
        level: SecurityLevel,
        user: Option<&UsmUser>,
    ) -> SecurityParams {
        SecurityParams {
            message_id: 0,
            max_size: 0,
            reportable: false,
            security_model: SecurityModel::Usm,
            security_level: level,
            engine_id: params.engine_id.clone(),
            engine_boots: params.engine_boots,
            engine_time: params.engine_time,
            user_name: user.map(|u| u.user_name.clone()).unwrap_or_else(|| params.user_name.clone()),
            auth_parameters: params.auth_parameters.clone(),
            priv_parameters: params.priv_parameters.clone(),
            context_engine_id: Vec::new(),
            context_name: String::new(),
            community: Vec::new(),
        }
    }

    /// Reconstructs the canonical outer message with `msgAuthenticationParameters`
    /// zeroed, for HMAC verification (RFC 3414 §3.2 step 7). Since the
    /// codec's encoder is deterministic and injective on well-typed input
    /// (spec §4.1 property 1), re-serializing the decoded fields yields
    /// the exact bytes the sender authenticated over.
    fn zeroed_auth_message(&self, envelope: &V3Envelope, params: &UsmSecurityParams) -> Vec<u8> {
        let mut zeroed = params.clone();
        zeroed.auth_parameters = vec![0u8; 12];
        let sec_params_blob = encode_usm_security_params(&zeroed);
        encode_v3_envelope(
            envelope.message_id,
            envelope.max_size,
            envelope.flags,
            envelope.security_model,
            &sec_params_blob,
            &envelope.msg_data,
        )
    }

    fn report_or_drop(
        &self,
        reportable: bool,
        envelope: &V3Envelope,
        params: &UsmSecurityParams,
        error: PriotError,
    ) -> UsmIngress {
        if !reportable {
            return UsmIngress::Drop;
        }
        UsmIngress::Report(self.build_report(envelope, params, error))
    }

    fn build_report(&self, envelope: &V3Envelope, params: &UsmSecurityParams, error: PriotError) -> Pdu {
        let value = self.counters.record_and_get(&error);
        let varbind = Varbind::new(counter_oid(&error).child(0), Value::Counter32(value as u32));
        let security = SecurityParams {
            message_id: envelope.message_id,
            max_size: envelope.max_size,
            reportable: false,
            security_model: SecurityModel::Usm,
            security_level: SecurityLevel::NoAuthNoPriv,
            engine_id: self.local_engine_id.to_vec(),
            engine_boots: self.local_engine_boots,
            engine_time: self.local_engine_time,
            user_name: params.user_name.clone(),
            auth_parameters: Vec::new(),
            priv_parameters: Vec::new(),
            context_engine_id: self.local_engine_id.to_vec(),
            context_name: String::new(),
            community: Vec::new(),
        };
        Pdu::new_request(SnmpVersion::V3, PduKind::Report, 0, vec![varbind], security)
    }

    /// Builds the engine-id discovery report: our engine-id, zeroed
    /// boots/time (spec §4.3 step 3).
    fn build_discovery_report(&self, envelope: &V3Envelope, params: &UsmSecurityParams) -> Pdu {
        let value = self.counters.record_and_get(&PriotError::UnknownEngineId);
        let varbind = Varbind::new(oid_unknown_engine_ids().child(0), Value::Counter32(value as u32));
        let security = SecurityParams {
            message_id: envelope.message_id,
            max_size: envelope.max_size,
            reportable: false,
            security_model: SecurityModel::Usm,
            security_level: SecurityLevel::NoAuthNoPriv,
            engine_id: self.local_engine_id.to_vec(),
            engine_boots: 0,
            engine_time: 0,
            user_name: params.user_name.clone(),
            auth_parameters: Vec::new(),
            priv_parameters: Vec::new(),
            context_engine_id: self.local_engine_id.to_vec(),
            context_name: String::new(),
            community: Vec::new(),
        };
        Pdu::new_request(SnmpVersion::V3, PduKind::Report, 0, vec![varbind], security)
    }

    /// RFC 3414 §3.1 outbound pipeline (spec §4.3 "USM egress"): encrypt
    /// if privacy is requested, place a fresh salt, compute HMAC last.
    #[allow(clippy::too_many_arguments)]
    pub fn process_outgoing(
        &self,
        user: &UsmUser,
        level: SecurityLevel,
        message_id: i32,
        max_size: u32,
        reportable: bool,
        context_engine_id: &[u8],
        context_name: &str,
        pdu: &Pdu,
        salt_counter: &SaltCounter,
    ) -> Result<Vec<u8>, PriotError> {
        let scoped_bytes = encode_scoped_pdu(context_engine_id, context_name, pdu);

        let (msg_data, priv_parameters) = if level.requires_priv() {
            let salt = salt_counter.next();
            match user.priv_protocol {
                Some(PrivProtocol::DesCbc) => {
                    if user.priv_key.len() < 16 {
                        return Err(PriotError::DecryptionError);
                    }
                    let key: [u8; 8] =
                        user.priv_key[..8].try_into().expect("checked length above");
                    let pre_iv: [u8; 8] =
                        user.priv_key[8..16].try_into().expect("checked length above");
                    let iv = des_iv(&pre_iv, &salt);
                    let mut padded = scoped_bytes.clone();
                    let pad = (8 - padded.len() % 8) % 8;
                    padded.extend(std::iter::repeat_n(0u8, pad));
                    let ct = des_cbc_encrypt(&key, &iv, &padded)?;
                    (build_octet_string(&ct), salt.to_vec())
                },
                Some(PrivProtocol::AesCfb128) => {
                    if user.priv_key.len() < 16 {
                        return Err(PriotError::DecryptionError);
                    }
                    let key: [u8; 16] =
                        user.priv_key[..16].try_into().expect("checked length above");
                    let iv = aes_iv(self.local_engine_boots, self.local_engine_time, &salt);
                    let ct = aes_cfb_encrypt(&key, &iv, &scoped_bytes);
                    (build_octet_string(&ct), salt.to_vec())
                },
                None => return Err(PriotError::UnsupportedSecLevel),
            }
        } else {
            (scoped_bytes, Vec::new())
        };

        let flags = flags_from_level(level, reportable);
        let mut params = UsmSecurityParams {
            engine_id: self.local_engine_id.to_vec(),
            engine_boots: self.local_engine_boots,
            engine_time: self.local_engine_time,
            user_name: user.user_name.clone(),
            auth_parameters: if level.requires_auth() { vec![0u8; 12] } else { Vec::new() },
            priv_parameters,
        };

        if !level.requires_auth() {
            let blob = encode_usm_security_params(&params);
            return Ok(encode_v3_envelope(message_id, max_size, flags, 3, &blob, &msg_data));
        }

        let zeroed_blob = encode_usm_security_params(&params);
        let zeroed_message = encode_v3_envelope(message_id, max_size, flags, 3, &zeroed_blob, &msg_data);
        let auth_protocol = user
            .auth_protocol
            .ok_or(PriotError::UnsupportedSecLevel)?;
        let mac = match auth_protocol {
            AuthProtocol::HmacMd5 => hmac_md5_96(&user.auth_key, &zeroed_message)?,
            AuthProtocol::HmacSha1 => hmac_sha1_96(&user.auth_key, &zeroed_message)?,
        };
        params.auth_parameters = mac.to_vec();
        let blob = encode_usm_security_params(&params);
        Ok(encode_v3_envelope(message_id, max_size, flags, 3, &blob, &msg_data))
    }
}

fn decrypt_scoped_pdu(
    msg_data: &[u8],
    user: &UsmUser,
    params: &UsmSecurityParams,
) -> Result<Vec<u8>, PriotError> {
    let (ciphertext, rest) = parse_octet_string(msg_data)?;
    if !rest.is_empty() {
        return Err(PriotError::DecryptionError);
    }
    match user.priv_protocol {
        Some(PrivProtocol::DesCbc) => {
            let salt: [u8; 8] = params
                .priv_parameters
                .as_slice()
                .try_into()
                .map_err(|_| PriotError::DecryptionError)?;
            if user.priv_key.len() < 16 {
                return Err(PriotError::DecryptionError);
            }
            let key: [u8; 8] = user.priv_key[..8].try_into().expect("checked length above");
            let pre_iv: [u8; 8] = user.priv_key[8..16].try_into().expect("checked length above");
            let iv = des_iv(&pre_iv, &salt);
            des_cbc_decrypt(&key, &iv, &ciphertext)
        },
        Some(PrivProtocol::AesCfb128) => {
            let salt: [u8; 8] = params
                .priv_parameters
                .as_slice()
                .try_into()
                .map_err(|_| PriotError::DecryptionError)?;
            if user.priv_key.len() < 16 {
                return Err(PriotError::DecryptionError);
            }
            let key: [u8; 16] = user.priv_key[..16].try_into().expect("checked length above");
            let iv = aes_iv(params.engine_boots, params.engine_time, &salt);
            Ok(aes_cfb_decrypt(&key, &iv, &ciphertext))
        },
        None => Err(PriotError::UnsupportedSecLevel),
    }
}
