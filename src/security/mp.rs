// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Message-processing dispatch (spec §4.3 step 1): peeks the wire
//! version, routes v1/v2c through the community model and v3 through
//! USM, and tallies the top-level `snmp` group counters that belong to
//! neither pipeline.

use crate::{
    codec::message::{decode_v1v2c, decode_v3_envelope, peek_version},
    data::pdu::{Pdu, SnmpVersion},
    error::{EngineCounters, PriotError},
    security::{
        community::CommunityTable,
        usm::{UsmEngine, UsmIngress},
        Principal,
    },
};

/// Security model identifier carried in `msgGlobalData` (RFC 3412 §6.3).
/// `1` is unused (reserved historically for SNMPv1's own code path, which
/// never reaches this v3-only dispatch branch).
const SECURITY_MODEL_USM: i32 = 3;

/// Result of routing one inbound datagram through message processing.
pub enum Incoming {
    /// A PDU ready for the request pipeline, the principal that
    /// authenticated it, and the largest response the peer will accept
    /// (spec §4.6 "the transport max-message-size, whichever is
    /// smaller"): the peer's advertised `msgMaxSize` for v3, or
    /// `u32::MAX` for v1/v2c, which carries no such field.
    Accepted { pdu: Pdu, principal: Principal, max_size: u32 },
    /// A reply to send back verbatim (a v3 report); the request pipeline
    /// never sees the original PDU.
    Reply(Vec<u8>),
    /// Reject silently: no reply, no further processing.
    Drop,
}

/// Ties the community and USM security models together behind one
/// version-dispatching entry point (spec §9: "an explicit engine context
/// passed by reference" rather than ambient globals).
pub struct MessageProcessor<'a> {
    pub community: &'a CommunityTable,
    pub usm: &'a UsmEngine<'a>,
    pub counters: &'a EngineCounters,
}

impl<'a> MessageProcessor<'a> {
    pub fn process_incoming(&self, buf: &[u8]) -> Result<Incoming, PriotError> {
        self.counters.snmp_in_pkts.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let version = match peek_version(buf) {
            Ok(v) => v,
            Err(e) => {
                self.counters.snmp_in_bad_versions.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                return Err(e);
            },
        };

        match version {
            SnmpVersion::V1 | SnmpVersion::V2c => {
                let pdu = decode_v1v2c(buf)?;
                match self.community.resolve(&pdu.security.community) {
                    Ok(principal) => Ok(Incoming::Accepted { pdu, principal, max_size: u32::MAX }),
                    Err(_) => Ok(Incoming::Drop),
                }
            },
            SnmpVersion::V3 => {
                let envelope = decode_v3_envelope(buf)?;
                if envelope.security_model != SECURITY_MODEL_USM {
                    self.counters.record(&PriotError::UnsupportedSecModel);
                    return Ok(Incoming::Drop);
                }
                match self.usm.process_incoming(&envelope)? {
                    UsmIngress::Accepted { scoped, principal } => {
                        Ok(Incoming::Accepted { pdu: scoped.pdu, principal, max_size: envelope.max_size })
                    },
                    UsmIngress::Report(pdu) => {
                        let bytes = self.usm.encode_report(
                            envelope.message_id,
                            envelope.max_size,
                            &pdu.security.user_name,
                            &pdu.security.context_engine_id,
                            &pdu,
                        );
                        Ok(Incoming::Reply(bytes))
                    },
                    UsmIngress::Drop => Ok(Incoming::Drop),
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::message::encode_v1v2c,
        data::{
            oid::Oid,
            pdu::{PduKind, SecurityParams},
            value::Value,
            Varbind,
        },
        security::{community::CommunityEntry, usm::UsmUserTable},
    };

    fn sample_get(community: &str) -> Pdu {
        let oid = Oid::new(vec![1, 3, 6, 1, 2, 1, 1, 3, 0]).expect("valid");
        Pdu::new_request(
            SnmpVersion::V2c,
            PduKind::Get,
            1,
            vec![Varbind::new(oid, Value::Null)],
            SecurityParams::community(community),
        )
    }

    #[test]
    fn v2c_known_community_is_accepted() {
        let community = CommunityTable::new();
        community.insert("public", CommunityEntry { security_name: "ro".into(), context_name: String::new() });
        let users = UsmUserTable::new();
        let counters = EngineCounters::new();
        let engine_id = b"engine".to_vec();
        let usm = UsmEngine {
            local_engine_id: &engine_id,
            local_engine_boots: 1,
            local_engine_time: 1,
            users: &users,
            counters: &counters,
        };
        let mp = MessageProcessor { community: &community, usm: &usm, counters: &counters };

        let bytes = encode_v1v2c(&sample_get("public"));
        match mp.process_incoming(&bytes).expect("decodes") {
            Incoming::Accepted { pdu, principal, max_size } => {
                assert_eq!(pdu.request_id, 1);
                assert_eq!(principal.security_name, "ro");
                assert_eq!(max_size, u32::MAX);
            },
            _ => panic!("expected acceptance"),
        }
    }

    #[test]
    fn v2c_unknown_community_is_dropped() {
        let community = CommunityTable::new();
        let users = UsmUserTable::new();
        let counters = EngineCounters::new();
        let engine_id = b"engine".to_vec();
        let usm = UsmEngine {
            local_engine_id: &engine_id,
            local_engine_boots: 1,
            local_engine_time: 1,
            users: &users,
            counters: &counters,
        };
        let mp = MessageProcessor { community: &community, usm: &usm, counters: &counters };

        let bytes = encode_v1v2c(&sample_get("private"));
        assert!(matches!(mp.process_incoming(&bytes).expect("decodes"), Incoming::Drop));
    }
}
