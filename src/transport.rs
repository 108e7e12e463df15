// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The transport contract (spec §6): how a caller outside this crate
//! feeds raw datagrams in and gets raw datagrams back out. No UDP/TCP
//! implementation lives here (out of scope per spec §1) — this keeps
//! framing (what bytes mean) separate from the socket plumbing that
//! would carry them, so the latter can be swapped in independently.

use std::net::SocketAddr;

use anyhow::Result;

/// One inbound datagram and the address it arrived from.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub payload: Vec<u8>,
    pub peer: SocketAddr,
}

/// A transport this core's pipeline can receive requests from and send
/// responses/traps through. Implementations are connectionless
/// (UDP-shaped) or connection-oriented (TCP-shaped); this core only
/// needs the three operations below, never the socket itself.
pub trait Transport {
    /// Waits for the next inbound datagram.
    async fn recv(&mut self) -> Result<Datagram>;

    /// Sends `payload` to `peer` (a response, or an unsolicited trap).
    async fn send(&mut self, peer: SocketAddr, payload: &[u8]) -> Result<()>;

    /// Releases any transport-held resources (sockets, buffers). A
    /// transport that has nothing to release can leave this a no-op.
    async fn close(&mut self) -> Result<()>;
}
