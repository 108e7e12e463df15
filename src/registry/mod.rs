// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Subtree dispatch (spec §4.4): maps an OID to the handler responsible
//! for it.

pub mod cache;
pub mod node;
pub mod tree;

pub use node::RegistrationId;
pub use tree::{RegistryError, SubtreeRegistry};
