// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Cryptographic primitives required by USM (spec §4.2): digest, cipher,
//! and key derivation. Every function here is pure in its inputs; no
//! global state, per spec §4.2's contract.

pub mod cipher;
pub mod digest;
pub mod kdf;

pub use cipher::{aes_cfb_decrypt, aes_cfb_encrypt, des_cbc_decrypt, des_cbc_encrypt};
pub use digest::{hmac_md5_96, hmac_sha1_96, AuthProtocol};
pub use kdf::{key_change, localize_key, password_to_key, PrivProtocol};
