// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! RFC 3414 §2.6/§A.2/§A.3 key derivation: password-to-key, localization,
//! and key-change (spec §4.2).

use digest::Digest as _;
use md5::Md5;
use sha1::Sha1;

use crate::{crypto::digest::AuthProtocol, error::PriotError};

const EXPANDED_LEN: usize = 1_048_576;

/// Which privacy protocol a USM user's priv-key feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivProtocol {
    DesCbc,
    AesCfb128,
}

fn digest_bytes(protocol: AuthProtocol, data: &[u8]) -> Vec<u8> {
    match protocol {
        AuthProtocol::HmacMd5 => Md5::digest(data).to_vec(),
        AuthProtocol::HmacSha1 => Sha1::digest(data).to_vec(),
    }
}

/// RFC 3414 §A.2 "password to key" algorithm: the passphrase is repeated
/// (wrapping) to fill exactly 1,048,576 octets, which is then digested.
/// Rejects an empty passphrase per spec §4.2.
pub fn password_to_key(
    protocol: AuthProtocol,
    passphrase: &[u8],
) -> Result<Vec<u8>, PriotError> {
    if passphrase.is_empty() {
        return Err(PriotError::InvalidValue("passphrase must not be empty"));
    }
    let mut expanded = Vec::with_capacity(EXPANDED_LEN);
    let mut cursor = 0usize;
    while expanded.len() < EXPANDED_LEN {
        expanded.push(passphrase[cursor % passphrase.len()]);
        cursor += 1;
    }
    Ok(digest_bytes(protocol, &expanded))
}

/// RFC 3414 §A.2 localization: `hash(digest || engine-id || digest)`.
/// Rejects an empty engine-id per spec §4.2.
pub fn localize_key(
    protocol: AuthProtocol,
    key: &[u8],
    engine_id: &[u8],
) -> Result<Vec<u8>, PriotError> {
    if engine_id.is_empty() {
        return Err(PriotError::InvalidValue("engine-id must not be empty"));
    }
    let mut buf = Vec::with_capacity(key.len() * 2 + engine_id.len());
    buf.extend_from_slice(key);
    buf.extend_from_slice(engine_id);
    buf.extend_from_slice(key);
    Ok(digest_bytes(protocol, &buf))
}

/// RFC 3414 §5 key-change: the incoming key-change octet string is split
/// into two equal halves `random || delta`; the new key is recovered as
/// `delta XOR hash(old_key || random)`.
pub fn key_change(
    protocol: AuthProtocol,
    old_key: &[u8],
    key_change_value: &[u8],
) -> Result<Vec<u8>, PriotError> {
    let half = key_change_value.len() / 2;
    if half == 0 || key_change_value.len() % 2 != 0 {
        return Err(PriotError::InvalidValue("key-change value must split evenly"));
    }
    let (random, delta) = key_change_value.split_at(half);

    let mut hashed_input = Vec::with_capacity(old_key.len() + random.len());
    hashed_input.extend_from_slice(old_key);
    hashed_input.extend_from_slice(random);
    let mask = digest_bytes(protocol, &hashed_input);

    if mask.len() < delta.len() {
        return Err(PriotError::InvalidValue("key-change delta longer than digest"));
    }
    let new_key: Vec<u8> = delta.iter().zip(mask.iter()).map(|(d, m)| d ^ m).collect();
    Ok(new_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_to_key_rejects_empty() {
        assert!(password_to_key(AuthProtocol::HmacMd5, b"").is_err());
    }

    #[test]
    fn password_to_key_is_deterministic() {
        let a = password_to_key(AuthProtocol::HmacSha1, b"maplesyrup").expect("ok");
        let b = password_to_key(AuthProtocol::HmacSha1, b"maplesyrup").expect("ok");
        assert_eq!(a, b);
        assert_eq!(a.len(), 20);
    }

    #[test]
    fn localize_key_rejects_empty_engine_id() {
        let k = password_to_key(AuthProtocol::HmacMd5, b"maplesyrup").expect("ok");
        assert!(localize_key(AuthProtocol::HmacMd5, &k, b"").is_err());
    }

    #[test]
    fn key_change_roundtrip() {
        let old_key = vec![7u8; 16];
        // construct a key-change value whose resulting new key we can predict:
        // random is arbitrary, delta = new_key XOR hash(old_key || random).
        let random = vec![9u8; 16];
        let new_key = vec![42u8; 16];
        let mut hashed_input = old_key.clone();
        hashed_input.extend_from_slice(&random);
        let mask = digest_bytes(AuthProtocol::HmacMd5, &hashed_input);
        let delta: Vec<u8> = new_key.iter().zip(mask.iter()).map(|(a, b)| a ^ b).collect();
        let mut kcv = random.clone();
        kcv.extend_from_slice(&delta);

        let recovered = key_change(AuthProtocol::HmacMd5, &old_key, &kcv).expect("recovers");
        assert_eq!(recovered, new_key);
    }
}
