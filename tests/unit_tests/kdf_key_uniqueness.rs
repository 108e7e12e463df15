// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! RFC 3414 key derivation properties that hold regardless of the exact
//! digest output (spec §4.2): localization is engine-id-specific, and
//! the two supported digests never collide on key length.

use priot_core::crypto::{
    digest::AuthProtocol,
    kdf::{localize_key, password_to_key},
};

#[test]
fn md5_and_sha1_keys_have_the_protocol_specific_length() {
    let md5_key = password_to_key(AuthProtocol::HmacMd5, b"maplesyrup").expect("ok");
    let sha1_key = password_to_key(AuthProtocol::HmacSha1, b"maplesyrup").expect("ok");
    assert_eq!(md5_key.len(), 16);
    assert_eq!(sha1_key.len(), 20);
    assert_ne!(md5_key, sha1_key[..16]);
}

#[test]
fn localizing_the_same_key_to_two_engines_yields_different_keys() {
    let key = password_to_key(AuthProtocol::HmacSha1, b"a shared passphrase").expect("ok");
    let localized_a = localize_key(AuthProtocol::HmacSha1, &key, b"engine-a").expect("ok");
    let localized_b = localize_key(AuthProtocol::HmacSha1, &key, b"engine-b").expect("ok");
    assert_ne!(localized_a, localized_b);
}

#[test]
fn localization_is_deterministic_for_the_same_engine() {
    let key = password_to_key(AuthProtocol::HmacMd5, b"another passphrase").expect("ok");
    let a = localize_key(AuthProtocol::HmacMd5, &key, b"engine-one").expect("ok");
    let b = localize_key(AuthProtocol::HmacMd5, &key, b"engine-one").expect("ok");
    assert_eq!(a, b);
}

#[test]
fn different_passphrases_never_derive_to_the_same_key() {
    let a = password_to_key(AuthProtocol::HmacSha1, b"passphrase-one").expect("ok");
    let b = password_to_key(AuthProtocol::HmacSha1, b"passphrase-two").expect("ok");
    assert_ne!(a, b);
}
