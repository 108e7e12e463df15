// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! CBC-DES / CFB-AES-128 (spec §4.2): the two USM privacy protocols.
//!
//! DES requires plaintext padded to the 8-octet block size by the caller
//! (spec §4.2: "cipher operations require plaintext length a multiple of
//! the block size (DES)"); AES-CFB has no such restriction and encrypts a
//! stream of arbitrary length.

use aes::Aes128;
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cfb_mode::{cipher::AsyncStreamCipher, Decryptor as CfbDecryptor, Encryptor as CfbEncryptor};
use des::Des;

use crate::error::PriotError;

type DesCbcEnc = cbc::Encryptor<Des>;
type DesCbcDec = cbc::Decryptor<Des>;
type Aes128Cfb128Enc = CfbEncryptor<Aes128>;
type Aes128Cfb128Dec = CfbDecryptor<Aes128>;

pub const DES_BLOCK_LEN: usize = 8;
pub const DES_KEY_LEN: usize = 8;
pub const AES128_KEY_LEN: usize = 16;
pub const AES128_IV_LEN: usize = 16;

/// Derives the 8-octet CBC-DES IV: the user's pre-IV XORed with the
/// 8-octet salt carried on the wire (RFC 3414 §8.1.1.1).
pub fn des_iv(pre_iv: &[u8; 8], salt: &[u8; 8]) -> [u8; 8] {
    let mut iv = [0u8; 8];
    for i in 0..8 {
        iv[i] = pre_iv[i] ^ salt[i];
    }
    iv
}

/// Derives the 16-octet CFB-AES-128 IV: `engineBoots || engineTime ||
/// salt` (RFC 3826 §3.1.2.1), where `salt` is an 8-octet local counter.
pub fn aes_iv(engine_boots: u32, engine_time: u32, salt: &[u8; 8]) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[0..4].copy_from_slice(&engine_boots.to_be_bytes());
    iv[4..8].copy_from_slice(&engine_time.to_be_bytes());
    iv[8..16].copy_from_slice(salt);
    iv
}

/// Encrypts `plaintext` under CBC-DES. `plaintext.len()` must be a
/// multiple of [`DES_BLOCK_LEN`]; otherwise returns
/// [`PriotError::DecryptionError`] (spec §4.2's single failure kind for
/// alignment problems on either direction).
pub fn des_cbc_encrypt(
    key: &[u8; DES_KEY_LEN],
    iv: &[u8; 8],
    plaintext: &[u8],
) -> Result<Vec<u8>, PriotError> {
    if plaintext.len() % DES_BLOCK_LEN != 0 {
        return Err(PriotError::DecryptionError);
    }
    let mut buf = plaintext.to_vec();
    let enc = DesCbcEnc::new(key.into(), iv.into());
    enc.encrypt_padded_mut::<NoPadding>(&mut buf, plaintext.len())
        .map_err(|_| PriotError::DecryptionError)?;
    Ok(buf)
}

/// Decrypts `ciphertext` under CBC-DES; block-alignment failure or a
/// corrupted padding marker is surfaced as [`PriotError::DecryptionError`]
/// per spec §4.2.
pub fn des_cbc_decrypt(
    key: &[u8; DES_KEY_LEN],
    iv: &[u8; 8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, PriotError> {
    if ciphertext.is_empty() || ciphertext.len() % DES_BLOCK_LEN != 0 {
        return Err(PriotError::DecryptionError);
    }
    let mut buf = ciphertext.to_vec();
    let dec = DesCbcDec::new(key.into(), iv.into());
    let len = dec
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| PriotError::DecryptionError)?
        .len();
    buf.truncate(len);
    Ok(buf)
}

/// CFB-128 mode AES-128 encrypt, arbitrary-length stream (no padding, no
/// block-alignment requirement, per spec §4.2).
pub fn aes_cfb_encrypt(
    key: &[u8; AES128_KEY_LEN],
    iv: &[u8; AES128_IV_LEN],
    plaintext: &[u8],
) -> Vec<u8> {
    let mut buf = plaintext.to_vec();
    Aes128Cfb128Enc::new(key.into(), iv.into()).encrypt(&mut buf);
    buf
}

pub fn aes_cfb_decrypt(
    key: &[u8; AES128_KEY_LEN],
    iv: &[u8; AES128_IV_LEN],
    ciphertext: &[u8],
) -> Vec<u8> {
    let mut buf = ciphertext.to_vec();
    Aes128Cfb128Dec::new(key.into(), iv.into()).decrypt(&mut buf);
    buf
}
