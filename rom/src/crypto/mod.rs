// Licensed under the Apache-2.0 license

//! Interfaces to the platform cryptographic provider.
//!
//! The boot stage never implements primitives itself. Platforms plug a
//! hardware accelerator (or, on the host, a software emulation) in behind
//! these traits.

mod aead;
mod key;
mod mac;

pub use aead::{AeadDirection, AeadOperation};
pub use key::{KeyHandle, KeyMaterial, OpaqueKeyId, IMPORTED_KEY_FLAG, MAX_KEY_LEN};
pub use mac::MacOperation;

use mcu_error::McuResult;

pub const SHA256_DIGEST_LEN: usize = 32;
pub const AES_BLOCK_LEN: usize = 16;
pub const CCM_TAG_LEN: usize = 16;
pub const CMAC_TAG_LEN: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MacAlgorithm {
    AesCmac,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AeadAlgorithm {
    /// AES-CCM with a 16-byte tag.
    AesCcm,
}

pub trait HashEngine {
    fn sha256(&mut self, data: &[u8], digest: &mut [u8; SHA256_DIGEST_LEN]) -> McuResult<()>;
}

/// Multi-part MAC computation. One operation is active at a time.
pub trait MacEngine {
    fn mac_sign_setup(&mut self, key: &KeyHandle, alg: MacAlgorithm) -> McuResult<()>;
    fn mac_update(&mut self, data: &[u8]) -> McuResult<()>;
    /// Writes the MAC to `mac` and returns its length.
    fn mac_sign_finish(&mut self, mac: &mut [u8]) -> McuResult<usize>;
    fn mac_abort(&mut self);
}

/// Multi-part AEAD computation. One operation is active at a time.
///
/// `aead_update` may hold back input and emit it in a later call, so the
/// number of bytes written to `output` need not match the input length.
pub trait AeadEngine {
    fn aead_encrypt_setup(&mut self, key: &KeyHandle, alg: AeadAlgorithm) -> McuResult<()>;
    fn aead_decrypt_setup(&mut self, key: &KeyHandle, alg: AeadAlgorithm) -> McuResult<()>;
    fn aead_set_lengths(&mut self, ad_len: usize, plaintext_len: usize) -> McuResult<()>;
    fn aead_set_nonce(&mut self, nonce: &[u8]) -> McuResult<()>;
    fn aead_update(&mut self, input: &[u8], output: &mut [u8]) -> McuResult<usize>;
    /// Emits the remaining ciphertext and the tag. Returns
    /// `(ciphertext_len, tag_len)`.
    fn aead_finish(&mut self, output: &mut [u8], tag: &mut [u8]) -> McuResult<(usize, usize)>;
    /// Emits the remaining plaintext and checks `tag`. Nothing is emitted
    /// when the check fails.
    fn aead_verify(&mut self, output: &mut [u8], tag: &[u8]) -> McuResult<usize>;
    fn aead_abort(&mut self);
}

/// Key slots of the platform.
pub trait KeyStore {
    /// Raw identifier of the key held in hardware slot `slot`, if any.
    fn opaque_key(&self, slot: u32) -> Option<u32>;
    /// Copies an imported key out of the store.
    fn export_key(&self, id: u32, out: &mut KeyMaterial) -> McuResult<()>;
}

pub trait CryptoProvider: HashEngine + MacEngine + AeadEngine + KeyStore {}

impl<T: HashEngine + MacEngine + AeadEngine + KeyStore + ?Sized> CryptoProvider for T {}

#[cfg(test)]
pub(crate) mod test_crypto;
