// Licensed under the Apache-2.0 license

//! Deterministic stand-in for the crypto provider. The "cipher" and "MACs"
//! are keyed byte folds; they only need to be position and key sensitive
//! for the engine logic under test.

use super::*;
use core::cell::RefCell;
use mcu_error::McuError;

#[derive(Default)]
pub struct FakeCrypto {
    pub calls: RefCell<Vec<&'static str>>,
    pub aead_aborts: usize,
    pub mac_aborts: usize,
    pub fail_aead_setup: bool,
    pub fail_hash: bool,
    pub no_binding_key: bool,
    pub(crate) mac: Option<([u8; 16], usize, u8)>,
    pub(crate) aead: Option<FakeAead>,
}

struct FakeAead {
    decrypt: bool,
    key: u8,
    pending: Vec<u8>,
    offset: usize,
    tag: [u8; 16],
}

fn key_byte(key: &KeyHandle) -> u8 {
    match key {
        KeyHandle::Imported(material) => material.as_bytes()[0],
        KeyHandle::Opaque(OpaqueKeyId(id)) => *id as u8,
    }
}

fn fold(acc: &mut [u8], pos: usize, byte: u8) {
    let i = pos % acc.len();
    acc[i] = acc[i].wrapping_mul(31).wrapping_add(byte) ^ (pos as u8);
}

impl FakeCrypto {
    fn record(&self, call: &'static str) {
        self.calls.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }
}

fn keystream(key: u8, pos: usize) -> u8 {
    key ^ (pos as u8).wrapping_mul(7) ^ 0x5a
}

impl FakeAead {
    /// Processes whole 16-byte blocks of `pending` into `output`.
    fn drain(&mut self, output: &mut [u8], all: bool) -> McuResult<usize> {
        let n = if all {
            self.pending.len()
        } else {
            self.pending.len() / AES_BLOCK_LEN * AES_BLOCK_LEN
        };
        if n > output.len() {
            return Err(McuError::CRYPTO_BUFFER_TOO_SMALL);
        }
        let (key, decrypt, offset) = (self.key, self.decrypt, self.offset);
        for (i, byte) in self.pending.drain(..n).enumerate() {
            let pos = offset + i;
            let out = byte ^ keystream(key, pos);
            fold(&mut self.tag, pos, if decrypt { out } else { byte });
            output[i] = out;
        }
        self.offset += n;
        Ok(n)
    }

    fn final_tag(&self) -> [u8; 16] {
        let mut tag = self.tag;
        for b in tag.iter_mut() {
            *b ^= self.key;
        }
        tag
    }
}

impl HashEngine for FakeCrypto {
    fn sha256(&mut self, data: &[u8], digest: &mut [u8; SHA256_DIGEST_LEN]) -> McuResult<()> {
        self.record("sha256");
        if self.fail_hash {
            return Err(McuError::CRYPTO_HASH_FAILED);
        }
        digest.fill(0);
        for (pos, b) in data.iter().enumerate() {
            fold(digest, pos, *b);
        }
        Ok(())
    }
}

impl MacEngine for FakeCrypto {
    fn mac_sign_setup(&mut self, key: &KeyHandle, _alg: MacAlgorithm) -> McuResult<()> {
        self.record("mac_setup");
        self.mac = Some(([0; 16], 0, key_byte(key)));
        Ok(())
    }

    fn mac_update(&mut self, data: &[u8]) -> McuResult<()> {
        let (acc, pos, _) = self.mac.as_mut().ok_or(McuError::CRYPTO_MAC_BAD_STATE)?;
        for b in data {
            fold(acc, *pos, *b);
            *pos += 1;
        }
        Ok(())
    }

    fn mac_sign_finish(&mut self, mac: &mut [u8]) -> McuResult<usize> {
        let (acc, _, key) = self.mac.ok_or(McuError::CRYPTO_MAC_BAD_STATE)?;
        if mac.len() < CMAC_TAG_LEN {
            return Err(McuError::CRYPTO_BUFFER_TOO_SMALL);
        }
        for (out, a) in mac.iter_mut().zip(acc.iter()) {
            *out = a ^ key;
        }
        self.mac = None;
        Ok(CMAC_TAG_LEN)
    }

    fn mac_abort(&mut self) {
        self.mac_aborts += 1;
        self.mac = None;
    }
}

impl FakeCrypto {
    fn aead_setup(&mut self, key: &KeyHandle, decrypt: bool) -> McuResult<()> {
        self.record("aead_setup");
        if self.fail_aead_setup {
            return Err(McuError::CRYPTO_AEAD_SETUP_FAILED);
        }
        self.aead = Some(FakeAead {
            decrypt,
            key: key_byte(key),
            pending: Vec::new(),
            offset: 0,
            tag: [0; 16],
        });
        Ok(())
    }
}

impl AeadEngine for FakeCrypto {
    fn aead_encrypt_setup(&mut self, key: &KeyHandle, _alg: AeadAlgorithm) -> McuResult<()> {
        self.aead_setup(key, false)
    }

    fn aead_decrypt_setup(&mut self, key: &KeyHandle, _alg: AeadAlgorithm) -> McuResult<()> {
        self.aead_setup(key, true)
    }

    fn aead_set_lengths(&mut self, _ad_len: usize, _plaintext_len: usize) -> McuResult<()> {
        Ok(())
    }

    fn aead_set_nonce(&mut self, nonce: &[u8]) -> McuResult<()> {
        let aead = self.aead.as_mut().ok_or(McuError::CRYPTO_AEAD_BAD_STATE)?;
        if nonce.len() != 12 {
            return Err(McuError::CRYPTO_AEAD_SET_NONCE_FAILED);
        }
        aead.key ^= nonce[0];
        Ok(())
    }

    fn aead_update(&mut self, input: &[u8], output: &mut [u8]) -> McuResult<usize> {
        let aead = self.aead.as_mut().ok_or(McuError::CRYPTO_AEAD_BAD_STATE)?;
        aead.pending.extend_from_slice(input);
        aead.drain(output, false)
    }

    fn aead_finish(&mut self, output: &mut [u8], tag: &mut [u8]) -> McuResult<(usize, usize)> {
        let aead = self.aead.as_mut().ok_or(McuError::CRYPTO_AEAD_BAD_STATE)?;
        let n = aead.drain(output, true)?;
        tag[..16].copy_from_slice(&aead.final_tag());
        self.aead = None;
        Ok((n, 16))
    }

    fn aead_verify(&mut self, output: &mut [u8], tag: &[u8]) -> McuResult<usize> {
        let aead = self.aead.as_mut().ok_or(McuError::CRYPTO_AEAD_BAD_STATE)?;
        let n = aead.drain(output, true)?;
        if aead.final_tag().as_slice() != tag {
            output[..n].fill(0);
            self.aead = None;
            return Err(McuError::CRYPTO_AEAD_AUTH_FAILED);
        }
        self.aead = None;
        Ok(n)
    }

    fn aead_abort(&mut self) {
        self.aead_aborts += 1;
        self.aead = None;
    }
}

impl KeyStore for FakeCrypto {
    fn opaque_key(&self, slot: u32) -> Option<u32> {
        self.record("key");
        if self.no_binding_key {
            return None;
        }
        Some(0x100 + slot)
    }

    fn export_key(&self, _id: u32, _out: &mut KeyMaterial) -> McuResult<()> {
        Err(McuError::KEY_IMPORT_FAILED)
    }
}
