// Licensed under the Apache-2.0 license

// Software crypto provider for the emulator platform.

use aes::cipher::{BlockEncrypt, KeyInit, KeyIvInit, StreamCipher};
use aes::{Aes128, Aes256, Block};
use cmac::{Cmac, Mac};
use mcu_error::{McuError, McuResult};
use mcu_rom_common::crypto::{
    AeadAlgorithm, AeadEngine, HashEngine, KeyHandle, KeyMaterial, KeyStore, MacAlgorithm,
    MacEngine, OpaqueKeyId, AES_BLOCK_LEN, CCM_TAG_LEN, CMAC_TAG_LEN, IMPORTED_KEY_FLAG,
    SHA256_DIGEST_LEN,
};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// Nonce length supported by the CCM engine.
pub const CCM_NONCE_LEN: usize = 12;
/// Size of the CCM length field for [`CCM_NONCE_LEN`].
const CCM_L: usize = 15 - CCM_NONCE_LEN;
const CCM_MAX_PAYLOAD: usize = (1 << (8 * CCM_L)) - 1;
/// B0 flags: no AAD, 16-byte tag, 3-byte length field.
const CCM_B0_FLAGS: u8 = ((((CCM_TAG_LEN - 2) / 2) as u8) << 3) | (CCM_L as u8 - 1);
const CCM_CTR_FLAGS: u8 = CCM_L as u8 - 1;

enum AesKey {
    Aes128(Aes128),
    Aes256(Aes256),
}

impl AesKey {
    fn new(key: &[u8]) -> McuResult<Self> {
        match key.len() {
            16 => Aes128::new_from_slice(key).map(AesKey::Aes128),
            32 => Aes256::new_from_slice(key).map(AesKey::Aes256),
            _ => return Err(McuError::KEY_INVALID_LENGTH),
        }
        .map_err(|_| McuError::KEY_INVALID_LENGTH)
    }

    fn encrypt_block(&self, block: &mut Block) {
        match self {
            AesKey::Aes128(cipher) => cipher.encrypt_block(block),
            AesKey::Aes256(cipher) => cipher.encrypt_block(block),
        }
    }
}

enum CtrKeystream {
    Aes128(ctr::Ctr32BE<Aes128>),
    Aes256(ctr::Ctr32BE<Aes256>),
}

impl CtrKeystream {
    fn new(key: &[u8], counter: &Block) -> McuResult<Self> {
        match key.len() {
            16 => ctr::Ctr32BE::<Aes128>::new_from_slices(key, counter).map(CtrKeystream::Aes128),
            32 => ctr::Ctr32BE::<Aes256>::new_from_slices(key, counter).map(CtrKeystream::Aes256),
            _ => return Err(McuError::KEY_INVALID_LENGTH),
        }
        .map_err(|_| McuError::KEY_INVALID_LENGTH)
    }

    fn apply(&mut self, buf: &mut [u8]) {
        match self {
            CtrKeystream::Aes128(ctr) => ctr.apply_keystream(buf),
            CtrKeystream::Aes256(ctr) => ctr.apply_keystream(buf),
        }
    }
}

enum CmacState {
    Aes128(Cmac<Aes128>),
    Aes256(Cmac<Aes256>),
}

impl CmacState {
    fn new(key: &[u8]) -> McuResult<Self> {
        match key.len() {
            16 => <Cmac<Aes128> as Mac>::new_from_slice(key).map(CmacState::Aes128),
            32 => <Cmac<Aes256> as Mac>::new_from_slice(key).map(CmacState::Aes256),
            _ => return Err(McuError::KEY_INVALID_LENGTH),
        }
        .map_err(|_| McuError::CRYPTO_MAC_SETUP_FAILED)
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            CmacState::Aes128(mac) => mac.update(data),
            CmacState::Aes256(mac) => mac.update(data),
        }
    }

    fn finalize(self) -> [u8; CMAC_TAG_LEN] {
        match self {
            CmacState::Aes128(mac) => mac.finalize().into_bytes().into(),
            CmacState::Aes256(mac) => mac.finalize().into_bytes().into(),
        }
    }
}

/// CCM stream after setup, waiting for lengths and nonce.
struct CcmSetup {
    decrypt: bool,
    key: KeyMaterial,
    payload_len: Option<usize>,
}

/// Running CCM computation. Data is processed in whole AES blocks; a
/// partial trailing block is held back until finish or verify.
struct CcmStream {
    decrypt: bool,
    cipher: AesKey,
    keystream: CtrKeystream,
    cbc_mac: Block,
    s0: Block,
    pending: [u8; AES_BLOCK_LEN],
    pending_len: usize,
    remaining: usize,
}

enum AeadState {
    Setup(CcmSetup),
    Running(CcmStream),
}

impl CcmStream {
    fn start(setup: &CcmSetup, payload_len: usize, nonce: &[u8]) -> McuResult<Self> {
        let key = setup.key.as_bytes();
        let cipher = AesKey::new(key)?;

        let mut b0 = Block::default();
        b0[0] = CCM_B0_FLAGS;
        b0[1..1 + CCM_NONCE_LEN].copy_from_slice(nonce);
        b0[1 + CCM_NONCE_LEN..].copy_from_slice(&(payload_len as u32).to_be_bytes()[4 - CCM_L..]);
        cipher.encrypt_block(&mut b0);

        let mut counter = Block::default();
        counter[0] = CCM_CTR_FLAGS;
        counter[1..1 + CCM_NONCE_LEN].copy_from_slice(nonce);
        let mut s0 = counter;
        cipher.encrypt_block(&mut s0);
        counter[AES_BLOCK_LEN - 1] = 1;

        Ok(CcmStream {
            decrypt: setup.decrypt,
            keystream: CtrKeystream::new(key, &counter)?,
            cipher,
            cbc_mac: b0,
            s0,
            pending: [0; AES_BLOCK_LEN],
            pending_len: 0,
            remaining: payload_len,
        })
    }

    fn absorb(&mut self, plaintext: &[u8]) {
        for (x, p) in self.cbc_mac.iter_mut().zip(plaintext) {
            *x ^= p;
        }
        self.cipher.encrypt_block(&mut self.cbc_mac);
    }

    /// Transforms the held-back bytes in place and folds the plaintext
    /// into the CBC-MAC.
    fn process_pending(&mut self) {
        let n = self.pending_len;
        let mut padded = [0u8; AES_BLOCK_LEN];
        if self.decrypt {
            self.keystream.apply(&mut self.pending[..n]);
            padded[..n].copy_from_slice(&self.pending[..n]);
            self.absorb(&padded);
        } else {
            padded[..n].copy_from_slice(&self.pending[..n]);
            self.absorb(&padded);
            self.keystream.apply(&mut self.pending[..n]);
        }
        padded.zeroize();
    }

    fn update(&mut self, mut input: &[u8], output: &mut [u8]) -> McuResult<usize> {
        if input.len() > self.remaining {
            return Err(McuError::CRYPTO_AEAD_UPDATE_FAILED);
        }
        let whole = (self.pending_len + input.len()) / AES_BLOCK_LEN * AES_BLOCK_LEN;
        if output.len() < whole {
            return Err(McuError::CRYPTO_BUFFER_TOO_SMALL);
        }
        self.remaining -= input.len();

        let mut written = 0;
        while !input.is_empty() {
            let take = core::cmp::min(AES_BLOCK_LEN - self.pending_len, input.len());
            self.pending[self.pending_len..self.pending_len + take].copy_from_slice(&input[..take]);
            self.pending_len += take;
            input = &input[take..];
            if self.pending_len == AES_BLOCK_LEN {
                self.process_pending();
                output[written..written + AES_BLOCK_LEN].copy_from_slice(&self.pending);
                written += AES_BLOCK_LEN;
                self.pending.zeroize();
                self.pending_len = 0;
            }
        }
        Ok(written)
    }

    /// Processes the trailing partial block and returns the tag.
    fn complete(&mut self) -> McuResult<(usize, [u8; CCM_TAG_LEN])> {
        if self.remaining != 0 {
            return Err(McuError::CRYPTO_AEAD_FINISH_FAILED);
        }
        let n = self.pending_len;
        if n > 0 {
            self.process_pending();
        }
        let mut tag = [0u8; CCM_TAG_LEN];
        for ((t, x), s) in tag.iter_mut().zip(self.cbc_mac.iter()).zip(self.s0.iter()) {
            *t = x ^ s;
        }
        Ok((n, tag))
    }
}

impl Drop for CcmStream {
    fn drop(&mut self) {
        self.pending.zeroize();
        self.cbc_mac.as_mut_slice().zeroize();
        self.s0.as_mut_slice().zeroize();
    }
}

/// Software crypto provider with a small table of key slots.
///
/// Keys installed with [`SoftCrypto::install_opaque`] are only usable by
/// id; keys installed with [`SoftCrypto::install_imported`] can be
/// exported through [`KeyStore::export_key`].
#[derive(Default)]
pub struct SoftCrypto {
    slots: Vec<(u32, u32)>,
    keys: Vec<(u32, KeyMaterial)>,
    next_id: u32,
    mac: Option<CmacState>,
    aead: Option<AeadState>,
}

impl SoftCrypto {
    pub fn new() -> Self {
        Self::default()
    }

    fn install(&mut self, slot: u32, key: &[u8], flags: u32) -> McuResult<u32> {
        let material = KeyMaterial::new(key)?;
        self.next_id += 1;
        let id = self.next_id | flags;
        self.slots.retain(|(s, _)| *s != slot);
        self.slots.push((slot, id));
        self.keys.push((id, material));
        Ok(id)
    }

    /// Installs a key that stays inside the provider. Returns its raw id.
    pub fn install_opaque(&mut self, slot: u32, key: &[u8]) -> McuResult<u32> {
        self.install(slot, key, 0)
    }

    /// Installs an exportable key. Returns its raw id.
    pub fn install_imported(&mut self, slot: u32, key: &[u8]) -> McuResult<u32> {
        self.install(slot, key, IMPORTED_KEY_FLAG)
    }

    /// Empties `slot`; keys already resolved stay valid.
    pub fn clear_slot(&mut self, slot: u32) {
        self.slots.retain(|(s, _)| *s != slot);
    }

    pub fn mac_active(&self) -> bool {
        self.mac.is_some()
    }

    pub fn aead_active(&self) -> bool {
        self.aead.is_some()
    }

    fn stored_key(&self, id: u32) -> Option<&KeyMaterial> {
        self.keys.iter().find(|(k, _)| *k == id).map(|(_, m)| m)
    }

    fn key_copy(&self, key: &KeyHandle) -> McuResult<KeyMaterial> {
        match key {
            KeyHandle::Imported(material) => KeyMaterial::new(material.as_bytes()),
            KeyHandle::Opaque(OpaqueKeyId(id)) => self
                .stored_key(*id)
                .ok_or(McuError::KEY_OPAQUE_SLOT_UNKNOWN)
                .and_then(|m| KeyMaterial::new(m.as_bytes())),
        }
    }

    fn aead_setup(&mut self, key: &KeyHandle, alg: AeadAlgorithm, decrypt: bool) -> McuResult<()> {
        if self.aead.is_some() {
            return Err(McuError::CRYPTO_AEAD_BAD_STATE);
        }
        match alg {
            AeadAlgorithm::AesCcm => {}
        }
        let key = self
            .key_copy(key)
            .map_err(|_| McuError::CRYPTO_AEAD_SETUP_FAILED)?;
        self.aead = Some(AeadState::Setup(CcmSetup {
            decrypt,
            key,
            payload_len: None,
        }));
        Ok(())
    }

    fn running(&mut self, decrypt: bool) -> McuResult<&mut CcmStream> {
        match self.aead.as_mut() {
            Some(AeadState::Running(stream)) if stream.decrypt == decrypt => Ok(stream),
            _ => Err(McuError::CRYPTO_AEAD_BAD_STATE),
        }
    }
}

impl HashEngine for SoftCrypto {
    fn sha256(&mut self, data: &[u8], digest: &mut [u8; SHA256_DIGEST_LEN]) -> McuResult<()> {
        digest.copy_from_slice(&Sha256::digest(data));
        Ok(())
    }
}

impl MacEngine for SoftCrypto {
    fn mac_sign_setup(&mut self, key: &KeyHandle, alg: MacAlgorithm) -> McuResult<()> {
        if self.mac.is_some() {
            return Err(McuError::CRYPTO_MAC_BAD_STATE);
        }
        match alg {
            MacAlgorithm::AesCmac => {}
        }
        let key = self
            .key_copy(key)
            .map_err(|_| McuError::CRYPTO_MAC_SETUP_FAILED)?;
        self.mac = Some(CmacState::new(key.as_bytes())?);
        Ok(())
    }

    fn mac_update(&mut self, data: &[u8]) -> McuResult<()> {
        self.mac
            .as_mut()
            .ok_or(McuError::CRYPTO_MAC_BAD_STATE)?
            .update(data);
        Ok(())
    }

    fn mac_sign_finish(&mut self, mac: &mut [u8]) -> McuResult<usize> {
        if mac.len() < CMAC_TAG_LEN {
            return Err(McuError::CRYPTO_BUFFER_TOO_SMALL);
        }
        let state = self.mac.take().ok_or(McuError::CRYPTO_MAC_BAD_STATE)?;
        mac[..CMAC_TAG_LEN].copy_from_slice(&state.finalize());
        Ok(CMAC_TAG_LEN)
    }

    fn mac_abort(&mut self) {
        self.mac = None;
    }
}

impl AeadEngine for SoftCrypto {
    fn aead_encrypt_setup(&mut self, key: &KeyHandle, alg: AeadAlgorithm) -> McuResult<()> {
        self.aead_setup(key, alg, false)
    }

    fn aead_decrypt_setup(&mut self, key: &KeyHandle, alg: AeadAlgorithm) -> McuResult<()> {
        self.aead_setup(key, alg, true)
    }

    fn aead_set_lengths(&mut self, ad_len: usize, plaintext_len: usize) -> McuResult<()> {
        let Some(AeadState::Setup(setup)) = self.aead.as_mut() else {
            return Err(McuError::CRYPTO_AEAD_BAD_STATE);
        };
        if ad_len != 0 {
            return Err(McuError::CRYPTO_NOT_SUPPORTED);
        }
        if plaintext_len > CCM_MAX_PAYLOAD {
            return Err(McuError::CRYPTO_AEAD_SET_LENGTHS_FAILED);
        }
        setup.payload_len = Some(plaintext_len);
        Ok(())
    }

    fn aead_set_nonce(&mut self, nonce: &[u8]) -> McuResult<()> {
        let Some(AeadState::Setup(setup)) = self.aead.as_ref() else {
            return Err(McuError::CRYPTO_AEAD_BAD_STATE);
        };
        if nonce.len() != CCM_NONCE_LEN {
            return Err(McuError::CRYPTO_AEAD_SET_NONCE_FAILED);
        }
        let payload_len = setup
            .payload_len
            .ok_or(McuError::CRYPTO_AEAD_SET_NONCE_FAILED)?;
        let stream = CcmStream::start(setup, payload_len, nonce)?;
        self.aead = Some(AeadState::Running(stream));
        Ok(())
    }

    fn aead_update(&mut self, input: &[u8], output: &mut [u8]) -> McuResult<usize> {
        let stream = match self.aead.as_mut() {
            Some(AeadState::Running(stream)) => stream,
            _ => return Err(McuError::CRYPTO_AEAD_BAD_STATE),
        };
        stream.update(input, output)
    }

    fn aead_finish(&mut self, output: &mut [u8], tag: &mut [u8]) -> McuResult<(usize, usize)> {
        let stream = self.running(false)?;
        if output.len() < stream.pending_len || tag.len() < CCM_TAG_LEN {
            return Err(McuError::CRYPTO_BUFFER_TOO_SMALL);
        }
        let (n, computed) = stream.complete()?;
        output[..n].copy_from_slice(&stream.pending[..n]);
        tag[..CCM_TAG_LEN].copy_from_slice(&computed);
        self.aead = None;
        Ok((n, CCM_TAG_LEN))
    }

    fn aead_verify(&mut self, output: &mut [u8], tag: &[u8]) -> McuResult<usize> {
        let stream = self.running(true)?;
        if output.len() < stream.pending_len {
            return Err(McuError::CRYPTO_BUFFER_TOO_SMALL);
        }
        let (n, mut computed) = stream.complete()?;
        let ok = tag.len() == CCM_TAG_LEN && constant_time_eq::constant_time_eq(&computed, tag);
        computed.zeroize();
        if ok {
            output[..n].copy_from_slice(&stream.pending[..n]);
        }
        self.aead = None;
        if !ok {
            return Err(McuError::CRYPTO_AEAD_AUTH_FAILED);
        }
        Ok(n)
    }

    fn aead_abort(&mut self) {
        self.aead = None;
    }
}

impl KeyStore for SoftCrypto {
    fn opaque_key(&self, slot: u32) -> Option<u32> {
        self.slots.iter().find(|(s, _)| *s == slot).map(|(_, id)| *id)
    }

    fn export_key(&self, id: u32, out: &mut KeyMaterial) -> McuResult<()> {
        if id & IMPORTED_KEY_FLAG == 0 {
            return Err(McuError::KEY_IMPORT_FAILED);
        }
        let material = self.stored_key(id).ok_or(McuError::KEY_IMPORT_FAILED)?;
        out.set(material.as_bytes())
    }
}
