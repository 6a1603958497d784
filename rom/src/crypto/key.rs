// Licensed under the Apache-2.0 license

use super::KeyStore;
use mcu_error::{McuError, McuResult};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const MAX_KEY_LEN: usize = 32;

/// Raw key ids with this bit set name keys imported at runtime; all other
/// non-zero ids name keys that stay inside the key hardware.
pub const IMPORTED_KEY_FLAG: u32 = 0x8000_0000;

/// AES key bytes, wiped on drop.
#[derive(Default, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    bytes: [u8; MAX_KEY_LEN],
    len: usize,
}

impl KeyMaterial {
    pub fn new(key: &[u8]) -> McuResult<Self> {
        let mut material = KeyMaterial::default();
        material.set(key)?;
        Ok(material)
    }

    /// Replaces the held key. Only AES-128 and AES-256 sizes are accepted.
    pub fn set(&mut self, key: &[u8]) -> McuResult<()> {
        if key.len() != 16 && key.len() != 32 {
            return Err(McuError::KEY_INVALID_LENGTH);
        }
        self.bytes.zeroize();
        self.bytes[..key.len()].copy_from_slice(key);
        self.len = key.len();
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl core::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyMaterial").field("len", &self.len).finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpaqueKeyId(pub u32);

/// A key as handed to the crypto provider.
#[derive(Debug)]
pub enum KeyHandle {
    /// Key bytes held by the boot stage.
    Imported(KeyMaterial),
    /// Key that never leaves the key hardware.
    Opaque(OpaqueKeyId),
}

impl KeyHandle {
    /// Classifies a raw key id. This is the only place the numeric id
    /// ranges are interpreted.
    pub fn resolve<K: KeyStore + ?Sized>(store: &K, raw_id: u32) -> McuResult<Self> {
        if raw_id == 0 {
            return Err(McuError::KEY_OPAQUE_SLOT_UNKNOWN);
        }
        if raw_id & IMPORTED_KEY_FLAG != 0 {
            let mut material = KeyMaterial::default();
            store
                .export_key(raw_id, &mut material)
                .map_err(|_| McuError::KEY_IMPORT_FAILED)?;
            return Ok(KeyHandle::Imported(material));
        }
        Ok(KeyHandle::Opaque(OpaqueKeyId(raw_id)))
    }

    /// Device-bound binding key held in `slot`. Resolved on every call.
    pub fn binding_key<K: KeyStore + ?Sized>(store: &K, slot: u32) -> McuResult<Self> {
        let raw_id = store
            .opaque_key(slot)
            .ok_or(McuError::KEY_BINDING_UNAVAILABLE)?;
        Self::resolve(store, raw_id).map_err(|_| McuError::KEY_BINDING_UNAVAILABLE)
    }
}
