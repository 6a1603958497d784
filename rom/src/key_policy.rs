// Licensed under the Apache-2.0 license

//! Per-image signing key slots and the obligation attached to each.

use crate::otp::{read_otp_word, OtpStore};
use core::fmt::Write;
use mcu_config::{KeyMapEntry, KeyPolicy, KeyPolicySource, IMAGE_COUNT, MAX_KEYS_PER_IMAGE};
use mcu_error::{McuError, McuResult};
use romtime::HexWord;

/// Width of the OTP policy mask.
const POLICY_MASK_BITS: usize = u32::BITS as usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyDescriptor {
    pub key_id: u32,
    pub image_index: u8,
    pub slot_index: u8,
    pub policy: KeyPolicy,
}

/// Bit of the OTP policy mask that holds the obligation of one key slot.
pub fn policy_bit_index(image_index: usize, slot_index: usize, slots_per_image: usize) -> usize {
    image_index * slots_per_image + slot_index
}

/// Key slots of every image, built once and read-only afterwards.
pub struct KeyPolicyTable<const IMAGES: usize, const SLOTS: usize> {
    slots: [[Option<KeyDescriptor>; SLOTS]; IMAGES],
}

pub type McuKeyPolicyTable = KeyPolicyTable<IMAGE_COUNT, MAX_KEYS_PER_IMAGE>;

impl<const IMAGES: usize, const SLOTS: usize> KeyPolicyTable<IMAGES, SLOTS> {
    /// Builds the table from the platform key map.
    ///
    /// With an OTP source the mask is read exactly once here; a set bit makes
    /// the slot [`KeyPolicy::MustSign`], a clear bit
    /// [`KeyPolicy::MightSign`].
    pub fn build(
        key_map: &[KeyMapEntry],
        source: KeyPolicySource,
        otp: &dyn OtpStore,
    ) -> McuResult<Self> {
        let mask = match source {
            KeyPolicySource::Otp(id) => {
                let mask =
                    read_otp_word(otp, id).map_err(|_| McuError::POLICY_OTP_READ_FAILED)?;
                romtime::println!("[mcu-rom] Key policy mask {}", HexWord(mask));
                Some(mask)
            }
            KeyPolicySource::Static | KeyPolicySource::Unprovisioned => None,
        };

        let mut slots = [[None; SLOTS]; IMAGES];
        for entry in key_map {
            let image = entry.image_index as usize;
            let slot = entry.slot_index as usize;
            if image >= IMAGES {
                return Err(McuError::POLICY_IMAGE_OUT_OF_RANGE);
            }
            if slot >= SLOTS {
                return Err(McuError::POLICY_SLOT_OUT_OF_RANGE);
            }
            let same_key = slots[image]
                .iter()
                .flatten()
                .any(|d: &KeyDescriptor| d.key_id == entry.key_id);
            if slots[image][slot].is_some() || same_key {
                return Err(McuError::POLICY_DUPLICATE_SLOT);
            }

            let policy = match (source, mask) {
                (KeyPolicySource::Static, _) => entry.policy,
                (KeyPolicySource::Otp(_), Some(mask)) => Self::policy_from_mask(mask, image, slot)?,
                _ => KeyPolicy::MustSign,
            };
            slots[image][slot] = Some(KeyDescriptor {
                key_id: entry.key_id,
                image_index: entry.image_index,
                slot_index: entry.slot_index,
                policy,
            });
        }
        Ok(KeyPolicyTable { slots })
    }

    fn policy_from_mask(mask: u32, image: usize, slot: usize) -> McuResult<KeyPolicy> {
        let bit = policy_bit_index(image, slot, SLOTS);
        if bit >= POLICY_MASK_BITS {
            return Err(McuError::POLICY_BIT_OUT_OF_RANGE);
        }
        if (mask >> bit) & 1 == 1 {
            Ok(KeyPolicy::MustSign)
        } else {
            Ok(KeyPolicy::MightSign)
        }
    }

    fn descriptor(&self, image_index: usize, slot_index: usize) -> McuResult<&KeyDescriptor> {
        let image = self
            .slots
            .get(image_index)
            .ok_or(McuError::POLICY_IMAGE_OUT_OF_RANGE)?;
        image
            .get(slot_index)
            .ok_or(McuError::POLICY_SLOT_OUT_OF_RANGE)?
            .as_ref()
            .ok_or(McuError::POLICY_SLOT_UNUSED)
    }

    /// Key registered in a slot, `None` if the slot is out of range or unused.
    pub fn key_id_for(&self, image_index: usize, slot_index: usize) -> Option<u32> {
        self.descriptor(image_index, slot_index)
            .ok()
            .map(|d| d.key_id)
    }

    pub fn policy_for(&self, image_index: usize, slot_index: usize) -> McuResult<KeyPolicy> {
        self.descriptor(image_index, slot_index).map(|d| d.policy)
    }

    /// Looks a key up by id among the slots of one image.
    pub fn find(&self, image_index: usize, key_id: u32) -> McuResult<&KeyDescriptor> {
        self.slots
            .get(image_index)
            .ok_or(McuError::POLICY_IMAGE_OUT_OF_RANGE)?
            .iter()
            .flatten()
            .find(|d| d.key_id == key_id)
            .ok_or(McuError::POLICY_KEY_NOT_REGISTERED)
    }
}
