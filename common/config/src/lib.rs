// Licensed under the Apache-2.0 license

#![cfg_attr(target_arch = "riscv32", no_std)]

/// Number of images the boot stage authenticates.
pub const IMAGE_COUNT: usize = 2;

/// Number of signing-key slots per image.
pub const MAX_KEYS_PER_IMAGE: usize = 2;

/// Granularity used when streaming an image region to or from flash.
pub const BIND_BLOCK_SIZE: usize = 1024;

/// Identifies an OTP element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OtpId(pub u32);

impl OtpId {
    /// 32-bit mask of per image/slot signing obligations.
    pub const ROTPK_POLICIES: OtpId = OtpId(0x0000_0040);
    /// First anti-rollback counter; image `n` uses `NV_COUNTER_BASE + n`.
    pub const NV_COUNTER_BASE: OtpId = OtpId(0x0000_0080);
}

/// Obligation a key carries when an image is verified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyPolicy {
    MightSign = 0b00,
    MustSign = 0b01,
}

/// Where key obligations come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyPolicySource {
    /// No source provisioned; every registered key is [`KeyPolicy::MustSign`].
    Unprovisioned,
    /// Obligations compiled into the key map.
    Static,
    /// Obligations read from a 32-bit OTP mask.
    Otp(OtpId),
}

/// One registered signing key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyMapEntry {
    pub image_index: u8,
    pub slot_index: u8,
    pub key_id: u32,
    /// Only consulted for [`KeyPolicySource::Static`].
    pub policy: KeyPolicy,
}

/// Location of one image in flash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct ImageSlot {
    pub image_id: u32,
    pub offset: u32,
    /// Size of the slot, header included.
    pub size: u32,
    /// Size of the region covered by the binding tag.
    pub protected_size: u32,
}

/// Boot stage configuration.
/// These are the defaults that can be overridden by the platform ROM build.
pub struct McuBootConfig {
    pub image_slots: [ImageSlot; IMAGE_COUNT],
    pub key_map: &'static [KeyMapEntry],
    pub key_policy_source: KeyPolicySource,
    /// Key slot holding the device-bound binding key.
    pub binding_key_slot: u32,
}

/// Built-in signing keys of the reference platform. Key ids start at 1.
pub const DEFAULT_KEY_MAP: [KeyMapEntry; 4] = [
    KeyMapEntry {
        image_index: 0,
        slot_index: 0,
        key_id: 1,
        policy: KeyPolicy::MustSign,
    },
    KeyMapEntry {
        image_index: 0,
        slot_index: 1,
        key_id: 2,
        policy: KeyPolicy::MightSign,
    },
    KeyMapEntry {
        image_index: 1,
        slot_index: 0,
        key_id: 3,
        policy: KeyPolicy::MustSign,
    },
    KeyMapEntry {
        image_index: 1,
        slot_index: 1,
        key_id: 4,
        policy: KeyPolicy::MightSign,
    },
];

impl Default for McuBootConfig {
    fn default() -> Self {
        McuBootConfig {
            image_slots: [
                ImageSlot {
                    image_id: 0,
                    offset: 0x0000_0000,
                    size: 0x0001_0000,
                    protected_size: 0x0000_c000,
                },
                ImageSlot {
                    image_id: 1,
                    offset: 0x0001_0000,
                    size: 0x0004_0000,
                    protected_size: 0x0003_0000,
                },
            ],
            key_map: &DEFAULT_KEY_MAP,
            key_policy_source: KeyPolicySource::Otp(OtpId::ROTPK_POLICIES),
            binding_key_slot: 4,
        }
    }
}

impl McuBootConfig {
    pub fn image_slot(&self, image_id: u32) -> Option<&ImageSlot> {
        self.image_slots.iter().find(|slot| slot.image_id == image_id)
    }
}
