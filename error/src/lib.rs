// Licensed under the Apache-2.0 license

//! Error codes shared by the MCU boot stages.
//!
//! Codes are grouped in blocks of 0x1_0000 so that the failing subsystem can
//! be recovered from the raw value reported through the fatal error path.

#![cfg_attr(target_arch = "riscv32", no_std)]

use core::num::NonZeroU32;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct McuError(pub NonZeroU32);
pub type McuResult<T> = Result<T, McuError>;

/// Coarse classification of an [`McuError`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    /// Fault-injection hardening detected an inconsistency.
    FaultInjection,
    /// The binding key or another key could not be resolved.
    KeyResolution,
    /// A hash, MAC or AEAD primitive reported failure.
    Primitive,
    /// A length exceeded what the cipher or the destination can hold.
    Capacity,
    /// A tag or authentication check failed.
    Integrity,
    /// Key policy source or evaluation failure.
    Policy,
    /// Flash or OTP access failure.
    Io,
    /// Image layout or anti-rollback failure.
    Image,
    Unknown,
}

impl McuError {
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("McuError cannot be 0"),
        }
    }

    const KIND_SHIFT: u32 = 16;

    pub const FIH_FAILURE: McuError = Self::new_const(0x0001_0001);
    pub const FIH_UNRECOGNIZED_RESULT: McuError = Self::new_const(0x0001_0002);
    pub const FIH_CFI_COUNTER_MISMATCH: McuError = Self::new_const(0x0001_0003);
    pub const FIH_CFI_COUNTER_CORRUPT: McuError = Self::new_const(0x0001_0004);
    pub const FIH_COMPARE_LOOP_FAULT: McuError = Self::new_const(0x0001_0005);

    pub const KEY_BINDING_UNAVAILABLE: McuError = Self::new_const(0x0002_0001);
    pub const KEY_OPAQUE_SLOT_UNKNOWN: McuError = Self::new_const(0x0002_0002);
    pub const KEY_IMPORT_FAILED: McuError = Self::new_const(0x0002_0003);
    pub const KEY_INVALID_LENGTH: McuError = Self::new_const(0x0002_0004);

    pub const CRYPTO_HASH_FAILED: McuError = Self::new_const(0x0003_0001);
    pub const CRYPTO_MAC_SETUP_FAILED: McuError = Self::new_const(0x0003_0002);
    pub const CRYPTO_MAC_UPDATE_FAILED: McuError = Self::new_const(0x0003_0003);
    pub const CRYPTO_MAC_FINISH_FAILED: McuError = Self::new_const(0x0003_0004);
    pub const CRYPTO_MAC_BAD_STATE: McuError = Self::new_const(0x0003_0005);
    pub const CRYPTO_AEAD_SETUP_FAILED: McuError = Self::new_const(0x0003_0006);
    pub const CRYPTO_AEAD_SET_LENGTHS_FAILED: McuError = Self::new_const(0x0003_0007);
    pub const CRYPTO_AEAD_SET_NONCE_FAILED: McuError = Self::new_const(0x0003_0008);
    pub const CRYPTO_AEAD_UPDATE_FAILED: McuError = Self::new_const(0x0003_0009);
    pub const CRYPTO_AEAD_FINISH_FAILED: McuError = Self::new_const(0x0003_000A);
    pub const CRYPTO_AEAD_BAD_STATE: McuError = Self::new_const(0x0003_000B);
    pub const CRYPTO_BUFFER_TOO_SMALL: McuError = Self::new_const(0x0003_000C);
    pub const CRYPTO_NOT_SUPPORTED: McuError = Self::new_const(0x0003_000D);

    pub const BINDING_CAPACITY_EXCEEDED: McuError = Self::new_const(0x0004_0001);
    pub const BINDING_PLAINTEXT_OVERFLOW: McuError = Self::new_const(0x0004_0002);
    pub const BINDING_LENGTH_MISMATCH: McuError = Self::new_const(0x0004_0003);
    pub const BINDING_BLOCK_SIZE_INVALID: McuError = Self::new_const(0x0004_0004);

    pub const BINDING_TAG_MISMATCH: McuError = Self::new_const(0x0005_0001);
    pub const BINDING_TAG_ABSENT: McuError = Self::new_const(0x0005_0002);
    pub const BINDING_INCOMPLETE: McuError = Self::new_const(0x0005_0003);
    pub const CRYPTO_AEAD_AUTH_FAILED: McuError = Self::new_const(0x0005_0004);

    pub const POLICY_KEY_NOT_REGISTERED: McuError = Self::new_const(0x0006_0001);
    pub const POLICY_SLOT_OUT_OF_RANGE: McuError = Self::new_const(0x0006_0002);
    pub const POLICY_SLOT_UNUSED: McuError = Self::new_const(0x0006_0003);
    pub const POLICY_DUPLICATE_SLOT: McuError = Self::new_const(0x0006_0004);
    pub const POLICY_IMAGE_OUT_OF_RANGE: McuError = Self::new_const(0x0006_0005);
    pub const POLICY_OTP_READ_FAILED: McuError = Self::new_const(0x0006_0006);
    pub const POLICY_BIT_OUT_OF_RANGE: McuError = Self::new_const(0x0006_0007);
    pub const POLICY_COUNT_OVERFLOW: McuError = Self::new_const(0x0006_0008);

    pub const FLASH_READ_FAILED: McuError = Self::new_const(0x0007_0001);
    pub const FLASH_WRITE_FAILED: McuError = Self::new_const(0x0007_0002);
    pub const FLASH_ERASE_FAILED: McuError = Self::new_const(0x0007_0003);
    pub const FLASH_OUT_OF_BOUNDS: McuError = Self::new_const(0x0007_0004);
    pub const FLASH_STREAM_OVERRUN: McuError = Self::new_const(0x0007_0005);
    pub const FLASH_STREAM_INCOMPLETE: McuError = Self::new_const(0x0007_0006);
    pub const FLASH_STREAM_NO_SCRATCH: McuError = Self::new_const(0x0007_0007);
    pub const OTP_READ_FAILED: McuError = Self::new_const(0x0007_0008);
    pub const OTP_UNKNOWN_ELEMENT: McuError = Self::new_const(0x0007_0009);
    pub const OTP_SIZE_MISMATCH: McuError = Self::new_const(0x0007_000A);

    pub const IMAGE_LAYOUT_INVALID: McuError = Self::new_const(0x0008_0001);
    pub const IMAGE_UNKNOWN_ID: McuError = Self::new_const(0x0008_0002);
    pub const ROLLBACK_COUNTER_READ_FAILED: McuError = Self::new_const(0x0008_0003);
    pub const ROLLBACK_DETECTED: McuError = Self::new_const(0x0008_0004);

    /// Lowest and highest block numbers in use. Anything outside is not a code
    /// this crate ever produced.
    const FIRST_BLOCK: u32 = 0x0001;
    const LAST_BLOCK: u32 = 0x0008;

    pub fn kind(self) -> ErrorKind {
        match self.0.get() >> Self::KIND_SHIFT {
            0x0001 => ErrorKind::FaultInjection,
            0x0002 => ErrorKind::KeyResolution,
            0x0003 => ErrorKind::Primitive,
            0x0004 => ErrorKind::Capacity,
            0x0005 => ErrorKind::Integrity,
            0x0006 => ErrorKind::Policy,
            0x0007 => ErrorKind::Io,
            0x0008 => ErrorKind::Image,
            _ => ErrorKind::Unknown,
        }
    }

    /// Rebuilds an error from a raw code, accepting only values that fall in
    /// one of the defined blocks.
    pub fn from_code(code: u32) -> Option<Self> {
        let block = code >> Self::KIND_SHIFT;
        if !(Self::FIRST_BLOCK..=Self::LAST_BLOCK).contains(&block) || code & 0xffff == 0 {
            return None;
        }
        NonZeroU32::new(code).map(Self)
    }
}

impl From<McuError> for u32 {
    fn from(err: McuError) -> u32 {
        err.0.get()
    }
}

impl From<McuError> for NonZeroU32 {
    fn from(err: McuError) -> NonZeroU32 {
        err.0
    }
}
