/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Fault injection hardened return values and call wrapper for the MCU
    boot stages.

--*/

#![cfg_attr(target_arch = "riscv32", no_std)]

mod cfi;
mod memeql;

pub use cfi::{cfi_assert_eq, cfi_counter, fih_call, fih_call_result};
pub use memeql::fih_memeql;

use core::fmt::Write;
use mcu_error::{McuError, McuResult};
use romtime::HexWord;

const FIH_POSITIVE_VALUE: u32 = 0x1AAA_555A;
const FIH_NEGATIVE_VALUE: u32 = 0x1555_5555;
const FIH_RET_MASK: u32 = 0xA5A5_A5A5;

/// Passes `val` through an optimization barrier so that repeated checks on
/// it are not folded into one by the compiler.
#[inline(always)]
pub fn fih_launder<T>(val: T) -> T {
    core::hint::black_box(val)
}

/// Compares two words twice, through independent expressions.
#[inline(always)]
pub fn fih_eq(a: u32, b: u32) -> bool {
    let direct = fih_launder(a) == fih_launder(b);
    let folded = fih_launder(a ^ b) == 0;
    direct && fih_launder(folded)
}

/// Result of a security decision.
///
/// Neither outcome is represented by zero or by any other value that a
/// skipped store or a cleared register would produce. Failures carry the
/// originating [`McuError`] masked so that a single bit flip cannot turn one
/// into [`FihRet::SUCCESS`].
#[must_use]
#[derive(Clone, Copy, Debug)]
pub struct FihRet(u32);

impl FihRet {
    pub const SUCCESS: FihRet = FihRet(FIH_POSITIVE_VALUE);
    pub const FAILURE: FihRet = FihRet(FIH_NEGATIVE_VALUE);

    pub fn from_error(err: McuError) -> Self {
        let encoded = u32::from(err) ^ FIH_RET_MASK;
        if encoded == FIH_POSITIVE_VALUE {
            return Self::FAILURE;
        }
        FihRet(encoded)
    }

    pub fn from_result(result: McuResult<()>) -> Self {
        match result {
            Ok(()) => Self::SUCCESS,
            Err(err) => Self::from_error(err),
        }
    }

    pub fn from_bool(ok: bool) -> Self {
        if fih_launder(ok) && fih_launder(ok) {
            Self::SUCCESS
        } else {
            Self::FAILURE
        }
    }

    /// Builds a value from a raw word, e.g. one read back from a register or
    /// handed over by another boot stage.
    pub fn from_raw(raw: u32) -> Self {
        FihRet(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_success(self) -> bool {
        fih_eq(self.0, FIH_POSITIVE_VALUE)
    }

    pub fn is_failure(self) -> bool {
        !self.is_success()
    }

    /// Canonical decode. Only the exact success pattern yields `Ok`; any
    /// word that is neither success nor a known failure encoding is reported
    /// as [`McuError::FIH_UNRECOGNIZED_RESULT`].
    pub fn decode(self) -> McuResult<()> {
        let raw = fih_launder(self.0);
        if raw == FIH_POSITIVE_VALUE && fih_eq(raw, FIH_POSITIVE_VALUE) {
            return Ok(());
        }
        if raw == FIH_NEGATIVE_VALUE {
            return Err(McuError::FIH_FAILURE);
        }
        match McuError::from_code(raw ^ FIH_RET_MASK) {
            Some(err) => Err(err),
            None => Err(McuError::FIH_UNRECOGNIZED_RESULT),
        }
    }
}

impl From<McuResult<()>> for FihRet {
    fn from(result: McuResult<()>) -> Self {
        Self::from_result(result)
    }
}

/// Reports an unrecoverable hardening violation and never returns.
#[inline(never)]
pub fn fih_panic(err: McuError) -> ! {
    romtime::println!("[mcu-fih] Hardening violation {}", HexWord(err.into()));
    romtime::fatal_error(err.into())
}
