// Licensed under the Apache-2.0 license

//! Control flow integrity counter.
//!
//! Every hardened call increments the counter on entry and decrements it on
//! return; a call that was skipped or returned through an unexpected path
//! leaves the counter out of step with the value saved by the caller.

use crate::{fih_eq, fih_launder, fih_panic, FihRet};
use mcu_error::{McuError, McuResult};

const CFI_SHADOW_MASK: u32 = 0x5A5A_C3C3;

#[cfg(target_arch = "riscv32")]
mod store {
    use core::sync::atomic::{AtomicU32, Ordering};

    // Plain loads and stores only; the ROM core has no atomic extension.
    static VALUE: AtomicU32 = AtomicU32::new(0);
    static SHADOW: AtomicU32 = AtomicU32::new(super::CFI_SHADOW_MASK);

    pub fn load() -> (u32, u32) {
        (VALUE.load(Ordering::Relaxed), SHADOW.load(Ordering::Relaxed))
    }

    pub fn save(value: u32, shadow: u32) {
        VALUE.store(value, Ordering::Relaxed);
        SHADOW.store(shadow, Ordering::Relaxed);
    }
}

#[cfg(not(target_arch = "riscv32"))]
mod store {
    use std::cell::Cell;

    // Host test threads each get their own counter.
    std::thread_local! {
        static COUNTER: Cell<(u32, u32)> = const { Cell::new((0, super::CFI_SHADOW_MASK)) };
    }

    pub fn load() -> (u32, u32) {
        COUNTER.with(|c| c.get())
    }

    pub fn save(value: u32, shadow: u32) {
        COUNTER.with(|c| c.set((value, shadow)));
    }
}

fn counter_get() -> u32 {
    let (value, shadow) = store::load();
    if !fih_eq(value ^ shadow, CFI_SHADOW_MASK) {
        fih_panic(McuError::FIH_CFI_COUNTER_CORRUPT);
    }
    value
}

fn counter_set(value: u32) {
    store::save(value, value ^ CFI_SHADOW_MASK);
}

/// Current nesting depth of hardened calls.
pub fn cfi_counter() -> u32 {
    counter_get()
}

/// Runs `f` as a hardened call.
pub fn fih_call<F>(f: F) -> FihRet
where
    F: FnOnce() -> FihRet,
{
    let saved = counter_get();
    counter_set(saved.wrapping_add(1));

    let ret = f();

    let after = counter_get();
    counter_set(after.wrapping_sub(1));
    if !fih_eq(fih_launder(counter_get()), saved) {
        fih_panic(McuError::FIH_CFI_COUNTER_MISMATCH);
    }
    ret
}

/// Runs an internal `McuResult` operation as a hardened call.
pub fn fih_call_result<F>(f: F) -> FihRet
where
    F: FnOnce() -> McuResult<()>,
{
    fih_call(|| FihRet::from_result(f()))
}

/// Fatal unless `actual == expected`.
#[inline(always)]
pub fn cfi_assert_eq(actual: usize, expected: usize, err: McuError) {
    let equal = fih_launder(actual) == fih_launder(expected);
    if !fih_launder(equal) || fih_launder(actual ^ expected) != 0 {
        fih_panic(err);
    }
}
