// Licensed under the Apache-2.0 license

use crate::{cfi_assert_eq, fih_launder, FihRet};
use mcu_error::McuError;

/// Constant-time equality of two byte buffers.
///
/// Every byte of the common prefix is visited regardless of where the first
/// difference is; the verdict is formed only after the scan. Buffers of
/// different lengths never compare equal.
pub fn fih_memeql(a: &[u8], b: &[u8]) -> FihRet {
    let common = core::cmp::min(a.len(), b.len());
    let mut diff: u8 = 0;
    let mut iters: usize = 0;

    for (x, y) in a[..common].iter().zip(b[..common].iter()) {
        diff |= fih_launder(*x ^ *y);
        iters += 1;
    }
    cfi_assert_eq(fih_launder(iters), common, McuError::FIH_COMPARE_LOOP_FAULT);

    let same_len = fih_launder(a.len() ^ b.len()) == 0;
    // Independent second pass so that one skipped branch cannot flip the
    // verdict.
    let second = constant_time_eq::constant_time_eq(a, b);

    FihRet::from_bool(fih_launder(diff) == 0 && same_len && second)
}
