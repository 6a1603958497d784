// Licensed under the Apache-2.0 license

use core::fmt::Write;
use mcu_config::OtpId;
use mcu_error::{McuError, McuResult};
use romtime::HexWord;

/// Read access to provisioned OTP elements.
pub trait OtpStore {
    /// Reads element `id` into `buf`. `buf` must not be longer than the
    /// element.
    fn read(&self, id: OtpId, buf: &mut [u8]) -> McuResult<()>;

    /// Size of element `id` in bytes.
    fn size(&self, id: OtpId) -> McuResult<usize>;
}

/// Reads a 32-bit little-endian OTP element.
pub fn read_otp_word(otp: &dyn OtpStore, id: OtpId) -> McuResult<u32> {
    let size = otp.size(id)?;
    if size != core::mem::size_of::<u32>() {
        romtime::println!(
            "[mcu-rom] OTP element {} has size {}",
            HexWord(id.0),
            size
        );
        return Err(McuError::OTP_SIZE_MISMATCH);
    }
    let mut word = [0u8; 4];
    otp.read(id, &mut word)?;
    Ok(u32::from_le_bytes(word))
}
