// Licensed under the Apache-2.0 license

// Emulated one-time programmable storage.

use core::fmt::Write;
use mcu_config::OtpId;
use mcu_error::{McuError, McuResult};
use mcu_rom_common::otp::OtpStore;
use romtime::HexWord;

struct OtpElement {
    id: OtpId,
    data: Vec<u8>,
}

/// OTP elements that start blank (all zero) and can only have bits set.
#[derive(Default)]
pub struct EmulatedOtp {
    elements: Vec<OtpElement>,
}

impl EmulatedOtp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a blank element of `size` bytes.
    pub fn provision(&mut self, id: OtpId, size: usize) -> McuResult<()> {
        if self.element(id).is_some() {
            return Err(McuError::OTP_SIZE_MISMATCH);
        }
        self.elements.push(OtpElement {
            id,
            data: vec![0; size],
        });
        Ok(())
    }

    /// Sets the bits of `data` in element `id`. Bits already set stay set.
    pub fn program(&mut self, id: OtpId, data: &[u8]) -> McuResult<()> {
        let element = self
            .elements
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(McuError::OTP_UNKNOWN_ELEMENT)?;
        if data.len() != element.data.len() {
            return Err(McuError::OTP_SIZE_MISMATCH);
        }
        for (cell, bits) in element.data.iter_mut().zip(data) {
            *cell |= bits;
        }
        Ok(())
    }

    /// Declares a 32-bit element if needed and programs `value` into it.
    pub fn program_word(&mut self, id: OtpId, value: u32) -> McuResult<()> {
        if self.element(id).is_none() {
            self.provision(id, core::mem::size_of::<u32>())?;
        }
        self.program(id, &value.to_le_bytes())
    }

    fn element(&self, id: OtpId) -> Option<&OtpElement> {
        self.elements.iter().find(|e| e.id == id)
    }
}

impl OtpStore for EmulatedOtp {
    fn read(&self, id: OtpId, buf: &mut [u8]) -> McuResult<()> {
        let element = self.element(id).ok_or_else(|| {
            romtime::println!("OTP element {} not provisioned", HexWord(id.0));
            McuError::OTP_UNKNOWN_ELEMENT
        })?;
        let src = element
            .data
            .get(..buf.len())
            .ok_or(McuError::OTP_READ_FAILED)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn size(&self, id: OtpId) -> McuResult<usize> {
        self.element(id)
            .map(|e| e.data.len())
            .ok_or(McuError::OTP_UNKNOWN_ELEMENT)
    }
}
