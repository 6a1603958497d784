// Licensed under the Apache-2.0 license

use mcu_error::{McuError, McuResult};
use zeroize::Zeroize;

/// Destination for decrypted data that wipes everything it received unless
/// released after authentication.
pub(crate) struct PlaintextSink<'d> {
    dest: &'d mut [u8],
    written: usize,
    released: bool,
}

impl<'d> PlaintextSink<'d> {
    pub(crate) fn new(dest: &'d mut [u8]) -> Self {
        PlaintextSink {
            dest,
            written: 0,
            released: false,
        }
    }

    /// Appends `data`; fails without writing if it would not fit.
    pub(crate) fn push(&mut self, data: &[u8]) -> McuResult<()> {
        let end = self
            .written
            .checked_add(data.len())
            .filter(|&end| end <= self.dest.len())
            .ok_or(McuError::BINDING_PLAINTEXT_OVERFLOW)?;
        self.dest[self.written..end].copy_from_slice(data);
        self.written = end;
        Ok(())
    }

    /// Keeps the plaintext. Fails, and wipes, if the destination was not
    /// filled exactly.
    pub(crate) fn release(mut self) -> McuResult<()> {
        if self.written != self.dest.len() {
            return Err(McuError::BINDING_LENGTH_MISMATCH);
        }
        self.released = true;
        Ok(())
    }
}

impl Drop for PlaintextSink<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.dest[..self.written].zeroize();
        }
    }
}
