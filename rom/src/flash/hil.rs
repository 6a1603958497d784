// Licensed under the Apache-2.0 license

//! Generic interface for flash storage access.

use core::result::Result;

/// Byte-addressed access to the boot flash. Drivers own page granularity,
/// erase-before-write and power-fail behaviour.
pub trait FlashStorage {
    /// Read from the flash storage, filling the provided buffer with data
    fn read(&self, buffer: &mut [u8], address: usize) -> Result<(), FlashDrvError>;

    /// Write to the flash storage with the full contents of the buffer, starting at the specified address
    fn write(&self, buffer: &[u8], address: usize) -> Result<(), FlashDrvError>;

    /// Erase `length` bytes starting at address `address`. The address must be
    /// in the address space of the physical storage.
    fn erase(&self, address: usize, length: usize) -> Result<(), FlashDrvError>;

    /// Returns the size of the flash storage in bytes.
    fn capacity(&self) -> usize;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum FlashDrvError {
    /// Generic failure condition
    FAIL = 1,
    /// An invalid parameter was passed
    INVAL = 6,
    /// Parameter passed was too large
    SIZE = 7,
}

impl From<FlashDrvError> for usize {
    fn from(err: FlashDrvError) -> usize {
        err as usize
    }
}

/// Flash operation a driver error came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlashOp {
    Read,
    Write,
    Erase,
}

impl FlashDrvError {
    /// Maps a driver error onto the boot error space. Range errors are
    /// reported the same way regardless of the operation.
    pub fn into_mcu_error(self, op: FlashOp) -> mcu_error::McuError {
        use mcu_error::McuError;
        match (self, op) {
            (FlashDrvError::SIZE, _) => McuError::FLASH_OUT_OF_BOUNDS,
            (_, FlashOp::Read) => McuError::FLASH_READ_FAILED,
            (_, FlashOp::Write) => McuError::FLASH_WRITE_FAILED,
            (_, FlashOp::Erase) => McuError::FLASH_ERASE_FAILED,
        }
    }
}
