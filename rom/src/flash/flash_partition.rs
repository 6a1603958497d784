// Licensed under the Apache-2.0 license

use crate::flash::hil::{FlashDrvError, FlashOp, FlashStorage};
use core::fmt::Write;
use mcu_config::ImageSlot;
use mcu_error::{McuError, McuResult};

/// Represents a partition within the flash memory.
///
/// A `FlashPartition` provides a bounds-checked view into a contiguous region
/// of the underlying flash. Offsets passed to it are relative to the start of
/// the partition; the absolute address is derived from `base_offset`.
///
/// # Fields
/// - `driver`: Reference to the flash storage controller driver.
/// - `name`: Name of the partition (for debugging or identification).
/// - `base_offset`: The starting offset of the partition within the flash.
/// - `length`: The size of the partition in bytes.
pub struct FlashPartition<'a> {
    driver: &'a dyn FlashStorage,
    name: &'static str,
    base_offset: usize,
    length: usize,
}

impl<'a> FlashPartition<'a> {
    /// Creates a new `FlashPartition` instance.
    ///
    /// Returns `Err(McuError::FLASH_OUT_OF_BOUNDS)` if the partition does not
    /// fit within the flash capacity.
    pub fn new(
        driver: &'a dyn FlashStorage,
        name: &'static str,
        base_offset: usize,
        length: usize,
    ) -> McuResult<Self> {
        let end = base_offset
            .checked_add(length)
            .ok_or(McuError::FLASH_OUT_OF_BOUNDS)?;
        if end > driver.capacity() {
            return Err(McuError::FLASH_OUT_OF_BOUNDS);
        }
        Ok(FlashPartition {
            driver,
            name,
            base_offset,
            length,
        })
    }

    /// Partition covering one configured image slot.
    pub fn for_image(driver: &'a dyn FlashStorage, slot: &ImageSlot) -> McuResult<Self> {
        Self::new(
            driver,
            "image",
            slot.offset as usize,
            slot.size as usize,
        )
    }

    fn check_range(&self, partition_offset: usize, len: usize) -> McuResult<usize> {
        match partition_offset.checked_add(len) {
            Some(end) if end <= self.length => Ok(self.base_offset + partition_offset),
            _ => {
                romtime::println!(
                    "[mcu-rom] {} partition access at {} out of range",
                    self.name,
                    partition_offset
                );
                Err(FlashDrvError::SIZE.into_mcu_error(FlashOp::Read))
            }
        }
    }

    /// Reads data from the partition into `buf`, starting at `partition_offset`.
    pub fn read(&self, partition_offset: usize, buf: &mut [u8]) -> McuResult<()> {
        let address = self.check_range(partition_offset, buf.len())?;
        self.driver
            .read(buf, address)
            .map_err(|e| e.into_mcu_error(FlashOp::Read))
    }

    /// Writes `buf` to the partition, starting at `partition_offset`.
    pub fn write(&self, partition_offset: usize, buf: &[u8]) -> McuResult<()> {
        let address = self.check_range(partition_offset, buf.len())?;
        self.driver
            .write(buf, address)
            .map_err(|e| e.into_mcu_error(FlashOp::Write))
    }

    /// Erases `len` bytes of the partition, starting at `partition_offset`.
    pub fn erase(&self, partition_offset: usize, len: usize) -> McuResult<()> {
        let address = self.check_range(partition_offset, len)?;
        self.driver
            .erase(address, len)
            .map_err(|e| e.into_mcu_error(FlashOp::Erase))
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}
