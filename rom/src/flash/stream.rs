// Licensed under the Apache-2.0 license

use crate::flash::flash_partition::FlashPartition;
use mcu_error::{McuError, McuResult};

/// Write cursor that collects data in a caller-provided scratch buffer and
/// programs flash one full buffer at a time.
///
/// The total length is fixed when the cursor is created; writing more than
/// that fails, and [`FlashStreamWriter::finish`] fails if less was written.
pub struct FlashStreamWriter<'p, 'a, 's> {
    partition: &'p FlashPartition<'a>,
    start: usize,
    next_offset: usize,
    remaining: usize,
    scratch: &'s mut [u8],
    fill: usize,
}

impl<'p, 'a, 's> FlashStreamWriter<'p, 'a, 's> {
    pub fn begin(
        partition: &'p FlashPartition<'a>,
        offset: usize,
        total_len: usize,
        scratch: &'s mut [u8],
    ) -> McuResult<Self> {
        if scratch.is_empty() {
            return Err(McuError::FLASH_STREAM_NO_SCRATCH);
        }
        match offset.checked_add(total_len) {
            Some(end) if end <= partition.len() => {}
            _ => return Err(McuError::FLASH_OUT_OF_BOUNDS),
        }
        Ok(FlashStreamWriter {
            partition,
            start: offset,
            next_offset: offset,
            remaining: total_len,
            scratch,
            fill: 0,
        })
    }

    pub fn write(&mut self, mut data: &[u8]) -> McuResult<()> {
        if data.len() > self.remaining {
            return Err(McuError::FLASH_STREAM_OVERRUN);
        }
        while !data.is_empty() {
            let n = core::cmp::min(self.scratch.len() - self.fill, data.len());
            self.scratch[self.fill..self.fill + n].copy_from_slice(&data[..n]);
            self.fill += n;
            self.remaining -= n;
            data = &data[n..];
            if self.fill == self.scratch.len() {
                self.program()?;
            }
        }
        Ok(())
    }

    /// Programs any buffered bytes and checks that exactly the announced
    /// length was written.
    pub fn finish(mut self) -> McuResult<()> {
        if self.fill > 0 {
            self.program()?;
        }
        if self.remaining != 0 {
            return Err(McuError::FLASH_STREAM_INCOMPLETE);
        }
        Ok(())
    }

    /// Bytes already programmed to flash.
    pub fn programmed(&self) -> usize {
        self.next_offset - self.start
    }

    fn program(&mut self) -> McuResult<()> {
        self.partition
            .write(self.next_offset, &self.scratch[..self.fill])?;
        self.next_offset += self.fill;
        self.fill = 0;
        Ok(())
    }
}
