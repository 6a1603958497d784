// Licensed under the Apache-2.0 license

// Emulated flash controller driver for MCU ROM.

use core::cell::{Cell, RefCell};
use core::fmt::Write;
use core::ops::{Index, IndexMut};
use mcu_rom_common::flash::hil::{FlashDrvError, FlashStorage};

pub const PAGE_SIZE: usize = 256;

#[derive(Debug, PartialEq)]
#[allow(clippy::enum_variant_names)]
pub enum FlashOperation {
    WritePage = 2,
    ErasePage = 3,
}

#[derive(Clone, Debug)]
pub struct EmulatedFlashPage(pub [u8; PAGE_SIZE]);

impl Default for EmulatedFlashPage {
    fn default() -> Self {
        Self([0xff; PAGE_SIZE])
    }
}

impl Index<usize> for EmulatedFlashPage {
    type Output = u8;

    fn index(&self, idx: usize) -> &u8 {
        &self.0[idx]
    }
}

impl IndexMut<usize> for EmulatedFlashPage {
    fn index_mut(&mut self, idx: usize) -> &mut u8 {
        &mut self.0[idx]
    }
}

/// Paged flash held in RAM.
///
/// A page program budget can be set to emulate a power loss: once it is
/// used up, every further page program fails and leaves the page as it was.
pub struct EmulatedFlashCtrl {
    pages: RefCell<Vec<EmulatedFlashPage>>,
    page_programs: Cell<usize>,
    program_budget: Cell<Option<usize>>,
}

impl FlashStorage for EmulatedFlashCtrl {
    // Read arbitrary length of data from flash, starting at `offset`, into `buf`.
    fn read(&self, buf: &mut [u8], offset: usize) -> Result<(), FlashDrvError> {
        self.check_range(offset, buf.len())?;
        let mut remaining = buf.len();
        let mut buf_offset = 0;
        let mut flash_offset = offset;
        let mut page_buf = EmulatedFlashPage::default();

        while remaining > 0 {
            let page_number = flash_offset / PAGE_SIZE;
            let page_offset = flash_offset % PAGE_SIZE;
            let to_read = core::cmp::min(PAGE_SIZE - page_offset, remaining);

            self.read_page(page_number, &mut page_buf)?;

            buf[buf_offset..buf_offset + to_read]
                .copy_from_slice(&page_buf.0[page_offset..page_offset + to_read]);

            remaining -= to_read;
            buf_offset += to_read;
            flash_offset += to_read;
        }

        Ok(())
    }

    // Write arbitrary length of data to flash, starting at `offset`, from `buf`.
    fn write(&self, buf: &[u8], offset: usize) -> Result<(), FlashDrvError> {
        self.check_range(offset, buf.len())?;
        let mut remaining = buf.len();
        let mut buf_offset = 0;
        let mut flash_offset = offset;

        while remaining > 0 {
            let page_number = flash_offset / PAGE_SIZE;
            let page_offset = flash_offset % PAGE_SIZE;
            let to_write = core::cmp::min(PAGE_SIZE - page_offset, remaining);

            // Read the page first if not writing the whole page
            let mut page_buf = if to_write != PAGE_SIZE {
                let mut tmp = EmulatedFlashPage::default();
                self.read_page(page_number, &mut tmp)?;
                tmp
            } else {
                EmulatedFlashPage::default()
            };

            page_buf.0[page_offset..page_offset + to_write]
                .copy_from_slice(&buf[buf_offset..buf_offset + to_write]);

            self.write_page(page_number, &page_buf)?;

            remaining -= to_write;
            buf_offset += to_write;
            flash_offset += to_write;
        }

        Ok(())
    }

    // Erase arbitrary length of data in flash, starting at `offset`, for `len` bytes.
    fn erase(&self, offset: usize, len: usize) -> Result<(), FlashDrvError> {
        if len == 0 {
            return Ok(());
        }
        self.check_range(offset, len)?;
        let start_page = offset / PAGE_SIZE;
        let end_page = (offset + len - 1) / PAGE_SIZE;

        for page in start_page..=end_page {
            self.erase_page(page)?;
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.pages.borrow().len() * PAGE_SIZE
    }
}

impl EmulatedFlashCtrl {
    /// Erased flash of `pages` pages.
    pub fn new(pages: usize) -> EmulatedFlashCtrl {
        EmulatedFlashCtrl {
            pages: RefCell::new(vec![EmulatedFlashPage::default(); pages]),
            page_programs: Cell::new(0),
            program_budget: Cell::new(None),
        }
    }

    /// Erased flash large enough for `bytes` bytes.
    pub fn with_capacity(bytes: usize) -> EmulatedFlashCtrl {
        Self::new(bytes.div_ceil(PAGE_SIZE))
    }

    /// Allows `programs` more page programs before failing. `None` removes
    /// the limit.
    pub fn set_program_budget(&self, programs: Option<usize>) {
        self.program_budget.set(programs);
    }

    /// Number of page programs performed so far.
    pub fn page_programs(&self) -> usize {
        self.page_programs.get()
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<(), FlashDrvError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.capacity() => Ok(()),
            _ => Err(FlashDrvError::SIZE),
        }
    }

    fn read_page(
        &self,
        page_number: usize,
        buf: &mut EmulatedFlashPage,
    ) -> Result<(), FlashDrvError> {
        let pages = self.pages.borrow();
        let page = pages.get(page_number).ok_or(FlashDrvError::INVAL)?;
        buf.0.copy_from_slice(&page.0);
        Ok(())
    }

    fn write_page(&self, page_number: usize, buf: &EmulatedFlashPage) -> Result<(), FlashDrvError> {
        self.consume_budget(FlashOperation::WritePage)?;
        let mut pages = self.pages.borrow_mut();
        let page = pages.get_mut(page_number).ok_or(FlashDrvError::INVAL)?;
        page.0.copy_from_slice(&buf.0);
        self.page_programs.set(self.page_programs.get() + 1);
        Ok(())
    }

    fn erase_page(&self, page_number: usize) -> Result<(), FlashDrvError> {
        self.consume_budget(FlashOperation::ErasePage)?;
        let mut pages = self.pages.borrow_mut();
        let page = pages.get_mut(page_number).ok_or(FlashDrvError::INVAL)?;
        page.0.fill(0xff);
        Ok(())
    }

    fn consume_budget(&self, op: FlashOperation) -> Result<(), FlashDrvError> {
        match self.program_budget.get() {
            Some(0) => {
                romtime::println!("Flash IO failed: {:?}", op);
                Err(FlashDrvError::FAIL)
            }
            Some(n) => {
                self.program_budget.set(Some(n - 1));
                Ok(())
            }
            None => Ok(()),
        }
    }
}
