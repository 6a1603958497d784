// Licensed under the Apache-2.0 license

#![cfg_attr(target_arch = "riscv32", no_std)]
#![allow(static_mut_refs)]

// Helpers to route boot-stage console output and fatal errors to the platform.

use core::fmt::{Display, Write};

pub static mut WRITER: Option<&'static mut dyn Write> = None;
static mut FATAL_ERROR_HANDLER: Option<&'static mut dyn FatalErrorHandler> = None;

/// Sets the global backing writer for `print` and `println` macros.
pub fn set_printer(writer: &'static mut dyn Write) {
    unsafe {
        WRITER = Some(writer);
    }
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        unsafe {
            if let Some(writer) = $crate::WRITER.as_mut() {
                let _ = write!(writer, $($arg)*);
            }
        }
    };
}

#[macro_export]
macro_rules! println {
    ($($arg:tt)*) => {
        if let Some(writer) = unsafe { $crate::WRITER.as_mut() } {
            let _ = writeln!(writer, $($arg)*);
        }
    };
}

pub struct HexBytes<'a>(pub &'a [u8]);
impl Display for HexBytes<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for &x in self.0.iter() {
            f.write_char(hex_digit(x >> 4))?;
            f.write_char(hex_digit(x & 0xf))?;
        }
        Ok(())
    }
}

fn hex_digit(nibble: u8) -> char {
    if nibble < 10 {
        (nibble + b'0') as char
    } else {
        (nibble - 10 + b'A') as char
    }
}

pub struct HexWord(pub u32);
impl Display for HexWord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        HexBytes(&self.0.to_be_bytes()).fmt(f)
    }
}

pub trait FatalErrorHandler {
    fn fatal_error(&mut self, code: u32) -> !;
}

/// Set the fatal error handler.
///
/// SAFETY: the passed handler must not be used or referenced anywhere else.
/// Create a single instance and hand it over immediately.
pub fn set_fatal_error_handler(handler: &'static mut dyn FatalErrorHandler) {
    unsafe {
        FATAL_ERROR_HANDLER = Some(handler);
    }
}

/// Stops the boot stage with `code`.
///
/// Without a registered handler the target spins forever, while host builds
/// panic so that tests can observe the condition.
#[inline(never)]
#[allow(clippy::empty_loop)]
pub fn fatal_error(code: u32) -> ! {
    if let Some(handler) = unsafe { FATAL_ERROR_HANDLER.as_mut() } {
        handler.fatal_error(code);
    }
    #[cfg(not(target_arch = "riscv32"))]
    panic!("fatal error {:#010x}", code);
    #[cfg(target_arch = "riscv32")]
    loop {}
}
