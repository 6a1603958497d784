/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Secure boot trust chain for MCU ROM: key policy, signature policy
    evaluation and device binding of boot images.

--*/

#![cfg_attr(not(test), no_std)]

pub mod binding;
pub use binding::{
    check_capacity, load_image, EncryptedBinding, ImageBinder, ImageBinding, TagBinding,
    BINDING_NONCE_LEN, MAX_BINDING_PAYLOAD_LEN,
};
pub mod crypto;
pub use crypto::CryptoProvider;
pub mod flash;
pub use flash::*;
pub mod key_policy;
pub use key_policy::{KeyDescriptor, KeyPolicyTable, McuKeyPolicyTable};
pub mod otp;
pub use otp::{read_otp_word, OtpStore};
pub mod rollback;
pub use rollback::{enforce_rollback, NvCounterStore, OtpNvCounters};
pub mod sig_policy;
pub use sig_policy::SignatureAccumulator;

pub use romtime::{fatal_error, set_fatal_error_handler, FatalErrorHandler};

#[no_mangle]
#[inline(never)]
#[cfg(target_arch = "riscv32")]
fn panic_is_possible() {
    core::hint::black_box(());
    // The existence of this symbol is used to inform test_panic_missing
    // that panics are possible. Do not remove or rename this symbol.
}

#[panic_handler]
#[inline(never)]
#[cfg(target_arch = "riscv32")]
fn rom_panic(_: &core::panic::PanicInfo) -> ! {
    panic_is_possible();
    fatal_error(0);
}
