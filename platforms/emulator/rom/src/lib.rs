/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Emulator platform for MCU ROM: RAM backed flash, OTP and a software
    crypto provider behind the boot stage collaborator traits.

--*/

pub mod boot;
pub mod crypto;
pub mod flash;
pub mod otp;

pub use boot::EmulatorBoot;
pub use crypto::SoftCrypto;
pub use flash::flash_drv::EmulatedFlashCtrl;
pub use otp::EmulatedOtp;
