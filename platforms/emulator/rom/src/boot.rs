// Licensed under the Apache-2.0 license

use crate::{EmulatedFlashCtrl, EmulatedOtp, SoftCrypto};
use core::fmt::Write;
use mcu_boot_image::BootImage;
use mcu_config::McuBootConfig;
use mcu_error::McuResult;
use mcu_fih::FihRet;
use mcu_rom_common::{enforce_rollback, load_image, ImageBinder, ImageBinding, OtpNvCounters};

/// Image authentication as the emulator ROM runs it. The binding scheme is
/// the one the build selected through `image-encryption`.
pub struct EmulatorBoot<'a> {
    crypto: &'a mut SoftCrypto,
    flash: &'a EmulatedFlashCtrl,
    otp: &'a EmulatedOtp,
    config: &'a McuBootConfig,
}

impl<'a> EmulatorBoot<'a> {
    pub fn new(
        crypto: &'a mut SoftCrypto,
        flash: &'a EmulatedFlashCtrl,
        otp: &'a EmulatedOtp,
        config: &'a McuBootConfig,
    ) -> Self {
        EmulatorBoot {
            crypto,
            flash,
            otp,
            config,
        }
    }

    pub fn binder(&mut self) -> ImageBinding<'_, SoftCrypto> {
        ImageBinding::<SoftCrypto>::new(&mut *self.crypto, self.flash, self.config)
    }

    /// Binds a freshly staged image in slot `image_id` to this device.
    pub fn bind_staged(&mut self, image_id: u32, buf: &mut [u8]) -> FihRet {
        let mut image = match load_image(self.flash, self.config, image_id, buf) {
            Ok(image) => image,
            Err(err) => return FihRet::from_error(err),
        };
        self.binder().bind(&mut image, image_id)
    }

    /// Loads slot `image_id`, checks its binding and its security counter.
    /// On success `buf` holds the authenticated protected region.
    pub fn boot<'b>(&mut self, image_id: u32, buf: &'b mut [u8]) -> McuResult<BootImage<'b>> {
        let mut image = load_image(self.flash, self.config, image_id, buf)?;
        self.binder().verify(&mut image).decode()?;
        enforce_rollback(&image, &OtpNvCounters::new(self.otp)).decode()?;
        romtime::println!("[mcu-rom] Image {} authenticated", image_id);
        Ok(image)
    }
}
