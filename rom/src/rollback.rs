// Licensed under the Apache-2.0 license

use crate::otp::{read_otp_word, OtpStore};
use core::fmt::Write;
use mcu_boot_image::BootImage;
use mcu_config::OtpId;
use mcu_error::{McuError, McuResult};
use mcu_fih::{fih_call_result, fih_launder, FihRet};

/// Source of the minimum accepted security counter per image.
pub trait NvCounterStore {
    fn read_counter(&self, image_id: u32) -> McuResult<u32>;
}

/// Counters kept as one OTP word per image.
pub struct OtpNvCounters<'a> {
    otp: &'a dyn OtpStore,
}

impl<'a> OtpNvCounters<'a> {
    pub fn new(otp: &'a dyn OtpStore) -> Self {
        OtpNvCounters { otp }
    }
}

impl NvCounterStore for OtpNvCounters<'_> {
    fn read_counter(&self, image_id: u32) -> McuResult<u32> {
        let id = OtpNvCounters::counter_id(image_id)?;
        read_otp_word(self.otp, id).map_err(|_| McuError::ROLLBACK_COUNTER_READ_FAILED)
    }
}

impl OtpNvCounters<'_> {
    fn counter_id(image_id: u32) -> McuResult<OtpId> {
        OtpId::NV_COUNTER_BASE
            .0
            .checked_add(image_id)
            .map(OtpId)
            .ok_or(McuError::ROLLBACK_COUNTER_READ_FAILED)
    }
}

/// Rejects an image whose security counter is below the stored counter.
pub fn enforce_rollback(image: &BootImage, counters: &dyn NvCounterStore) -> FihRet {
    fih_call_result(|| {
        let image_counter = image.security_counter()?;
        let stored = counters.read_counter(image.image_id())?;
        if fih_launder(image_counter) < stored || image_counter < fih_launder(stored) {
            romtime::println!(
                "[mcu-rom] Image {} security counter {} below {}",
                image.image_id(),
                image_counter,
                stored
            );
            return Err(McuError::ROLLBACK_DETECTED);
        }
        Ok(())
    })
}
