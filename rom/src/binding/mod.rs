// Licensed under the Apache-2.0 license

//! Binding of boot images to the device and their flash slot.
//!
//! Two schemes are provided. [`TagBinding`] stores an AES-CMAC over the
//! SHA-256 of the protected region in the image header. [`EncryptedBinding`]
//! additionally re-encrypts the protected region in flash with AES-CCM under
//! the same device key. The build selects one of them as [`ImageBinding`].

mod encrypt;
mod sink;
mod tag;

pub use encrypt::EncryptedBinding;
pub use tag::TagBinding;

use crate::flash::{FlashPartition, FlashStorage};
use core::fmt::Write;
use mcu_boot_image::{BindState, BootImage, BINDING_TAG_LEN, IMAGE_HEADER_SIZE};
use mcu_config::McuBootConfig;
use mcu_error::{McuError, McuResult};
use mcu_fih::{fih_call, fih_launder, fih_memeql, FihRet};

/// Nonce length used for CCM binding.
pub const BINDING_NONCE_LEN: usize = 12;

/// Bytes left for the CCM length field once the nonce is placed.
const CCM_LENGTH_FIELD_LEN: usize = 15 - BINDING_NONCE_LEN;

/// Largest protected region CCM can cover with [`BINDING_NONCE_LEN`].
pub const MAX_BINDING_PAYLOAD_LEN: usize = 1 << (8 * CCM_LENGTH_FIELD_LEN);

#[cfg(feature = "image-encryption")]
pub type ImageBinding<'a, C> = EncryptedBinding<'a, C>;
#[cfg(not(feature = "image-encryption"))]
pub type ImageBinding<'a, C> = TagBinding<'a, C>;

pub trait ImageBinder {
    /// Success iff the stored tag is not all zero.
    fn tag_present(&self, image: &BootImage) -> FihRet;

    /// Binds `image` to slot `image_id`, persisting the result to flash.
    fn bind(&mut self, image: &mut BootImage, image_id: u32) -> FihRet;

    /// Checks the binding of `image` against its slot.
    fn verify(&mut self, image: &mut BootImage) -> FihRet;

    fn binding_state(&self, image: &BootImage) -> BindState {
        image.header().bind_meta.state()
    }
}

/// Rejects regions the CCM length field cannot describe. Applied by both
/// schemes before any key or cipher use.
pub fn check_capacity(len: usize) -> McuResult<()> {
    if len > MAX_BINDING_PAYLOAD_LEN {
        romtime::println!(
            "[mcu-rom] Protected region of {} bytes exceeds binding limit",
            len
        );
        return Err(McuError::BINDING_CAPACITY_EXCEEDED);
    }
    Ok(())
}

pub(crate) fn tag_present(image: &BootImage) -> FihRet {
    fih_call(|| {
        let zero = [0u8; BINDING_TAG_LEN];
        let eq = fih_memeql(&image.header().binding_tag, &zero);
        // Present only on the canonical "differs" answer, never on an
        // unexpected value.
        if eq.is_failure() && fih_launder(eq.raw()) == FihRet::FAILURE.raw() {
            FihRet::SUCCESS
        } else {
            FihRet::from_error(McuError::BINDING_TAG_ABSENT)
        }
    })
}

/// Reads header and protected region of `image_id` from flash into `buf`.
pub fn load_image<'b>(
    flash: &dyn FlashStorage,
    config: &McuBootConfig,
    image_id: u32,
    buf: &'b mut [u8],
) -> McuResult<BootImage<'b>> {
    let slot = config
        .image_slot(image_id)
        .ok_or(McuError::IMAGE_UNKNOWN_ID)?;
    let len = IMAGE_HEADER_SIZE + slot.protected_size as usize;
    let buf = buf.get_mut(..len).ok_or(McuError::IMAGE_LAYOUT_INVALID)?;
    let partition = FlashPartition::for_image(flash, slot)?;
    partition.read(0, buf)?;
    BootImage::new(image_id, buf)
}

/// Flash partition of `image_id`, checked to match the in-memory region.
pub(crate) fn image_partition<'a>(
    flash: &'a dyn FlashStorage,
    config: &McuBootConfig,
    image_id: u32,
    protected_len: usize,
) -> McuResult<FlashPartition<'a>> {
    let slot = config
        .image_slot(image_id)
        .ok_or(McuError::IMAGE_UNKNOWN_ID)?;
    if slot.protected_size as usize != protected_len
        || IMAGE_HEADER_SIZE + protected_len > slot.size as usize
    {
        return Err(McuError::IMAGE_LAYOUT_INVALID);
    }
    FlashPartition::for_image(flash, slot)
}
