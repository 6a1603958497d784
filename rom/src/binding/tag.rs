// Licensed under the Apache-2.0 license

use super::{check_capacity, image_partition, ImageBinder};
use crate::crypto::{
    CryptoProvider, KeyHandle, MacAlgorithm, MacOperation, CMAC_TAG_LEN, SHA256_DIGEST_LEN,
};
use crate::flash::FlashStorage;
use core::fmt::Write;
use mcu_boot_image::{
    BindAlgorithm, BindMeta, BindState, BootImage, BINDING_TAG_LEN, BINDING_TAG_OFFSET,
    BIND_META_OFFSET,
};
use mcu_config::McuBootConfig;
use mcu_error::{McuError, McuResult};
use mcu_fih::{fih_call, fih_call_result, fih_memeql, FihRet};
use zerocopy::IntoBytes;
use zeroize::Zeroizing;

/// Tag-only binding: `AES-CMAC(binding key, SHA-256(protected region))`.
pub struct TagBinding<'a, C: CryptoProvider + ?Sized> {
    crypto: &'a mut C,
    flash: &'a dyn FlashStorage,
    config: &'a McuBootConfig,
}

impl<'a, C: CryptoProvider + ?Sized> TagBinding<'a, C> {
    pub fn new(crypto: &'a mut C, flash: &'a dyn FlashStorage, config: &'a McuBootConfig) -> Self {
        TagBinding {
            crypto,
            flash,
            config,
        }
    }

    fn compute_tag(&mut self, protected: &[u8], tag: &mut [u8; BINDING_TAG_LEN]) -> McuResult<()> {
        check_capacity(protected.len())?;

        let mut digest = Zeroizing::new([0u8; SHA256_DIGEST_LEN]);
        self.crypto.sha256(protected, &mut digest)?;

        let key = KeyHandle::binding_key(&*self.crypto, self.config.binding_key_slot)?;
        let mut mac = MacOperation::sign_setup(&mut *self.crypto, &key, MacAlgorithm::AesCmac)?;
        mac.update(&digest[..])?;
        if mac.sign_finish(tag)? != CMAC_TAG_LEN {
            return Err(McuError::CRYPTO_MAC_FINISH_FAILED);
        }
        Ok(())
    }

    fn bind_internal(&mut self, image: &mut BootImage, image_id: u32) -> McuResult<()> {
        check_capacity(image.protected().len())?;
        let partition = image_partition(self.flash, self.config, image_id, image.protected().len())?;

        let mut tag = Zeroizing::new([0u8; BINDING_TAG_LEN]);
        self.compute_tag(image.protected(), &mut tag)?;

        let meta = BindMeta::new(BindState::Bound, BindAlgorithm::Cmac, 0);
        partition.write(BINDING_TAG_OFFSET, &tag[..])?;
        partition.write(BIND_META_OFFSET, meta.as_bytes())?;

        let header = image.header_mut();
        header.binding_tag = *tag;
        header.bind_meta = meta;
        image.set_image_id(image_id);
        romtime::println!("[mcu-rom] Image {} bound", image_id);
        Ok(())
    }
}

impl<C: CryptoProvider + ?Sized> ImageBinder for TagBinding<'_, C> {
    fn tag_present(&self, image: &BootImage) -> FihRet {
        super::tag_present(image)
    }

    fn bind(&mut self, image: &mut BootImage, image_id: u32) -> FihRet {
        fih_call_result(|| self.bind_internal(image, image_id))
    }

    fn verify(&mut self, image: &mut BootImage) -> FihRet {
        fih_call(|| {
            let mut computed = Zeroizing::new([0u8; BINDING_TAG_LEN]);
            if let Err(err) = self.compute_tag(image.protected(), &mut computed) {
                return FihRet::from_error(err);
            }
            let ret = fih_memeql(&computed[..], &image.header().binding_tag);
            if ret.is_failure() {
                romtime::println!("[mcu-rom] Image {} binding tag mismatch", image.image_id());
                return FihRet::from_error(McuError::BINDING_TAG_MISMATCH);
            }
            ret
        })
    }
}
