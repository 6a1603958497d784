// Licensed under the Apache-2.0 license

use super::sink::PlaintextSink;
use super::{check_capacity, image_partition, ImageBinder, BINDING_NONCE_LEN};
use crate::crypto::{
    AeadDirection, AeadOperation, CryptoProvider, KeyHandle, AES_BLOCK_LEN, CCM_TAG_LEN,
};
use crate::flash::{FlashStorage, FlashStreamWriter};
use core::fmt::Write;
use mcu_boot_image::{
    BindAlgorithm, BindMeta, BindState, BootImage, BINDING_TAG_OFFSET, BIND_META_OFFSET,
    IMAGE_HEADER_SIZE,
};
use mcu_config::{McuBootConfig, BIND_BLOCK_SIZE};
use mcu_error::{McuError, McuResult};
use mcu_fih::{fih_call_result, FihRet};
use romtime::HexWord;
use zerocopy::IntoBytes;
use zeroize::Zeroizing;

/// Encrypt-and-bind: the protected region is stored in flash as AES-CCM
/// ciphertext under the binding key, with the CCM tag in the header.
///
/// Data moves through `BLOCK`-byte buffers. Plaintext is fed to the cipher
/// `BLOCK - 16` bytes at a time so that output held back from an earlier
/// step always fits.
pub struct EncryptedBinding<'a, C: CryptoProvider + ?Sized, const BLOCK: usize = { BIND_BLOCK_SIZE }> {
    crypto: &'a mut C,
    flash: &'a dyn FlashStorage,
    config: &'a McuBootConfig,
}

impl<'a, C: CryptoProvider + ?Sized, const BLOCK: usize> EncryptedBinding<'a, C, BLOCK> {
    const BLOCK_OK: () = assert!(BLOCK >= 2 * AES_BLOCK_LEN);
    const CHUNK: usize = BLOCK - AES_BLOCK_LEN;

    pub fn new(crypto: &'a mut C, flash: &'a dyn FlashStorage, config: &'a McuBootConfig) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::BLOCK_OK;
        EncryptedBinding {
            crypto,
            flash,
            config,
        }
    }

    fn encrypt_to_flash(&mut self, image: &mut BootImage, image_id: u32) -> McuResult<()> {
        let total = image.protected().len();
        check_capacity(total)?;
        let partition = image_partition(self.flash, self.config, image_id, total)?;
        let nonce = image.header().ctr_iv;
        let key = KeyHandle::binding_key(&*self.crypto, self.config.binding_key_slot)?;

        let mut op = AeadOperation::new(&mut *self.crypto);
        op.start(AeadDirection::Encrypt, &key, &nonce, total)?;

        let in_progress = BindMeta::new(
            BindState::InProgress,
            BindAlgorithm::Ccm,
            BINDING_NONCE_LEN as u8,
        );
        partition.write(BIND_META_OFFSET, in_progress.as_bytes())?;

        let mut out = Zeroizing::new([0u8; BLOCK]);
        let mut scratch = Zeroizing::new([0u8; BLOCK]);
        let mut writer =
            FlashStreamWriter::begin(&partition, IMAGE_HEADER_SIZE, total, &mut scratch[..])?;
        for chunk in image.protected().chunks(Self::CHUNK) {
            let n = op.update(chunk, &mut out[..])?;
            writer.write(&out[..n])?;
        }
        let mut tag = [0u8; CCM_TAG_LEN];
        let n = op.finish(&mut out[..], &mut tag)?;
        writer.write(&out[..n])?;
        writer.finish()?;

        let bound = BindMeta::new(BindState::Bound, BindAlgorithm::Ccm, BINDING_NONCE_LEN as u8);
        partition.write(BINDING_TAG_OFFSET, &tag)?;
        partition.write(BIND_META_OFFSET, bound.as_bytes())?;

        let header = image.header_mut();
        header.binding_tag = tag;
        header.bind_meta = bound;
        image.set_image_id(image_id);
        romtime::println!(
            "[mcu-rom] Image {} encrypted and bound ({} bytes)",
            image_id,
            total
        );
        Ok(())
    }

    fn decrypt_from_flash(&mut self, image: &mut BootImage) -> McuResult<()> {
        let total = image.protected().len();
        check_capacity(total)?;
        let header = *image.header();
        match header.bind_meta.state() {
            BindState::Bound => {}
            BindState::Unset => return Err(McuError::BINDING_TAG_ABSENT),
            BindState::InProgress => {
                romtime::println!(
                    "[mcu-rom] Image {} has an interrupted binding",
                    image.image_id()
                );
                return Err(McuError::BINDING_INCOMPLETE);
            }
        }
        let partition = image_partition(self.flash, self.config, image.image_id(), total)?;
        let key = KeyHandle::binding_key(&*self.crypto, self.config.binding_key_slot)?;

        let mut op = AeadOperation::new(&mut *self.crypto);
        op.start(AeadDirection::Decrypt, &key, &header.ctr_iv, total)?;

        let mut input = Zeroizing::new([0u8; BLOCK]);
        let mut out = Zeroizing::new([0u8; BLOCK]);
        let mut sink = PlaintextSink::new(image.protected_mut());
        let mut offset = 0;
        while offset < total {
            let len = core::cmp::min(Self::CHUNK, total - offset);
            partition.read(IMAGE_HEADER_SIZE + offset, &mut input[..len])?;
            let n = op.update(&input[..len], &mut out[..])?;
            sink.push(&out[..n])?;
            offset += len;
        }
        let n = op.verify(&mut out[..], &header.binding_tag)?;
        sink.push(&out[..n])?;
        sink.release()
    }
}

impl<C: CryptoProvider + ?Sized, const BLOCK: usize> ImageBinder
    for EncryptedBinding<'_, C, BLOCK>
{
    fn tag_present(&self, image: &BootImage) -> FihRet {
        super::tag_present(image)
    }

    fn bind(&mut self, image: &mut BootImage, image_id: u32) -> FihRet {
        fih_call_result(|| self.encrypt_to_flash(image, image_id))
    }

    fn verify(&mut self, image: &mut BootImage) -> FihRet {
        fih_call_result(|| {
            self.decrypt_from_flash(image).inspect_err(|err| {
                romtime::println!(
                    "[mcu-rom] Image {} failed to decrypt: {}",
                    image.image_id(),
                    HexWord((*err).into())
                );
            })
        })
    }
}
