// Licensed under the Apache-2.0 license

#[cfg(test)]
mod test {
    use crate::test::{oracle_seal, Platform, BINDING_KEY_SLOT};
    use mcu_boot_image::{
        BindAlgorithm, BindState, BootImage, BINDING_TAG_LEN, BIND_META_OFFSET, IMAGE_HEADER_SIZE,
    };
    use mcu_config::OtpId;
    use mcu_error::McuError;
    use mcu_rom_common::{
        load_image, EncryptedBinding, ImageBinder, TagBinding, MAX_BINDING_PAYLOAD_LEN,
    };
    use mcu_rom_emulator::SoftCrypto;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const CTR_IV_RANGE: core::ops::Range<usize> = 16..28;

    #[test]
    fn test_tag_binding_round_trip() {
        let mut p = Platform::new(1, [0x400, 0x1234]);
        for image_id in 0..2 {
            let original = p.provision_image(image_id, 1);
            let mut buf = p.image_buf(image_id);
            let mut image = load_image(&p.flash, &p.config, image_id, &mut buf).unwrap();
            {
                let mut binder = p.binder(false);
                assert!(binder.tag_present(&image).is_failure());
                assert_eq!(binder.binding_state(&image), BindState::Unset);
                assert_eq!(
                    binder.verify(&mut image).decode(),
                    Err(McuError::BINDING_TAG_MISMATCH)
                );

                assert!(binder.bind(&mut image, image_id).is_success());
                assert!(binder.tag_present(&image).is_success());
                assert_eq!(binder.binding_state(&image), BindState::Bound);
                assert!(binder.verify(&mut image).is_success());
            }

            // Only the header changed in flash.
            let stored = p.stored_image(image_id);
            assert_eq!(stored[IMAGE_HEADER_SIZE..], original[IMAGE_HEADER_SIZE..]);
            assert_eq!(&stored[..BINDING_TAG_LEN], &image.header().binding_tag);

            let mut boot_buf = p.image_buf(image_id);
            let mut image = load_image(&p.flash, &p.config, image_id, &mut boot_buf).unwrap();
            assert!(p.binder(false).verify(&mut image).is_success());
        }
    }

    fn encrypted_round_trip<const BLOCK: usize>(seed: u64, protected_len: usize) {
        let mut p = Platform::new(seed, [protected_len, 0x40]);
        let original = p.provision_image(0, 3);
        let mut buf = p.image_buf(0);
        let mut image = load_image(&p.flash, &p.config, 0, &mut buf).unwrap();
        {
            let mut binder =
                EncryptedBinding::<SoftCrypto, BLOCK>::new(&mut p.crypto, &p.flash, &p.config);
            assert!(binder.bind(&mut image, 0).is_success());
            assert_eq!(binder.binding_state(&image), BindState::Bound);
        }
        assert_eq!(image.protected(), &original[IMAGE_HEADER_SIZE..]);

        // Flash holds exactly what a one-shot AES-256-CCM produces.
        let stored = p.stored_image(0);
        let sealed = oracle_seal(
            &p.binding_key,
            &original[CTR_IV_RANGE],
            &original[IMAGE_HEADER_SIZE..],
        );
        assert_eq!(
            stored[IMAGE_HEADER_SIZE..],
            sealed[..protected_len],
            "ciphertext, {protected_len} bytes through {BLOCK}-byte blocks"
        );
        assert_eq!(stored[..BINDING_TAG_LEN], sealed[protected_len..]);

        let mut boot_buf = p.image_buf(0);
        let mut image = load_image(&p.flash, &p.config, 0, &mut boot_buf).unwrap();
        let mut binder =
            EncryptedBinding::<SoftCrypto, BLOCK>::new(&mut p.crypto, &p.flash, &p.config);
        assert!(binder.verify(&mut image).is_success());
        assert_eq!(image.protected(), &original[IMAGE_HEADER_SIZE..]);
    }

    #[test]
    fn test_encrypted_binding_round_trip() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut lengths = vec![12, 13, 27, 28, 29, 44, 1024, 1025, 4099];
        lengths.extend((0..4).map(|_| rng.gen_range(12..6000)));
        for (i, len) in lengths.into_iter().enumerate() {
            let seed = 100 + i as u64;
            encrypted_round_trip::<32>(seed, len);
            encrypted_round_trip::<100>(seed, len);
            encrypted_round_trip::<1024>(seed, len);
        }
    }

    #[test]
    fn test_encrypted_binding_with_imported_key() {
        let mut p = Platform::new(2, [0x300, 0x40]);
        let key = p.binding_key;
        p.crypto.install_imported(BINDING_KEY_SLOT, &key).unwrap();
        let original = p.provision_image(0, 1);
        let mut buf = p.image_buf(0);
        let mut image = load_image(&p.flash, &p.config, 0, &mut buf).unwrap();
        assert!(p.binder(true).bind(&mut image, 0).is_success());

        let sealed = oracle_seal(&key, &original[CTR_IV_RANGE], &original[IMAGE_HEADER_SIZE..]);
        assert_eq!(p.stored_image(0)[IMAGE_HEADER_SIZE..], sealed[..0x300]);
    }

    #[test]
    fn test_single_bit_flips_rejected() {
        let len = 700;
        let mut rng = StdRng::seed_from_u64(77);
        for encrypted in [false, true] {
            for _ in 0..8 {
                let mut p = Platform::new(rng.gen(), [len, 0x40]);
                let original = p.provision_image(0, 1);
                let mut buf = p.image_buf(0);
                let mut image = load_image(&p.flash, &p.config, 0, &mut buf).unwrap();
                assert!(p.binder(encrypted).bind(&mut image, 0).is_success());

                let offset = if rng.gen_bool(0.25) {
                    rng.gen_range(0..BINDING_TAG_LEN)
                } else {
                    IMAGE_HEADER_SIZE + rng.gen_range(0..len)
                };
                p.flip_bit(0, offset, rng.gen_range(0..8));

                let mut boot_buf = p.image_buf(0);
                let mut image = load_image(&p.flash, &p.config, 0, &mut boot_buf).unwrap();
                let ret = p.binder(encrypted).verify(&mut image);
                assert!(ret.is_failure(), "flip at {offset} accepted");

                if encrypted {
                    assert_eq!(ret.decode(), Err(McuError::CRYPTO_AEAD_AUTH_FAILED));
                    // Nothing decrypted survives the failed tag check.
                    let emitted = len / 16 * 16;
                    assert!(image.protected()[..emitted].iter().all(|&b| b == 0));
                    assert_ne!(image.protected(), &original[IMAGE_HEADER_SIZE..]);
                } else {
                    assert_eq!(ret.decode(), Err(McuError::BINDING_TAG_MISMATCH));
                }
            }
        }
    }

    #[test]
    fn test_capacity_limit_checked_first() {
        let mut p = Platform::new(3, [0x40, 0x40]);
        // With no binding key, any key use would surface as a key error.
        p.crypto.clear_slot(BINDING_KEY_SLOT);
        let mut buf = vec![0u8; IMAGE_HEADER_SIZE + MAX_BINDING_PAYLOAD_LEN + 1];
        let mut image = BootImage::new(0, &mut buf).unwrap();
        for encrypted in [false, true] {
            let mut binder = p.binder(encrypted);
            assert_eq!(
                binder.bind(&mut image, 0).decode(),
                Err(McuError::BINDING_CAPACITY_EXCEEDED)
            );
            assert_eq!(
                binder.verify(&mut image).decode(),
                Err(McuError::BINDING_CAPACITY_EXCEEDED)
            );
        }
        assert_eq!(p.flash.page_programs(), 0);
        assert!(!p.crypto.aead_active());
        assert!(!p.crypto.mac_active());
    }

    #[test]
    fn test_capacity_limit_inclusive() {
        let mut p = Platform::new(4, [MAX_BINDING_PAYLOAD_LEN, 0x40]);
        p.provision_image(0, 1);
        let mut buf = p.image_buf(0);
        let mut image = load_image(&p.flash, &p.config, 0, &mut buf).unwrap();
        {
            let mut binder = TagBinding::new(&mut p.crypto, &p.flash, &p.config);
            assert!(binder.bind(&mut image, 0).is_success());
            assert!(binder.verify(&mut image).is_success());
        }

        // The CCM length field of the software engine stops one byte short;
        // the request still gets past the capacity check.
        let programs = p.flash.page_programs();
        let ret = p.binder(true).bind(&mut image, 0);
        assert_eq!(ret.decode(), Err(McuError::CRYPTO_AEAD_SET_LENGTHS_FAILED));
        assert_eq!(p.flash.page_programs(), programs);
    }

    #[test]
    fn test_interrupted_encryption_detected() {
        let mut p = Platform::new(5, [4000, 0x40]);
        p.provision_image(0, 1);
        let mut buf = p.image_buf(0);
        let mut image = load_image(&p.flash, &p.config, 0, &mut buf).unwrap();

        p.flash.set_program_budget(Some(3));
        assert_eq!(
            p.binder(true).bind(&mut image, 0).decode(),
            Err(McuError::FLASH_WRITE_FAILED)
        );
        p.flash.set_program_budget(None);
        assert!(!p.crypto.aead_active());

        let mut boot_buf = p.image_buf(0);
        let mut image = load_image(&p.flash, &p.config, 0, &mut boot_buf).unwrap();
        let mut binder = p.binder(true);
        assert_eq!(binder.binding_state(&image), BindState::InProgress);
        assert!(binder.tag_present(&image).is_failure());
        assert_eq!(
            binder.verify(&mut image).decode(),
            Err(McuError::BINDING_INCOMPLETE)
        );
    }

    #[test]
    fn test_missing_binding_key() {
        let mut p = Platform::new(6, [0x100, 0x40]);
        p.provision_image(0, 1);
        p.crypto.clear_slot(BINDING_KEY_SLOT);
        let programs = p.flash.page_programs();
        let mut buf = p.image_buf(0);
        let mut image = load_image(&p.flash, &p.config, 0, &mut buf).unwrap();
        for encrypted in [false, true] {
            assert_eq!(
                p.binder(encrypted).bind(&mut image, 0).decode(),
                Err(McuError::KEY_BINDING_UNAVAILABLE)
            );
        }
        assert_eq!(p.flash.page_programs(), programs);
        assert_eq!(image.header().binding_tag, [0; BINDING_TAG_LEN]);
    }

    #[test]
    fn test_boot_sequence_with_rollback() {
        let mut p = Platform::new(7, [0x200, 0x200]);
        let original = p.provision_image(0, 5);
        p.provision_image(1, 4);
        p.otp
            .program_word(OtpId(OtpId::NV_COUNTER_BASE.0), 5)
            .unwrap();

        for image_id in 0..2 {
            let mut buf = p.image_buf(image_id);
            assert!(p.boot().bind_staged(image_id, &mut buf).is_success());
        }

        let mut buf = p.image_buf(0);
        let image = p.boot().boot(0, &mut buf).unwrap();
        assert_eq!(image.protected(), &original[IMAGE_HEADER_SIZE..]);

        let mut buf = p.image_buf(1);
        assert_eq!(
            p.boot().boot(1, &mut buf).err(),
            Some(McuError::ROLLBACK_COUNTER_READ_FAILED)
        );
        p.otp
            .program_word(OtpId(OtpId::NV_COUNTER_BASE.0 + 1), 5)
            .unwrap();
        assert_eq!(
            p.boot().boot(1, &mut buf).err(),
            Some(McuError::ROLLBACK_DETECTED)
        );
    }

    #[cfg(feature = "image-encryption")]
    #[test]
    fn test_boot_binding_encrypts_slot() {
        let mut p = Platform::new(8, [0x345, 0x40]);
        let original = p.provision_image(0, 1);
        let mut buf = p.image_buf(0);
        assert!(p.boot().bind_staged(0, &mut buf).is_success());

        let stored = p.stored_image(0);
        let sealed = oracle_seal(&p.binding_key, &original[CTR_IV_RANGE], &original[IMAGE_HEADER_SIZE..]);
        assert_eq!(stored[IMAGE_HEADER_SIZE..], sealed[..0x345]);
        assert_eq!(stored[..BINDING_TAG_LEN], sealed[0x345..]);
        assert_eq!(stored[BIND_META_OFFSET + 1], BindAlgorithm::Ccm as u8);

        let mut buf = p.image_buf(0);
        let image = p.boot().boot(0, &mut buf).unwrap();
        assert_eq!(image.protected(), &original[IMAGE_HEADER_SIZE..]);
    }

    #[cfg(not(feature = "image-encryption"))]
    #[test]
    fn test_boot_binding_tags_slot() {
        let mut p = Platform::new(8, [0x345, 0x40]);
        let original = p.provision_image(0, 1);
        let mut buf = p.image_buf(0);
        assert!(p.boot().bind_staged(0, &mut buf).is_success());

        let stored = p.stored_image(0);
        assert_eq!(stored[IMAGE_HEADER_SIZE..], original[IMAGE_HEADER_SIZE..]);
        assert_ne!(stored[..BINDING_TAG_LEN], [0u8; BINDING_TAG_LEN]);
        assert_eq!(stored[BIND_META_OFFSET + 1], BindAlgorithm::Cmac as u8);

        let mut buf = p.image_buf(0);
        let image = p.boot().boot(0, &mut buf).unwrap();
        assert_eq!(image.protected(), &original[IMAGE_HEADER_SIZE..]);

        p.flip_bit(0, IMAGE_HEADER_SIZE + 0x100, 3);
        let mut buf = p.image_buf(0);
        assert_eq!(
            p.boot().boot(0, &mut buf).err(),
            Some(McuError::BINDING_TAG_MISMATCH)
        );
    }
}
