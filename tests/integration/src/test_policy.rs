// Licensed under the Apache-2.0 license

#[cfg(test)]
mod test {
    use crate::test::Platform;
    use mcu_config::{KeyMapEntry, KeyPolicy, KeyPolicySource, OtpId};
    use mcu_error::McuError;
    use mcu_fih::fih_memeql;
    use mcu_rom_common::{KeyPolicyTable, McuKeyPolicyTable, SignatureAccumulator};
    use mcu_rom_emulator::EmulatedOtp;
    use rand::Rng;

    const fn entry(slot_index: u8, key_id: u32, policy: KeyPolicy) -> KeyMapEntry {
        KeyMapEntry {
            image_index: 0,
            slot_index,
            key_id,
            policy,
        }
    }

    const TWO_MUST_ONE_MIGHT: [KeyMapEntry; 3] = [
        entry(0, 10, KeyPolicy::MustSign),
        entry(1, 11, KeyPolicy::MustSign),
        entry(2, 12, KeyPolicy::MightSign),
    ];

    const MIGHT_ONLY: [KeyMapEntry; 2] = [
        entry(0, 20, KeyPolicy::MightSign),
        entry(1, 21, KeyPolicy::MightSign),
    ];

    #[test]
    fn test_otp_policy_bit_for_second_image() {
        let mut p = Platform::new(1, [0x40, 0x40]);
        p.otp.program_word(OtpId::ROTPK_POLICIES, 1 << 2).unwrap();
        let table =
            McuKeyPolicyTable::build(p.config.key_map, p.config.key_policy_source, &p.otp).unwrap();

        assert_eq!(table.policy_for(1, 0), Ok(KeyPolicy::MustSign));
        assert_eq!(table.policy_for(0, 0), Ok(KeyPolicy::MightSign));
        assert_eq!(table.policy_for(0, 1), Ok(KeyPolicy::MightSign));
        assert_eq!(table.policy_for(1, 1), Ok(KeyPolicy::MightSign));
        assert_eq!(table.key_id_for(1, 0), Some(3));
    }

    #[test]
    fn test_policy_sources() {
        let p = Platform::new(2, [0x40, 0x40]);
        assert_eq!(
            McuKeyPolicyTable::build(p.config.key_map, p.config.key_policy_source, &p.otp).err(),
            Some(McuError::POLICY_OTP_READ_FAILED)
        );

        let table =
            McuKeyPolicyTable::build(p.config.key_map, KeyPolicySource::Unprovisioned, &p.otp)
                .unwrap();
        for (image, slot) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
            assert_eq!(table.policy_for(image, slot), Ok(KeyPolicy::MustSign));
        }

        let table =
            McuKeyPolicyTable::build(p.config.key_map, KeyPolicySource::Static, &p.otp).unwrap();
        assert_eq!(table.policy_for(0, 0), Ok(KeyPolicy::MustSign));
        assert_eq!(table.policy_for(0, 1), Ok(KeyPolicy::MightSign));
    }

    #[test]
    fn test_evaluator_truth_table() {
        let otp = EmulatedOtp::new();
        let table =
            KeyPolicyTable::<1, 3>::build(&TWO_MUST_ONE_MIGHT, KeyPolicySource::Static, &otp)
                .unwrap();

        for bits in 0..8u8 {
            let valid = [bits & 1 != 0, bits & 2 != 0, bits & 4 != 0];
            let mut acc = SignatureAccumulator::new();
            for (entry, valid) in TWO_MUST_ONE_MIGHT.iter().zip(valid) {
                assert!(acc.observe(&table, 0, entry.key_id, valid).is_success());
            }
            assert_eq!(acc.must_sign_count(), 2, "{valid:?}");
            assert_eq!(acc.must_sign(), valid[0] && valid[1], "{valid:?}");
            assert_eq!(acc.might_sign(), valid.iter().any(|&v| v), "{valid:?}");
        }
    }

    #[test]
    fn test_evaluator_without_mandatory_keys() {
        let otp = EmulatedOtp::new();
        let table =
            KeyPolicyTable::<1, 2>::build(&MIGHT_ONLY, KeyPolicySource::Static, &otp).unwrap();

        let mut acc = SignatureAccumulator::new();
        assert!(acc.observe(&table, 0, 20, false).is_success());
        assert!(acc.observe(&table, 0, 21, false).is_success());
        // Vacuously true; only the zero count tells the caller that no
        // mandatory key exists.
        assert!(acc.must_sign());
        assert_eq!(acc.must_sign_count(), 0);
        assert!(!acc.might_sign());

        let before = acc;
        assert_eq!(
            acc.observe(&table, 0, 99, true).decode(),
            Err(McuError::POLICY_KEY_NOT_REGISTERED)
        );
        assert_eq!(acc, before);
    }

    #[test]
    fn test_comparator() {
        let mut p = Platform::new(3, [0x40, 0x40]);
        let mut a = [0u8; 64];
        p.rng.fill(&mut a[..]);
        assert!(fih_memeql(&a, &a.clone()).is_success());

        for pos in [0, a.len() / 2, a.len() - 1] {
            let mut b = a;
            b[pos] ^= 1 << p.rng.gen_range(0..8);
            assert!(fih_memeql(&a, &b).is_failure(), "difference at {pos}");
        }
        assert!(fih_memeql(&a, &a[..63]).is_failure());
        assert!(fih_memeql(&a[..0], &a).is_failure());
    }
}
