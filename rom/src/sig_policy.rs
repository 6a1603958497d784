// Licensed under the Apache-2.0 license

use crate::key_policy::KeyPolicyTable;
use mcu_config::KeyPolicy;
use mcu_error::McuError;
use mcu_fih::{fih_call_result, FihRet};

/// Signature verdicts of one image verification attempt.
///
/// The verifying loop creates one per attempt, feeds it every candidate key
/// through [`SignatureAccumulator::observe`] and then reads the three
/// values. An image with no MUST_SIGN key ends with `must_sign() == true`
/// and `must_sign_count() == 0`; the consumer has to treat a zero count as
/// "no mandatory key" rather than as "all mandatory keys signed".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignatureAccumulator {
    might_sign: bool,
    must_sign: bool,
    must_sign_count: u32,
}

impl Default for SignatureAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureAccumulator {
    pub fn new() -> Self {
        SignatureAccumulator {
            might_sign: false,
            must_sign: true,
            must_sign_count: 0,
        }
    }

    /// At least one key produced a valid signature.
    pub fn might_sign(&self) -> bool {
        self.might_sign
    }

    /// No MUST_SIGN key has produced an invalid signature.
    pub fn must_sign(&self) -> bool {
        self.must_sign
    }

    /// Number of MUST_SIGN keys observed.
    pub fn must_sign_count(&self) -> u32 {
        self.must_sign_count
    }

    /// Folds the verdict for `key_id` into the accumulator. Fails, leaving
    /// the accumulator untouched, if the key is not registered for the image.
    pub fn observe<const IMAGES: usize, const SLOTS: usize>(
        &mut self,
        table: &KeyPolicyTable<IMAGES, SLOTS>,
        image_index: usize,
        key_id: u32,
        signature_valid: bool,
    ) -> FihRet {
        fih_call_result(|| {
            let descriptor = table.find(image_index, key_id)?;
            match descriptor.policy {
                KeyPolicy::MightSign => {
                    self.might_sign |= signature_valid;
                }
                KeyPolicy::MustSign => {
                    self.must_sign_count = self
                        .must_sign_count
                        .checked_add(1)
                        .ok_or(McuError::POLICY_COUNT_OVERFLOW)?;
                    self.might_sign |= signature_valid;
                    self.must_sign &= signature_valid;
                }
            }
            Ok(())
        })
    }
}
