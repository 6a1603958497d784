// Licensed under the Apache-2.0 license

use super::{AeadAlgorithm, AeadEngine, KeyHandle, CCM_TAG_LEN};
use mcu_error::{McuError, McuResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AeadDirection {
    Encrypt,
    Decrypt,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AeadState {
    Idle,
    Streaming {
        direction: AeadDirection,
        consumed: usize,
        produced: usize,
        expected: usize,
    },
    Finalized,
    Failed,
}

/// One streaming AEAD computation over a payload of known length.
///
/// Calls outside the expected order fail with
/// [`McuError::CRYPTO_AEAD_BAD_STATE`]. Any engine error aborts the engine
/// and leaves the operation in a terminal failed state; dropping an
/// operation that did not finish aborts it as well.
pub struct AeadOperation<'e, E: AeadEngine + ?Sized> {
    engine: &'e mut E,
    state: AeadState,
}

impl<'e, E: AeadEngine + ?Sized> AeadOperation<'e, E> {
    pub fn new(engine: &'e mut E) -> Self {
        AeadOperation {
            engine,
            state: AeadState::Idle,
        }
    }

    /// Sets up the engine for a payload of `payload_len` bytes with no
    /// associated data.
    pub fn start(
        &mut self,
        direction: AeadDirection,
        key: &KeyHandle,
        nonce: &[u8],
        payload_len: usize,
    ) -> McuResult<()> {
        if self.state != AeadState::Idle {
            return Err(McuError::CRYPTO_AEAD_BAD_STATE);
        }
        let setup = match direction {
            AeadDirection::Encrypt => self.engine.aead_encrypt_setup(key, AeadAlgorithm::AesCcm),
            AeadDirection::Decrypt => self.engine.aead_decrypt_setup(key, AeadAlgorithm::AesCcm),
        };
        let result = setup
            .and_then(|_| self.engine.aead_set_lengths(0, payload_len))
            .and_then(|_| self.engine.aead_set_nonce(nonce));
        if let Err(err) = result {
            self.fail();
            return Err(err);
        }
        self.state = AeadState::Streaming {
            direction,
            consumed: 0,
            produced: 0,
            expected: payload_len,
        };
        Ok(())
    }

    /// Feeds `input` and returns the number of bytes written to `output`.
    pub fn update(&mut self, input: &[u8], output: &mut [u8]) -> McuResult<usize> {
        let AeadState::Streaming {
            direction,
            consumed,
            produced,
            expected,
        } = self.state
        else {
            return Err(McuError::CRYPTO_AEAD_BAD_STATE);
        };
        let consumed = match consumed.checked_add(input.len()) {
            Some(c) if c <= expected => c,
            _ => return Err(self.fail_with(McuError::BINDING_LENGTH_MISMATCH)),
        };
        let written = match self.engine.aead_update(input, output) {
            Ok(n) => n,
            Err(err) => return Err(self.fail_with(err)),
        };
        let produced = match produced.checked_add(written) {
            Some(p) if p <= expected && written <= output.len() => p,
            _ => return Err(self.fail_with(McuError::BINDING_PLAINTEXT_OVERFLOW)),
        };
        self.state = AeadState::Streaming {
            direction,
            consumed,
            produced,
            expected,
        };
        Ok(written)
    }

    /// Completes an encryption. Returns the number of trailing ciphertext
    /// bytes written to `output`; the tag goes to `tag`.
    pub fn finish(&mut self, output: &mut [u8], tag: &mut [u8; CCM_TAG_LEN]) -> McuResult<usize> {
        let produced = self.check_complete(AeadDirection::Encrypt)?;
        let (written, tag_len) = match self.engine.aead_finish(output, tag) {
            Ok(lens) => lens,
            Err(err) => return Err(self.fail_with(err)),
        };
        if tag_len != CCM_TAG_LEN {
            return Err(self.fail_with(McuError::CRYPTO_AEAD_FINISH_FAILED));
        }
        self.complete(produced, written, output.len())
    }

    /// Completes a decryption, authenticating against `tag`. Returns the
    /// number of trailing plaintext bytes written to `output`.
    pub fn verify(&mut self, output: &mut [u8], tag: &[u8; CCM_TAG_LEN]) -> McuResult<usize> {
        let produced = self.check_complete(AeadDirection::Decrypt)?;
        let written = match self.engine.aead_verify(output, tag) {
            Ok(n) => n,
            Err(err) => return Err(self.fail_with(err)),
        };
        self.complete(produced, written, output.len())
    }

    pub fn is_finalized(&self) -> bool {
        self.state == AeadState::Finalized
    }

    fn check_complete(&mut self, want: AeadDirection) -> McuResult<usize> {
        match self.state {
            AeadState::Streaming {
                direction,
                consumed,
                produced,
                expected,
            } if direction == want => {
                if consumed != expected {
                    return Err(self.fail_with(McuError::BINDING_LENGTH_MISMATCH));
                }
                Ok(produced)
            }
            _ => Err(McuError::CRYPTO_AEAD_BAD_STATE),
        }
    }

    fn complete(&mut self, produced: usize, written: usize, capacity: usize) -> McuResult<usize> {
        let AeadState::Streaming { expected, .. } = self.state else {
            return Err(McuError::CRYPTO_AEAD_BAD_STATE);
        };
        if written > capacity || produced.checked_add(written) != Some(expected) {
            return Err(self.fail_with(McuError::BINDING_LENGTH_MISMATCH));
        }
        self.state = AeadState::Finalized;
        Ok(written)
    }

    fn fail(&mut self) {
        self.engine.aead_abort();
        self.state = AeadState::Failed;
    }

    fn fail_with(&mut self, err: McuError) -> McuError {
        self.fail();
        err
    }
}

impl<E: AeadEngine + ?Sized> Drop for AeadOperation<'_, E> {
    fn drop(&mut self) {
        if matches!(self.state, AeadState::Streaming { .. }) {
            self.engine.aead_abort();
        }
    }
}
