// Licensed under the Apache-2.0 license

use super::{KeyHandle, MacAlgorithm, MacEngine};
use mcu_error::McuResult;

/// Active MAC computation; aborted on drop unless finished.
pub struct MacOperation<'e, E: MacEngine + ?Sized> {
    engine: &'e mut E,
    active: bool,
}

impl<'e, E: MacEngine + ?Sized> MacOperation<'e, E> {
    pub fn sign_setup(engine: &'e mut E, key: &KeyHandle, alg: MacAlgorithm) -> McuResult<Self> {
        if let Err(err) = engine.mac_sign_setup(key, alg) {
            engine.mac_abort();
            return Err(err);
        }
        Ok(MacOperation {
            engine,
            active: true,
        })
    }

    pub fn update(&mut self, data: &[u8]) -> McuResult<()> {
        self.engine.mac_update(data)
    }

    /// Writes the MAC into `mac` and returns its length.
    pub fn sign_finish(mut self, mac: &mut [u8]) -> McuResult<usize> {
        let result = self.engine.mac_sign_finish(mac);
        if result.is_ok() {
            self.active = false;
        }
        result
    }
}

impl<E: MacEngine + ?Sized> Drop for MacOperation<'_, E> {
    fn drop(&mut self) {
        if self.active {
            self.engine.mac_abort();
        }
    }
}
