//! Persistent settings with default recovery
//!
//! The settings block lives in non-volatile storage behind the
//! [`SettingsStorage`] trait. On load, a block failing either checksum or
//! carrying an unknown trigger mode is replaced by compiled defaults,
//! which are immediately re-persisted so the next boot is clean. Every
//! write is followed by a settle delay; bus masters are told to wait
//! that long after `StoreSettings` before issuing the next command.

use embedded_hal::delay::DelayNs;
use piezotrig_core::Settings;

use crate::board::SettingsStorage;

/// Milliseconds to wait after programming the settings block.
pub const PERSIST_SETTLE_MS: u32 = 10;

/// The active configuration plus its backing storage.
#[derive(Debug)]
pub struct SettingsStore<S> {
    storage: S,
    current: Settings,
}

impl<S: SettingsStorage> SettingsStore<S> {
    /// Wrap a storage backend. The active settings start at defaults
    /// until [`load`](Self::load) runs.
    pub const fn new(storage: S) -> Self {
        Self {
            storage,
            current: Settings {
                trigger_mode: Settings::DEFAULT_TRIGGER_MODE,
                threshold: Settings::DEFAULT_THRESHOLD,
                alpha: Settings::DEFAULT_ALPHA,
                calibration_samples: Settings::DEFAULT_CALIBRATION_SAMPLES,
                debounce_ms: Settings::DEFAULT_DEBOUNCE_MS,
            },
        }
    }

    /// Load the stored block, reverting to defaults when it is invalid.
    ///
    /// Returns `true` when defaults had to be restored (and were
    /// persisted).
    pub fn load<D: DelayNs>(&mut self, delay: &mut D) -> bool {
        let block = self.storage.read_block();
        match Settings::from_block(&block) {
            Ok(settings) => {
                self.current = settings;
                false
            }
            Err(_) => {
                self.current = Settings::default();
                self.save(delay);
                true
            }
        }
    }

    /// Persist the active settings and wait for the storage to settle.
    pub fn save<D: DelayNs>(&mut self, delay: &mut D) {
        self.storage.write_block(&self.current.to_block());
        delay.delay_ms(PERSIST_SETTLE_MS);
    }

    /// Revert to compiled defaults and persist them.
    pub fn reset_defaults<D: DelayNs>(&mut self, delay: &mut D) {
        self.current = Settings::default();
        self.save(delay);
    }

    /// Active configuration.
    #[must_use]
    pub const fn current(&self) -> &Settings {
        &self.current
    }

    /// Mutable access for command handlers. Changes are volatile until
    /// [`save`](Self::save) runs.
    pub fn current_mut(&mut self) -> &mut Settings {
        &mut self.current
    }

    /// Recover the storage backend, discarding the volatile state.
    pub fn into_storage(self) -> S {
        self.storage
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{InstantDelay, RamStorage};
    use piezotrig_core::TriggerMode;

    #[test]
    fn test_blank_storage_restores_defaults() {
        let mut store = SettingsStore::new(RamStorage::blank());
        let mut delay = InstantDelay;

        assert!(store.load(&mut delay));
        assert_eq!(*store.current(), Settings::default());

        // The defaults were persisted: a second load is clean.
        assert!(!store.load(&mut delay));
    }

    #[test]
    fn test_save_and_reload() {
        let mut store = SettingsStore::new(RamStorage::blank());
        let mut delay = InstantDelay;
        store.load(&mut delay);

        store.current_mut().threshold = 99;
        store.current_mut().trigger_mode = TriggerMode::PiezoOnly;
        store.save(&mut delay);

        // Clobber the in-memory copy, then reload from storage.
        store.current_mut().threshold = 1;
        assert!(!store.load(&mut delay));
        assert_eq!(store.current().threshold, 99);
        assert_eq!(store.current().trigger_mode, TriggerMode::PiezoOnly);
    }

    #[test]
    fn test_corrupt_storage_restores_defaults() {
        let mut storage = RamStorage::blank();
        let mut good = Settings::default();
        good.threshold = 77;
        let mut block = good.to_block();
        storage.write_block(&block);
        block[2] ^= 0x80;
        storage.write_block(&block);

        let mut store = SettingsStore::new(storage);
        let mut delay = InstantDelay;
        assert!(store.load(&mut delay));
        assert_eq!(store.current().threshold, Settings::DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_reset_defaults_persists() {
        let mut store = SettingsStore::new(RamStorage::blank());
        let mut delay = InstantDelay;
        store.load(&mut delay);

        store.current_mut().threshold = 5;
        store.save(&mut delay);
        store.reset_defaults(&mut delay);

        assert!(!store.load(&mut delay));
        assert_eq!(*store.current(), Settings::default());
    }
}
