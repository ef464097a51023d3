//! Traits the board support package provides to the firmware core
//!
//! The digital pins and the persistence delay already come from
//! `embedded-hal`. These two traits cover what it does not model: byte
//! addressable non-volatile storage for the settings block, and masking
//! of the interrupt sources while the main loop reads state the ISRs
//! write.

use piezotrig_core::Settings;

/// Non-volatile storage for the persistent settings block.
///
/// On the target this maps to the EEPROM peripheral; writes are expected
/// to block until the cell is programmed.
pub trait SettingsStorage {
    /// Read the settings block from its fixed location.
    fn read_block(&mut self) -> [u8; Settings::BLOCK_LEN];

    /// Write the settings block to its fixed location.
    fn write_block(&mut self, block: &[u8; Settings::BLOCK_LEN]);
}

/// Runs a closure with the interrupt sources masked.
///
/// The firmware core calls this around every main-loop read of state that
/// an interrupt handler mutates (clock, sample pipeline, trigger flag).
/// On the target this disables interrupts and restores the previous mask;
/// the single-threaded test implementation is a plain call.
pub trait CriticalSection {
    /// Execute `f` atomically with respect to the interrupt handlers.
    fn with<R>(&mut self, f: impl FnOnce() -> R) -> R;
}
