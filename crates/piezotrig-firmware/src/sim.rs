//! In-memory board parts for host tests and demos
//!
//! Everything here is `no_std` and allocation free. Pins are backed by a
//! shared [`Latch`] cell so test code can flip the probe input and watch
//! the trigger output while the device owns the pin halves; storage is a
//! RAM image that starts erased like a blank EEPROM.

use core::cell::Cell;
use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use piezotrig_core::Settings;

use crate::board::{CriticalSection, SettingsStorage};

/// A shared boolean signal line.
#[derive(Debug, Default)]
pub struct Latch(Cell<bool>);

impl Latch {
    /// Create a latch in the low state.
    #[must_use]
    pub const fn new() -> Self {
        Self(Cell::new(false))
    }

    /// Drive the line.
    pub fn set(&self, high: bool) {
        self.0.set(high);
    }

    /// Read the line.
    #[must_use]
    pub fn get(&self) -> bool {
        self.0.get()
    }
}

/// Input pin reading a [`Latch`].
#[derive(Debug)]
pub struct SimProbe<'a>(&'a Latch);

impl<'a> SimProbe<'a> {
    /// Attach to a signal line.
    #[must_use]
    pub const fn new(latch: &'a Latch) -> Self {
        Self(latch)
    }
}

impl ErrorType for SimProbe<'_> {
    type Error = Infallible;
}

impl InputPin for SimProbe<'_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.get())
    }
}

/// Output pin driving a [`Latch`].
#[derive(Debug)]
pub struct SimTriggerPin<'a>(&'a Latch);

impl<'a> SimTriggerPin<'a> {
    /// Attach to a signal line.
    #[must_use]
    pub const fn new(latch: &'a Latch) -> Self {
        Self(latch)
    }
}

impl ErrorType for SimTriggerPin<'_> {
    type Error = Infallible;
}

impl OutputPin for SimTriggerPin<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set(true);
        Ok(())
    }
}

/// Settings storage over a RAM image.
#[derive(Debug, Clone)]
pub struct RamStorage {
    block: [u8; Settings::BLOCK_LEN],
}

impl RamStorage {
    /// An erased image, reading as all `0xFF` like blank EEPROM.
    #[must_use]
    pub const fn blank() -> Self {
        Self {
            block: [0xFF; Settings::BLOCK_LEN],
        }
    }
}

impl SettingsStorage for RamStorage {
    fn read_block(&mut self) -> [u8; Settings::BLOCK_LEN] {
        self.block
    }

    fn write_block(&mut self, block: &[u8; Settings::BLOCK_LEN]) {
        self.block = *block;
    }
}

/// Delay provider that returns immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantDelay;

impl DelayNs for InstantDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Critical section for single-threaded hosts: a plain call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleThread;

impl CriticalSection for SingleThread {
    fn with<R>(&mut self, f: impl FnOnce() -> R) -> R {
        f()
    }
}
