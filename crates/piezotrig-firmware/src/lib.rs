//! Piezotrig Firmware - hardware-generic logic for the impact trigger board
//!
//! This crate contains everything the trigger-board firmware does above
//! the register level: the bus transport with its frame scanner, the
//! four-channel signal pipeline with centerline calibration, the trigger
//! policy with debounce, and the command dispatcher. Hardware access goes
//! through `embedded-hal` traits plus two small board traits, so the whole
//! stack runs unchanged against the in-memory parts in [`sim`] for host
//! testing.
//!
//! # Modules
//!
//! - [`board`]: traits the board support package must provide
//! - [`clock`]: millisecond clock fed by a timer-overflow interrupt
//! - [`transport`]: bus ring buffers and the receive frame scanner
//! - [`acquisition`]: multiplexed sampling, filtering, and calibration
//! - [`trigger`]: trigger policy evaluation and the debounce hold
//! - [`settings`]: persistent settings with default recovery
//! - [`dispatcher`]: command handling for received frames
//! - [`device`]: the aggregate tying the above together
//! - [`sim`]: in-memory trait implementations for tests and demos

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

#[cfg(test)]
extern crate std;

pub mod acquisition;
pub mod board;
pub mod clock;
pub mod device;
pub mod dispatcher;
pub mod settings;
pub mod sim;
pub mod transport;
pub mod trigger;

pub use acquisition::SignalAcquisition;
pub use board::{CriticalSection, SettingsStorage};
pub use clock::SystemClock;
pub use device::{Device, DeviceError};
pub use settings::SettingsStore;
pub use transport::{BusTransport, ReceivedFrame};
pub use trigger::TriggerController;
