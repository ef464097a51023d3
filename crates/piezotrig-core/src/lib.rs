//! Piezotrig Core - `no_std` compatible protocol and configuration primitives
//!
//! This crate provides the foundation shared by the trigger-board firmware
//! and any host-side tooling: the wire protocol spoken over the two-wire
//! bus, the persistent settings block, and the bounded byte buffers the
//! transport is built on. It carries no hardware dependencies and is fully
//! unit-testable on the host.
//!
//! # Modules
//!
//! - [`types`]: trigger modes, settings block, device identity
//! - [`error`]: error types for the protocol and settings codec
//! - [`protocol`]: wire frame format (sync, opcodes, XOR checksum)
//! - [`ringbuf`]: fixed-capacity byte ring buffer
//!
//! # Features
//!
//! - `std`: Enable standard library support
//! - `defmt`: Enable `defmt` formatting for embedded logging
//!
//! # Example
//!
//! ```rust
//! use piezotrig_core::protocol::{self, Opcode};
//!
//! // Frame a GetThreshold request the way a bus master would.
//! let mut buf = [0u8; protocol::MAX_FRAME];
//! let n = protocol::encode_frame(Opcode::GetThreshold as u8, &[], &mut buf).unwrap();
//! assert_eq!(&buf[..n], &[0xAA, 0x55, 0xAA, 0x55, 0x02, 0x02, 0x00]);
//!
//! let (opcode, payload) = protocol::parse_frame(&buf[..n]).unwrap();
//! assert_eq!(opcode, Opcode::GetThreshold as u8);
//! assert!(payload.is_empty());
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod protocol;
pub mod ringbuf;
pub mod types;

// Re-export commonly used items at the crate root
pub use error::{ProtocolError, SettingsError};
pub use protocol::Opcode;
pub use ringbuf::RingBuffer;
pub use types::{Settings, TriggerMode, CHANNEL_COUNT};
