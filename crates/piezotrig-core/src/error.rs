//! Error types for the piezo trigger board
//!
//! All errors work in `no_std` environments and carry enough context for
//! debugging without heap allocation. Note that the firmware never reports
//! errors over the bus - there is no error opcode. Transport errors are
//! consumed locally by resynchronization and the bus master infers failure
//! from its response timeout.

use core::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Protocol Errors
// ============================================================================

/// Errors in the wire protocol codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolError {
    /// A sync byte did not match the expected pattern
    BadSync {
        /// Offset within the sync pattern (0..4)
        offset: u8,
        /// The byte that was found there
        got: u8,
    },
    /// Length byte below the minimum of 2 (it counts opcode and itself)
    BadLength {
        /// The length byte that was received
        length: u8,
    },
    /// XOR over opcode..checksum did not come out zero
    ChecksumMismatch {
        /// The non-zero XOR residue
        residue: u8,
    },
    /// Payload exceeds what a frame can carry
    PayloadTooLarge {
        /// Requested payload length
        length: usize,
        /// Maximum allowed payload length
        maximum: usize,
    },
    /// Destination buffer too small for the frame
    BufferOverflow {
        /// Required size in bytes
        required: usize,
        /// Available size in bytes
        available: usize,
    },
    /// Not enough bytes for a complete frame
    IncompletePacket {
        /// Bytes received
        received: usize,
        /// Bytes expected
        expected: usize,
    },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadSync { offset, got } => {
                write!(f, "Bad sync byte at offset {offset}: 0x{got:02X}")
            }
            Self::BadLength { length } => {
                write!(f, "Invalid length byte: {length} (minimum 2)")
            }
            Self::ChecksumMismatch { residue } => {
                write!(f, "Checksum mismatch: residue 0x{residue:02X}")
            }
            Self::PayloadTooLarge { length, maximum } => {
                write!(f, "Payload too large: {length} bytes (max {maximum})")
            }
            Self::BufferOverflow { required, available } => {
                write!(f, "Buffer overflow: need {required} bytes, have {available}")
            }
            Self::IncompletePacket { received, expected } => {
                write!(f, "Incomplete frame: got {received}/{expected} bytes")
            }
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ProtocolError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::BadSync { offset, got } => {
                defmt::write!(f, "Bad sync @{}: {:02X}", offset, got);
            }
            Self::BadLength { length } => {
                defmt::write!(f, "Bad length: {}", length);
            }
            Self::ChecksumMismatch { residue } => {
                defmt::write!(f, "Checksum residue: {:02X}", residue);
            }
            Self::PayloadTooLarge { length, maximum } => {
                defmt::write!(f, "Payload: {} > {}", length, maximum);
            }
            Self::BufferOverflow { required, available } => {
                defmt::write!(f, "Overflow: {} > {}", required, available);
            }
            Self::IncompletePacket { received, expected } => {
                defmt::write!(f, "Incomplete: {}/{}", received, expected);
            }
        }
    }
}

// ============================================================================
// Settings Errors
// ============================================================================

/// Errors validating the persistent settings block.
///
/// The firmware recovers from all of these by reverting to compiled
/// defaults and immediately re-persisting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingsError {
    /// Stored XOR checksum does not match the block contents
    ChecksumMismatch {
        /// Checksum recomputed over the block
        computed: u8,
        /// Checksum stored in the block
        stored: u8,
    },
    /// Stored negated checksum does not match the complement
    NegatedChecksumMismatch {
        /// Complemented checksum recomputed over the block
        computed: u8,
        /// Negated checksum stored in the block
        stored: u8,
    },
    /// Trigger-mode byte outside the known encoding (0..3)
    InvalidMode {
        /// The mode byte that was stored
        value: u8,
    },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChecksumMismatch { computed, stored } => {
                write!(f, "Settings checksum mismatch: computed 0x{computed:02X}, stored 0x{stored:02X}")
            }
            Self::NegatedChecksumMismatch { computed, stored } => {
                write!(
                    f,
                    "Settings negated checksum mismatch: computed 0x{computed:02X}, stored 0x{stored:02X}"
                )
            }
            Self::InvalidMode { value } => {
                write!(f, "Invalid trigger mode in settings: 0x{value:02X}")
            }
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SettingsError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::ChecksumMismatch { computed, stored } => {
                defmt::write!(f, "Settings checksum: {:02X} != {:02X}", computed, stored);
            }
            Self::NegatedChecksumMismatch { computed, stored } => {
                defmt::write!(f, "Settings ~checksum: {:02X} != {:02X}", computed, stored);
            }
            Self::InvalidMode { value } => {
                defmt::write!(f, "Bad mode: {:02X}", value);
            }
        }
    }
}
