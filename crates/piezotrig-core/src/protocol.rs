//! Wire protocol for the trigger board bus
//!
//! The board answers a bus master over a two-wire serial bus using framed
//! byte packets. The format is self-synchronizing and error-detecting:
//!
//! ```text
//! +0..3   sync pattern  AA 55 AA 55
//! +4      opcode        (never 0xAA - used to qualify the sync match)
//! +5      length        counts opcode + length + payload (payload + 2)
//! +6..    payload       length - 2 bytes
//! last    checksum      XOR such that opcode ^ .. ^ checksum == 0
//! ```
//!
//! Requests and responses are framed identically, so one scanner serves
//! both directions. The checksum deliberately excludes the sync pattern,
//! which may repeat indefinitely on a noisy bus.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

// ============================================================================
// Frame constants
// ============================================================================

/// Frame synchronization pattern.
pub const SYNC: [u8; 4] = [0xAA, 0x55, 0xAA, 0x55];

/// Length of the sync pattern in bytes.
pub const SYNC_LEN: usize = SYNC.len();

/// Fixed bytes per frame: sync + opcode + length + checksum.
pub const FRAME_OVERHEAD: usize = SYNC_LEN + 3;

/// Largest whole frame; bounded by what a 64-byte ring buffer can hold.
pub const MAX_FRAME: usize = 63;

/// Largest payload a frame can carry.
pub const MAX_PAYLOAD: usize = MAX_FRAME - FRAME_OVERHEAD;

/// Minimum value of the length byte (opcode + length, empty payload).
pub const MIN_LENGTH_FIELD: u8 = 2;

// ============================================================================
// Opcodes
// ============================================================================

/// Command opcodes understood by the board.
///
/// Unknown opcodes are silently ignored; there is no error response.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    /// Read the 16-byte board identifier plus the firmware version byte
    GetIdAndVersion = 0x01,
    /// Read the deviation threshold (1 byte)
    GetThreshold = 0x02,
    /// Set the deviation threshold (1 byte)
    SetThreshold = 0x03,
    /// Read the four raw ADC counts (4 x u16 little-endian)
    ReadCurrentValues = 0x04,
    /// Read the four filtered averages (4 x u16 little-endian)
    ReadCurrentAverages = 0x05,
    /// Set the trigger mode (1 byte, 0..3)
    SetTriggerMode = 0x06,
    /// Read the trigger mode (1 byte, 0..3)
    GetTriggerMode = 0x07,
    /// Revert to compiled defaults, persist, and restart calibration
    Reset = 0x08,
    /// Restart centerline calibration only
    Recalibrate = 0x09,
    /// Persist the current settings (caller must wait before the next command)
    StoreSettings = 0x0A,
    /// Read the filter alpha as a percentage (1 byte, 0-100)
    GetAlpha = 0x0B,
    /// Set the filter alpha as a percentage (1 byte, clamped to 100)
    SetAlpha = 0x0C,
}

impl Opcode {
    /// Try to convert a byte to an opcode.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::GetIdAndVersion),
            0x02 => Some(Self::GetThreshold),
            0x03 => Some(Self::SetThreshold),
            0x04 => Some(Self::ReadCurrentValues),
            0x05 => Some(Self::ReadCurrentAverages),
            0x06 => Some(Self::SetTriggerMode),
            0x07 => Some(Self::GetTriggerMode),
            0x08 => Some(Self::Reset),
            0x09 => Some(Self::Recalibrate),
            0x0A => Some(Self::StoreSettings),
            0x0B => Some(Self::GetAlpha),
            0x0C => Some(Self::SetAlpha),
            _ => None,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Opcode {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::GetIdAndVersion => defmt::write!(f, "GetIdAndVersion"),
            Self::GetThreshold => defmt::write!(f, "GetThreshold"),
            Self::SetThreshold => defmt::write!(f, "SetThreshold"),
            Self::ReadCurrentValues => defmt::write!(f, "ReadCurrentValues"),
            Self::ReadCurrentAverages => defmt::write!(f, "ReadCurrentAverages"),
            Self::SetTriggerMode => defmt::write!(f, "SetTriggerMode"),
            Self::GetTriggerMode => defmt::write!(f, "GetTriggerMode"),
            Self::Reset => defmt::write!(f, "Reset"),
            Self::Recalibrate => defmt::write!(f, "Recalibrate"),
            Self::StoreSettings => defmt::write!(f, "StoreSettings"),
            Self::GetAlpha => defmt::write!(f, "GetAlpha"),
            Self::SetAlpha => defmt::write!(f, "SetAlpha"),
        }
    }
}

// ============================================================================
// Checksum
// ============================================================================

/// XOR all bytes together.
#[must_use]
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Total on-wire size of a frame carrying `payload_len` bytes.
#[must_use]
pub const fn frame_len(payload_len: usize) -> usize {
    payload_len + FRAME_OVERHEAD
}

// ============================================================================
// Encode / parse
// ============================================================================

/// Encode a complete frame into `out`.
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// Returns [`ProtocolError::PayloadTooLarge`] when the payload exceeds
/// [`MAX_PAYLOAD`] and [`ProtocolError::BufferOverflow`] when `out` cannot
/// hold the frame.
pub fn encode_frame(opcode: u8, payload: &[u8], out: &mut [u8]) -> Result<usize, ProtocolError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(ProtocolError::PayloadTooLarge {
            length: payload.len(),
            maximum: MAX_PAYLOAD,
        });
    }

    let total = frame_len(payload.len());
    if out.len() < total {
        return Err(ProtocolError::BufferOverflow {
            required: total,
            available: out.len(),
        });
    }

    let length = (payload.len() + 2) as u8;

    out[..SYNC_LEN].copy_from_slice(&SYNC);
    out[SYNC_LEN] = opcode;
    out[SYNC_LEN + 1] = length;
    out[SYNC_LEN + 2..SYNC_LEN + 2 + payload.len()].copy_from_slice(payload);
    out[total - 1] = opcode ^ length ^ xor_checksum(payload);

    Ok(total)
}

/// Parse one complete frame starting at `buf[0]`.
///
/// Returns the opcode byte and a view of the payload. This is the
/// host/test-side decoder; the firmware scans frames in place inside its
/// receive ring buffer instead.
///
/// # Errors
///
/// Returns [`ProtocolError::IncompletePacket`] when bytes are missing,
/// [`ProtocolError::BadSync`] / [`ProtocolError::BadLength`] on a
/// malformed header, and [`ProtocolError::ChecksumMismatch`] when the XOR
/// over opcode..checksum is non-zero.
pub fn parse_frame(buf: &[u8]) -> Result<(u8, &[u8]), ProtocolError> {
    if buf.len() < FRAME_OVERHEAD {
        return Err(ProtocolError::IncompletePacket {
            received: buf.len(),
            expected: FRAME_OVERHEAD,
        });
    }

    for (offset, (&got, &want)) in buf.iter().zip(SYNC.iter()).enumerate() {
        if got != want {
            return Err(ProtocolError::BadSync {
                offset: offset as u8,
                got,
            });
        }
    }

    let length = buf[SYNC_LEN + 1];
    if length < MIN_LENGTH_FIELD {
        return Err(ProtocolError::BadLength { length });
    }

    let total = SYNC_LEN + usize::from(length) + 1;
    if buf.len() < total {
        return Err(ProtocolError::IncompletePacket {
            received: buf.len(),
            expected: total,
        });
    }

    let residue = xor_checksum(&buf[SYNC_LEN..total]);
    if residue != 0 {
        return Err(ProtocolError::ChecksumMismatch { residue });
    }

    let opcode = buf[SYNC_LEN];
    let payload = &buf[SYNC_LEN + 2..total - 1];
    Ok((opcode, payload))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_bytes() {
        let mut buf = [0u8; MAX_FRAME];
        let n = encode_frame(Opcode::SetThreshold as u8, &[0x07], &mut buf).unwrap();
        // opcode 0x03, length 0x03, payload 0x07, checksum 03^03^07 = 07
        assert_eq!(&buf[..n], &[0xAA, 0x55, 0xAA, 0x55, 0x03, 0x03, 0x07, 0x07]);
    }

    #[test]
    fn test_round_trip_all_payload_lengths() {
        let mut payload = [0u8; MAX_PAYLOAD];
        for (i, b) in payload.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(31).wrapping_add(5);
        }

        for len in 0..=MAX_PAYLOAD {
            let mut buf = [0u8; MAX_FRAME];
            let n = encode_frame(0x04, &payload[..len], &mut buf).unwrap();
            assert_eq!(n, frame_len(len));

            let (opcode, parsed) = parse_frame(&buf[..n]).unwrap();
            assert_eq!(opcode, 0x04);
            assert_eq!(parsed, &payload[..len]);
        }
    }

    #[test]
    fn test_payload_too_large() {
        let payload = [0u8; MAX_PAYLOAD + 1];
        let mut buf = [0u8; 128];
        let result = encode_frame(0x01, &payload, &mut buf);
        assert!(matches!(result, Err(ProtocolError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_encode_into_short_buffer() {
        let mut buf = [0u8; 6];
        let result = encode_frame(0x01, &[], &mut buf);
        assert!(matches!(result, Err(ProtocolError::BufferOverflow { .. })));
    }

    #[test]
    fn test_single_byte_mutation_is_detected() {
        let mut buf = [0u8; MAX_FRAME];
        let n = encode_frame(0x05, &[0x11, 0x22, 0x33], &mut buf).unwrap();

        // Flipping any bit in the checksummed region must fail the parse.
        // A corrupt length byte may surface as a truncation instead of a
        // checksum residue; either way the frame is rejected.
        for i in SYNC_LEN..n {
            let mut corrupted = buf;
            corrupted[i] ^= 0x40;
            let result = parse_frame(&corrupted[..n]);
            if i == SYNC_LEN + 1 {
                assert!(result.is_err(), "mutated length at offset {i} was accepted");
            } else {
                assert!(
                    matches!(result, Err(ProtocolError::ChecksumMismatch { .. })),
                    "mutation at offset {i} was not detected"
                );
            }
        }
    }

    #[test]
    fn test_bad_sync() {
        let mut buf = [0u8; MAX_FRAME];
        let n = encode_frame(0x02, &[], &mut buf).unwrap();
        buf[2] = 0x00;
        let result = parse_frame(&buf[..n]);
        assert!(matches!(result, Err(ProtocolError::BadSync { offset: 2, got: 0x00 })));
    }

    #[test]
    fn test_incomplete_frame() {
        let mut buf = [0u8; MAX_FRAME];
        let n = encode_frame(0x05, &[0x11, 0x22, 0x33], &mut buf).unwrap();
        let result = parse_frame(&buf[..n - 1]);
        assert!(matches!(result, Err(ProtocolError::IncompletePacket { .. })));
    }

    #[test]
    fn test_bad_length_field() {
        let buf = [0xAA, 0x55, 0xAA, 0x55, 0x02, 0x01, 0x03];
        let result = parse_frame(&buf);
        assert!(matches!(result, Err(ProtocolError::BadLength { length: 1 })));
    }

    #[test]
    fn test_opcode_from_byte() {
        assert_eq!(Opcode::from_byte(0x01), Some(Opcode::GetIdAndVersion));
        assert_eq!(Opcode::from_byte(0x0C), Some(Opcode::SetAlpha));
        assert_eq!(Opcode::from_byte(0x0D), None);
        assert_eq!(Opcode::from_byte(0x00), None);
        assert_eq!(Opcode::from_byte(0xAA), None);
    }

    #[test]
    fn test_xor_checksum() {
        assert_eq!(xor_checksum(&[]), 0);
        assert_eq!(xor_checksum(&[0x01, 0x02, 0x03]), 0x01 ^ 0x02 ^ 0x03);
    }
}
