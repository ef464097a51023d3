//! Core types for the piezo trigger board
//!
//! Trigger-mode policy encoding, the persistent settings block with its
//! dual-checksum codec, and the fixed device identity reported over the
//! bus.

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::protocol::xor_checksum;

// ============================================================================
// Device identity
// ============================================================================

/// Number of analog sense channels on the board.
pub const CHANNEL_COUNT: usize = 4;

/// Fixed 16-byte board identifier returned by `GetIdAndVersion`.
pub const DEVICE_ID: [u8; 16] = [
    0xca, 0x26, 0x13, 0x06, 0xd7, 0x64, 0x11, 0xeb, 0x94, 0x24, 0xb4, 0x99, 0xba, 0xdf, 0x00, 0xa1,
];

/// Firmware version byte appended to the identifier.
pub const DEVICE_VERSION: u8 = 0x01;

/// Bus slave address the board answers on.
pub const BUS_ADDRESS: u8 = 0x11;

// ============================================================================
// Trigger mode
// ============================================================================

/// Policy selecting which sensor source(s) may assert the trigger output.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TriggerMode {
    /// Piezo deviation fires only while the external probe is also active
    PiezoVeto = 0,
    /// Piezo deviation alone fires; the probe is ignored
    PiezoOnly = 1,
    /// Level-triggered purely by the external probe; piezos are ignored
    Capacitive = 2,
    /// Either source fires (failsafe fallback default)
    PiezoOrCapacitive = 3,
}

impl TriggerMode {
    /// Try to convert a wire byte to a trigger mode.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::PiezoVeto),
            1 => Some(Self::PiezoOnly),
            2 => Some(Self::Capacitive),
            3 => Some(Self::PiezoOrCapacitive),
            _ => None,
        }
    }

    /// `true` when this mode can fire from the piezo deviation flag.
    #[must_use]
    pub const fn uses_piezo(self) -> bool {
        matches!(self, Self::PiezoVeto | Self::PiezoOnly | Self::PiezoOrCapacitive)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TriggerMode {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::PiezoVeto => defmt::write!(f, "PiezoVeto"),
            Self::PiezoOnly => defmt::write!(f, "PiezoOnly"),
            Self::Capacitive => defmt::write!(f, "Capacitive"),
            Self::PiezoOrCapacitive => defmt::write!(f, "PiezoOrCapacitive"),
        }
    }
}

// ============================================================================
// Settings block
// ============================================================================

/// Board configuration, persisted as a checksummed block.
///
/// Block layout (little-endian, checksum bytes always last):
///
/// ```text
/// +0      trigger mode        1 byte
/// +1      threshold factor    u32
/// +5      filter alpha        f32
/// +9      calibration samples u32
/// +13     debounce length     u16, milliseconds
/// +15     XOR checksum        over bytes 0..15
/// +16     negated checksum    bitwise complement of the above
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Which sensor source(s) may assert the output
    pub trigger_mode: TriggerMode,
    /// ADC counts the filtered average must deviate from the centerline
    pub threshold: u32,
    /// Exponential filter coefficient in `[0, 1]`; 1 = no smoothing, 0 = frozen
    pub alpha: f32,
    /// Samples per channel used to learn the centerline
    pub calibration_samples: u32,
    /// Minimum output hold duration after firing, in milliseconds
    pub debounce_ms: u16,
}

impl Settings {
    /// Size of the persisted block in bytes.
    pub const BLOCK_LEN: usize = 17;

    /// Default trigger mode: fire on either source.
    pub const DEFAULT_TRIGGER_MODE: TriggerMode = TriggerMode::PiezoOrCapacitive;
    /// Default deviation threshold in ADC counts.
    pub const DEFAULT_THRESHOLD: u32 = 40;
    /// Default filter alpha.
    pub const DEFAULT_ALPHA: f32 = 0.25;
    /// Default centerline calibration length, samples per channel.
    pub const DEFAULT_CALIBRATION_SAMPLES: u32 = 1024;
    /// Default debounce pulse length in milliseconds.
    pub const DEFAULT_DEBOUNCE_MS: u16 = 150;

    /// Serialize into a persistable block, stamping both checksum bytes.
    #[must_use]
    pub fn to_block(&self) -> [u8; Self::BLOCK_LEN] {
        let mut block = [0u8; Self::BLOCK_LEN];

        block[0] = self.trigger_mode as u8;
        block[1..5].copy_from_slice(&self.threshold.to_le_bytes());
        block[5..9].copy_from_slice(&self.alpha.to_le_bytes());
        block[9..13].copy_from_slice(&self.calibration_samples.to_le_bytes());
        block[13..15].copy_from_slice(&self.debounce_ms.to_le_bytes());

        let checksum = xor_checksum(&block[..Self::BLOCK_LEN - 2]);
        block[Self::BLOCK_LEN - 2] = checksum;
        block[Self::BLOCK_LEN - 1] = !checksum;

        block
    }

    /// Deserialize and validate a persisted block.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] when either checksum fails or the
    /// trigger-mode byte is outside the known encoding. The caller is
    /// expected to recover by reverting to [`Settings::default`] and
    /// re-persisting.
    pub fn from_block(block: &[u8; Self::BLOCK_LEN]) -> Result<Self, SettingsError> {
        let computed = xor_checksum(&block[..Self::BLOCK_LEN - 2]);

        let stored = block[Self::BLOCK_LEN - 2];
        if computed != stored {
            return Err(SettingsError::ChecksumMismatch { computed, stored });
        }

        let stored = block[Self::BLOCK_LEN - 1];
        if !computed != stored {
            return Err(SettingsError::NegatedChecksumMismatch {
                computed: !computed,
                stored,
            });
        }

        let trigger_mode =
            TriggerMode::from_byte(block[0]).ok_or(SettingsError::InvalidMode { value: block[0] })?;

        // Slice-to-array conversions cannot fail on a fixed-size block.
        let le4 = |offset: usize| [block[offset], block[offset + 1], block[offset + 2], block[offset + 3]];

        Ok(Self {
            trigger_mode,
            threshold: u32::from_le_bytes(le4(1)),
            alpha: f32::from_le_bytes(le4(5)),
            calibration_samples: u32::from_le_bytes(le4(9)),
            debounce_ms: u16::from_le_bytes([block[13], block[14]]),
        })
    }

    /// Filter alpha as the 0-100 percentage used on the wire.
    #[must_use]
    pub fn alpha_percent(&self) -> u8 {
        (self.alpha * 100.0) as u8
    }

    /// Set the filter alpha from a wire percentage, clamping to 100.
    pub fn set_alpha_percent(&mut self, percent: u8) {
        let percent = percent.min(100);
        self.alpha = f32::from(percent) / 100.0;
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trigger_mode: Self::DEFAULT_TRIGGER_MODE,
            threshold: Self::DEFAULT_THRESHOLD,
            alpha: Self::DEFAULT_ALPHA,
            calibration_samples: Self::DEFAULT_CALIBRATION_SAMPLES,
            debounce_ms: Self::DEFAULT_DEBOUNCE_MS,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_mode_from_byte() {
        assert_eq!(TriggerMode::from_byte(0), Some(TriggerMode::PiezoVeto));
        assert_eq!(TriggerMode::from_byte(1), Some(TriggerMode::PiezoOnly));
        assert_eq!(TriggerMode::from_byte(2), Some(TriggerMode::Capacitive));
        assert_eq!(TriggerMode::from_byte(3), Some(TriggerMode::PiezoOrCapacitive));
        assert_eq!(TriggerMode::from_byte(4), None);
    }

    #[test]
    fn test_settings_block_round_trip() {
        let settings = Settings {
            trigger_mode: TriggerMode::PiezoVeto,
            threshold: 72,
            alpha: 0.5,
            calibration_samples: 256,
            debounce_ms: 40,
        };

        let block = settings.to_block();
        let parsed = Settings::from_block(&block).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_settings_checksum_bytes() {
        let block = Settings::default().to_block();
        let checksum = xor_checksum(&block[..Settings::BLOCK_LEN - 2]);
        assert_eq!(block[Settings::BLOCK_LEN - 2], checksum);
        assert_eq!(block[Settings::BLOCK_LEN - 1], !checksum);
    }

    #[test]
    fn test_corrupt_block_is_rejected() {
        let mut block = Settings::default().to_block();
        block[3] ^= 0x10;
        let result = Settings::from_block(&block);
        assert!(matches!(result, Err(SettingsError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_corrupt_negated_checksum_is_rejected() {
        let mut block = Settings::default().to_block();
        block[Settings::BLOCK_LEN - 1] = block[Settings::BLOCK_LEN - 1].wrapping_add(1);
        let result = Settings::from_block(&block);
        assert!(matches!(
            result,
            Err(SettingsError::NegatedChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_blank_storage_is_rejected() {
        // Erased EEPROM reads as all-0xFF; both checksums fail.
        let block = [0xFF; Settings::BLOCK_LEN];
        assert!(Settings::from_block(&block).is_err());
    }

    #[test]
    fn test_invalid_mode_byte_is_rejected() {
        let mut block = Settings::default().to_block();
        block[0] = 9;
        let checksum = xor_checksum(&block[..Settings::BLOCK_LEN - 2]);
        block[Settings::BLOCK_LEN - 2] = checksum;
        block[Settings::BLOCK_LEN - 1] = !checksum;

        let result = Settings::from_block(&block);
        assert!(matches!(result, Err(SettingsError::InvalidMode { value: 9 })));
    }

    #[test]
    fn test_alpha_percent_round_trip_and_clamp() {
        let mut settings = Settings::default();

        settings.set_alpha_percent(37);
        assert_eq!(settings.alpha_percent(), 37);

        settings.set_alpha_percent(250);
        assert_eq!(settings.alpha_percent(), 100);
        assert!((settings.alpha - 1.0).abs() < f32::EPSILON);

        settings.set_alpha_percent(0);
        assert_eq!(settings.alpha_percent(), 0);
    }
}
