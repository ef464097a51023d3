//! Command dispatch for received frames
//!
//! Responses echo the request opcode and are framed like requests, so
//! the master reuses one codec for both directions. There is no error
//! reply: unknown opcodes and short payloads are dropped, and the master
//! recovers by timeout. Getters answer immediately; setters mutate the
//! volatile settings only, so the master must issue `StoreSettings`
//! explicitly to persist.

use embedded_hal::delay::DelayNs;
use piezotrig_core::types::{DEVICE_ID, DEVICE_VERSION};
use piezotrig_core::{Opcode, TriggerMode, CHANNEL_COUNT};

use crate::acquisition::SignalAcquisition;
use crate::board::{CriticalSection, SettingsStorage};
use crate::settings::SettingsStore;
use crate::transport::{BusTransport, ReceivedFrame};

/// Handle one validated frame.
///
/// Response transmit failures are dropped: the TX ring only overflows
/// when the master stopped reading, and it will retry on timeout.
pub fn dispatch<S, D, C>(
    frame: &ReceivedFrame,
    settings: &mut SettingsStore<S>,
    acquisition: &mut SignalAcquisition,
    transport: &mut BusTransport,
    delay: &mut D,
    cs: &mut C,
) where
    S: SettingsStorage,
    D: DelayNs,
    C: CriticalSection,
{
    let Some(opcode) = Opcode::from_byte(frame.opcode) else {
        return;
    };

    match opcode {
        Opcode::GetIdAndVersion => {
            let mut payload = [0u8; DEVICE_ID.len() + 1];
            payload[..DEVICE_ID.len()].copy_from_slice(&DEVICE_ID);
            payload[DEVICE_ID.len()] = DEVICE_VERSION;
            let _ = transport.send_frame(frame.opcode, &payload);
        }

        Opcode::GetThreshold => {
            let threshold = settings.current().threshold.min(255) as u8;
            let _ = transport.send_frame(frame.opcode, &[threshold]);
        }

        Opcode::SetThreshold => {
            if let Some(&value) = frame.payload.first() {
                settings.current_mut().threshold = u32::from(value);
            }
        }

        Opcode::ReadCurrentValues => {
            let values = cs.with(|| acquisition.raw_values());
            let _ = transport.send_frame(frame.opcode, &pack_u16(&values));
        }

        Opcode::ReadCurrentAverages => {
            let averages = cs.with(|| acquisition.averages());
            let mut values = [0u16; CHANNEL_COUNT];
            for (v, avg) in values.iter_mut().zip(averages.iter()) {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                {
                    *v = *avg as u16;
                }
            }
            let _ = transport.send_frame(frame.opcode, &pack_u16(&values));
        }

        Opcode::SetTriggerMode => {
            if let Some(mode) = frame.payload.first().and_then(|&b| TriggerMode::from_byte(b)) {
                settings.current_mut().trigger_mode = mode;
            }
        }

        Opcode::GetTriggerMode => {
            let mode = settings.current().trigger_mode as u8;
            let _ = transport.send_frame(frame.opcode, &[mode]);
        }

        Opcode::Reset => {
            settings.reset_defaults(delay);
            cs.with(|| acquisition.start_calibration(settings.current()));
        }

        Opcode::Recalibrate => {
            cs.with(|| acquisition.start_calibration(settings.current()));
        }

        Opcode::StoreSettings => {
            settings.save(delay);
        }

        Opcode::GetAlpha => {
            let percent = settings.current().alpha_percent();
            let _ = transport.send_frame(frame.opcode, &[percent]);
        }

        Opcode::SetAlpha => {
            if let Some(&percent) = frame.payload.first() {
                settings.current_mut().set_alpha_percent(percent);
            }
        }
    }
}

fn pack_u16(values: &[u16; CHANNEL_COUNT]) -> [u8; CHANNEL_COUNT * 2] {
    let mut out = [0u8; CHANNEL_COUNT * 2];
    for (chunk, value) in out.chunks_exact_mut(2).zip(values.iter()) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
