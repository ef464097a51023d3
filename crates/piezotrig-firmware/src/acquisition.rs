//! Four-channel signal pipeline: multiplexed sampling, filtering,
//! centerline calibration, and the deviation detector
//!
//! The ADC free-runs through the four piezo channels via an analog mux.
//! Because the mux selection written during one conversion only takes
//! effect for the next, a completed conversion always belongs to the
//! channel armed one step earlier; the conversion handler accounts for
//! that lag and returns the next channel to arm.
//!
//! Each channel runs an exponential moving average
//! `y = y * (1 - alpha) + x * alpha`. During calibration raw samples are
//! summed instead and the per-channel mean becomes the centerline. Once
//! armed, a filtered value deviating from the centerline by more than the
//! threshold latches the trigger flag, which stays set until the main
//! loop consumes it.

use piezotrig_core::{Settings, CHANNEL_COUNT};

/// Per-channel sample state.
#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    raw: u16,
    average: f32,
    centerline: f32,
}

/// Acquisition state shared between the conversion interrupt and the
/// main loop.
#[derive(Debug, Default)]
pub struct SignalAcquisition {
    channels: [ChannelState; CHANNEL_COUNT],
    /// Wide enough for u32::MAX samples of full-scale input
    accumulators: [u64; CHANNEL_COUNT],
    /// Calibration cycles (one sample per channel) still to run
    remaining_cycles: u32,
    /// Total cycles of the calibration in progress
    total_cycles: u32,
    /// Samples seen in the current mux rotation, 0..4
    sample_in_cycle: u8,
    /// Channel whose conversion is currently in flight
    armed: u8,
    triggered: bool,
}

impl SignalAcquisition {
    /// Create an idle pipeline with zeroed centerlines.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            channels: [ChannelState {
                raw: 0,
                average: 0.0,
                centerline: 0.0,
            }; CHANNEL_COUNT],
            accumulators: [0; CHANNEL_COUNT],
            remaining_cycles: 0,
            total_cycles: 0,
            sample_in_cycle: 0,
            armed: 0,
            triggered: false,
        }
    }

    /// A conversion finished with result `raw`. Interrupt context.
    ///
    /// Returns the channel index to arm for the next conversion.
    pub fn on_conversion_complete(&mut self, raw: u16, settings: &Settings) -> u8 {
        let ch = usize::from(self.armed);
        self.armed = (self.armed + 1) & 0b11;

        self.channels[ch].raw = raw;

        if self.remaining_cycles > 0 {
            self.accumulators[ch] += u64::from(raw);
            self.sample_in_cycle += 1;
            // Count whole rotations so every channel gets the same number
            // of samples regardless of which channel calibration started on.
            if usize::from(self.sample_in_cycle) == CHANNEL_COUNT {
                self.sample_in_cycle = 0;
                self.remaining_cycles -= 1;
                if self.remaining_cycles == 0 {
                    self.finish_calibration();
                }
            }
        } else {
            let sample = f32::from(raw);
            let state = &mut self.channels[ch];
            state.average = state.average * (1.0 - settings.alpha) + sample * settings.alpha;

            let deviation = if state.average > state.centerline {
                state.average - state.centerline
            } else {
                state.centerline - state.average
            };
            #[allow(clippy::cast_precision_loss)]
            if deviation > settings.threshold as f32 {
                self.triggered = true;
            }
        }

        self.armed
    }

    /// Begin (re)learning the centerlines. Call under a critical section.
    ///
    /// Clears a pending trigger flag; a configured sample count of zero
    /// leaves the pipeline armed with its current centerlines.
    pub fn start_calibration(&mut self, settings: &Settings) {
        if settings.calibration_samples == 0 {
            return;
        }
        self.accumulators = [0; CHANNEL_COUNT];
        for state in &mut self.channels {
            state.average = 0.0;
            state.centerline = 0.0;
        }
        self.remaining_cycles = settings.calibration_samples;
        self.total_cycles = settings.calibration_samples;
        self.sample_in_cycle = 0;
        self.triggered = false;
    }

    fn finish_calibration(&mut self) {
        #[allow(clippy::cast_precision_loss)]
        let count = self.total_cycles as f32;
        for (state, &sum) in self.channels.iter_mut().zip(self.accumulators.iter()) {
            #[allow(clippy::cast_precision_loss)]
            let mean = sum as f32 / count;
            state.centerline = mean;
            // Seed the filter at the centerline so the armed pipeline
            // starts from a known-quiet state.
            state.average = mean;
        }
        self.accumulators = [0; CHANNEL_COUNT];
    }

    /// `true` while centerlines are still being learned.
    #[must_use]
    pub const fn is_calibrating(&self) -> bool {
        self.remaining_cycles > 0
    }

    /// Sticky deviation flag. Set in interrupt context, cleared by the
    /// main loop after the trigger policy consumed it.
    #[must_use]
    pub const fn triggered(&self) -> bool {
        self.triggered
    }

    /// Consume the deviation flag.
    pub fn clear_triggered(&mut self) {
        self.triggered = false;
    }

    /// Channel whose conversion is in flight.
    #[must_use]
    pub const fn armed_channel(&self) -> u8 {
        self.armed
    }

    /// Latest raw ADC counts per channel.
    #[must_use]
    pub fn raw_values(&self) -> [u16; CHANNEL_COUNT] {
        let mut out = [0u16; CHANNEL_COUNT];
        for (o, state) in out.iter_mut().zip(self.channels.iter()) {
            *o = state.raw;
        }
        out
    }

    /// Filtered averages per channel.
    #[must_use]
    pub fn averages(&self) -> [f32; CHANNEL_COUNT] {
        let mut out = [0f32; CHANNEL_COUNT];
        for (o, state) in out.iter_mut().zip(self.channels.iter()) {
            *o = state.average;
        }
        out
    }
}

// ============================================================================
// Tests
// ============================================================================
