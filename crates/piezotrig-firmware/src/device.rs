//! Device aggregate
//!
//! [`Device`] wires the clock, transport, signal pipeline, settings, and
//! trigger policy together behind two surfaces: the interrupt entry
//! points (one call per hardware event, no allocation, no error paths)
//! and [`poll`](Device::poll), the main-loop body. The board support
//! package supplies the pins, storage, delay, and interrupt masking as
//! type parameters, so the whole device runs against [`crate::sim`]
//! parts on a host.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use piezotrig_core::Settings;

use crate::acquisition::SignalAcquisition;
use crate::board::{CriticalSection, SettingsStorage};
use crate::clock::SystemClock;
use crate::dispatcher::dispatch;
use crate::settings::SettingsStore;
use crate::transport::BusTransport;
use crate::trigger::TriggerController;

/// Pin faults surfaced by the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError<PE, TE> {
    /// Reading the probe input failed
    Probe(PE),
    /// Driving the trigger output failed
    Trigger(TE),
}

impl<PE: fmt::Debug, TE: fmt::Debug> fmt::Display for DeviceError<PE, TE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Probe(e) => write!(f, "Probe pin error: {e:?}"),
            Self::Trigger(e) => write!(f, "Trigger pin error: {e:?}"),
        }
    }
}

/// The complete trigger board.
#[derive(Debug)]
pub struct Device<PROBE, TRIG, STORE, DELAY, CS> {
    probe: PROBE,
    trigger_pin: TRIG,
    settings: SettingsStore<STORE>,
    delay: DELAY,
    cs: CS,
    clock: SystemClock,
    transport: BusTransport,
    acquisition: SignalAcquisition,
    trigger: TriggerController,
}

impl<PROBE, TRIG, STORE, DELAY, CS> Device<PROBE, TRIG, STORE, DELAY, CS>
where
    PROBE: InputPin,
    TRIG: OutputPin,
    STORE: SettingsStorage,
    DELAY: DelayNs,
    CS: CriticalSection,
{
    /// Assemble a device from its board parts.
    pub fn new(probe: PROBE, trigger_pin: TRIG, storage: STORE, delay: DELAY, cs: CS) -> Self {
        Self {
            probe,
            trigger_pin,
            settings: SettingsStore::new(storage),
            delay,
            cs,
            clock: SystemClock::new(),
            transport: BusTransport::new(),
            acquisition: SignalAcquisition::new(),
            trigger: TriggerController::new(),
        }
    }

    /// Power-on initialization: release the output, load (or restore)
    /// settings, and start centerline calibration.
    ///
    /// Returns `true` when the stored settings were invalid and defaults
    /// were restored.
    ///
    /// # Errors
    ///
    /// Propagates a failure to release the trigger output.
    pub fn init(&mut self) -> Result<bool, TRIG::Error> {
        self.trigger_pin.set_low()?;
        let restored = self.settings.load(&mut self.delay);
        let acquisition = &mut self.acquisition;
        let settings = &self.settings;
        self.cs
            .with(|| acquisition.start_calibration(settings.current()));
        Ok(restored)
    }

    // ------------------------------------------------------------------
    // Interrupt entry points
    // ------------------------------------------------------------------

    /// Timer overflow. Interrupt context.
    pub fn on_tick(&mut self) {
        self.clock.tick();
    }

    /// Bus byte received. Interrupt context.
    pub fn on_byte_received(&mut self, byte: u8) {
        self.transport.on_byte_received(byte);
    }

    /// Bus byte clocked out. Interrupt context.
    pub fn on_byte_requested(&mut self) -> u8 {
        self.transport.on_byte_requested()
    }

    /// Bus fault flagged. Interrupt context.
    pub fn on_bus_error(&mut self) {
        self.transport.on_bus_error();
    }

    /// ADC conversion complete. Interrupt context.
    ///
    /// Returns the mux channel to arm for the next conversion.
    pub fn on_conversion_complete(&mut self, raw: u16) -> u8 {
        self.acquisition
            .on_conversion_complete(raw, self.settings.current())
    }

    // ------------------------------------------------------------------
    // Main loop
    // ------------------------------------------------------------------

    /// One pass of the main loop: handle at most one received frame,
    /// evaluate the trigger policy, and release an expired hold.
    ///
    /// # Errors
    ///
    /// Propagates pin faults; bus and settings problems are handled
    /// internally.
    pub fn poll(&mut self) -> Result<(), DeviceError<PROBE::Error, TRIG::Error>> {
        if let Some(frame) = self.transport.poll_frame() {
            dispatch(
                &frame,
                &mut self.settings,
                &mut self.acquisition,
                &mut self.transport,
                &mut self.delay,
                &mut self.cs,
            );
        }

        let acquisition = &mut self.acquisition;
        let clock = &self.clock;
        let (piezo, now) = self.cs.with(|| (acquisition.triggered(), clock.millis()));
        let probe = self.probe.is_high().map_err(DeviceError::Probe)?;

        let settings = self.settings.current();
        let mode = settings.trigger_mode;
        let debounce_ms = settings.debounce_ms;

        let eval = self.trigger.evaluate(mode, piezo, probe, now);
        if eval.assert {
            self.trigger_pin.set_high().map_err(DeviceError::Trigger)?;
        }
        if eval.consume_flag {
            let acquisition = &mut self.acquisition;
            self.cs.with(|| acquisition.clear_triggered());
        }

        if self.trigger.poll_expiry(now, debounce_ms) {
            self.trigger_pin.set_low().map_err(DeviceError::Trigger)?;
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Active configuration.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        self.settings.current()
    }

    /// Response bytes queued for the master.
    #[must_use]
    pub fn tx_pending(&self) -> usize {
        self.transport.tx_pending()
    }

    /// `true` while centerline calibration is running.
    #[must_use]
    pub fn is_calibrating(&self) -> bool {
        self.acquisition.is_calibrating()
    }

    /// Current trigger output state.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.trigger.is_asserted()
    }
}

// ============================================================================
// Tests
// ============================================================================
