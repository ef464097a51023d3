//! Trigger policy and the debounce hold
//!
//! The main loop feeds the controller two inputs per pass: the sticky
//! piezo deviation flag and the level of the external probe input. The
//! configured mode decides which combination fires. Once fired, the
//! output holds for the debounce duration; piezo events are one-shot and
//! cannot refire while the output is held, while the probe is level
//! sensitive and keeps restarting the hold as long as it stays active.

use piezotrig_core::TriggerMode;

/// Result of one policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    /// The output must be asserted now
    pub assert: bool,
    /// The piezo deviation flag was used and must be consumed
    pub consume_flag: bool,
}

/// Trigger output state machine.
#[derive(Debug, Clone, Default)]
pub struct TriggerController {
    asserted: bool,
    /// Millisecond timestamp of the most recent fire
    started_at: u32,
}

impl TriggerController {
    /// Create a released controller.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            asserted: false,
            started_at: 0,
        }
    }

    /// Apply the configured policy to the current inputs.
    ///
    /// `now` is the millisecond clock; a fire records it as the start of
    /// the debounce hold.
    pub fn evaluate(
        &mut self,
        mode: TriggerMode,
        piezo: bool,
        probe: bool,
        now: u32,
    ) -> Evaluation {
        let idle = !self.asserted;
        let fire = match mode {
            TriggerMode::PiezoOnly => piezo && idle,
            TriggerMode::PiezoVeto => piezo && idle && probe,
            TriggerMode::Capacitive => probe,
            TriggerMode::PiezoOrCapacitive => (piezo && idle) || probe,
        };

        if fire {
            self.asserted = true;
            self.started_at = now;
        }

        // The sticky flag is only consumed by the fire that used it. A
        // vetoed or held-off impact stays latched and fires later.
        Evaluation {
            assert: fire,
            consume_flag: fire && mode.uses_piezo(),
        }
    }

    /// Release the output once the debounce hold has elapsed.
    ///
    /// Returns `true` when the output transitioned to released. The
    /// comparison wraps, so a hold spanning the 32-bit millisecond
    /// rollover still expires on time.
    pub fn poll_expiry(&mut self, now: u32, debounce_ms: u16) -> bool {
        if self.asserted && now.wrapping_sub(self.started_at) >= u32::from(debounce_ms) {
            self.asserted = false;
            return true;
        }
        false
    }

    /// Current output state.
    #[must_use]
    pub const fn is_asserted(&self) -> bool {
        self.asserted
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_piezo_only_fires_and_holds() {
        let mut tc = TriggerController::new();
        let eval = tc.evaluate(TriggerMode::PiezoOnly, true, false, 100);
        assert!(eval.assert);
        assert!(eval.consume_flag);
        assert!(tc.is_asserted());

        // A second piezo event during the hold does not refire.
        let eval = tc.evaluate(TriggerMode::PiezoOnly, true, false, 120);
        assert!(!eval.assert);

        assert!(!tc.poll_expiry(249, 150));
        assert!(tc.poll_expiry(250, 150));
        assert!(!tc.is_asserted());
    }

    #[test]
    fn test_piezo_veto_requires_probe() {
        let mut tc = TriggerController::new();
        let eval = tc.evaluate(TriggerMode::PiezoVeto, true, false, 0);
        assert!(!eval.assert);
        // A vetoed impact stays latched.
        assert!(!eval.consume_flag);

        // It fires once the probe goes active, and only then is consumed.
        let eval = tc.evaluate(TriggerMode::PiezoVeto, true, true, 0);
        assert!(eval.assert);
        assert!(eval.consume_flag);
    }

    #[test]
    fn test_impact_during_hold_fires_after_expiry() {
        let mut tc = TriggerController::new();
        let eval = tc.evaluate(TriggerMode::PiezoOnly, true, false, 0);
        assert!(eval.assert);
        assert!(eval.consume_flag);

        // A second impact lands while the output is held: not consumed.
        let eval = tc.evaluate(TriggerMode::PiezoOnly, true, false, 50);
        assert!(!eval.assert);
        assert!(!eval.consume_flag);

        // Once the hold expires the latched impact fires.
        assert!(tc.poll_expiry(150, 150));
        let eval = tc.evaluate(TriggerMode::PiezoOnly, true, false, 151);
        assert!(eval.assert);
        assert!(eval.consume_flag);
    }

    #[test]
    fn test_capacitive_ignores_piezo_and_follows_level() {
        let mut tc = TriggerController::new();
        let eval = tc.evaluate(TriggerMode::Capacitive, true, false, 0);
        assert!(!eval.assert);
        assert!(!eval.consume_flag);

        let eval = tc.evaluate(TriggerMode::Capacitive, false, true, 10);
        assert!(eval.assert);

        // Probe held: the hold keeps restarting.
        tc.evaluate(TriggerMode::Capacitive, false, true, 100);
        assert!(!tc.poll_expiry(160, 150));
        assert!(tc.poll_expiry(250, 150));
    }

    #[test]
    fn test_either_mode_fires_on_each_source() {
        let mut tc = TriggerController::new();
        assert!(tc.evaluate(TriggerMode::PiezoOrCapacitive, true, false, 0).assert);
        tc.poll_expiry(200, 150);
        assert!(tc.evaluate(TriggerMode::PiezoOrCapacitive, false, true, 300).assert);
    }

    #[test]
    fn test_hold_spans_clock_rollover() {
        let mut tc = TriggerController::new();
        let start = u32::MAX - 20;
        tc.evaluate(TriggerMode::PiezoOnly, true, false, start);

        assert!(!tc.poll_expiry(u32::MAX, 150));
        assert!(!tc.poll_expiry(100, 150)); // 121 ms elapsed
        assert!(tc.poll_expiry(129, 150)); // 150 ms elapsed
    }

    #[test]
    fn test_zero_debounce_releases_immediately() {
        let mut tc = TriggerController::new();
        tc.evaluate(TriggerMode::PiezoOnly, true, false, 42);
        assert!(tc.poll_expiry(42, 0));
    }
}
