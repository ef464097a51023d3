//! Millisecond system clock driven by a timer-overflow interrupt
//!
//! The timebase is an 8-bit timer free-running at the CPU clock over a
//! /64 prescaler: at 16 MHz one overflow arrives every 1024 us. Each tick
//! adds one whole millisecond plus a 3/125 ms fractional remainder, which
//! is carried so the clock stays exact over time (125 ticks = 128 ms).

/// Microseconds between timer overflows.
pub const TICK_MICROS: u32 = 1024;

/// Whole milliseconds accumulated per tick.
pub const MILLIS_PER_TICK: u32 = 1;

/// Fractional numerator accumulated per tick.
pub const FRACT_PER_TICK: u32 = 3;

/// Fractional denominator; a carry adds one extra millisecond.
pub const FRACT_MAX: u32 = 125;

/// Monotonic wrapping clock, advanced from the overflow interrupt and
/// read by the main loop under a critical section.
#[derive(Debug, Clone, Default)]
pub struct SystemClock {
    millis: u32,
    fract: u32,
    overflows: u32,
}

impl SystemClock {
    /// Create a clock at time zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            millis: 0,
            fract: 0,
            overflows: 0,
        }
    }

    /// Advance by one timer overflow. Interrupt context.
    #[inline]
    pub fn tick(&mut self) {
        self.overflows = self.overflows.wrapping_add(1);

        let mut millis = MILLIS_PER_TICK;
        self.fract += FRACT_PER_TICK;
        if self.fract >= FRACT_MAX {
            self.fract -= FRACT_MAX;
            millis += 1;
        }
        self.millis = self.millis.wrapping_add(millis);
    }

    /// Milliseconds since startup, wrapping at `u32::MAX`.
    ///
    /// Callers compare timestamps with `wrapping_sub` so the rollover
    /// after ~49.7 days is harmless.
    #[must_use]
    pub const fn millis(&self) -> u32 {
        self.millis
    }

    /// Microseconds since startup at tick granularity (multiples of 1024).
    #[must_use]
    pub const fn micros(&self) -> u32 {
        self.overflows.wrapping_mul(TICK_MICROS)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fractional_carry_is_exact() {
        let mut clock = SystemClock::new();
        // 1000 ticks of 1024 us each is exactly 1024 ms.
        for _ in 0..1000 {
            clock.tick();
        }
        assert_eq!(clock.millis(), 1024);
        assert_eq!(clock.micros(), 1_024_000);
    }

    #[test]
    fn test_carry_cycle() {
        let mut clock = SystemClock::new();
        // 125 ticks carry three extra milliseconds: 125 + 3 = 128 ms.
        for _ in 0..125 {
            clock.tick();
        }
        assert_eq!(clock.millis(), 128);
    }

    #[test]
    fn test_millis_granularity() {
        let mut clock = SystemClock::new();
        clock.tick();
        // A single tick may report 1 or 2 ms, never 0.
        assert!(clock.millis() >= 1);
        assert_eq!(clock.micros(), TICK_MICROS);
    }
}
