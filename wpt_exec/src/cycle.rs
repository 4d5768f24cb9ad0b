//! # Cyclic executive rate keeping
//!
//! Keeps the main loop running at the configured control rate: each cycle is
//! timed, and the remainder of the period is slept away. Overrunning cycles
//! are reported rather than compensated, the next cycle simply starts late.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::thread;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Fixed-rate ticker for the cyclic executive.
pub struct CycleTicker {
    period: Duration,
    cycle_start: Option<Instant>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CycleTicker {
    /// Create a ticker running at the given frequency.
    pub fn new(frequency_hz: f64) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / frequency_hz),
            cycle_start: None,
        }
    }

    /// Mark the start of a cycle.
    pub fn start_cycle(&mut self) {
        self.cycle_start = Some(Instant::now());
    }

    /// Sleep out the remainder of the current cycle.
    ///
    /// Returns the overrun duration if the cycle took longer than the period,
    /// in which case no sleep is performed.
    pub fn wait_remainder(&mut self) -> Option<Duration> {
        let start = match self.cycle_start.take() {
            Some(s) => s,
            None => return None,
        };

        let elapsed = start.elapsed();

        match self.period.checked_sub(elapsed) {
            Some(remainder) => {
                thread::sleep(remainder);
                None
            }
            None => Some(elapsed - self.period),
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
