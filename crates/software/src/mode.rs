//! The two operating modes and the window during which program mode waits for a message to capture.

use crate::configuration::Timing;
use embassy_time::{Duration, Instant};

/// Operating mode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Normal operation: pistons and organ messages start and stop the zimbelstern.
    #[default]
    Zimbel,
    /// The next capturable organ message becomes the trigger. The zimbel lamp blinks meanwhile.
    Program,
}

/// Time-keeping for a stay in [`Mode::Program`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProgramWindow {
    opened: Instant,
    blink_interval: Duration,
    timeout: Duration,
}

impl ProgramWindow {
    /// Opens a window at `now`.
    pub fn open(now: Instant, timing: &Timing) -> Self {
        Self {
            opened: now,
            blink_interval: timing.blink_interval,
            timeout: timing.program_timeout,
        }
    }

    /// Returns true once the window has been open for the whole timeout.
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.opened) >= self.timeout
    }

    /// Returns whether the blinking lamp is lit at `now`. The lamp is lit during the first interval.
    pub fn lamp_lit(&self, now: Instant) -> bool {
        let interval = self.blink_interval.as_ticks().max(1);
        (now.saturating_duration_since(self.opened).as_ticks() / interval) % 2 == 0
    }

    /// Returns the instant at which the window expires.
    pub fn expiry(&self) -> Instant {
        self.opened.saturating_add(self.timeout)
    }
}
