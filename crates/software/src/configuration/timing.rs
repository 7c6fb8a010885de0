use embassy_time::Duration;

/// Intervals governing input handling and indicator animation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// Minimum pause between two iterations of a polling loop, letting the other tasks run.
    pub yield_interval: Duration,
    /// Settle time after a button edge before its state is sampled again.
    pub debounce: Duration,
    /// How long the zimbel button must be held to enter program mode.
    pub program_hold: Duration,
    /// How long the prepare button must be held to play the hymn.
    pub hymn_hold: Duration,
    /// Half period of the zimbel indicator while in program mode.
    pub blink_interval: Duration,
    /// How long program mode waits for a message to capture.
    pub program_timeout: Duration,
    /// Interval between keep-alive bytes on the star bus while running.
    pub star_keep_alive: Duration,
    /// How long the star board waits for a keep-alive before it stops the motor.
    pub star_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            yield_interval: Duration::from_millis(1),
            debounce: Duration::from_millis(100),
            program_hold: Duration::from_millis(1500),
            hymn_hold: Duration::from_secs(10),
            blink_interval: Duration::from_millis(200),
            program_timeout: Duration::from_secs(10),
            star_keep_alive: Duration::from_millis(100),
            star_timeout: Duration::from_millis(500),
        }
    }
}
