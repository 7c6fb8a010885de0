/// A second, quieter strike following each strike, imitating a clapper bouncing off its bell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Echo {
    /// Shortest delay, in milliseconds, between the end of a strike and its echo.
    pub min_delay_ms: u16,
    /// Longest delay, in milliseconds, between the end of a strike and its echo.
    pub max_delay_ms: u16,
    /// Solenoid on-time of the echo, in milliseconds.
    pub strike_ms: u16,
}

impl Default for Echo {
    fn default() -> Self {
        Self {
            min_delay_ms: 10,
            max_delay_ms: 30,
            strike_ms: 12,
        }
    }
}
