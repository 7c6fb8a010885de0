use embassy_time::Duration;

/// Eases the bells in after activation, starting quiet and/or slow and reaching the live settings after
/// [`duration`](Self::duration).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FadeIn {
    /// Whether the volume is eased in.
    pub volume: bool,
    /// Whether the tempo is eased in.
    pub tempo: bool,
    /// How long the fade lasts, measured at the target tempo.
    pub duration: Duration,
    /// Solenoid on-time, in milliseconds, of the first strike.
    pub volume_floor_ms: u16,
    /// Tempo, in beats per minute, of the first strike.
    pub tempo_floor_bpm: u16,
}

impl Default for FadeIn {
    fn default() -> Self {
        Self {
            volume: true,
            tempo: false,
            duration: Duration::from_secs(2),
            volume_floor_ms: 12,
            tempo_floor_bpm: 270,
        }
    }
}

impl FadeIn {
    /// No fading at all, e.g., for the hymn.
    pub const NONE: Self = Self {
        volume: false,
        tempo: false,
        duration: Duration::from_secs(0),
        volume_floor_ms: 0,
        tempo_floor_bpm: 0,
    };

    /// Returns true if either volume or tempo is eased.
    pub fn is_enabled(&self) -> bool {
        self.volume || self.tempo
    }

    /// Number of strikes the fade spans at the given tempo: `round(beats per second × duration)`.
    pub fn strikes(&self, tempo_bpm: u16) -> usize {
        use num_traits::Float;

        let beats_per_second = f32::from(tempo_bpm) / 60.0;
        let seconds = self.duration.as_millis() as f32 / 1000.0;
        (beats_per_second * seconds).round() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strikes() {
        let fade = FadeIn::default();
        assert_eq!(10, fade.strikes(290), "Expected left but got right");
        assert_eq!(4, fade.strikes(120), "Expected left but got right");
        assert_eq!(0, FadeIn::NONE.strikes(290), "Expected left but got right");
    }
}
