/// The span of values a potentiometer is mapped onto, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KnobRange {
    /// Value at the counterclockwise stop.
    pub min: u16,
    /// Value at the clockwise stop.
    pub max: u16,
}

impl KnobRange {
    /// Volume, in milliseconds of solenoid on-time. Below 15 ms some bells don't sound at all; above 40 ms the clapper
    /// rests against the bell and mutes it.
    pub const VOLUME: Self = Self { min: 15, max: 40 };

    /// Tempo, in beats per minute.
    pub const TEMPO: Self = Self { min: 100, max: 800 };

    /// Maps a fraction of full travel onto the range. Fractions outside `0.0..=1.0` are clamped.
    pub fn scale(&self, fraction: f32) -> u16 {
        let fraction = fraction.clamp(0.0, 1.0);
        // truncates, so the maximum is only reached at the very end of travel
        self.min + (fraction * f32::from(self.max - self.min)) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale() {
        assert_eq!(15, KnobRange::VOLUME.scale(0.0));
        assert_eq!(27, KnobRange::VOLUME.scale(0.5));
        assert_eq!(40, KnobRange::VOLUME.scale(1.0));
    }

    #[test]
    fn scale_clamps() {
        assert_eq!(15, KnobRange::VOLUME.scale(-1.0));
        assert_eq!(40, KnobRange::VOLUME.scale(2.0));
    }
}
