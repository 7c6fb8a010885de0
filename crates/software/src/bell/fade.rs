use crate::{configuration::FadeIn, curve::spread};
use num_traits::Float;
use tinyvec::ArrayVec;

/// Longest fade, in strikes.
pub const MAX_FADE_STRIKES: usize = 64;

/// Volumes and tempos for the first strikes after activation, ramping from the [`FadeIn`] floors to the targets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FadeEnvelope {
    volumes: ArrayVec<[f32; MAX_FADE_STRIKES]>,
    tempos: ArrayVec<[f32; MAX_FADE_STRIKES]>,
}

impl FadeEnvelope {
    /// Builds the envelope for the given targets.
    ///
    /// The fade spans `round(tempo / 60 × duration)` strikes, capped at [`MAX_FADE_STRIKES`]. A fade shorter than two
    /// strikes can't ramp and is skipped.
    pub fn build(config: &FadeIn, volume_ms: u16, tempo_bpm: u16) -> Self {
        if !config.is_enabled() {
            return Self::default();
        }

        let mut strikes = config.strikes(tempo_bpm);
        if strikes > MAX_FADE_STRIKES {
            warn!("Fade of {} strikes shortened to {}", strikes, MAX_FADE_STRIKES);
            strikes = MAX_FADE_STRIKES;
        }
        if strikes < 2 {
            warn!("Fade of {} strikes is too short; skipping", strikes);
            return Self::default();
        }

        let ramp = |enabled: bool, floor: u16, target: u16| {
            if !enabled {
                return ArrayVec::new();
            }
            spread::<MAX_FADE_STRIKES>(floor.into(), target.into(), strikes).unwrap_or_default()
        };

        Self {
            volumes: ramp(config.volume, config.volume_floor_ms, volume_ms),
            tempos: ramp(config.tempo, config.tempo_floor_bpm, tempo_bpm),
        }
    }

    /// Volume of the nth strike, if it falls within the fade.
    pub fn volume(&self, strike: usize) -> Option<u16> {
        self.volumes.get(strike).map(|&volume| volume.round() as u16)
    }

    /// Tempo of the nth strike, if it falls within the fade.
    pub fn tempo(&self, strike: usize) -> Option<u16> {
        self.tempos.get(strike).map(|&tempo| tempo.round() as u16)
    }

    /// Number of strikes affected by the fade.
    pub fn len(&self) -> usize {
        self.volumes.len().max(self.tempos.len())
    }

    /// Returns true if no strike is affected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_time::Duration;

    #[test]
    fn volume_only() {
        let envelope = FadeEnvelope::build(&FadeIn::default(), 40, 290);
        assert_eq!(10, envelope.len());
        assert_eq!(Some(12), envelope.volume(0));
        assert_eq!(Some(40), envelope.volume(9));
        assert_eq!(None, envelope.volume(10));
        assert_eq!(None, envelope.tempo(0), "Tempo should not fade by default");
    }

    #[test]
    fn tempo_only() {
        let config = FadeIn {
            volume: false,
            tempo: true,
            ..Default::default()
        };
        let envelope = FadeEnvelope::build(&config, 40, 300);
        assert_eq!(10, envelope.len());
        assert_eq!(Some(270), envelope.tempo(0));
        assert_eq!(Some(300), envelope.tempo(9));
        assert_eq!(None, envelope.volume(0));
    }

    #[test]
    fn disabled() {
        assert!(FadeEnvelope::build(&FadeIn::NONE, 40, 290).is_empty());
    }

    #[test]
    fn too_short_to_ramp() {
        let config = FadeIn {
            duration: Duration::from_millis(100),
            ..Default::default()
        };
        assert!(FadeEnvelope::build(&config, 40, 290).is_empty());
    }

    #[test]
    fn capped() {
        let config = FadeIn {
            duration: Duration::from_secs(60),
            ..Default::default()
        };
        let envelope = FadeEnvelope::build(&config, 40, 290);
        assert_eq!(MAX_FADE_STRIKES, envelope.len());
        assert_eq!(Some(40), envelope.volume(MAX_FADE_STRIKES - 1));
    }
}
