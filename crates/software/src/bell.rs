//! Decides which bell to strike next and for how long.
//!
//! The firmware asks the [`BellSequencer`] for one [`Strike`] at a time, drives the note's solenoid for
//! [`Strike::strike`], and waits out [`Strike::rest`] before asking again. Volume is the solenoid on-time in
//! milliseconds; tempo is in beats per minute. Both are passed in with every request because the potentiometers may
//! change them at any moment.

use crate::configuration::{Echo, FadeIn, MelodyConfig, Settings};
use embassy_time::Duration;
use num_derive::{FromPrimitive, ToPrimitive};
use oorandom::Rand32;

mod fade;
pub use fade::*;

mod melody;
pub use melody::*;

/// Number of bells.
pub const NOTE_CNT: usize = 5;

/// One of the bells, named after its pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Note {
    #[allow(missing_docs)]
    D,
    #[allow(missing_docs)]
    F,
    #[allow(missing_docs)]
    G,
    #[allow(missing_docs)]
    A,
    #[allow(missing_docs)]
    C,
}

impl Note {
    /// Every bell, from lowest to highest.
    pub const ALL: [Note; NOTE_CNT] = [Note::D, Note::F, Note::G, Note::A, Note::C];

    /// Position of the note in [`Note::ALL`], e.g., to index per-note arrays.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// "cdfgacgdcafgcadf"
pub const FIXED_MELODY: [Note; 16] = {
    use Note::*;
    [C, D, F, G, A, C, G, D, C, A, F, G, C, A, D, F]
};

/// A note and how many beats it lasts.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Beat {
    #[allow(missing_docs)]
    pub note: Note,
    #[allow(missing_docs)]
    pub beats: f32,
}

impl Beat {
    /// A one-beat note.
    pub const fn one(note: Note) -> Self {
        Self { note, beats: 1.0 }
    }
}

/// A quieter strike following the main one.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EchoStrike {
    /// Bell to strike, possibly the same as the main one.
    pub note: Note,
    /// Pause between the end of the main strike and the echo.
    pub delay: Duration,
    /// Solenoid on-time.
    pub strike: Duration,
}

/// Instructions for one beat.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Strike {
    /// Bell to strike.
    pub note: Note,
    /// Solenoid on-time.
    pub strike: Duration,
    /// Optional echo, to be played right after the strike.
    pub echo: Option<EchoStrike>,
    /// Pause after the strike (and its echo) until the next beat.
    pub rest: Duration,
}

/// Produces strikes for as long as the zimbelstern runs.
#[derive(Debug, Clone)]
pub struct BellSequencer {
    configured: Melody,
    melody: Melody,
    fade_in: FadeIn,
    fade: FadeEnvelope,
    echo: Option<Echo>,
    rng: Rand32,
    strike_cnt: usize,
}

impl BellSequencer {
    /// Constructs a sequencer. The seed should differ between power cycles, or every service sounds the same.
    pub fn new(settings: &Settings, seed: u64) -> Self {
        let melody = match settings.melody {
            MelodyConfig::Fixed(notes) if !notes.is_empty() => Melody::from(FixedMelody::new(notes)),
            MelodyConfig::Fixed(_) => {
                warn!("Fixed melody is empty; playing random notes instead");
                Melody::from(WeightedRandom::new(settings.repeat_penalty))
            }
            MelodyConfig::WeightedRandom => Melody::from(WeightedRandom::new(settings.repeat_penalty)),
        };
        let echo = match melody {
            Melody::WeightedRandom(_) => settings.echo,
            _ => None,
        };

        Self {
            configured: melody.clone(),
            melody,
            fade_in: settings.fade_in,
            fade: FadeEnvelope::default(),
            echo,
            rng: Rand32::new(seed),
            strike_cnt: 0,
        }
    }

    /// Prepares for a new activation: the melody starts over and the fade-in envelope is rebuilt for the given
    /// target volume and tempo.
    pub fn restart(&mut self, volume_ms: u16, tempo_bpm: u16) {
        self.melody = self.configured.clone();
        self.melody.restart();
        self.fade = FadeEnvelope::build(&self.fade_in, volume_ms, tempo_bpm);
        self.strike_cnt = 0;
    }

    /// Switches to the hymn until it has been played through once. No fade is applied.
    pub fn play_hymn(&mut self) {
        self.melody = Melody::from(Hymn::default());
        self.fade = FadeEnvelope::default();
        self.strike_cnt = 0;
    }

    /// Returns true while the hymn is playing.
    pub fn is_playing_hymn(&self) -> bool {
        matches!(self.melody, Melody::Hymn(_))
    }

    /// Computes the next strike, or `None` once a finite melody has run out (after which the configured melody
    /// resumes on the next [`restart`](Self::restart)).
    ///
    /// During the first strikes after a restart the fade-in envelope replaces the live volume and/or tempo.
    pub fn next_strike(&mut self, volume_ms: u16, tempo_bpm: u16) -> Option<Strike> {
        let Some(beat) = self.melody.next_beat(&mut self.rng) else {
            self.melody = self.configured.clone();
            return None;
        };

        let volume_ms = self.fade.volume(self.strike_cnt).unwrap_or(volume_ms);
        let tempo_bpm = self
            .melody
            .tempo_bpm()
            .or(self.fade.tempo(self.strike_cnt))
            .unwrap_or(tempo_bpm);
        self.strike_cnt = self.strike_cnt.saturating_add(1);

        let echo = match (self.echo, &mut self.melody) {
            (Some(echo), Melody::WeightedRandom(picker)) => Some(EchoStrike {
                note: picker.pick(&mut self.rng),
                delay: Duration::from_millis(
                    self.rng
                        .rand_range(u32::from(echo.min_delay_ms)..u32::from(echo.max_delay_ms) + 1)
                        .into(),
                ),
                strike: Duration::from_millis(echo.strike_ms.into()),
            }),
            _ => None,
        };

        let strike = Duration::from_millis(volume_ms.into());
        let occupied = strike + echo.map_or(Duration::MIN, |echo| echo.delay + echo.strike);
        let beat_len = beat_duration(tempo_bpm, beat.beats);
        let rest = beat_len.checked_sub(occupied).unwrap_or_else(|| {
            warn!(
                "Strike of {} ms exceeds the beat of {} ms at {} bpm; not resting",
                occupied.as_millis(),
                beat_len.as_millis(),
                tempo_bpm
            );
            Duration::MIN
        });

        Some(Strike {
            note: beat.note,
            strike,
            echo,
            rest,
        })
    }
}

/// Length of `beats` beats at the given tempo.
pub fn beat_duration(tempo_bpm: u16, beats: f32) -> Duration {
    let micros = 60_000_000.0 * beats / f32::from(tempo_bpm.max(1));
    Duration::from_micros(micros as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(melody: MelodyConfig) -> Settings {
        Settings {
            melody,
            fade_in: FadeIn::NONE,
            echo: None,
            ..Default::default()
        }
    }

    #[test]
    fn beat_duration_follows_tempo() {
        assert_eq!(Duration::from_millis(500), beat_duration(120, 1.0));
        assert_eq!(Duration::from_millis(250), beat_duration(120, 0.5));
        assert_eq!(Duration::from_millis(1500), beat_duration(120, 3.0));
    }

    #[test]
    fn rest_fills_the_beat() {
        let mut sequencer = BellSequencer::new(&settings(MelodyConfig::CLASSIC), 1);
        sequencer.restart(20, 120);
        let strike = sequencer.next_strike(20, 120).unwrap();
        assert_eq!(Note::C, strike.note);
        assert_eq!(Duration::from_millis(20), strike.strike);
        assert_eq!(Duration::from_millis(480), strike.rest, "Expected left but got right");
        assert_eq!(None, strike.echo);
    }

    #[test]
    fn rest_is_clamped_when_the_strike_outlasts_the_beat() {
        let mut sequencer = BellSequencer::new(&settings(MelodyConfig::CLASSIC), 1);
        sequencer.restart(40, 2000);
        let strike = sequencer.next_strike(40, 2000).unwrap();
        assert_eq!(Duration::MIN, strike.rest);
    }

    #[test]
    fn fixed_melody_repeats_and_restarts() {
        let mut sequencer = BellSequencer::new(&settings(MelodyConfig::CLASSIC), 1);
        sequencer.restart(20, 290);
        let notes: [Note; 20] = core::array::from_fn(|_| sequencer.next_strike(20, 290).unwrap().note);
        assert_eq!(&FIXED_MELODY[..], &notes[..16], "Expected left but got right");
        assert_eq!(&FIXED_MELODY[..4], &notes[16..], "Melody should wrap around");

        sequencer.restart(20, 290);
        assert_eq!(FIXED_MELODY[0], sequencer.next_strike(20, 290).unwrap().note);
    }

    #[test]
    fn empty_fixed_melody_plays_random_notes() {
        let mut sequencer = BellSequencer::new(&settings(MelodyConfig::Fixed(&[])), 1);
        sequencer.restart(20, 290);
        assert!(sequencer.next_strike(20, 290).is_some());
    }

    #[test]
    fn live_settings_apply_after_the_fade() {
        let mut sequencer = BellSequencer::new(
            &Settings {
                melody: MelodyConfig::CLASSIC,
                echo: None,
                ..Default::default()
            },
            1,
        );
        sequencer.restart(40, 290);
        let volumes: [u64; 12] = core::array::from_fn(|_| sequencer.next_strike(40, 290).unwrap().strike.as_millis());
        assert_eq!(12, volumes[0], "Fade should start at the floor");
        assert_eq!(40, volumes[9], "Fade should end at the target");
        assert!(volumes[..10].windows(2).all(|pair| pair[0] < pair[1]));

        let next = sequencer.next_strike(25, 290).unwrap();
        assert_eq!(Duration::from_millis(25), next.strike, "Knob changes should apply once the fade is over");
    }

    #[test]
    fn echo_shortens_the_rest() {
        let mut sequencer = BellSequencer::new(
            &Settings {
                fade_in: FadeIn::NONE,
                ..Default::default()
            },
            7,
        );
        sequencer.restart(20, 120);
        for _ in 0..50 {
            let strike = sequencer.next_strike(20, 120).unwrap();
            let echo = strike.echo.expect("Random melodies should echo by default");
            assert!(echo.delay >= Duration::from_millis(10) && echo.delay <= Duration::from_millis(30));
            assert_eq!(Duration::from_millis(12), echo.strike);
            assert_eq!(
                Duration::from_millis(500),
                strike.strike + echo.delay + echo.strike + strike.rest,
                "Strike, echo, and rest should add up to one beat"
            );
        }
    }

    #[test]
    fn hymn_plays_once_then_ends() {
        let mut sequencer = BellSequencer::new(&settings(MelodyConfig::CLASSIC), 1);
        sequencer.play_hymn();
        assert!(sequencer.is_playing_hymn());

        let first = sequencer.next_strike(20, 290).unwrap();
        assert_eq!(Note::C, first.note);
        assert_eq!(
            Duration::from_millis(480),
            first.rest,
            "Hymn should be played at 120 bpm regardless of the knob"
        );

        let mut remaining = 0;
        while sequencer.next_strike(20, 290).is_some() {
            remaining += 1;
        }
        assert_eq!(SINE_NOMINE.len() - 1, remaining);
        assert!(!sequencer.is_playing_hymn());
    }
}
