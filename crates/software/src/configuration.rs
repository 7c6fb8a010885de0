//! Tuned settings of the device. Everything is fixed at compile time: the firmware constructs a [`Settings`] in `main`
//! and hands it to the tasks that need it.

mod echo;
pub use echo::*;

mod fade_in;
pub use fade_in::*;

mod knob;
pub use knob::*;

mod motor;
pub use motor::*;

mod program_timeout;
pub use program_timeout::*;

mod timing;
pub use timing::*;

use crate::bell::{FIXED_MELODY, Note};

/// Where the bell sequencer takes its notes from.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MelodyConfig {
    /// Plays the notes in order, over and over. An empty melody is played as [`WeightedRandom`](Self::WeightedRandom).
    Fixed(&'static [Note]),
    /// Picks notes at random without immediate repeats.
    #[default]
    WeightedRandom,
}

impl MelodyConfig {
    /// The melody the device shipped with before random melodies were introduced.
    pub const CLASSIC: Self = Self::Fixed(&FIXED_MELODY);
}

/// Everything that can be tuned without touching the code that uses it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    /// Input and indicator intervals.
    pub timing: Timing,
    /// Note selection.
    pub melody: MelodyConfig,
    /// How the bells ease in after activation.
    pub fade_in: FadeIn,
    /// Clapper bounce imitation, if any. Only applies to random melodies.
    pub echo: Option<Echo>,
    /// Mapping of the volume potentiometer.
    pub volume_knob: KnobRange,
    /// Mapping of the tempo potentiometer, if one is fitted.
    pub tempo_knob: Option<KnobRange>,
    /// Tempo, in beats per minute, used when no tempo potentiometer is fitted.
    pub default_tempo_bpm: u16,
    /// What a program mode timeout does to the trigger.
    pub program_timeout: ProgramTimeout,
    /// Weight a randomly picked note is set to; the lower it is, the more notes must sound before it may repeat.
    /// Values are clamped so that some note always remains eligible.
    pub repeat_penalty: i8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            melody: MelodyConfig::default(),
            fade_in: FadeIn::default(),
            echo: Some(Echo::default()),
            volume_knob: KnobRange::VOLUME,
            tempo_knob: None,
            default_tempo_bpm: 290,
            program_timeout: ProgramTimeout::default(),
            repeat_penalty: -1,
        }
    }
}
