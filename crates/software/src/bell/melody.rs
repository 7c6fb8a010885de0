use super::{Beat, NOTE_CNT, Note};
use enum_dispatch::enum_dispatch;
use num_traits::FromPrimitive;
use oorandom::Rand32;

/// Source of beats for the [`BellSequencer`](super::BellSequencer).
#[enum_dispatch]
pub trait ProvideBeat {
    /// Returns the next beat, or `None` if the melody is over.
    fn next_beat(&mut self, rng: &mut Rand32) -> Option<Beat>;

    /// Starts over from the beginning.
    fn restart(&mut self);

    /// Returns the tempo the melody must be played at, if it doesn't follow the knob.
    fn tempo_bpm(&self) -> Option<u16> {
        None
    }
}

/// All the melodies the bells can play.
#[enum_dispatch(ProvideBeat)]
#[derive(Debug, Clone)]
pub enum Melody {
    /// See [`FixedMelody`].
    Fixed(FixedMelody),
    /// See [`WeightedRandom`].
    WeightedRandom(WeightedRandom),
    /// See [`Hymn`].
    Hymn(Hymn),
}

/// Loops over a fixed sequence of notes.
#[derive(Debug, Clone)]
pub struct FixedMelody {
    notes: &'static [Note],
    cursor: usize,
}

impl FixedMelody {
    /// Constructs a melody starting at its first note.
    pub fn new(notes: &'static [Note]) -> Self {
        Self { notes, cursor: 0 }
    }
}

impl ProvideBeat for FixedMelody {
    fn next_beat(&mut self, _rng: &mut Rand32) -> Option<Beat> {
        let note = *self.notes.get(self.cursor)?;
        self.cursor = (self.cursor + 1) % self.notes.len();
        Some(Beat::one(note))
    }

    fn restart(&mut self) {
        self.cursor = 0;
    }
}

/// Picks notes at random, never the same note twice in a row.
///
/// Every note has a weight, initially one, and is as likely to be picked as its weight is large. Notes whose weight
/// is zero or less are never picked. A picked note's weight drops to the penalty while all other weights grow by one,
/// so a note needs `1 - penalty` other notes to sound before it can sound again.
#[derive(Debug, Clone)]
pub struct WeightedRandom {
    weights: [i8; NOTE_CNT],
    penalty: i8,
    last: Option<Note>,
}

impl WeightedRandom {
    /// Constructs a picker with all weights at one. The penalty is clamped to `-(NOTE_CNT - 2)..=0`; any lower and
    /// there would come a pick at which no note is eligible. At the lowest penalty the notes sound in a fixed rotation.
    pub fn new(penalty: i8) -> Self {
        let floor = -(NOTE_CNT as i8 - 2);
        if !(floor..=0).contains(&penalty) {
            warn!("Repeat penalty {} is out of range; clamping", penalty);
        }
        Self {
            weights: [1; NOTE_CNT],
            penalty: penalty.clamp(floor, 0),
            last: None,
        }
    }

    /// Returns the current weights, indexed by [`Note::index`].
    pub fn weights(&self) -> &[i8; NOTE_CNT] {
        &self.weights
    }

    /// Picks a note and updates the weights.
    pub fn pick(&mut self, rng: &mut Rand32) -> Note {
        let mut total = self.eligible_weight();
        if total == 0 {
            warn!("No note is eligible; resetting weights");
            for note in Note::ALL {
                self.weights[note.index()] = if Some(note) == self.last { self.penalty } else { 1 };
            }
            total = self.eligible_weight();
        }

        let mut ticket = rng.rand_range(0..total);
        let mut picked = Note::D;
        for (index, &weight) in self.weights.iter().enumerate() {
            let weight = weight.max(0) as u32;
            if ticket < weight {
                picked = Note::from_usize(index).unwrap_or(Note::D);
                break;
            }
            ticket -= weight;
        }

        for note in Note::ALL {
            let weight = &mut self.weights[note.index()];
            *weight = if note == picked { self.penalty } else { weight.saturating_add(1) };
        }
        self.last = Some(picked);

        picked
    }

    fn eligible_weight(&self) -> u32 {
        self.weights.iter().map(|&weight| weight.max(0) as u32).sum()
    }
}

impl Default for WeightedRandom {
    fn default() -> Self {
        Self::new(-1)
    }
}

impl ProvideBeat for WeightedRandom {
    fn next_beat(&mut self, rng: &mut Rand32) -> Option<Beat> {
        Some(Beat::one(self.pick(rng)))
    }

    fn restart(&mut self) {
        // the weights carry over so that a restart can't repeat the note that sounded last
    }
}

/// "Sine Nomine," Ralph Vaughan Williams's tune for "For All the Saints," as far as five bells allow.
pub const SINE_NOMINE: [Beat; 43] = {
    use Note::*;
    const fn b(note: Note, beats: f32) -> Beat {
        Beat { note, beats }
    }
    [
        b(C, 1.0), b(A, 1.0), b(G, 1.0), b(F, 3.0), b(C, 1.0), b(D, 1.0), b(F, 1.0), b(G, 1.0), b(C, 1.0), b(A, 2.0),
        b(G, 1.0), b(F, 1.0), b(G, 2.0), b(G, 2.0), b(F, 1.0), b(G, 1.0), b(F, 1.0), b(D, 1.0), b(C, 4.0), b(F, 2.0),
        b(F, 1.0), b(F, 1.0), b(C, 3.0), b(C, 1.0), b(G, 1.0), b(C, 1.0), b(G, 0.5), b(A, 0.5), b(G, 0.5), b(F, 0.5),
        b(G, 2.0), b(C, 2.0), b(D, 1.0), b(C, 0.5), b(A, 0.5), b(C, 2.0), b(A, 3.0), b(G, 0.5), b(A, 0.5),
        b(G, 1.0), b(A, 1.0), b(G, 2.0), b(F, 4.0),
    ]
};

/// Plays [`SINE_NOMINE`] once.
#[derive(Debug, Clone, Default)]
pub struct Hymn {
    cursor: usize,
}

impl Hymn {
    /// The hymn is always played at this tempo.
    pub const TEMPO_BPM: u16 = 120;
}

impl ProvideBeat for Hymn {
    fn next_beat(&mut self, _rng: &mut Rand32) -> Option<Beat> {
        let beat = SINE_NOMINE.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(beat)
    }

    fn restart(&mut self) {
        self.cursor = 0;
    }

    fn tempo_bpm(&self) -> Option<u16> {
        Some(Self::TEMPO_BPM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picker_never_repeats() {
        for penalty in [0, -1, -2, -3] {
            let mut picker = WeightedRandom::new(penalty);
            let mut rng = Rand32::new(42);
            let mut previous = picker.pick(&mut rng);
            for _ in 0..1000 {
                let note = picker.pick(&mut rng);
                assert_ne!(previous, note, "Note repeated with penalty {}", penalty);
                previous = note;
            }
        }
    }

    #[test]
    fn penalty_widens_the_repeat_window() {
        let mut picker = WeightedRandom::new(-3);
        let mut rng = Rand32::new(3);
        let picks: [Note; 200] = core::array::from_fn(|_| picker.pick(&mut rng));
        for window in picks.windows(NOTE_CNT) {
            let mut seen = [false; NOTE_CNT];
            for note in window {
                assert!(!seen[note.index()], "Every note should sound once per {} picks: {:?}", NOTE_CNT, window);
                seen[note.index()] = true;
            }
        }
    }

    #[test]
    fn picker_plays_every_note() {
        let mut picker = WeightedRandom::default();
        let mut rng = Rand32::new(9);
        let mut seen = [false; NOTE_CNT];
        for _ in 0..100 {
            seen[picker.pick(&mut rng).index()] = true;
        }
        assert_eq!([true; NOTE_CNT], seen);
    }

    #[test]
    fn picked_note_takes_the_penalty() {
        let mut picker = WeightedRandom::new(-2);
        let mut rng = Rand32::new(1);
        let picked = picker.pick(&mut rng);
        for note in Note::ALL {
            let expected = if note == picked { -2 } else { 2 };
            assert_eq!(expected, picker.weights()[note.index()], "Weight of {:?}", note);
        }
    }

    #[test]
    fn penalty_is_clamped() {
        let mut picker = WeightedRandom::new(-100);
        let mut rng = Rand32::new(1);
        let picked = picker.pick(&mut rng);
        assert_eq!(-3, picker.weights()[picked.index()]);
        assert_eq!(0, WeightedRandom::new(5).penalty);
    }

    #[test]
    fn fixed_melody_is_empty_safe() {
        let mut melody = FixedMelody::new(&[]);
        assert_eq!(None, melody.next_beat(&mut Rand32::new(0)));
    }

    #[test]
    fn hymn_has_a_fixed_tempo() {
        let melody = Melody::from(Hymn::default());
        assert_eq!(Some(120), melody.tempo_bpm());
        assert_eq!(None, Melody::from(WeightedRandom::default()).tempo_bpm());
    }

    #[test]
    fn hymn_restarts() {
        let mut hymn = Hymn::default();
        let mut rng = Rand32::new(0);
        let first = hymn.next_beat(&mut rng);
        hymn.next_beat(&mut rng);
        hymn.restart();
        assert_eq!(first, hymn.next_beat(&mut rng));
    }
}
