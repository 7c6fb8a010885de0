//! Interpretation of polled button and potentiometer samples.

use crate::configuration::KnobRange;
use embassy_time::{Duration, Instant};

/// Something a button did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonEvent {
    /// The button went down.
    Pressed,
    /// The button has been down for the hold threshold. Reported once per press.
    Held,
    /// The button came up.
    Released {
        /// Whether [`Held`](ButtonEvent::Held) was reported during this press.
        held: bool,
    },
}

/// Recognizes presses, holds, and releases in a stream of samples.
///
/// After each edge, samples are ignored until the debounce interval has passed.
#[derive(Debug, Clone)]
pub struct ButtonTracker {
    hold: Duration,
    debounce: Duration,
    pressed_at: Option<Instant>,
    held: bool,
    settled_at: Instant,
}

impl ButtonTracker {
    /// Constructs a tracker for a button that is initially up.
    pub fn new(hold: Duration, debounce: Duration) -> Self {
        Self {
            hold,
            debounce,
            pressed_at: None,
            held: false,
            settled_at: Instant::from_ticks(0),
        }
    }

    /// Feeds one sample taken at `now`.
    pub fn sample(&mut self, pressed: bool, now: Instant) -> Option<ButtonEvent> {
        if now < self.settled_at {
            return None;
        }

        match (pressed, self.pressed_at) {
            (true, None) => {
                self.pressed_at = Some(now);
                self.held = false;
                self.settled_at = now.saturating_add(self.debounce);
                Some(ButtonEvent::Pressed)
            }
            (true, Some(since)) if !self.held && now.saturating_duration_since(since) >= self.hold => {
                self.held = true;
                Some(ButtonEvent::Held)
            }
            (true, Some(_)) => None,
            (false, Some(_)) => {
                self.pressed_at = None;
                self.settled_at = now.saturating_add(self.debounce);
                Some(ButtonEvent::Released { held: self.held })
            }
            (false, None) => None,
        }
    }

    /// Returns true while the button is down.
    pub fn is_pressed(&self) -> bool {
        self.pressed_at.is_some()
    }
}

/// Maps raw samples of a potentiometer onto a [`KnobRange`].
#[derive(Debug, Clone)]
pub struct Knob {
    range: KnobRange,
    full_scale: u16,
    last: Option<u16>,
}

impl Knob {
    /// Constructs a knob whose converter reads `full_scale` at the clockwise stop.
    pub fn new(range: KnobRange, full_scale: u16) -> Self {
        Self {
            range,
            full_scale: full_scale.max(1),
            last: None,
        }
    }

    /// Feeds one raw sample, returning the mapped value if it differs from the previous one.
    pub fn sample(&mut self, raw: u16) -> Option<u16> {
        let value = self.range.scale(f32::from(raw) / f32::from(self.full_scale));
        if self.last == Some(value) {
            return None;
        }

        self.last = Some(value);
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> ButtonTracker {
        ButtonTracker::new(Duration::from_millis(1500), Duration::from_millis(100))
    }

    fn ms(millis: u64) -> Instant {
        Instant::from_millis(millis)
    }

    #[test]
    fn press_and_release() {
        let mut button = tracker();
        assert_eq!(None, button.sample(false, ms(0)));
        assert_eq!(Some(ButtonEvent::Pressed), button.sample(true, ms(10)));
        assert!(button.is_pressed());
        assert_eq!(None, button.sample(true, ms(200)));
        assert_eq!(
            Some(ButtonEvent::Released { held: false }),
            button.sample(false, ms(300))
        );
        assert!(!button.is_pressed());
    }

    #[test]
    fn bounces_are_ignored() {
        let mut button = tracker();
        assert_eq!(Some(ButtonEvent::Pressed), button.sample(true, ms(0)));
        assert_eq!(None, button.sample(false, ms(20)));
        assert_eq!(None, button.sample(true, ms(40)));
        assert_eq!(None, button.sample(false, ms(99)));
        assert!(button.is_pressed(), "Bounces within the debounce interval should be ignored");
        assert_eq!(
            Some(ButtonEvent::Released { held: false }),
            button.sample(false, ms(100))
        );
        assert_eq!(None, button.sample(true, ms(150)));
        assert_eq!(Some(ButtonEvent::Pressed), button.sample(true, ms(200)));
    }

    #[test]
    fn hold_is_reported_once() {
        let mut button = tracker();
        button.sample(true, ms(0));
        assert_eq!(None, button.sample(true, ms(1499)));
        assert_eq!(Some(ButtonEvent::Held), button.sample(true, ms(1500)));
        assert_eq!(None, button.sample(true, ms(5000)));
        assert_eq!(
            Some(ButtonEvent::Released { held: true }),
            button.sample(false, ms(5001))
        );
    }

    #[test]
    fn next_press_starts_unheld() {
        let mut button = tracker();
        button.sample(true, ms(0));
        button.sample(true, ms(2000));
        button.sample(false, ms(2100));
        button.sample(true, ms(3000));
        assert_eq!(
            Some(ButtonEvent::Released { held: false }),
            button.sample(false, ms(3200))
        );
    }

    #[test]
    fn knob_reports_changes_only() {
        let mut knob = Knob::new(KnobRange::VOLUME, 4095);
        assert_eq!(Some(15), knob.sample(0));
        assert_eq!(None, knob.sample(10), "Noise below one step should not be reported");
        assert_eq!(Some(40), knob.sample(4095));
        assert_eq!(None, knob.sample(4095));
        assert_eq!(Some(27), knob.sample(2048));
    }
}
