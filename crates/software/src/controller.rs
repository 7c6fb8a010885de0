//! Ties the parsers, the trigger, the persistence, and the device state together.
//!
//! The firmware owns exactly one [`Controller`], shared behind a mutex, and feeds it raw MIDI batches, button events,
//! and knob values. Every entry point returns the [`Change`]s it caused so that the caller can publish a new
//! [`Status`] only when something actually changed.

use crate::{
    configuration::{ProgramTimeout, Settings},
    input::ButtonEvent,
    midi::{MessageKind, MidiMessage, classify, rodgers},
    mode::{Mode, ProgramWindow},
    persistence::{KeyValueStore, TriggerStore},
    state::{Change, DeviceState, Source, Status},
    trigger::{ResetDetector, TriggerPattern},
};
use embassy_time::Instant;

/// The control engine.
#[derive(Debug)]
pub struct Controller<S> {
    settings: Settings,
    state: DeviceState,
    store: TriggerStore<S>,
    reset: ResetDetector,
}

impl<S: KeyValueStore> Controller<S> {
    /// Constructs a controller in its boot state. Call [`boot`](Self::boot) before anything else.
    pub fn new(settings: Settings, store: S) -> Self {
        Self {
            state: DeviceState::new(settings.volume_knob.min, settings.default_tempo_bpm),
            settings,
            store: TriggerStore::new(store),
            reset: ResetDetector::new(),
        }
    }

    /// Loads the persisted trigger. A storage failure is logged and leaves the device without a trigger.
    pub fn boot(&mut self) -> Change {
        match self.store.load() {
            Ok(Some(trigger)) => self.state.set_trigger(trigger),
            Ok(None) => {
                info!("No trigger stored");
                Change::none()
            }
            Err(_) => {
                warn!("Unable to load the trigger; starting without one");
                Change::none()
            }
        }
    }

    /// Handles one batch of bytes read from the MIDI port.
    ///
    /// Active Sensing is dropped before anything else, the reset detector included, since the organ interleaves it
    /// with the power-up burst.
    pub fn receive_midi(&mut self, batch: &[u8], now: Instant) -> Change {
        let Some(msg) = classify(batch) else {
            return Change::none();
        };
        if self.reset.observe(msg.bytes()) {
            return self.organ_reset(now);
        }
        debug!("{}: {=[u8]:x}", msg.kind(), msg.bytes());

        match self.state.mode() {
            Mode::Program => self.capture(&msg),
            Mode::Zimbel => self.respond(&msg, now),
        }
    }

    /// Handles the zimbel button: a short press toggles the zimbelstern, a hold enters program mode.
    pub fn zimbel_button(&mut self, event: ButtonEvent, now: Instant) -> Change {
        match (event, self.state.mode()) {
            (ButtonEvent::Held, Mode::Zimbel) => {
                let window = ProgramWindow::open(now, &self.settings.timing);
                self.state.enter_program(window, now)
            }
            (ButtonEvent::Released { held: false }, Mode::Zimbel) => self.state.toggle(Source::ZimbelPiston, now),
            _ => Change::none(),
        }
    }

    /// Handles the prepare button: a press toggles the prepared latch, a long hold plays the hymn.
    pub fn prepare_button(&mut self, event: ButtonEvent, now: Instant) -> Change {
        match (event, self.state.mode()) {
            (ButtonEvent::Pressed, Mode::Zimbel) if self.state.is_prepared() => self.state.unprepare(),
            (ButtonEvent::Pressed, Mode::Zimbel) => self.state.prepare(now),
            (ButtonEvent::Held, Mode::Zimbel) => {
                self.state.deactivate(Source::Hymn, now) | self.state.unprepare() | self.state.request_hymn()
            }
            _ => Change::none(),
        }
    }

    /// Applies a new volume.
    pub fn set_volume(&mut self, volume_ms: u16) -> Change {
        self.state.set_volume(volume_ms)
    }

    /// Applies a new tempo.
    pub fn set_tempo(&mut self, tempo_bpm: u16) -> Change {
        self.state.set_tempo(tempo_bpm)
    }

    /// Leaves program mode if it has been waiting for longer than the timeout.
    pub fn poll_program(&mut self, now: Instant) -> Change {
        let expired = self
            .state
            .program_window()
            .is_some_and(|window| window.is_expired(now));
        if !expired {
            return Change::none();
        }

        info!("Program mode timed out");
        match self.settings.program_timeout {
            ProgramTimeout::RetainTrigger => self.state.leave_program(true),
            ProgramTimeout::ClearTrigger => {
                self.persist(&TriggerPattern::empty());
                self.state.leave_program(false)
            }
        }
    }

    /// Returns a snapshot of the state.
    pub fn status(&self) -> Status {
        self.state.status()
    }

    /// Returns the state.
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Returns the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the trigger store, e.g., for inspection.
    pub fn store(&self) -> &TriggerStore<S> {
        &self.store
    }

    /// Binds the message as the new trigger, if it can serve as one, and returns to zimbel mode. The trigger is
    /// persisted before the mode changes.
    fn capture(&mut self, msg: &MidiMessage) -> Change {
        let Some(trigger) = TriggerPattern::capture(msg) else {
            debug!("{} can't serve as a trigger", msg.kind());
            return Change::none();
        };

        self.persist(&trigger);
        self.state.set_trigger(trigger) | self.state.leave_program(false)
    }

    fn respond(&mut self, msg: &MidiMessage, now: Instant) -> Change {
        if msg.is_general_cancel() {
            info!("General Cancel");
            return self.state.deactivate(Source::GeneralCancel, now) | self.state.set_stops_engaged(false);
        }

        let trigger = *self.state.trigger();
        let matched = trigger.matches(msg);
        let bound = trigger.origin() == msg.kind() && trigger.is_armed();

        match msg.kind() {
            MessageKind::ProgramChange if bound && matched => self.state.activate(Source::RegistrationPiston, now),
            MessageKind::ProgramChange if bound => self.state.deactivate(Source::RegistrationPiston, now),
            MessageKind::ControlChange if matched => self.state.toggle(Source::TogglePiston, now),
            MessageKind::SysEx => {
                let rodgers::SysEx::StopChange(stops) = rodgers::parse(msg.bytes()) else {
                    return Change::none();
                };
                let change = self.state.set_stops_engaged(!rodgers::all_stops_off(stops));
                change
                    | match (bound, matched) {
                        (true, true) => self.state.activate(Source::StopChange, now),
                        (true, false) => self.state.deactivate(Source::StopChange, now),
                        (false, _) => Change::none(),
                    }
            }
            MessageKind::NoteOn if self.state.is_prepared() && self.state.stops_engaged() => {
                self.state.activate(Source::PreparedNote, now)
            }
            _ => Change::none(),
        }
    }

    fn organ_reset(&mut self, now: Instant) -> Change {
        info!("Organ reset detected");
        let change = self.state.deactivate(Source::OrganReset, now)
            | self.state.unprepare()
            | self.state.set_stops_engaged(false)
            | self.state.leave_program(false)
            | self.state.set_trigger(TriggerPattern::empty());
        self.persist(&TriggerPattern::empty());
        change
    }

    fn persist(&mut self, trigger: &TriggerPattern) {
        if self.store.save(trigger).is_err() {
            warn!("Unable to persist trigger; it will be lost on power-down");
        }
    }
}
