//! The mutable runtime state shared by every task, and the transitions it may undergo.
//!
//! All transitions are idempotent: activating a running zimbelstern or deactivating a stopped one changes nothing and
//! reports no [`Change`]. Running and prepared are mutually exclusive, and nothing is started while the device is in
//! [`Mode::Program`].

use crate::{
    mode::{Mode, ProgramWindow},
    trigger::TriggerPattern,
};
use bitmask_enum::bitmask;
use embassy_time::{Duration, Instant};

/// Aspects of the state that a transition may alter.
#[bitmask(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Change {
    /// The operating mode changed.
    Mode,
    /// The zimbelstern started or stopped.
    Running,
    /// The prepared latch was armed or disarmed.
    Prepared,
    /// The organ reported stops being drawn or all stops being cancelled.
    StopsEngaged,
    /// A different trigger is in effect.
    Trigger,
    /// The volume knob moved.
    Volume,
    /// The tempo knob moved.
    Tempo,
    /// The hymn was requested.
    Hymn,
}

/// What caused a transition. Logged with every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Source {
    /// The zimbel button on the device.
    ZimbelPiston,
    /// A numbered registration piston, sending a Program Change.
    RegistrationPiston,
    /// A coupler or toggle piston, sending a Control Change.
    TogglePiston,
    /// A key played while the zimbelstern was prepared.
    PreparedNote,
    /// Stops drawn or retired, as reported by SysEx.
    StopChange,
    /// The prepare button on the device.
    PreparePiston,
    /// Entering program mode.
    ProgramMode,
    /// The organ's General Cancel piston.
    GeneralCancel,
    /// The organ powering up.
    OrganReset,
    /// Playing the hymn.
    Hymn,
}

/// Summary of one run of the zimbelstern, from activation to deactivation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RunRecord {
    #[allow(missing_docs)]
    pub started_by: Source,
    #[allow(missing_docs)]
    pub stopped_by: Source,
    #[allow(missing_docs)]
    pub run_time: Duration,
    /// Tempo at the time the run ended, in beats per minute.
    pub tempo_bpm: u16,
    /// Volume at the time the run ended, in milliseconds.
    pub volume_ms: u16,
}

/// A copy of everything output tasks need, cheap enough to publish after every change.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    #[allow(missing_docs)]
    pub mode: Mode,
    #[allow(missing_docs)]
    pub running: bool,
    #[allow(missing_docs)]
    pub prepared: bool,
    #[allow(missing_docs)]
    pub stops_engaged: bool,
    /// Solenoid on-time, in milliseconds.
    pub volume_ms: u16,
    /// Beats per minute.
    pub tempo_bpm: u16,
    /// Incremented with every activation, so that a task which missed a stop can still tell a new run began.
    pub generation: u32,
    /// Incremented with every hymn request.
    pub hymn: u32,
    /// Present while in [`Mode::Program`].
    pub program_window: Option<ProgramWindow>,
}

/// All shared mutable runtime state.
#[derive(Debug, Clone)]
pub struct DeviceState {
    mode: Mode,
    running: bool,
    prepared: bool,
    stops_engaged: bool,
    volume_ms: u16,
    tempo_bpm: u16,
    trigger: TriggerPattern,
    stashed_trigger: Option<TriggerPattern>,
    program_window: Option<ProgramWindow>,
    generation: u32,
    hymn: u32,
    started: Option<(Instant, Source)>,
    last_run: Option<RunRecord>,
}

impl DeviceState {
    /// Constructs the state at boot: zimbel mode, stopped, not prepared, no trigger.
    pub fn new(volume_ms: u16, tempo_bpm: u16) -> Self {
        Self {
            mode: Mode::Zimbel,
            running: false,
            prepared: false,
            stops_engaged: false,
            volume_ms,
            tempo_bpm,
            trigger: TriggerPattern::empty(),
            stashed_trigger: None,
            program_window: None,
            generation: 0,
            hymn: 0,
            started: None,
            last_run: None,
        }
    }

    /// Starts the zimbelstern and disarms the prepared latch. Only possible in [`Mode::Zimbel`].
    pub fn activate(&mut self, source: Source, now: Instant) -> Change {
        if self.running || self.mode != Mode::Zimbel {
            return Change::none();
        }

        self.running = true;
        self.generation = self.generation.wrapping_add(1);
        self.started = Some((now, source));
        info!("Zimbelstern on ({})", source);

        Change::Running | self.unprepare()
    }

    /// Stops the zimbelstern and disarms the prepared latch, logging a [`RunRecord`].
    pub fn deactivate(&mut self, source: Source, now: Instant) -> Change {
        if !self.running {
            return Change::none();
        }

        self.running = false;
        let (start, started_by) = self.started.take().unwrap_or((now, source));
        let record = RunRecord {
            started_by,
            stopped_by: source,
            run_time: now.saturating_duration_since(start),
            tempo_bpm: self.tempo_bpm,
            volume_ms: self.volume_ms,
        };
        info!(
            "Zimbelstern off ({}): started by {}, ran {} s at {} bpm and {} ms",
            source,
            record.started_by,
            record.run_time.as_secs(),
            record.tempo_bpm,
            record.volume_ms
        );
        self.last_run = Some(record);

        Change::Running | self.unprepare()
    }

    /// Flips the running state.
    pub fn toggle(&mut self, source: Source, now: Instant) -> Change {
        if self.running {
            self.deactivate(source, now)
        } else {
            self.activate(source, now)
        }
    }

    /// Arms the prepared latch, stopping the zimbelstern if it is running. Only possible in [`Mode::Zimbel`].
    pub fn prepare(&mut self, now: Instant) -> Change {
        if self.prepared || self.mode != Mode::Zimbel {
            return Change::none();
        }

        let change = self.deactivate(Source::PreparePiston, now);
        self.prepared = true;
        info!("Prepared");

        change | Change::Prepared
    }

    /// Disarms the prepared latch.
    pub fn unprepare(&mut self) -> Change {
        if !self.prepared {
            return Change::none();
        }

        self.prepared = false;
        info!("No longer prepared");

        Change::Prepared
    }

    /// Records whether the organ has any stops drawn.
    pub fn set_stops_engaged(&mut self, engaged: bool) -> Change {
        if self.stops_engaged == engaged {
            return Change::none();
        }

        self.stops_engaged = engaged;
        debug!("Stops engaged: {}", engaged);

        Change::StopsEngaged
    }

    /// Sets the solenoid on-time.
    pub fn set_volume(&mut self, volume_ms: u16) -> Change {
        if self.volume_ms == volume_ms {
            return Change::none();
        }

        self.volume_ms = volume_ms;
        debug!("Volume: {} ms", volume_ms);

        Change::Volume
    }

    /// Sets the tempo.
    pub fn set_tempo(&mut self, tempo_bpm: u16) -> Change {
        if self.tempo_bpm == tempo_bpm {
            return Change::none();
        }

        self.tempo_bpm = tempo_bpm;
        debug!("Tempo: {} bpm", tempo_bpm);

        Change::Tempo
    }

    /// Replaces the trigger.
    pub fn set_trigger(&mut self, trigger: TriggerPattern) -> Change {
        if self.trigger == trigger {
            return Change::none();
        }

        self.trigger = trigger;
        info!("Trigger: {}", self.trigger);

        Change::Trigger
    }

    /// Switches to [`Mode::Program`], stopping the zimbelstern and setting the current trigger aside.
    pub fn enter_program(&mut self, window: ProgramWindow, now: Instant) -> Change {
        if self.mode == Mode::Program {
            return Change::none();
        }

        let change = self.deactivate(Source::ProgramMode, now) | self.unprepare();
        self.stashed_trigger = Some(self.trigger);
        self.program_window = Some(window);
        self.mode = Mode::Program;
        info!("Mode: {}", self.mode);

        change | Change::Mode | self.set_trigger(TriggerPattern::empty())
    }

    /// Returns to [`Mode::Zimbel`]. With `restore`, the trigger set aside on entering program mode is reinstated;
    /// otherwise the current trigger stays in effect.
    pub fn leave_program(&mut self, restore: bool) -> Change {
        if self.mode == Mode::Zimbel {
            return Change::none();
        }

        self.mode = Mode::Zimbel;
        self.program_window = None;
        info!("Mode: {}", self.mode);

        let stashed = self.stashed_trigger.take();
        match stashed {
            Some(trigger) if restore => Change::Mode | self.set_trigger(trigger),
            _ => Change::Mode,
        }
    }

    /// Records a request to play the hymn.
    pub fn request_hymn(&mut self) -> Change {
        self.hymn = self.hymn.wrapping_add(1);
        info!("Hymn requested");

        Change::Hymn
    }

    /// Returns the current mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns true while the zimbelstern runs.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Returns true while the prepared latch is armed.
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Returns true while the organ has any stops drawn.
    pub fn stops_engaged(&self) -> bool {
        self.stops_engaged
    }

    /// Returns the trigger in effect.
    pub fn trigger(&self) -> &TriggerPattern {
        &self.trigger
    }

    /// Returns the program mode window, if in program mode.
    pub fn program_window(&self) -> Option<&ProgramWindow> {
        self.program_window.as_ref()
    }

    /// Returns the record of the most recent completed run.
    pub fn last_run(&self) -> Option<&RunRecord> {
        self.last_run.as_ref()
    }

    /// Takes a snapshot for publication.
    pub fn status(&self) -> Status {
        Status {
            mode: self.mode,
            running: self.running,
            prepared: self.prepared,
            stops_engaged: self.stops_engaged,
            volume_ms: self.volume_ms,
            tempo_bpm: self.tempo_bpm,
            generation: self.generation,
            hymn: self.hymn,
            program_window: self.program_window,
        }
    }
}
