//! Spins the star: a stepper motor accelerated and decelerated along logarithmic curves.
//!
//! A [`MotionProfile`] holds the precomputed per-step delays; a [`MotorRunner`] walks through them one step at a time,
//! following the on/off command it is given with every step. Every delay is a half period: the STEP pin is driven
//! high, the delay elapses, the pin is driven low, and the delay elapses again.

use crate::{
    configuration::MotorConfig,
    curve::{CurveError, log_ramp},
};
use tinyvec::ArrayVec;

/// Most points a curve may have.
pub const MAX_CURVE_LEN: usize = 128;

type Curve = ArrayVec<[u32; MAX_CURVE_LEN]>;

/// Commands sent by the controller to the star board, one byte each.
///
/// The upper nibble carries the command; the lower nibble is reserved for a speed setting and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StarCommand {
    /// Sent repeatedly while the zimbelstern runs.
    On,
    /// Sent once when it stops.
    Off,
}

impl StarCommand {
    /// Returns the byte sent on the bus.
    pub fn byte(self) -> u8 {
        match self {
            Self::On => 0xFF,
            Self::Off => 0x00,
        }
    }

    /// Interprets a received byte. Returns `None` for line noise.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte >> 4 {
            0xF => Some(Self::On),
            0x0 => Some(Self::Off),
            _ => None,
        }
    }

    /// Returns true for [`StarCommand::On`].
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

/// Delays for every phase of a spin.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionProfile {
    accel: Curve,
    decel: Curve,
    cruise_delay_us: u32,
    accel_steps: u32,
    cruise_steps: u32,
    decel_steps: u32,
}

impl MotionProfile {
    /// Computes the curves. Acceleration eases from the slow delay toward the cruise delay; deceleration is the curve
    /// from the end delay toward the cruise delay, reversed.
    pub fn build(config: &MotorConfig) -> Result<Self, CurveError> {
        let len = config.curve_len();
        let accel = log_ramp(config.slow_delay_us, config.cruise_delay_us, len)?;
        let mut decel: Curve = log_ramp(config.end_delay_us, config.cruise_delay_us, len)?;
        decel.reverse();

        let steps = |revs: f32| config.steps(revs).max(1);
        Ok(Self {
            accel,
            decel,
            cruise_delay_us: config.cruise_delay_us,
            accel_steps: steps(config.accel_revs),
            cruise_steps: steps(config.cruise_revs),
            decel_steps: steps(config.decel_revs),
        })
    }

    /// Returns the acceleration curve.
    pub fn accel(&self) -> &[u32] {
        &self.accel
    }

    /// Returns the deceleration curve.
    pub fn decel(&self) -> &[u32] {
        &self.decel
    }

    /// Delay of a step during acceleration. Steps in between curve points reuse the nearest earlier point.
    pub fn accel_delay(&self, step: u32) -> u32 {
        self.accel[curve_index(step, self.accel_steps, self.accel.len())]
    }

    /// Delay of a step during deceleration.
    pub fn decel_delay(&self, step: u32) -> u32 {
        self.decel[curve_index(step, self.decel_steps, self.decel.len())]
    }

    /// The deceleration step running at the speed of the given acceleration step.
    fn decel_step_matching(&self, accel_step: u32) -> u32 {
        let delay = self.accel_delay(accel_step);
        let index = self.decel.iter().position(|&d| d >= delay).unwrap_or(self.decel.len() - 1);
        phase_step(index, self.decel_steps, self.decel.len())
    }

    /// The acceleration step running at the speed of the given deceleration step.
    fn accel_step_matching(&self, decel_step: u32) -> u32 {
        let delay = self.decel_delay(decel_step);
        let index = self.accel.iter().position(|&d| d <= delay).unwrap_or(0);
        phase_step(index, self.accel_steps, self.accel.len())
    }
}

fn curve_index(step: u32, phase_steps: u32, len: usize) -> usize {
    let index = u64::from(step) * len as u64 / u64::from(phase_steps.max(1));
    (index as usize).min(len - 1)
}

/// The first step mapped onto the given curve point.
fn phase_step(index: usize, phase_steps: u32, len: usize) -> u32 {
    (index as u64 * u64::from(phase_steps)).div_ceil(len as u64) as u32
}

/// Where the motor is in its spin.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// At rest; the driver may be disabled.
    #[default]
    Idle,
    /// Speeding up toward the cruise speed.
    Accelerating {
        /// Steps taken in this phase.
        step: u32,
    },
    /// At full speed.
    Cruising {
        /// Steps taken in the current lap.
        step: u32,
    },
    /// Slowing down to a stop.
    Decelerating {
        /// Steps taken in this phase.
        step: u32,
    },
}

/// Steps through a [`MotionProfile`].
#[derive(Debug, Clone)]
pub struct MotorRunner {
    profile: MotionProfile,
    phase: Phase,
}

impl MotorRunner {
    /// Constructs a runner at rest.
    pub fn new(profile: MotionProfile) -> Self {
        Self {
            profile,
            phase: Phase::Idle,
        }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns true unless the motor is at rest.
    pub fn is_moving(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// Advances by one step and returns its half period in microseconds, or `None` if the motor is (now) at rest.
    ///
    /// Turning off while accelerating continues with the deceleration step of the same speed, and turning on while
    /// decelerating continues with the acceleration step of the same speed, so the star never jerks.
    pub fn next_delay(&mut self, on: bool) -> Option<u32> {
        let profile = &self.profile;
        let (phase, delay) = match (self.phase, on) {
            (Phase::Idle, false) => return None,
            (Phase::Idle, true) => (Phase::Accelerating { step: 1 }, profile.accel_delay(0)),
            (Phase::Accelerating { step }, true) if step >= profile.accel_steps => {
                (Phase::Cruising { step: 1 }, profile.cruise_delay_us)
            }
            (Phase::Accelerating { step }, true) => (Phase::Accelerating { step: step + 1 }, profile.accel_delay(step)),
            (Phase::Accelerating { step }, false) => {
                let step = profile.decel_step_matching(step.saturating_sub(1));
                (Phase::Decelerating { step: step + 1 }, profile.decel_delay(step))
            }
            (Phase::Cruising { step }, true) if step >= profile.cruise_steps => {
                debug!("Cruise lap complete");
                (Phase::Cruising { step: 1 }, profile.cruise_delay_us)
            }
            (Phase::Cruising { step }, true) => (Phase::Cruising { step: step + 1 }, profile.cruise_delay_us),
            (Phase::Cruising { .. }, false) => (Phase::Decelerating { step: 1 }, profile.decel_delay(0)),
            (Phase::Decelerating { step }, false) if step >= profile.decel_steps => {
                info!("Star at rest");
                self.phase = Phase::Idle;
                return None;
            }
            (Phase::Decelerating { step }, false) => (Phase::Decelerating { step: step + 1 }, profile.decel_delay(step)),
            (Phase::Decelerating { step }, true) => {
                let step = profile.accel_step_matching(step.saturating_sub(1));
                (Phase::Accelerating { step: step + 1 }, profile.accel_delay(step))
            }
        };

        self.phase = phase;
        Some(delay)
    }
}
