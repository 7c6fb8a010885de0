/// Drive parameters of the star's stepper motor. Delays are half periods of the STEP signal, in microseconds; a smaller
/// delay turns the star faster.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorConfig {
    /// Steps per revolution of the star, i.e., after gearing.
    pub steps_per_rev: u32,
    /// How many physical steps share one point of the acceleration curve.
    pub downsample: u32,
    /// Delay at standstill, where acceleration begins.
    pub slow_delay_us: u32,
    /// Delay at full speed.
    pub cruise_delay_us: u32,
    /// Delay at the end of deceleration.
    pub end_delay_us: u32,
    /// Revolutions spent accelerating.
    pub accel_revs: f32,
    /// Revolutions per cruise lap. Laps repeat for as long as the star is on.
    pub cruise_revs: f32,
    /// Revolutions spent decelerating.
    pub decel_revs: f32,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            // 1600 microsteps per motor revolution through a 5.187:1 gearbox
            steps_per_rev: 8299,
            downsample: 83,
            slow_delay_us: 750,
            cruise_delay_us: 100,
            end_delay_us: 1500,
            accel_revs: 0.75,
            cruise_revs: 1.0,
            decel_revs: 0.75,
        }
    }
}

impl MotorConfig {
    /// Number of distinct points on the acceleration and deceleration curves.
    pub fn curve_len(&self) -> usize {
        (self.steps_per_rev / self.downsample.max(1)) as usize
    }

    /// Number of steps in the given number of revolutions.
    pub fn steps(&self, revs: f32) -> u32 {
        (self.steps_per_rev as f32 * revs) as u32
    }
}
