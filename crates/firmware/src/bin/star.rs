//! Firmware for the star board of the zimbelstern, which sits up in the case next to the star and drives its
//! stepper motor. It runs on the same Nucleo-F767ZI board as the controller.
//!
//! The board listens to the star bus, a one-way serial line from the controller, and spins the star for as long as
//! the controller keeps asking it to. The star ramps up and down along logarithmic curves so that it neither jerks
//! nor rattles the case.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_stm32::{
    bind_interrupts,
    gpio::{Level, Output, Speed},
    mode::Async,
    peripherals,
    usart::{self, UartRx},
};
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    watch::{Receiver, Sender, Watch},
};
use embassy_time::{Duration, TimeoutError, Timer, with_timeout};
use zimbelstern_board::clock_config;
use zimbelstern_lib::{
    configuration::{MotorConfig, Timing},
    motor::{MotionProfile, MotorRunner, StarCommand},
};

#[cfg(feature = "defmt-rtt")]
use defmt_rtt as _;
#[cfg(not(feature = "panic-probe"))]
use panic_halt as _;
#[cfg(feature = "panic-probe")]
use panic_probe as _;

bind_interrupts!(
    #[doc(hidden)]
    struct Irqs {
        USART6 => usart::InterruptHandler<peripherals::USART6>;
    }
);

const STAR_BAUD: u32 = 9_600;

const SPIN_RECEIVER_CNT: usize = 1;
type SpinSync = Watch<CriticalSectionRawMutex, bool, SPIN_RECEIVER_CNT>;
type SpinSender<'a> = Sender<'a, CriticalSectionRawMutex, bool, SPIN_RECEIVER_CNT>;
type SpinReceiver<'a> = Receiver<'a, CriticalSectionRawMutex, bool, SPIN_RECEIVER_CNT>;

/// Whether the controller currently wants the star to spin.
static SPIN: SpinSync = Watch::new_with(false);

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Initializing star");

    let p = embassy_stm32::init(clock_config());

    let timing = Timing::default();
    let profile = unwrap!(MotionProfile::build(&MotorConfig::default()));
    info!("Motion profile of {} points per ramp", profile.accel().len());

    // star bus: USART6 RX on PC7
    let mut bus_config = usart::Config::default();
    bus_config.baudrate = STAR_BAUD;
    let rx = unwrap!(UartRx::new(p.USART6, Irqs, p.PC7, p.DMA2_CH1, bus_config));
    unwrap!(spawner.spawn(listener_task(rx, SPIN.sender(), timing.star_timeout)));

    // stepper driver: STEP, active-low ENABLE, and DIR, which is fixed since the star only turns one way
    let step = Output::new(p.PE14, Level::Low, Speed::VeryHigh);
    let enable = Output::new(p.PE15, Level::High, Speed::Low);
    let direction = Output::new(p.PE13, Level::High, Speed::Low);
    unwrap!(spawner.spawn(stepper_task(
        step,
        enable,
        direction,
        unwrap!(SPIN.receiver()),
        MotorRunner::new(profile)
    )));
}

/// Task responsible for reading the star bus.
///
/// Silence for longer than `timeout` counts as [`StarCommand::Off`], so the star comes to rest if the controller
/// goes away mid-run.
#[embassy_executor::task]
async fn listener_task(mut rx: UartRx<'static, Async>, spin: SpinSender<'static>, timeout: Duration) -> ! {
    let mut byte = [0];
    loop {
        let on = match with_timeout(timeout, rx.read(&mut byte)).await {
            Ok(Ok(())) => match StarCommand::from_byte(byte[0]) {
                Some(command) => command.is_on(),
                None => {
                    warn!("Ignoring {=u8:x} on the star bus", byte[0]);
                    continue;
                }
            },
            Ok(Err(e)) => {
                warn!("Star bus read failed: {}", e);
                continue;
            }
            Err(TimeoutError) => false,
        };

        if spin.try_get() != Some(on) {
            info!("Star {}", if on { "on" } else { "off" });
            spin.send(on);
        }
    }
}

/// Task responsible for pulsing the stepper driver.
///
/// Every step, the runner is told whether the star should spin and answers with the half period of the step. Once
/// the star is at rest the driver is disabled until the next [`StarCommand::On`].
#[embassy_executor::task]
async fn stepper_task(
    mut step: Output<'static>,
    mut enable: Output<'static>,
    // held for as long as the task lives so that the pin keeps its level
    _direction: Output<'static>,
    mut spin: SpinReceiver<'static>,
    mut runner: MotorRunner,
) -> ! {
    loop {
        let on = spin.try_get().unwrap_or(false);
        match runner.next_delay(on) {
            Some(delay) => {
                enable.set_low();
                step.set_high();
                Timer::after_micros(delay.into()).await;
                step.set_low();
                Timer::after_micros(delay.into()).await;
            }
            None => {
                enable.set_high();
                spin.changed_and(|on| *on).await;
            }
        }
    }
}
