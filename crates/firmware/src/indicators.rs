//! Drives the lamps in the zimbel and prepare pistons.

use crate::{ControllerAsyncMutex, StatusReceiver, StatusSender, update};
use embassy_futures::select::{Either, select};
use embassy_stm32::gpio::{Level, Output};
use embassy_time::{Instant, Timer};
use zimbelstern_lib::configuration::Timing;

/// Task responsible for the piston lamps.
///
/// The zimbel lamp is lit while the zimbelstern runs and blinks while in program mode; the prepare lamp is lit
/// while the prepared latch is armed. Since this task is the one awake during program mode, it is also the one
/// that expires program mode when nothing has been captured in time.
#[embassy_executor::task]
pub async fn lamp_task(
    mut zimbel_lamp: Output<'static>,
    mut prepare_lamp: Output<'static>,
    mut status: StatusReceiver<'static>,
    controller: &'static ControllerAsyncMutex,
    sender: StatusSender<'static>,
    timing: Timing,
) -> ! {
    loop {
        let current = status.get().await;
        prepare_lamp.set_level(Level::from(current.prepared));

        let Some(window) = current.program_window else {
            zimbel_lamp.set_level(Level::from(current.running));
            status.changed().await;
            continue;
        };

        zimbel_lamp.set_level(Level::from(window.lamp_lit(Instant::now())));
        if let Either::Second(_) = select(status.changed(), Timer::after(timing.blink_interval)).await {
            update(controller, &sender, |c| c.poll_program(Instant::now())).await;
        }
    }
}
