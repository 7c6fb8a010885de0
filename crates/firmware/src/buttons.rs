//! Polls the pistons wired to the board.
//!
//! Both buttons are normally open and pull the pin to ground when pressed. They are polled rather than bound to
//! EXTI lines because hold detection needs the clock anyway.

use crate::{ControllerAsyncMutex, StatusSender, update};
use defmt::*;
use embassy_stm32::gpio::Input;
use embassy_time::{Instant, Timer};
use zimbelstern_lib::{configuration::Timing, input::ButtonTracker};

/// Identifies which button a [`button_task`] polls.
#[derive(Clone, Copy, Format)]
pub enum Button {
    /// Starts and stops the zimbelstern; held, it enters program mode.
    Zimbel,
    /// Arms the zimbelstern to start with the next note; held for long, it plays the hymn.
    Prepare,
}

#[embassy_executor::task(pool_size = 2)]
pub async fn button_task(
    pin: Input<'static>,
    button: Button,
    controller: &'static ControllerAsyncMutex,
    status: StatusSender<'static>,
    timing: Timing,
) -> ! {
    let hold = match button {
        Button::Zimbel => timing.program_hold,
        Button::Prepare => timing.hymn_hold,
    };
    let mut tracker = ButtonTracker::new(hold, timing.debounce);

    loop {
        let now = Instant::now();
        if let Some(event) = tracker.sample(pin.is_low(), now) {
            info!("{} button: {}", button, event);
            update(controller, &status, |c| match button {
                Button::Zimbel => c.zimbel_button(event, now),
                Button::Prepare => c.prepare_button(event, now),
            })
            .await;
        }
        Timer::after(timing.yield_interval).await;
    }
}
