//! Tells the star board whether to spin the star.

use crate::StatusReceiver;
use defmt::*;
use embassy_futures::select::select;
use embassy_stm32::{mode::Async, usart::UartTx};
use embassy_time::Timer;
use zimbelstern_lib::{configuration::Timing, motor::StarCommand};

/// Task responsible for the star bus.
///
/// While the zimbelstern runs, [`StarCommand::On`] is repeated every keep-alive interval; the star board stops on
/// its own if the repetitions cease, e.g., because this board lost power. [`StarCommand::Off`] is sent once when the
/// zimbelstern stops.
#[embassy_executor::task]
pub async fn star_task(mut tx: UartTx<'static, Async>, mut status: StatusReceiver<'static>, timing: Timing) -> ! {
    let mut spinning = false;
    loop {
        let current = status.get().await;

        if current.running {
            spinning = true;
            send(&mut tx, StarCommand::On).await;
            select(status.changed(), Timer::after(timing.star_keep_alive)).await;
            continue;
        }

        if spinning {
            spinning = false;
            send(&mut tx, StarCommand::Off).await;
        }
        status.changed().await;
    }
}

async fn send(tx: &mut UartTx<'static, Async>, command: StarCommand) {
    if let Err(e) = tx.write(&[command.byte()]).await {
        warn!("Unable to send {} to the star: {}", command, e);
    }
}
