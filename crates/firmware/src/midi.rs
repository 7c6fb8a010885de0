//! Reads the organ's MIDI output.

use crate::{ControllerAsyncMutex, StatusSender, update};
use defmt::*;
use embassy_stm32::{mode::Async, usart::UartRx};
use embassy_time::Instant;

/// Comfortably holds the longest stop change a Rodgers organ sends.
const BATCH_LEN: usize = 128;

/// Task responsible for handing every batch of bytes received on the MIDI port to the controller.
///
/// The port is read until the line goes idle, so a batch holds whatever the organ sent in one burst.
#[embassy_executor::task]
pub async fn midi_task(
    mut rx: UartRx<'static, Async>,
    controller: &'static ControllerAsyncMutex,
    status: StatusSender<'static>,
) -> ! {
    let mut buf = [0; BATCH_LEN];
    loop {
        match rx.read_until_idle(&mut buf).await {
            Ok(0) => {}
            Ok(n) => {
                let batch = &buf[..n];
                debug!("MIDI in: {=[u8]:x}", batch);
                update(controller, &status, |c| c.receive_midi(batch, Instant::now())).await;
            }
            Err(e) => warn!("MIDI read failed: {}", e),
        }
    }
}
