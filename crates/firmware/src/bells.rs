//! Strikes the bells.

use crate::StatusReceiver;
use defmt::*;
use embassy_futures::select::{Either, select};
use embassy_stm32::gpio::Output;
use embassy_time::{Duration, Instant, Timer};
use zimbelstern_lib::{
    bell::{BellSequencer, NOTE_CNT, Strike},
    configuration::Settings,
    state::Status,
};

/// Task responsible for the bell solenoids, one per [`Note`](zimbelstern_lib::bell::Note).
///
/// A new activation generation restarts the melody (and its fade-in) even if this task never saw the zimbelstern
/// stop in between. A hymn request is played through once unless the zimbelstern is activated meanwhile.
#[embassy_executor::task]
pub async fn bell_task(
    mut solenoids: [Output<'static>; NOTE_CNT],
    mut status: StatusReceiver<'static>,
    settings: Settings,
) -> ! {
    // seeded on first use: the time it takes the organist to reach for the zimbelstern is the only entropy around
    let mut sequencer: Option<BellSequencer> = None;
    let mut generation = 0;
    let mut hymn = 0;

    loop {
        let current = status.get().await;

        if current.running {
            hymn = current.hymn;
            let sequencer =
                sequencer.get_or_insert_with(|| BellSequencer::new(&settings, Instant::now().as_ticks()));
            if current.generation != generation {
                generation = current.generation;
                sequencer.restart(current.volume_ms, current.tempo_bpm);
            }
            if let Some(strike) = sequencer.next_strike(current.volume_ms, current.tempo_bpm) {
                play(&mut solenoids, strike, &mut status, |s| s.running && s.generation == generation).await;
            }
            continue;
        }

        if current.hymn != hymn {
            hymn = current.hymn;
            info!("Playing the hymn");
            let sequencer =
                sequencer.get_or_insert_with(|| BellSequencer::new(&settings, Instant::now().as_ticks()));
            sequencer.play_hymn();
            while let Some(strike) = sequencer.next_strike(current.volume_ms, current.tempo_bpm) {
                if !play(&mut solenoids, strike, &mut status, |s| !s.running).await {
                    info!("Hymn interrupted");
                    break;
                }
            }
            continue;
        }

        status.changed().await;
    }
}

/// Sounds one strike and its echo, then rests until the next beat.
///
/// Before every output and during the rest, the latest status is checked against `proceed`; returns false as soon
/// as it no longer holds, leaving every solenoid released.
async fn play(
    solenoids: &mut [Output<'static>; NOTE_CNT],
    strike: Strike,
    status: &mut StatusReceiver<'static>,
    proceed: impl Fn(&Status) -> bool,
) -> bool {
    debug!("Striking {}", strike);
    pulse(&mut solenoids[strike.note.index()], strike.strike).await;

    if let Some(echo) = strike.echo {
        Timer::after(echo.delay).await;
        if !status.try_get().is_some_and(|s| proceed(&s)) {
            return false;
        }
        pulse(&mut solenoids[echo.note.index()], echo.strike).await;
    }

    match select(Timer::after(strike.rest), status.changed_and(|s| !proceed(s))).await {
        Either::First(_) => true,
        Either::Second(_) => false,
    }
}

/// Energizes a solenoid for `strike`. The clapper returns by spring once released.
async fn pulse(solenoid: &mut Output<'static>, strike: Duration) {
    solenoid.set_high();
    Timer::after(strike).await;
    solenoid.set_low();
}
