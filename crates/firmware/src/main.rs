//! Zimbelstern is [Embassy](https://embassy.dev)-based firmware for the controller of a
//! [zimbelstern](https://en.wikipedia.org/wiki/Zimbelstern), the ornament of small bells and a revolving star found
//! on some pipe organs. The firmware runs on the [Nucleo-F767ZI development
//! board](https://www.st.com/en/evaluation-tools/nucleo-f767zi.html), which is powered by an F7-series STM32
//! microcontroller, mounted in the organ console.
//!
//! It listens to the organ's MIDI output so that the organist can bind the zimbelstern to any registration piston,
//! toggle piston, or stop, and it reads the zimbel and prepare pistons and the volume (and optionally tempo) knob
//! wired to the board. While running it strikes five tuned bells through solenoids and tells the star board, which
//! runs the `star` binary, to spin the star.
//!
//! All decisions are made by the [`Controller`] of the `zimbelstern_lib` crate; the tasks in this crate merely move
//! bytes and pin levels in and out of it.

#![no_std]
#![no_main]

mod bells;
mod buttons;
mod flash_store;
mod indicators;
mod knobs;
mod midi;
mod star;

use crate::{buttons::Button, flash_store::FlashStore};
use defmt::*;
use embassy_executor::Spawner;
use embassy_stm32::{
    adc::{Adc, AdcChannel as _},
    bind_interrupts,
    flash::Flash,
    gpio::{Input, Level, Output, Pull, Speed},
    peripherals,
    usart::{self, UartRx, UartTx},
};
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    mutex,
    watch::{Receiver, Sender, Watch},
};
use static_cell::StaticCell;
use zimbelstern_board::clock_config;
use zimbelstern_lib::{
    configuration::Settings,
    controller::Controller,
    state::{Change, Status},
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
        USART2 => usart::InterruptHandler<peripherals::USART2>;
    }
);

type ControllerAsyncMutex = mutex::Mutex<CriticalSectionRawMutex, Controller<FlashStore>>;

/// Lamps, bells, and star bus.
const STATUS_RECEIVER_CNT: usize = 3;
type StatusSync = Watch<CriticalSectionRawMutex, Status, STATUS_RECEIVER_CNT>;
type StatusSender<'a> = Sender<'a, CriticalSectionRawMutex, Status, STATUS_RECEIVER_CNT>;
type StatusReceiver<'a> = Receiver<'a, CriticalSectionRawMutex, Status, STATUS_RECEIVER_CNT>;

/// Publishes the state of the device after every change.
static STATUS_SYNC: StatusSync = Watch::new();

/// MIDI runs at a fixed 31.25 kbaud.
const MIDI_BAUD: u32 = 31_250;

/// Rate of the line between the controller and the star board.
const STAR_BAUD: u32 = 9_600;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Initializing zimbelstern");

    let p = embassy_stm32::init(clock_config());

    let settings = Settings::default();

    static CONTROLLER: StaticCell<ControllerAsyncMutex> = StaticCell::new();
    let controller = {
        let store = FlashStore::new(Flash::new_blocking(p.FLASH));
        let mut controller = Controller::new(settings, store);
        controller.boot();
        info!("Booted into {}", controller.status());
        CONTROLLER.init(mutex::Mutex::new(controller))
    };

    // every task that mutates the controller publishes through its own sender; receivers are created before the
    // first status is sent so that none of them misses it
    let lamps_status = unwrap!(STATUS_SYNC.receiver());
    let bells_status = unwrap!(STATUS_SYNC.receiver());
    let star_status = unwrap!(STATUS_SYNC.receiver());
    STATUS_SYNC.sender().send(controller.lock().await.status());

    // MIDI in: USART2 RX on PD6, per the Nucleo's ST Zio connector (CN9)
    let mut midi_config = usart::Config::default();
    midi_config.baudrate = MIDI_BAUD;
    let midi_rx = unwrap!(UartRx::new(p.USART2, Irqs, p.PD6, p.DMA1_CH5, midi_config));
    unwrap!(spawner.spawn(midi::midi_task(midi_rx, controller, STATUS_SYNC.sender())));

    let zimbel_button = Input::new(p.PF13, Pull::Up);
    unwrap!(spawner.spawn(buttons::button_task(
        zimbel_button,
        Button::Zimbel,
        controller,
        STATUS_SYNC.sender(),
        settings.timing
    )));

    let prepare_button = Input::new(p.PE9, Pull::Up);
    unwrap!(spawner.spawn(buttons::button_task(
        prepare_button,
        Button::Prepare,
        controller,
        STATUS_SYNC.sender(),
        settings.timing
    )));

    let adc = Adc::new(p.ADC1);
    let volume_knob = p.PA3.degrade_adc();
    let tempo_knob = settings.tempo_knob.map(|_| p.PC0.degrade_adc());
    unwrap!(spawner.spawn(knobs::knob_task(
        adc,
        volume_knob,
        tempo_knob,
        controller,
        STATUS_SYNC.sender(),
        settings
    )));

    let zimbel_lamp = Output::new(p.PE11, Level::Low, Speed::Low);
    let prepare_lamp = Output::new(p.PF14, Level::Low, Speed::Low);
    unwrap!(spawner.spawn(indicators::lamp_task(
        zimbel_lamp,
        prepare_lamp,
        lamps_status,
        controller,
        STATUS_SYNC.sender(),
        settings.timing
    )));

    // one solenoid driver per bell, in the order of `Note::ALL`
    let solenoids = [
        Output::new(p.PG9, Level::Low, Speed::Low),
        Output::new(p.PG14, Level::Low, Speed::Low),
        Output::new(p.PF15, Level::Low, Speed::Low),
        Output::new(p.PE13, Level::Low, Speed::Low),
        Output::new(p.PF12, Level::Low, Speed::Low),
    ];
    unwrap!(spawner.spawn(bells::bell_task(solenoids, bells_status, settings)));

    // star bus: USART6 TX on PC6
    let mut star_config = usart::Config::default();
    star_config.baudrate = STAR_BAUD;
    let star_tx = unwrap!(UartTx::new(p.USART6, p.PC6, p.DMA2_CH6, star_config));
    unwrap!(spawner.spawn(star::star_task(star_tx, star_status, settings.timing)));
}

/// Applies `update` to the controller and publishes the resulting status if anything changed.
///
/// The lock is held only for as long as `update` runs, which never awaits.
async fn update(
    controller: &'static ControllerAsyncMutex,
    status: &StatusSender<'static>,
    update: impl FnOnce(&mut Controller<FlashStore>) -> Change,
) -> Change {
    let mut controller = controller.lock().await;
    let change = update(&mut controller);
    if !change.is_none() {
        let current = controller.status();
        debug!("{} changed: {}", change, current);
        status.send(current);
    }
    change
}
