//! Samples the volume potentiometer and, if one is fitted, the tempo potentiometer.

use crate::{ControllerAsyncMutex, StatusSender, update};
use defmt::*;
use embassy_stm32::{
    adc::{Adc, AnyAdcChannel},
    peripherals::ADC1,
};
use embassy_time::Timer;
use zimbelstern_lib::{configuration::Settings, input::Knob};

/// The ADC resolves 12 bits.
const FULL_SCALE: u16 = 4095;

#[embassy_executor::task]
pub async fn knob_task(
    mut adc: Adc<'static, ADC1>,
    mut volume_pin: AnyAdcChannel<ADC1>,
    mut tempo_pin: Option<AnyAdcChannel<ADC1>>,
    controller: &'static ControllerAsyncMutex,
    status: StatusSender<'static>,
    settings: Settings,
) -> ! {
    let mut volume = Knob::new(settings.volume_knob, FULL_SCALE);
    let mut tempo = settings.tempo_knob.map(|range| Knob::new(range, FULL_SCALE));

    loop {
        if let Some(volume_ms) = volume.sample(adc.blocking_read(&mut volume_pin)) {
            info!("Volume: {} ms", volume_ms);
            update(controller, &status, |c| c.set_volume(volume_ms)).await;
        }

        if let (Some(knob), Some(pin)) = (tempo.as_mut(), tempo_pin.as_mut())
            && let Some(tempo_bpm) = knob.sample(adc.blocking_read(pin))
        {
            info!("Tempo: {} bpm", tempo_bpm);
            update(controller, &status, |c| c.set_tempo(tempo_bpm)).await;
        }

        Timer::after(settings.timing.yield_interval).await;
    }
}
