use embedded_hal_1::digital::{OutputPin, PinState};

use super::SensorLines;

/// Sensor control lines on plain GPIO outputs.
///
/// The external trigger and light source outputs are optional.
pub struct SensorPins<CLK, ST, TRG, LIGHT> {
    pub clk: CLK,
    pub st: ST,
    pub trg: Option<TRG>,
    pub light: Option<LIGHT>,
}

// Runs in interrupt context, pin errors are dropped.
fn drive<P: OutputPin>(pin: &mut P, high: bool) {
    pin.set_state(PinState::from(high)).ok();
}

impl<CLK, ST, TRG, LIGHT> SensorLines for SensorPins<CLK, ST, TRG, LIGHT>
where
    CLK: OutputPin,
    ST: OutputPin,
    TRG: OutputPin,
    LIGHT: OutputPin,
{
    fn set_clock(&mut self, high: bool) {
        drive(&mut self.clk, high);
    }

    fn set_strobe(&mut self, high: bool) {
        drive(&mut self.st, high);
    }

    fn set_trigger(&mut self, high: bool) {
        if let Some(trg) = self.trg.as_mut() {
            drive(trg, high);
        }
    }

    fn set_light(&mut self, high: bool) {
        if let Some(light) = self.light.as_mut() {
            drive(light, high);
        }
    }

    fn has_trigger(&self) -> bool {
        self.trg.is_some()
    }
}
