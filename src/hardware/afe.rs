use arbitrary_int::{u2, Number};
use bitbybit::bitenum;
use embedded_hal_1::digital::{OutputPin, PinState};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Sensor output amplification.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[repr(u8)]
pub enum Gain {
    #[default]
    None = 0,
    High = 1,
}

/// ADC reference voltage, encoded on the two reference select lines.
#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq, Eq, Default)]
pub enum AdcReference {
    V2_5 = 0,
    V3_0 = 1,
    V4_096 = 2,
    #[default]
    V5_0 = 3,
}

impl AdcReference {
    /// The reference voltage in volts.
    pub fn volts(self) -> f32 {
        match self {
            Self::V2_5 => 2.5,
            Self::V3_0 => 3.0,
            Self::V4_096 => 4.096,
            Self::V5_0 => 5.0,
        }
    }

    /// The smallest reference usable for sensor voltages up to `voltage`.
    ///
    /// The C12666MA output never exceeds 4.096 V, so 5 V is never selected.
    pub fn covering(voltage: f32) -> Self {
        if voltage > Self::V3_0.volts() {
            Self::V4_096
        } else if voltage > Self::V2_5.volts() {
            Self::V3_0
        } else {
            Self::V2_5
        }
    }
}

impl From<AdcReference> for u8 {
    fn from(reference: AdcReference) -> u8 {
        reference.raw_value().value()
    }
}

impl TryFrom<u8> for AdcReference {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        if value <= <u2 as Number>::MAX.value() {
            Ok(Self::new_with_raw_value(u2::new(value)))
        } else {
            Err(value)
        }
    }
}

/// The sensor gain line and the ADC reference selector driven via GPIO.
pub struct Frontend<G, S0, S1> {
    gain: G,
    sel0: S0,
    sel1: S1,
}

fn drive<P: OutputPin>(pin: &mut P, high: bool) {
    if let Err(e) = pin.set_state(PinState::from(high)) {
        log::warn!("Frontend pin: {e:?}");
    }
}

impl<G, S0, S1> Frontend<G, S0, S1>
where
    G: OutputPin,
    S0: OutputPin,
    S1: OutputPin,
{
    /// Construct the frontend.
    ///
    /// Args:
    /// * `gain` - Output connected to the sensor gain input.
    /// * `sel0` - Output connected to bit 0 of the reference selector.
    /// * `sel1` - Output connected to bit 1 of the reference selector.
    pub fn new(gain: G, sel0: S0, sel1: S1) -> Self {
        Self { gain, sel0, sel1 }
    }

    pub fn set_gain(&mut self, gain: Gain) {
        drive(&mut self.gain, gain == Gain::High);
    }

    pub fn set_reference(&mut self, reference: AdcReference) {
        let code = u8::from(reference);
        drive(&mut self.sel0, code & 0b01 != 0);
        drive(&mut self.sel1, code & 0b10 != 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covering_reference() {
        assert_eq!(AdcReference::covering(2.3), AdcReference::V2_5);
        assert_eq!(AdcReference::covering(2.5), AdcReference::V2_5);
        assert_eq!(AdcReference::covering(2.7), AdcReference::V3_0);
        assert_eq!(AdcReference::covering(3.5), AdcReference::V4_096);
        assert_eq!(AdcReference::covering(4.5), AdcReference::V4_096);
    }

    #[test]
    fn reference_codes() {
        for code in 0..4u8 {
            assert_eq!(u8::from(AdcReference::try_from(code).unwrap()), code);
        }
        assert_eq!(AdcReference::try_from(4), Err(4));
    }
}
