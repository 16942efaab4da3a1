//! Conversion of raw accumulations into calibrated spectra
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::acquisition::RawPixel;
use crate::design_parameters::{ADC_FULL_SCALE, PIXELS};

/// Unit of the processed measurement.
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
pub enum MeasurementType {
    /// Fraction of the ADC reference.
    #[default]
    Relative = 0,
    /// Sensor output voltage.
    Voltage = 1,
    /// Fraction of the saturation voltage of the active gain.
    Absolute = 2,
}

/// Convert raw accumulations into `out` and return the largest value.
///
/// Pixels without any conversion come out as 0.
pub fn process(
    raw: &[RawPixel],
    kind: MeasurementType,
    reference: f32,
    saturation: f32,
    out: &mut [f32],
) -> f32 {
    let scale = match kind {
        MeasurementType::Relative => 1.0,
        MeasurementType::Voltage => reference,
        MeasurementType::Absolute => reference / saturation,
    };

    out.iter_mut().zip(raw).fold(0.0, |max, (value, pixel)| {
        *value = if pixel.count > 0 {
            pixel.sum as f32 * scale / (pixel.count as f32 * ADC_FULL_SCALE)
        } else {
            0.0
        };
        value.max(max)
    })
}

/// Mean of all values above 95 % of `max`, or `max` if there are none.
pub fn averaged_max(max: f32, data: &[f32]) -> f32 {
    let (sum, count) = data
        .iter()
        .filter(|&&v| v > max * 0.95)
        .fold((0.0, 0u32), |(sum, count), &v| (sum + v, count + 1));
    if count > 0 {
        sum / count as f32
    } else {
        max
    }
}

/// Wavelength in nm of the zero based pixel `pixel`.
///
/// The calibration polynomial is evaluated at the one based pixel number.
pub fn wavelength(calibration: &[f64; 6], pixel: usize) -> f64 {
    let p = (pixel + 1) as f64;
    calibration.iter().rev().fold(0.0, |acc, c| acc * p + c)
}

/// Stearns & Stearns (1988) bandpass correction of pixel `i`.
///
/// The taps sum to one so flat spectra pass unchanged. The result is not clamped.
fn bandpass(value: impl Fn(usize) -> f64, i: usize, len: usize) -> f64 {
    if len < 2 {
        value(i)
    } else if i == 0 {
        1.083 * value(0) - 0.083 * value(1)
    } else if i == len - 1 {
        1.083 * value(i) - 0.083 * value(i - 1)
    } else {
        1.166 * value(i) - 0.083 * value(i - 1) - 0.083 * value(i + 1)
    }
}

/// The current measurement and black reference.
#[derive(Clone, Debug)]
pub struct Spectrum {
    measurement: [f32; PIXELS],
    black: [f32; PIXELS],
}

impl Default for Spectrum {
    fn default() -> Self {
        Self {
            measurement: [0.0; PIXELS],
            black: [0.0; PIXELS],
        }
    }
}

impl Spectrum {
    pub fn measurement_values(&self) -> &[f32; PIXELS] {
        &self.measurement
    }

    pub fn measurement_mut(&mut self) -> &mut [f32; PIXELS] {
        &mut self.measurement
    }

    pub fn black_mut(&mut self) -> &mut [f32; PIXELS] {
        &mut self.black
    }

    pub fn reset_black(&mut self) {
        self.black = [0.0; PIXELS];
    }

    fn corrected(&self, pixel: usize, subtract_black: bool) -> f64 {
        let m = self.measurement[pixel];
        if subtract_black {
            (m - self.black[pixel]).max(0.0) as f64
        } else {
            m as f64
        }
    }

    /// Measurement of `pixel`, black subtracted before the optional bandpass correction.
    pub fn measurement(
        &self,
        pixel: usize,
        subtract_black: bool,
        bandpass_correction: bool,
    ) -> f64 {
        let value = |i| self.corrected(i, subtract_black);
        if bandpass_correction {
            bandpass(value, pixel, PIXELS)
        } else {
            value(pixel)
        }
    }

    /// Black reference of `pixel`.
    pub fn black(&self, pixel: usize, bandpass_correction: bool) -> f64 {
        let value = |i: usize| self.black[i] as f64;
        if bandpass_correction {
            bandpass(value, pixel, PIXELS)
        } else {
            value(pixel)
        }
    }
}
