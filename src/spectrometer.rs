//! Spectrometer session control and configuration
//!
//! All measurement calls block until the sensor has been read out, which can take up to ten
//! seconds at the longest integration time. Calls made while a measurement is in progress are
//! ignored, as are configuration changes.
use strum::IntoEnumIterator;

use crate::acquisition::SessionPlan;
use crate::design_parameters::{
    us_to_ticks, ticks_to_us, EXT_TRIGGER_HIGH_TICKS, MAX_TRIGGER_DELAY_US,
    PIXELS, SATURATION_HIGH_GAIN, SATURATION_NO_GAIN, SETTLE_MS, TICK_PERIOD,
};
use crate::hardware::{AdcReference, Gain, Liveness, Platform};
use crate::processing::{self, MeasurementType, Spectrum};
use crate::settings::{
    integration_ticks, integration_time_us, saturation_voltage, DeviceConfig,
    Key, Store,
};

pub struct Spectrometer<P, S, H> {
    pub(crate) platform: P,
    pub(crate) store: S,
    pub(crate) liveness: H,
    pub(crate) config: DeviceConfig,
    pub(crate) spectrum: Spectrum,
    // A measurement or autoranging run is in progress.
    pub(crate) measuring: bool,
}

impl<P: Platform, S: Store, H: Liveness> Spectrometer<P, S, H> {
    /// Load the configuration from `store` and apply it to the frontend.
    ///
    /// # Args
    /// * `platform` - The board resources.
    /// * `store` - The settings store.
    /// * `liveness` - Host hooks serviced during long autoranging runs.
    /// * `default_calibration` - Wavelength calibration used if none is stored.
    pub fn new(
        mut platform: P,
        mut store: S,
        liveness: H,
        default_calibration: Option<&[f64; 6]>,
    ) -> Self {
        let config = DeviceConfig::load(&mut store, default_calibration);
        log::info!("Spectrometer configuration: {config:?}");
        platform.set_gain(config.gain);
        platform.set_reference(config.adc_reference);

        Self {
            platform,
            store,
            liveness,
            config,
            spectrum: Spectrum::default(),
            measuring: false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.measuring || self.platform.engine().is_armed()
    }

    /// Run one acquisition session and leave the result in the raw buffer.
    ///
    /// # Args
    /// * `integration_us` - Integration time for this session only, 0 for the configured one.
    /// * `trigger` - Pulse the external trigger output ahead of the integration.
    /// * `light` - Enable the external light source during the integration.
    pub fn read_spectrometer(
        &mut self,
        integration_us: u32,
        trigger: bool,
        light: bool,
    ) {
        let integration_ticks = if integration_us > 0 {
            integration_ticks(integration_us)
        } else {
            self.config.integration_ticks
        };
        let plan = SessionPlan::new(
            integration_ticks,
            self.config.trigger_delay_us,
            trigger,
            light,
        );

        if !self.platform.engine().begin(&plan) {
            return;
        }

        self.platform.start(TICK_PERIOD);
        while !self.platform.engine().is_stopped() {
            self.platform.relax();
        }
        self.platform.stop();
        self.platform.engine().finish();
    }

    /// Process the raw buffer into the measurement or the black reference. Returns the largest
    /// value.
    pub(crate) fn process(&mut self, kind: MeasurementType, black: bool) -> f32 {
        let reference = self.config.adc_reference.volts();
        let saturation = self.config.saturation();
        let out = if black {
            self.spectrum.black_mut()
        } else {
            self.spectrum.measurement_mut()
        };
        self.platform.engine().with_raw(|raw| {
            processing::process(raw, kind, reference, saturation, out)
        })
    }

    /// Take a measurement.
    ///
    /// # Args
    /// * `integration_us` - Integration time, 0 for the configured one.
    /// * `external` - Pulse the external trigger and enable the light source output.
    pub fn take_measurement(&mut self, integration_us: u32, external: bool) {
        if self.is_busy() {
            return;
        }
        self.measuring = true;
        self.read_spectrometer(integration_us, external, external);
        self.process(self.config.measurement_type, false);
        self.measuring = false;
    }

    /// Take a black reference measurement. The external outputs stay idle.
    pub fn take_black_measurement(&mut self, integration_us: u32) {
        if self.is_busy() {
            return;
        }
        self.measuring = true;
        self.read_spectrometer(integration_us, false, false);
        self.process(self.config.measurement_type, true);
        self.measuring = false;
    }

    pub fn reset_black_levels(&mut self) {
        self.spectrum.reset_black();
    }

    pub(crate) fn persist(&mut self, key: Key) {
        if let Err(e) = self.config.save(&mut self.store, key) {
            log::warn!("Failed to store `{}`: {e:?}", <&str>::from(key));
        }
    }

    /// Persist the whole configuration.
    pub fn save_config(&mut self) {
        for key in Key::iter() {
            self.persist(key);
        }
    }

    pub(crate) fn apply_gain(&mut self, gain: Gain) {
        self.config.gain = gain;
        self.platform.set_gain(gain);
    }

    pub(crate) fn apply_reference(&mut self, reference: AdcReference) {
        self.config.adc_reference = reference;
        self.platform.set_reference(reference);
    }

    pub fn set_gain(&mut self, gain: Gain, persist: bool) {
        if self.is_busy() {
            return;
        }
        self.apply_gain(gain);
        if persist {
            self.persist(Key::Gain);
        }
        self.platform.delay_ms(SETTLE_MS);
    }

    pub fn gain(&self) -> Gain {
        self.config.gain
    }

    pub fn set_adc_reference(&mut self, reference: AdcReference, persist: bool) {
        if self.is_busy() {
            return;
        }
        self.apply_reference(reference);
        if persist {
            self.persist(Key::AdcReference);
        }
        self.platform.delay_ms(SETTLE_MS);
    }

    pub fn adc_reference(&self) -> AdcReference {
        self.config.adc_reference
    }

    /// Change the unit of subsequent measurements. The black reference is dropped if the unit
    /// changes.
    pub fn set_measurement_type(&mut self, kind: MeasurementType, persist: bool) {
        if self.is_busy() {
            return;
        }
        if kind != self.config.measurement_type {
            self.reset_black_levels();
        }
        self.config.measurement_type = kind;
        if persist {
            self.persist(Key::MeasurementType);
        }
    }

    pub fn measurement_type(&self) -> MeasurementType {
        self.config.measurement_type
    }

    /// Set the integration time in microseconds including the readout window.
    pub fn set_integration_time(&mut self, us: u32, persist: bool) {
        if self.is_busy() {
            return;
        }
        self.config.integration_ticks = integration_ticks(us);
        if persist {
            self.persist(Key::IntegrationTicks);
        }
    }

    pub fn integration_time(&self) -> u32 {
        integration_time_us(self.config.integration_ticks)
    }

    /// Set the delay from the external trigger rising edge to the start of the integration.
    ///
    /// The delay is at least the trigger pulse length and below 10 s. Negative values disable
    /// the trigger pulse.
    pub fn set_trigger_delay(&mut self, us: i32, persist: bool) {
        if self.is_busy() {
            return;
        }
        self.config.trigger_delay_us = if us < 0 {
            0
        } else {
            let us = (us as u32).min(MAX_TRIGGER_DELAY_US - 1);
            let ticks = (us_to_ticks(us) & !1)
                .max(EXT_TRIGGER_HIGH_TICKS.next_multiple_of(2));
            ticks_to_us(ticks)
        };
        if persist {
            self.persist(Key::TriggerDelay);
        }
    }

    pub fn trigger_delay(&self) -> u32 {
        self.config.trigger_delay_us
    }

    /// Set the saturation voltages of both gains. Values outside the datasheet limits select
    /// the lower limit, values not above zero leave the voltage unchanged.
    pub fn set_saturation_voltages(
        &mut self,
        high_gain: f32,
        no_gain: f32,
        persist: bool,
    ) {
        if self.is_busy() {
            return;
        }
        if high_gain > 0.0 {
            self.config.saturation_high_gain =
                saturation_voltage(high_gain, SATURATION_HIGH_GAIN);
            if persist {
                self.persist(Key::SaturationHighGain);
            }
        }
        if no_gain > 0.0 {
            self.config.saturation_no_gain =
                saturation_voltage(no_gain, SATURATION_NO_GAIN);
            if persist {
                self.persist(Key::SaturationNoGain);
            }
        }
    }

    /// Saturation voltages at high gain and without gain.
    pub fn saturation_voltages(&self) -> (f32, f32) {
        (self.config.saturation_high_gain, self.config.saturation_no_gain)
    }

    pub fn set_wavelength_calibration(
        &mut self,
        calibration: &[f64; 6],
        persist: bool,
    ) {
        if self.is_busy() {
            return;
        }
        self.config.calibration = *calibration;
        if persist {
            self.persist(Key::Calibration);
        }
    }

    pub fn wavelength_calibration(&self) -> &[f64; 6] {
        &self.config.calibration
    }

    pub fn set_bandpass_correction(&mut self, enable: bool) {
        if self.is_busy() {
            return;
        }
        self.config.bandpass_correction = enable;
    }

    pub fn bandpass_correction(&self) -> bool {
        self.config.bandpass_correction
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn pixels(&self) -> usize {
        PIXELS
    }

    /// Measurement of `pixel` with the configured bandpass correction.
    pub fn measurement(&self, pixel: usize, subtract_black: bool) -> f64 {
        self.spectrum.measurement(
            pixel,
            subtract_black,
            self.config.bandpass_correction,
        )
    }

    pub fn black_measurement(&self, pixel: usize) -> f64 {
        self.spectrum
            .black(pixel, self.config.bandpass_correction)
    }

    /// Wavelength of `pixel` in nm.
    pub fn wavelength(&self, pixel: usize) -> f64 {
        processing::wavelength(&self.config.calibration, pixel)
    }

    /// Chromaticity and colour temperature of the black corrected measurement.
    pub fn chromaticity(&self) -> Option<colour::Chromaticity> {
        colour::chromaticity(self)
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn liveness(&self) -> &H {
        &self.liveness
    }

    pub fn release(self) -> (P, S, H) {
        (self.platform, self.store, self.liveness)
    }
}

impl<P: Platform, S: Store, H: Liveness> colour::SpectralSource
    for Spectrometer<P, S, H>
{
    /// The sensor is hard-wired, a constructed device is always present.
    fn is_connected(&self) -> bool {
        true
    }

    fn total_pixels(&self) -> usize {
        PIXELS
    }

    fn measurement(&self, pixel: usize) -> f64 {
        Spectrometer::measurement(self, pixel, true)
    }

    fn wavelength(&self, pixel: usize) -> f64 {
        Spectrometer::wavelength(self, pixel)
    }
}
