//! Automatic gain, reference and integration time selection
//!
//! Autoranging starts from the shortest integration at high gain, falls back to no gain if
//! that already saturates and then walks the integration time up until the largest pixel lands
//! just below the saturation voltage (or the ADC reference, whichever is lower).
//!
//! The saturation voltages have to be set or measured with
//! [Spectrometer::measure_saturation_voltages] for this to work.
use strum::IntoStaticStr;

use crate::design_parameters::{
    AUTORANGE_LOWER, AUTORANGE_MAX_ITERATIONS, AUTORANGE_SETTLE_MS,
    AUTORANGE_UPPER, LIVENESS_THRESHOLD_US, MAX_INTEGRATION_TICKS,
    MIN_INTEGRATION_TICKS, READ_TICKS,
};
use crate::hardware::{AdcReference, Gain, Liveness, Platform};
use crate::processing::{averaged_max, MeasurementType};
use crate::settings::{integration_time_us, Key, Store};
use crate::spectrometer::Spectrometer;

/// Autoranging target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoStaticStr)]
pub enum AutoMode {
    /// Fill the currently selected ADC reference. Only gain and integration time change.
    ForSetRef,
    /// Fill the smallest ADC reference covering the shortest reading for the shortest
    /// integration time.
    AllMinInteg,
    /// Fill the sensor output range up to saturation.
    AllMaxRange,
}

impl<P: Platform, S: Store, H: Liveness> Spectrometer<P, S, H> {
    /// Read out at the configured integration time and return the largest voltage.
    fn read_voltage(&mut self, light: bool) -> f32 {
        self.read_spectrometer(0, false, light);
        self.process(MeasurementType::Voltage, false)
    }

    /// Take a measurement after selecting gain, reference and integration time automatically.
    ///
    /// The black reference is dropped. The selected integration time, gain and (unless in
    /// [AutoMode::ForSetRef]) ADC reference are persisted. `external` enables the external light
    /// source during each integration, the trigger output stays idle.
    pub fn take_auto_measurement(&mut self, mode: AutoMode, external: bool) {
        if self.is_busy() {
            return;
        }
        self.measuring = true;
        self.reset_black_levels();

        self.apply_gain(Gain::High);
        let mut saturation = self.config.saturation_high_gain;
        if mode != AutoMode::ForSetRef {
            self.apply_reference(AdcReference::covering(saturation));
        }
        self.platform.delay_ms(AUTORANGE_SETTLE_MS);

        self.config.integration_ticks = MIN_INTEGRATION_TICKS;
        let mut max = self.read_voltage(external);

        if max > self.config.saturation_high_gain {
            self.apply_gain(Gain::None);
            saturation = self.config.saturation_no_gain;
            if mode != AutoMode::ForSetRef {
                self.apply_reference(AdcReference::covering(saturation));
            }
            self.platform.delay_ms(AUTORANGE_SETTLE_MS);
            max = self.read_voltage(external);
        }

        if max < saturation && mode == AutoMode::AllMinInteg {
            self.apply_reference(AdcReference::covering(max));
            self.platform.delay_ms(AUTORANGE_SETTLE_MS);
        }

        let saturation = saturation.min(self.config.adc_reference.volts());
        let lower = saturation * AUTORANGE_LOWER;
        let upper = saturation * AUTORANGE_UPPER;

        let mut step = self.config.integration_ticks;
        let mut iterations = 0;
        let mut going = max < lower;
        while going {
            let mut ticks = self.config.integration_ticks;
            if max < upper {
                step = if max > 0.0 {
                    ((upper - max) * (ticks + READ_TICKS as u32) as f32 / max)
                        as u32
                } else {
                    MAX_INTEGRATION_TICKS
                };
                ticks = ticks.saturating_add(step);
            } else {
                step >>= 1;
                ticks = ticks.saturating_sub(step);
            }
            ticks = ticks.clamp(MIN_INTEGRATION_TICKS, MAX_INTEGRATION_TICKS);

            // Long reads starve the host.
            if integration_time_us(ticks) > LIVENESS_THRESHOLD_US {
                self.liveness.checkin();
                self.liveness.service();
            }

            self.config.integration_ticks = ticks;
            max = self.read_voltage(external);
            iterations += 1;
            log::debug!(
                "Autorange step {iterations}: {ticks} ticks, {max} V (step {step})"
            );

            let settled = max >= lower && max < upper;
            let pinned = (ticks == MAX_INTEGRATION_TICKS && max < upper)
                || (ticks == MIN_INTEGRATION_TICKS && max > upper);
            going = if settled || pinned {
                false
            } else if step <= 2 {
                // Undo the last step if it overshot.
                if max > upper {
                    self.config.integration_ticks = ticks
                        .saturating_sub(step << 1)
                        .max(MIN_INTEGRATION_TICKS);
                    self.read_voltage(external);
                }
                false
            } else if iterations >= AUTORANGE_MAX_ITERATIONS {
                log::warn!("Autorange did not settle after {iterations} steps");
                false
            } else {
                true
            };
        }

        self.process(self.config.measurement_type, false);
        self.measuring = false;

        log::info!(
            "Autorange {}: {:?} gain, {:?} reference, {} us",
            <&str>::from(mode),
            self.config.gain,
            self.config.adc_reference,
            self.integration_time()
        );

        self.persist(Key::IntegrationTicks);
        self.persist(Key::Gain);
        if mode != AutoMode::ForSetRef {
            self.persist(Key::AdcReference);
        }
    }

    /// Measure the saturation voltages of both gains.
    ///
    /// The sensor has to be exposed to bright light. Both gains are read out for 1 s at the
    /// 4.096 V reference and the mean of the pixels within 5 % of the peak is taken as the
    /// saturation voltage. Gain and reference are restored afterwards.
    pub fn measure_saturation_voltages(&mut self, persist: bool) {
        if self.is_busy() {
            return;
        }
        self.measuring = true;

        let (gain, reference) = (self.config.gain, self.config.adc_reference);

        self.apply_reference(AdcReference::V4_096);
        self.apply_gain(Gain::High);
        self.platform.delay_ms(AUTORANGE_SETTLE_MS);
        self.read_spectrometer(1_000_000, false, false);
        let max = self.process(MeasurementType::Voltage, false);
        let high_gain = averaged_max(max, self.spectrum.measurement_values());

        self.apply_gain(Gain::None);
        self.platform.delay_ms(AUTORANGE_SETTLE_MS);
        self.read_spectrometer(1_000_000, false, false);
        let max = self.process(MeasurementType::Voltage, false);
        let no_gain = averaged_max(max, self.spectrum.measurement_values());

        self.apply_reference(reference);
        self.apply_gain(gain);
        self.measuring = false;

        log::info!("Measured saturation: {high_gain} V high gain, {no_gain} V no gain");
        self.set_saturation_voltages(high_gain, no_gain, persist);
    }
}
