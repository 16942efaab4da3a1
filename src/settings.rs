//! Spectron Settings Management
//!
//! # Design
//! The device configuration is loaded once at construction and afterwards only changed through
//! the setters of the [Spectrometer](crate::spectrometer::Spectrometer), each of which can
//! optionally persist the new value.
//!
//! Settings are stored as individual records addressed by a [Key]. This has a number of
//! benefits:
//! 1. Records can be added in the future without losing the values stored by older firmware.
//! 2. Every setter only rewrites its own record.
//! 3. Records that are absent or fail validation fall back to their defaults independently.
//!
//! Records are `postcard` encoded. Writes compare against the stored record and skip identical
//! data to spare the flash.
use core::fmt::Debug;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{de::DeserializeOwned, Serialize};
use strum::{EnumIter, IntoStaticStr};

use crate::design_parameters::{
    ticks_to_us, DEFAULT_INTEGRATION_US, EXT_TRIGGER_HIGH_TICKS,
    MAX_INTEGRATION_US, MAX_TRIGGER_DELAY_US, MIN_INTEGRATION_US, READ_TICKS,
    SATURATION_HIGH_GAIN, SATURATION_NO_GAIN, TICK_NS,
};
use crate::hardware::{AdcReference, Gain};
use crate::processing::MeasurementType;

/// Record buffer size. Covers the largest encoded record with the key and the flash word
/// padding of a map item.
pub const RECORD_SIZE: usize = 128;

/// Store record addresses.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    IntoPrimitive,
    TryFromPrimitive,
    EnumIter,
    IntoStaticStr,
)]
#[repr(u8)]
pub enum Key {
    Gain = 0,
    AdcReference = 1,
    MeasurementType = 2,
    IntegrationTicks = 3,
    TriggerDelay = 4,
    SaturationHighGain = 5,
    SaturationNoGain = 6,
    Calibration = 7,
}

/// A key-addressed record store.
pub trait Store {
    type Error: Debug;

    /// Read the record stored under `key` into `buffer`.
    fn fetch<'a>(
        &mut self,
        key: Key,
        buffer: &'a mut [u8],
    ) -> Result<Option<&'a [u8]>, Self::Error>;

    fn store(&mut self, key: Key, data: &[u8]) -> Result<(), Self::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error<E> {
    #[error("Postcard: {0}")]
    Postcard(postcard::Error),
    #[error("Store: {0:?}")]
    Store(E),
}

impl<E> From<postcard::Error> for Error<E> {
    fn from(e: postcard::Error) -> Self {
        Self::Postcard(e)
    }
}

/// Load and decode a record.
pub fn load<T: DeserializeOwned, S: Store>(
    store: &mut S,
    key: Key,
) -> Result<Option<T>, Error<S::Error>> {
    let mut buffer = [0u8; RECORD_SIZE];
    match store.fetch(key, &mut buffer).map_err(Error::Store)? {
        Some(data) => Ok(Some(postcard::from_bytes(data)?)),
        None => Ok(None),
    }
}

/// Encode and store a record unless the store already holds the same data.
///
/// Returns whether the store was written.
pub fn save<T: Serialize, S: Store>(
    store: &mut S,
    key: Key,
    value: &T,
) -> Result<bool, Error<S::Error>> {
    let mut data = [0u8; RECORD_SIZE];
    let data = postcard::to_slice(value, &mut data)?;

    let mut buffer = [0u8; RECORD_SIZE];
    if store.fetch(key, &mut buffer).map_err(Error::Store)? == Some(&*data) {
        return Ok(false);
    }

    log::info!("Storing `{}`", <&str>::from(key));
    store.store(key, data).map_err(Error::Store)?;
    Ok(true)
}

/// Integration ticks for an integration time of `us` including the readout window.
///
/// The time is limited to the readout window plus the minimum integration time at the lower
/// and the maximum integration time at the upper end. The tick count is even.
pub fn integration_ticks(us: u32) -> u32 {
    let min_ns = TICK_NS as u64 * READ_TICKS as u64
        + MIN_INTEGRATION_US as u64 * 1_000;
    let max_ns = MAX_INTEGRATION_US as u64 * 1_000;
    let ns = (us as u64 * 1_000).clamp(min_ns, max_ns);
    let ticks = (ns / TICK_NS as u64) as u32 - READ_TICKS as u32 + 1;
    (ticks + 1) & !1
}

/// Integration time in microseconds including the readout window.
pub fn integration_time_us(ticks: u32) -> u32 {
    ticks_to_us(ticks + READ_TICKS as u32)
}

/// `voltage` if within the datasheet `limits`, the lower limit otherwise.
pub fn saturation_voltage(voltage: f32, limits: (f32, f32)) -> f32 {
    if (limits.0..=limits.1).contains(&voltage) {
        voltage
    } else {
        limits.0
    }
}

fn trigger_delay_valid(us: u32) -> bool {
    us == 0
        || (ticks_to_us(EXT_TRIGGER_HIGH_TICKS)..MAX_TRIGGER_DELAY_US)
            .contains(&us)
}

fn integration_valid(ticks: u32) -> bool {
    (MIN_INTEGRATION_US..=MAX_INTEGRATION_US).contains(&ticks_to_us(ticks))
}

fn calibration_valid(calibration: &[f64; 6]) -> bool {
    calibration[0] > 100.0 && calibration[0] < 500.0
}

/// Run-time configuration of the spectrometer.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceConfig {
    pub gain: Gain,
    pub adc_reference: AdcReference,
    pub measurement_type: MeasurementType,
    pub integration_ticks: u32,
    /// External trigger to integration delay, 0 if disabled.
    pub trigger_delay_us: u32,
    pub saturation_high_gain: f32,
    pub saturation_no_gain: f32,
    /// Wavelength polynomial coefficients, constant term first.
    pub calibration: [f64; 6],
    /// Not persisted.
    pub bandpass_correction: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            gain: Gain::default(),
            adc_reference: AdcReference::default(),
            measurement_type: MeasurementType::default(),
            integration_ticks: integration_ticks(DEFAULT_INTEGRATION_US),
            trigger_delay_us: 0,
            saturation_high_gain: SATURATION_HIGH_GAIN.0,
            saturation_no_gain: SATURATION_NO_GAIN.0,
            calibration: [0.0; 6],
            bandpass_correction: true,
        }
    }
}

fn fetch<T: DeserializeOwned, S: Store>(store: &mut S, key: Key) -> Option<T> {
    load(store, key)
        .inspect_err(|e| {
            log::warn!("Failed to load `{}`: {e:?}", <&str>::from(key))
        })
        .ok()
        .flatten()
}

fn reject<T: Debug>(key: Key, value: T) {
    log::warn!("Ignoring stored `{}`: {value:?}", <&str>::from(key));
}

impl DeviceConfig {
    /// Load the configuration, falling back to defaults for absent or invalid records.
    ///
    /// Without a valid stored calibration `default_calibration` is used if provided.
    pub fn load<S: Store>(
        store: &mut S,
        default_calibration: Option<&[f64; 6]>,
    ) -> Self {
        let mut config = Self::default();

        if let Some(code) = fetch::<u8, _>(store, Key::MeasurementType) {
            match MeasurementType::try_from(code) {
                Ok(kind) => config.measurement_type = kind,
                Err(_) => reject(Key::MeasurementType, code),
            }
        }

        if let Some(code) = fetch::<u8, _>(store, Key::Gain) {
            match Gain::try_from(code) {
                Ok(gain) => config.gain = gain,
                Err(_) => reject(Key::Gain, code),
            }
        }

        if let Some(code) = fetch::<u8, _>(store, Key::AdcReference) {
            match AdcReference::try_from(code) {
                Ok(reference) => config.adc_reference = reference,
                Err(_) => reject(Key::AdcReference, code),
            }
        }

        if let Some(us) = fetch::<u32, _>(store, Key::TriggerDelay) {
            if trigger_delay_valid(us) {
                config.trigger_delay_us = us;
            } else {
                reject(Key::TriggerDelay, us);
            }
        }

        if let Some(ticks) = fetch::<u32, _>(store, Key::IntegrationTicks) {
            if integration_valid(ticks) {
                config.integration_ticks = ticks;
            } else {
                reject(Key::IntegrationTicks, ticks);
            }
        }

        if let Some(v) = fetch::<f32, _>(store, Key::SaturationHighGain) {
            config.saturation_high_gain =
                saturation_voltage(v, SATURATION_HIGH_GAIN);
        }

        if let Some(v) = fetch::<f32, _>(store, Key::SaturationNoGain) {
            config.saturation_no_gain =
                saturation_voltage(v, SATURATION_NO_GAIN);
        }

        match fetch::<[f64; 6], _>(store, Key::Calibration) {
            Some(calibration) if calibration_valid(&calibration) => {
                config.calibration = calibration
            }
            stored => {
                if let Some(calibration) = stored {
                    reject(Key::Calibration, calibration);
                }
                if let Some(calibration) = default_calibration {
                    config.calibration = *calibration;
                }
            }
        }

        config
    }

    /// Persist the record for `key`.
    pub fn save<S: Store>(
        &self,
        store: &mut S,
        key: Key,
    ) -> Result<bool, Error<S::Error>> {
        match key {
            Key::Gain => save(store, key, &u8::from(self.gain)),
            Key::AdcReference => {
                save(store, key, &u8::from(self.adc_reference))
            }
            Key::MeasurementType => {
                save(store, key, &u8::from(self.measurement_type))
            }
            Key::IntegrationTicks => save(store, key, &self.integration_ticks),
            Key::TriggerDelay => save(store, key, &self.trigger_delay_us),
            Key::SaturationHighGain => {
                save(store, key, &self.saturation_high_gain)
            }
            Key::SaturationNoGain => save(store, key, &self.saturation_no_gain),
            Key::Calibration => save(store, key, &self.calibration),
        }
    }

    /// Saturation voltage of the active gain.
    pub fn saturation(&self) -> f32 {
        match self.gain {
            Gain::High => self.saturation_high_gain,
            Gain::None => self.saturation_no_gain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design_parameters::{us_to_ticks, MIN_INTEGRATION_TICKS};
    use std::collections::BTreeMap;
    use std::vec::Vec;

    #[derive(Default)]
    struct Map {
        records: BTreeMap<u8, Vec<u8>>,
        writes: usize,
    }

    impl Store for Map {
        type Error = ();

        fn fetch<'a>(
            &mut self,
            key: Key,
            buffer: &'a mut [u8],
        ) -> Result<Option<&'a [u8]>, ()> {
            let Some(data) = self.records.get(&u8::from(key)) else {
                return Ok(None);
            };
            let out = &mut buffer[..data.len()];
            out.copy_from_slice(data);
            Ok(Some(&*out))
        }

        fn store(&mut self, key: Key, data: &[u8]) -> Result<(), ()> {
            self.writes += 1;
            self.records.insert(u8::from(key), data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn integration_time_conversion() {
        let min = integration_ticks(0);
        assert_eq!(min % 2, 0);
        assert!(
            integration_time_us(min)
                >= integration_time_us(0) + MIN_INTEGRATION_US
        );
        assert!(min > MIN_INTEGRATION_TICKS);

        let max = integration_ticks(u32::MAX);
        assert_eq!(max % 2, 0);
        assert!(integration_time_us(max) <= MAX_INTEGRATION_US + ticks_to_us(2));

        let ticks = integration_ticks(100_000);
        assert_eq!(ticks % 2, 0);
        assert!(integration_time_us(ticks).abs_diff(100_000) <= ticks_to_us(2));
    }

    #[test]
    fn empty_store() {
        let config = DeviceConfig::load(&mut Map::default(), None);
        assert_eq!(config, DeviceConfig::default());
        assert_eq!(config.adc_reference, AdcReference::V5_0);
        assert!(config.bandpass_correction);

        let cal = [310.0, 2.7, -1e-3, 0.0, 0.0, 0.0];
        let config = DeviceConfig::load(&mut Map::default(), Some(&cal));
        assert_eq!(config.calibration, cal);
    }

    #[test]
    fn stored_values() {
        let mut map = Map::default();
        let config = DeviceConfig {
            gain: Gain::High,
            adc_reference: AdcReference::V3_0,
            measurement_type: MeasurementType::Absolute,
            integration_ticks: us_to_ticks(50_000),
            trigger_delay_us: 5_000,
            saturation_high_gain: 3.1,
            saturation_no_gain: 2.0,
            calibration: [320.0, 2.5, 0.0, 0.0, 0.0, 0.0],
            bandpass_correction: false,
        };
        for key in <Key as strum::IntoEnumIterator>::iter() {
            assert!(config.save(&mut map, key).unwrap());
        }
        assert_eq!(map.writes, 8);

        let loaded = DeviceConfig::load(&mut map, None);
        assert_eq!(
            loaded,
            DeviceConfig {
                bandpass_correction: true,
                ..config.clone()
            }
        );

        // Unchanged records are not rewritten.
        for key in <Key as strum::IntoEnumIterator>::iter() {
            assert!(!config.save(&mut map, key).unwrap());
        }
        assert_eq!(map.writes, 8);
    }

    #[test]
    fn invalid_values() {
        let mut map = Map::default();
        save(&mut map, Key::MeasurementType, &7u8).unwrap();
        save(&mut map, Key::Gain, &2u8).unwrap();
        save(&mut map, Key::AdcReference, &4u8).unwrap();
        save(&mut map, Key::TriggerDelay, &500u32).unwrap();
        save(&mut map, Key::IntegrationTicks, &1u32).unwrap();
        save(&mut map, Key::SaturationHighGain, &5.0f32).unwrap();
        save(&mut map, Key::SaturationNoGain, &1.0f32).unwrap();
        save(&mut map, Key::Calibration, &[600.0f64; 6]).unwrap();

        let default_cal = [300.0, 2.0, 0.0, 0.0, 0.0, 0.0];
        let config = DeviceConfig::load(&mut map, Some(&default_cal));
        assert_eq!(
            config,
            DeviceConfig {
                calibration: default_cal,
                ..Default::default()
            }
        );
    }

    #[test]
    fn trigger_delay_bounds() {
        assert!(trigger_delay_valid(0));
        assert!(!trigger_delay_valid(999));
        assert!(trigger_delay_valid(1_000));
        assert!(trigger_delay_valid(9_999_999));
        assert!(!trigger_delay_valid(10_000_000));
    }

    #[test]
    fn corrupt_record() {
        let mut map = Map::default();
        map.store(Key::SaturationHighGain, &[1]).unwrap();
        assert!(matches!(
            load::<f32, _>(&mut map, Key::SaturationHighGain),
            Err(Error::Postcard(_))
        ));
        let config = DeviceConfig::load(&mut map, None);
        assert_eq!(config.saturation_high_gain, SATURATION_HIGH_GAIN.0);
    }
}
