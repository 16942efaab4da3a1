//! Host model of the Spectron board
//!
//! The platform ticks the engine from its relax hook and models the sensor video output as a
//! triangular spectrum that grows linearly with the exposure and clips at the saturation
//! voltage of the active gain.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use fugit::NanosDurationU32;
use spectron::acquisition::{Engine, State};
use spectron::design_parameters::{PIXELS, READ_TICKS};
use spectron::hardware::{
    AdcReference, Gain, Liveness, PixelAdc, Platform, SensorLines,
};
use spectron::settings::{Key, Store};

/// Sensor output clipping voltages.
pub const CLIP_HIGH_GAIN: f64 = 2.6;
pub const CLIP_NO_GAIN: f64 = 1.6;

#[derive(Debug, Default)]
pub struct Sensor {
    /// Peak output in V per exposure tick at high gain.
    pub rate: f64,
    /// Dark output in V.
    pub offset: f64,
    pub gain: Gain,
    pub reference: AdcReference,
    /// Ticks spent integrating in the current session.
    pub exposure: u32,
    /// Next pixel to be converted.
    pub pixel: usize,
}

impl Sensor {
    fn shape(pixel: usize) -> f64 {
        let distance = (pixel as f64 - 128.0).abs() / 128.0;
        1.0 - 0.8 * distance
    }

    /// Video output of `pixel` in V.
    pub fn output(&self, pixel: usize) -> f64 {
        let (factor, clip) = match self.gain {
            Gain::High => (1.0, CLIP_HIGH_GAIN),
            Gain::None => (0.5, CLIP_NO_GAIN),
        };
        let exposure = (self.exposure as usize + READ_TICKS) as f64;
        let v = self.offset + Self::shape(pixel) * self.rate * exposure * factor;
        v.min(clip)
    }

    fn code(&self) -> u16 {
        let v = self.output(self.pixel.min(PIXELS - 1));
        let relative = (v / self.reference.volts() as f64).clamp(0.0, 1.0);
        (relative * 65535.0) as u16
    }
}

pub struct SimAdc {
    sensor: Rc<RefCell<Sensor>>,
    pub conversions: u32,
}

impl PixelAdc for SimAdc {
    type Error = ();

    fn convert(&mut self) -> Result<u16, ()> {
        self.conversions += 1;
        Ok(self.sensor.borrow().code())
    }
}

#[derive(Debug, Default)]
pub struct SimLines {
    levels: [bool; 4],
    pub clock_edges: u32,
    pub strobe_pulses: u32,
    pub trigger_pulses: u32,
    pub light_pulses: u32,
    pub fitted_trigger: bool,
}

impl SimLines {
    fn set(&mut self, index: usize, high: bool) -> bool {
        let rising = high && !self.levels[index];
        self.levels[index] = high;
        rising
    }

    pub fn trigger(&self) -> bool {
        self.levels[2]
    }

    pub fn light(&self) -> bool {
        self.levels[3]
    }
}

impl SensorLines for SimLines {
    fn set_clock(&mut self, high: bool) {
        if self.set(0, high) {
            self.clock_edges += 1;
        }
    }

    fn set_strobe(&mut self, high: bool) {
        if self.set(1, high) {
            self.strobe_pulses += 1;
        }
    }

    fn set_trigger(&mut self, high: bool) {
        if self.set(2, high) {
            self.trigger_pulses += 1;
        }
    }

    fn set_light(&mut self, high: bool) {
        if self.set(3, high) {
            self.light_pulses += 1;
        }
    }

    fn has_trigger(&self) -> bool {
        self.fitted_trigger
    }
}

pub struct SimPlatform {
    engine: Engine<SimLines, SimAdc>,
    pub sensor: Rc<RefCell<Sensor>>,
    pub period: Option<NanosDurationU32>,
    pub running: bool,
    pub sessions: u32,
    pub ticks: u64,
    /// Ticks with the light output high outside of the integration.
    pub stray_light_ticks: u32,
    pub delayed_ms: u32,
}

impl SimPlatform {
    pub fn new(rate: f64) -> Self {
        Self::with_trigger(rate, true)
    }

    pub fn with_trigger(rate: f64, fitted_trigger: bool) -> Self {
        let sensor = Rc::new(RefCell::new(Sensor {
            rate,
            ..Default::default()
        }));
        let lines = SimLines {
            fitted_trigger,
            ..Default::default()
        };
        let adc = SimAdc {
            sensor: sensor.clone(),
            conversions: 0,
        };
        Self {
            engine: Engine::new(lines, adc),
            sensor,
            period: None,
            running: false,
            sessions: 0,
            ticks: 0,
            stray_light_ticks: 0,
            delayed_ms: 0,
        }
    }

    pub fn lines<R>(&self, f: impl FnOnce(&SimLines) -> R) -> R {
        self.engine.with_lines(f)
    }

    pub fn conversions(&self) -> u32 {
        self.engine
            .with_adc(|adc| adc.conversions)
            .expect("ADC lent to a burst")
    }
}

impl Platform for SimPlatform {
    type Lines = SimLines;
    type Adc = SimAdc;

    fn engine(&self) -> &Engine<SimLines, SimAdc> {
        &self.engine
    }

    fn start(&mut self, period: NanosDurationU32) {
        assert!(!self.running);
        self.period = Some(period);
        self.running = true;
        self.sessions += 1;
        let mut sensor = self.sensor.borrow_mut();
        sensor.exposure = 0;
        sensor.pixel = 0;
    }

    fn stop(&mut self) {
        assert!(self.running);
        self.running = false;
    }

    fn relax(&mut self) {
        assert!(self.running);
        let state = self.engine.flags().state();
        if state == State::Integration {
            self.sensor.borrow_mut().exposure += 1;
        }
        if self.lines(|l| l.light())
            && !matches!(state, State::Integration | State::Read | State::Trail)
        {
            self.stray_light_ticks += 1;
        }

        self.ticks += 1;
        if self.engine.on_tick() {
            self.engine.on_pixel_ready();
            self.sensor.borrow_mut().pixel += 1;
        }
    }

    fn set_gain(&mut self, gain: Gain) {
        self.sensor.borrow_mut().gain = gain;
    }

    fn set_reference(&mut self, reference: AdcReference) {
        self.sensor.borrow_mut().reference = reference;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delayed_ms += ms;
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    pub records: BTreeMap<u8, Vec<u8>>,
    pub writes: Vec<Key>,
}

impl MemoryStore {
    pub fn contains(&self, key: Key) -> bool {
        self.records.contains_key(&u8::from(key))
    }
}

impl Store for MemoryStore {
    type Error = ();

    fn fetch<'a>(
        &mut self,
        key: Key,
        buffer: &'a mut [u8],
    ) -> Result<Option<&'a [u8]>, ()> {
        match self.records.get(&u8::from(key)) {
            Some(data) => {
                let out = &mut buffer[..data.len()];
                out.copy_from_slice(data);
                Ok(Some(&*out))
            }
            None => Ok(None),
        }
    }

    fn store(&mut self, key: Key, data: &[u8]) -> Result<(), ()> {
        self.records.insert(key.into(), data.to_vec());
        self.writes.push(key);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct CountingLiveness {
    pub checkins: u32,
    pub services: u32,
}

impl Liveness for CountingLiveness {
    fn checkin(&mut self) {
        self.checkins += 1;
    }

    fn service(&mut self) {
        self.services += 1;
    }
}
