use fugit::NanosDurationU32;

/// Number of pixels of the C12666MA.
pub const PIXELS: usize = 256;

/// Sensor clock ticks per pixel readout. Every pixel takes 4 CLK cycles with two ticks (one per
/// edge) per cycle.
pub const TICKS_PER_PIXEL: usize = 8;

/// Tick within each pixel window where the video output is valid and the ADC is triggered.
pub const PIXEL_READY_OFFSET: usize = 7;

/// Ticks appended to the readout window. The sensor needs 6 CLK cycles after the last pixel;
/// anything above 2 ticks works up to 200 kHz at room temperature.
pub const TRAIL_TICKS: usize = 12;

/// Ticks in one full readout window: 4 * 256 + 6 CLK cycles.
pub const READ_TICKS: usize = PIXELS * TICKS_PER_PIXEL + TRAIL_TICKS;

/// Ticks spent before the first reset cycle. Anything above 38 is fine up to a 200 kHz clock.
pub const DEFAULT_LEAD_TICKS: u32 = 64;

/// ADC conversions averaged per pixel.
#[cfg(not(feature = "adc-avg-4"))]
pub const ADC_AVERAGING: usize = 2;
#[cfg(feature = "adc-avg-4")]
pub const ADC_AVERAGING: usize = 4;

/// Duration of one sensor clock tick. It has to accommodate the averaged AD7980 conversions of
/// a pixel. Two conversions give a minimum integration time of 11.3 ms, four 18.51 ms.
#[cfg(not(feature = "adc-avg-4"))]
pub const TICK_NS: u32 = 5_000;
#[cfg(feature = "adc-avg-4")]
pub const TICK_NS: u32 = 8_500;

/// Period of the tick timer.
pub const TICK_PERIOD: NanosDurationU32 = NanosDurationU32::from_ticks(TICK_NS);

/// Sensor integration time limits. The lower bound keeps the integration state in use.
pub const MIN_INTEGRATION_US: u32 = 1_000;
pub const MAX_INTEGRATION_US: u32 = 10_000_000;

/// Integration tick bounds used while autoranging.
pub const MIN_INTEGRATION_TICKS: u32 = us_to_ticks(MIN_INTEGRATION_US);
pub const MAX_INTEGRATION_TICKS: u32 = us_to_ticks(MAX_INTEGRATION_US);

/// Duration of the external trigger pulse (1 ms).
pub const EXT_TRIGGER_HIGH_TICKS: u32 = us_to_ticks(1_000);

/// Upper bound (exclusive) of the external trigger to measurement delay.
pub const MAX_TRIGGER_DELAY_US: u32 = 10_000_000;

/// Full scale code of the AD7980.
pub const ADC_FULL_SCALE: f32 = ad7980::FULL_SCALE as f32;

/// Saturation voltage limits from the C12666MA datasheet.
pub const SATURATION_HIGH_GAIN: (f32, f32) = (2.3, 4.0);
pub const SATURATION_NO_GAIN: (f32, f32) = (1.4, 2.7);

/// Settling time after a user gain or reference change.
pub const SETTLE_MS: u32 = 200;

/// Settling time after a gain or reference change while autoranging.
pub const AUTORANGE_SETTLE_MS: u32 = 50;

/// Autoranging target window as fractions of the saturation voltage.
pub const AUTORANGE_LOWER: f32 = 0.975;
pub const AUTORANGE_UPPER: f32 = 0.99;

/// Hard limit on autoranging refinement iterations.
pub const AUTORANGE_MAX_ITERATIONS: u32 = 64;

/// Integration time above which autoranging iterations keep the host alive.
pub const LIVENESS_THRESHOLD_US: u32 = 1_000_000;

/// Integration time used when no valid one is stored.
pub const DEFAULT_INTEGRATION_US: u32 = 100_000;

/// Convert microseconds to sensor clock ticks (truncating).
pub const fn us_to_ticks(us: u32) -> u32 {
    (us as u64 * 1_000 / TICK_NS as u64) as u32
}

/// Convert sensor clock ticks to microseconds (truncating).
pub const fn ticks_to_us(ticks: u32) -> u32 {
    (ticks as u64 * TICK_NS as u64 / 1_000) as u32
}
