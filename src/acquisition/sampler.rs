use crate::design_parameters::{ADC_AVERAGING, PIXELS};
use crate::hardware::PixelAdc;

/// Accumulated conversions of one pixel.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RawPixel {
    pub sum: u32,
    /// Number of conversions in `sum`, at most the averaging depth.
    pub count: u8,
}

/// Accumulate up to `samples` conversions into `slot`.
///
/// The first conversion is always taken. Every further one is only started while `wanted`
/// holds and only counted if it still holds once the result is in. Failed conversions are
/// dropped.
pub fn accumulate<A: PixelAdc>(
    adc: &mut A,
    slot: &mut RawPixel,
    samples: usize,
    wanted: impl Fn() -> bool,
) {
    for n in 0..samples {
        if n > 0 && !wanted() {
            break;
        }
        if let Ok(code) = adc.convert() {
            if n == 0 || wanted() {
                slot.sum += code as u32;
                slot.count += 1;
            }
        }
    }
}

/// The pixel-ready handler half of an acquisition session.
///
/// The ADC is lent out to the handler for the duration of a burst so that the conversions
/// run without holding the engine lock.
pub struct Sampler<A> {
    adc: Option<A>,
    raw: [RawPixel; PIXELS],
    cursor: Option<usize>,
}

impl<A: PixelAdc> Sampler<A> {
    pub fn new(adc: A) -> Self {
        Self {
            adc: Some(adc),
            raw: [RawPixel::default(); PIXELS],
            cursor: None,
        }
    }

    /// Clear the buffer and point at the first pixel.
    pub fn arm(&mut self) {
        self.raw = [RawPixel::default(); PIXELS];
        self.cursor = Some(0);
    }

    pub fn release(&mut self) {
        self.cursor = None;
    }

    /// Take the ADC for a burst on the pixel under the cursor.
    ///
    /// Returns `None` if no pixel is due or the ADC is already lent out.
    pub fn lend(&mut self) -> Option<(usize, A)> {
        let index = self.cursor?;
        let adc = self.adc.take()?;
        Some((index, adc))
    }

    /// Return the ADC with the burst result for pixel `index` and advance.
    ///
    /// The result is dropped if the session was released or restarted meanwhile.
    pub fn settle(&mut self, index: usize, slot: RawPixel, adc: A) {
        self.adc = Some(adc);
        if self.cursor == Some(index) {
            self.raw[index] = slot;
            self.cursor = Some(index + 1).filter(|&i| i < PIXELS);
        }
    }

    pub fn raw(&self) -> &[RawPixel; PIXELS] {
        &self.raw
    }

    /// The ADC unless it is lent out.
    pub fn adc(&self) -> Option<&A> {
        self.adc.as_ref()
    }
}
