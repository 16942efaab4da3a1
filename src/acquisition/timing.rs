use bitbybit::bitfield;
use heapless::Vec;

use crate::design_parameters::{PIXEL_READY_OFFSET, READ_TICKS};

/// Line levels and events of one tick in the readout window.
#[bitfield(u8, default = 0)]
#[derive(Debug, PartialEq)]
pub struct Tick {
    /// The start pulse is asserted (ST driven low).
    #[bit(0, rw)]
    strobe_active: bool,

    /// The video output of a pixel is valid and a conversion is due.
    #[bit(1, rw)]
    pixel_ready: bool,
}

/// Per-tick schedule of one readout window.
///
/// The table is walked twice to flush the sensor before integration and once more to read
/// the pixels out.
#[derive(Clone, Debug)]
pub struct TimingTable<const N: usize> {
    ticks: Vec<Tick, N>,
}

/// The readout schedule of the C12666MA.
pub type SensorTimingTable = TimingTable<READ_TICKS>;

impl<const N: usize> TimingTable<N> {
    /// Build the schedule for `pixels` pixels read out over `ticks_per_pixel` ticks each,
    /// followed by `trail_ticks` idle ticks.
    ///
    /// # Panics
    /// The table capacity `N` must hold the whole window and every pixel window must include
    /// the ready tick.
    pub fn build(
        pixels: usize,
        ticks_per_pixel: usize,
        trail_ticks: usize,
    ) -> Self {
        let len = pixels * ticks_per_pixel + trail_ticks;
        assert!(len <= N);
        assert!(pixels == 0 || ticks_per_pixel > PIXEL_READY_OFFSET);

        let ready = |i: usize| {
            pixels > 0
                && i >= PIXEL_READY_OFFSET
                && (i - PIXEL_READY_OFFSET) % ticks_per_pixel == 0
                && (i - PIXEL_READY_OFFSET) / ticks_per_pixel < pixels
        };

        Self {
            ticks: (0..len)
                .map(|i| {
                    Tick::DEFAULT
                        .with_strobe_active(i < 2)
                        .with_pixel_ready(ready(i))
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Sensor ST level at tick `index`.
    pub fn strobe_level(&self, index: usize) -> bool {
        !self.ticks[index].strobe_active()
    }

    pub fn pixel_ready(&self, index: usize) -> bool {
        self.ticks[index].pixel_ready()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tick> {
        self.ticks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design_parameters::{PIXELS, TICKS_PER_PIXEL, TRAIL_TICKS};

    fn ready_ticks<const N: usize>(table: &TimingTable<N>) -> impl Iterator<Item = usize> + '_ {
        table
            .iter()
            .enumerate()
            .filter(|(_, t)| t.pixel_ready())
            .map(|(i, _)| i)
    }

    #[test]
    fn sensor_table() {
        let table = SensorTimingTable::build(PIXELS, TICKS_PER_PIXEL, TRAIL_TICKS);
        assert_eq!(table.len(), READ_TICKS);

        let strobes: std::vec::Vec<_> = table
            .iter()
            .enumerate()
            .filter(|(_, t)| t.strobe_active())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(strobes, [0, 1]);
        assert!(!table.strobe_level(0));
        assert!(table.strobe_level(2));

        let ready: std::vec::Vec<_> = ready_ticks(&table).collect();
        assert_eq!(ready.len(), PIXELS);
        assert_eq!(ready[0], 7);
        assert_eq!(*ready.last().unwrap(), 7 + 255 * TICKS_PER_PIXEL);
    }

    #[test]
    fn one_ready_tick_per_pixel() {
        for pixels in [1, 3, 16, 100] {
            for tpp in [8, 10, 16] {
                let table = TimingTable::<2048>::build(pixels, tpp, 5);
                assert_eq!(table.len(), pixels * tpp + 5);
                let ready: std::vec::Vec<_> = ready_ticks(&table).collect();
                assert_eq!(ready.len(), pixels);
                assert!(ready.windows(2).all(|w| w[1] - w[0] == tpp));
            }
        }
    }

    #[test]
    #[should_panic]
    fn oversized() {
        TimingTable::<16>::build(4, 8, 0);
    }
}
