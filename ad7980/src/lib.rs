#![no_std]
//! AD7980 driver
//!
//! The converter is wired in 3-wire CS mode without busy indicator: SDI is tied high and CNV
//! doubles as chip select. A conversion is started by a rising CNV edge. After the maximum
//! conversion time has elapsed CNV is taken low again, which enables SDO, and the 16 bit result
//! is clocked out MSB first.
//!
//! Conversion results are straight binary with 0xffff corresponding to the reference voltage.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::{self, SpiBus};

/// Maximum conversion time (tCONV) from the datasheet.
pub const T_CONV_NS: u32 = 710;

/// Full scale conversion code.
pub const FULL_SCALE: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("SPI")]
    Bus(spi::ErrorKind),
    #[error("CNV pin")]
    Cnv,
}

impl<E: spi::Error> From<E> for Error {
    fn from(value: E) -> Self {
        Self::Bus(value.kind())
    }
}

pub struct Ad7980<B, P, D> {
    bus: B,
    cnv: P,
    delay: D,
}

impl<B: SpiBus<u8>, P: OutputPin, D: DelayNs> Ad7980<B, P, D> {
    /// Take ownership of the bus, the CNV line and a nanosecond delay.
    ///
    /// # Args
    /// * `bus` - SPI bus in mode 0 with only SCK and MISO in use. The AD7980 supports SCK rates
    ///   well above what most MCUs reach, so the fastest available prescaler should be used.
    /// * `cnv` - Output connected to CNV.
    /// * `delay` - Delay used to hold off readout until the conversion completed.
    pub fn new(bus: B, mut cnv: P, delay: D) -> Result<Self, Error> {
        cnv.set_low().or(Err(Error::Cnv))?;
        Ok(Self { bus, cnv, delay })
    }

    /// Perform one conversion of the analog input and return its code.
    pub fn convert(&mut self) -> Result<u16, Error> {
        self.cnv.set_high().or(Err(Error::Cnv))?;
        self.delay.delay_ns(T_CONV_NS);
        self.cnv.set_low().or(Err(Error::Cnv))?;

        let mut word = [0u8; 2];
        self.bus.read(&mut word)?;
        self.bus.flush()?;
        Ok(u16::from_be_bytes(word))
    }

    /// Release the underlying resources.
    pub fn release(self) -> (B, P, D) {
        (self.bus, self.cnv, self.delay)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::convert::Infallible;
    use std::vec::Vec;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Event {
        Cnv(bool),
        Delay(u32),
        Read,
    }

    #[derive(Default)]
    struct Trace(core::cell::RefCell<Vec<Event>>);

    struct Bus<'a>(&'a Trace, u16);
    struct Cnv<'a>(&'a Trace);
    struct Delay<'a>(&'a Trace);

    impl spi::ErrorType for Bus<'_> {
        type Error = Infallible;
    }

    impl SpiBus<u8> for Bus<'_> {
        fn read(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
            self.0 .0.borrow_mut().push(Event::Read);
            words.copy_from_slice(&self.1.to_be_bytes());
            Ok(())
        }
        fn write(&mut self, _words: &[u8]) -> Result<(), Infallible> {
            unimplemented!()
        }
        fn transfer(
            &mut self,
            _read: &mut [u8],
            _write: &[u8],
        ) -> Result<(), Infallible> {
            unimplemented!()
        }
        fn transfer_in_place(
            &mut self,
            _words: &mut [u8],
        ) -> Result<(), Infallible> {
            unimplemented!()
        }
        fn flush(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    impl embedded_hal::digital::ErrorType for Cnv<'_> {
        type Error = Infallible;
    }

    impl OutputPin for Cnv<'_> {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0 .0.borrow_mut().push(Event::Cnv(false));
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0 .0.borrow_mut().push(Event::Cnv(true));
            Ok(())
        }
    }

    impl DelayNs for Delay<'_> {
        fn delay_ns(&mut self, ns: u32) {
            self.0 .0.borrow_mut().push(Event::Delay(ns));
        }
    }

    #[test]
    fn conversion_sequence() {
        let trace = Trace::default();
        let mut adc =
            Ad7980::new(Bus(&trace, 0xbeef), Cnv(&trace), Delay(&trace))
                .unwrap();
        assert_eq!(adc.convert().unwrap(), 0xbeef);
        assert_eq!(
            trace.0.borrow().as_slice(),
            &[
                Event::Cnv(false),
                Event::Cnv(true),
                Event::Delay(T_CONV_NS),
                Event::Cnv(false),
                Event::Read,
            ]
        );
    }
}
