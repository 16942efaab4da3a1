//! Hardware boundary of the Spectron board
//!
//! The acquisition core never touches peripherals directly. A board support package implements
//! [Platform] for its timer, interrupt controller and frontend pins, and binds
//! [Engine::on_tick](crate::acquisition::Engine::on_tick) and
//! [Engine::on_pixel_ready](crate::acquisition::Engine::on_pixel_ready) to the tick and
//! pixel-ready interrupt handlers.
//!
//! [Engine::new](crate::acquisition::Engine::new) builds the timing table at run time, so the
//! engine is placed in a `'static` slot during init and each handler keeps a reference as a
//! local resource. A typical RTIC binding looks like this:
//!
//! ```ignore
//! #[local]
//! struct Local {
//!     tick_engine: &'static Engine<SensorPins<..>, Ad7980<..>>,
//!     pixel_engine: &'static Engine<SensorPins<..>, Ad7980<..>>,
//! }
//!
//! #[init]
//! fn init(c: init::Context) -> (Shared, Local) {
//!     // ...
//!     let engine: &'static _ = cortex_m::singleton!(
//!         : Engine<SensorPins<..>, Ad7980<..>> = Engine::new(lines, adc)
//!     )
//!     .unwrap();
//!     // `engine` is also handed to the `Platform` implementation.
//! }
//!
//! #[task(binds = TIM7, local = [tick_engine, timer], priority = 3)]
//! fn tick(c: tick::Context) {
//!     c.local.timer.clear_irq();
//!     if c.local.tick_engine.on_tick() {
//!         rtic::pend(Interrupt::EXTI0);
//!     }
//! }
//!
//! #[task(binds = EXTI0, local = [pixel_engine], priority = 2)]
//! fn pixel_ready(c: pixel_ready::Context) {
//!     c.local.pixel_engine.on_pixel_ready();
//! }
//! ```
//!
//! The tick interrupt must have the higher priority of the two.
use fugit::NanosDurationU32;

use crate::acquisition::Engine;

mod afe;
#[cfg(target_arch = "arm")]
mod delay;
mod lines;

pub use afe::{AdcReference, Frontend, Gain};
#[cfg(target_arch = "arm")]
pub use delay::AsmDelay;
pub use lines::SensorPins;

/// Sensor control outputs driven from the tick interrupt.
pub trait SensorLines {
    /// Sensor pixel clock (CLK).
    fn set_clock(&mut self, high: bool);

    /// Sensor start pulse (ST).
    fn set_strobe(&mut self, high: bool);

    /// External trigger output (TRG).
    fn set_trigger(&mut self, high: bool);

    /// External light source enable.
    fn set_light(&mut self, high: bool);

    /// Whether an external trigger output is fitted.
    fn has_trigger(&self) -> bool {
        true
    }
}

/// A single conversion of the sensor video output.
pub trait PixelAdc {
    type Error: core::fmt::Debug;

    fn convert(&mut self) -> Result<u16, Self::Error>;
}

impl<B, P, D> PixelAdc for ad7980::Ad7980<B, P, D>
where
    B: embedded_hal_1::spi::SpiBus<u8>,
    P: embedded_hal_1::digital::OutputPin,
    D: embedded_hal_1::delay::DelayNs,
{
    type Error = ad7980::Error;

    fn convert(&mut self) -> Result<u16, Self::Error> {
        ad7980::Ad7980::convert(self)
    }
}

/// The device context owning the board resources.
pub trait Platform {
    type Lines: SensorLines;
    type Adc: PixelAdc;

    /// The engine shared with the tick and pixel-ready interrupts.
    fn engine(&self) -> &Engine<Self::Lines, Self::Adc>;

    /// Prepare the ADC interface, start the periodic tick interrupt with the given period and
    /// unmask the pixel-ready interrupt.
    fn start(&mut self, period: NanosDurationU32);

    /// Stop the tick timer, mask and clear the pixel-ready interrupt and release the ADC
    /// interface.
    fn stop(&mut self);

    /// Called repeatedly while the foreground waits for a session to finish.
    fn relax(&mut self) {
        core::hint::spin_loop();
    }

    fn set_gain(&mut self, gain: Gain);

    fn set_reference(&mut self, reference: AdcReference);

    /// Blocking delay on the foreground.
    fn delay_ms(&mut self, ms: u32);
}

/// Host application hooks serviced during long autoranging runs.
pub trait Liveness {
    /// Feed the application watchdog.
    fn checkin(&mut self) {}

    /// Service the connectivity layer if connected.
    fn service(&mut self) {}
}

impl Liveness for () {}
