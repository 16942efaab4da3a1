#![cfg_attr(not(test), no_std)]
//! C12666MA micro-spectrometer acquisition
//!
//! The sensor is clocked from a periodic timer interrupt driving the [acquisition::Engine]
//! state machine. Pixels are converted by an AD7980 from a second, lower priority interrupt
//! signalled by the tick handler. The foreground [Spectrometer] plans sessions, waits for them
//! to complete and turns the raw accumulations into calibrated spectra.

pub mod acquisition;
pub mod autorange;
pub mod design_parameters;
pub mod flash;
pub mod hardware;
pub mod processing;
pub mod settings;
pub mod spectrometer;

pub use acquisition::Engine;
pub use autorange::AutoMode;
pub use processing::MeasurementType;
pub use settings::DeviceConfig;
pub use spectrometer::Spectrometer;
