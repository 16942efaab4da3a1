//! Real-time acquisition engine
//!
//! A periodic tick drives the sensor clock and start pulse through the session states. During
//! readout the tick handler raises the pixel-ready interrupt once per pixel and the pixel-ready
//! handler converts and accumulates the sensor output.
mod engine;
mod sampler;
mod sequencer;
mod timing;

pub use engine::{Engine, SessionFlags};
pub use sampler::{accumulate, RawPixel, Sampler};
pub use sequencer::{Sequencer, SessionPlan, State, Step};
pub use timing::{SensorTimingTable, Tick, TimingTable};
