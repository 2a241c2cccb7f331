//! Sensor module - reading model, sources and the synthetic generator

mod generator;
mod reading;
mod simulator;
mod traits;

pub use generator::{Generator, GENERATOR_TASK};
pub use reading::*;
pub use simulator::{FieldSimulator, GeneratorState};
pub use traits::{IngestSource, SensorSource};
