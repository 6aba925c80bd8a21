//! Sensor Reading Validation and Normalization
//!
//! Turns loosely-typed measurements posted by flood sensors into
//! well-formed, timestamped, classified [`Reading`]s.

mod error;
mod normalizer;
mod reading;
pub mod timestamp;

pub use error::ValidationError;
pub use normalizer::{NormalizerConfig, ReadingNormalizer};
pub use reading::{RawReading, Reading, Status, WaterLevel};
