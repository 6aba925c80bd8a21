//! Validation Error Types

use thiserror::Error;

/// Errors raised while normalizing a raw reading
///
/// Only the distance is mandatory; every other defect is repaired.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No distance in the payload
    #[error("Distance is required and must be a number")]
    MissingDistance,

    /// Distance present but not a JSON number
    #[error("Distance is required and must be a number, got {0}")]
    NonNumericDistance(String),
}
