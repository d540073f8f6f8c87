//! Domain models for patient registration.

mod outcome;
mod patient;

pub use outcome::*;
pub use patient::*;
