//! Domain models for the trial matching system.

mod coverage;
mod outcome;
mod patient;
mod predicate;
mod ranking;

pub use coverage::*;
pub use outcome::*;
pub use patient::*;
pub use predicate::*;
pub use ranking::*;
