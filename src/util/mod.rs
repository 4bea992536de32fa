//! Small self-contained utilities.

pub mod det_rng;

pub use det_rng::DetRng;
