//! Platform seams: time, device detection and the async runtime.

pub mod clock;
pub mod environment;
pub mod runtime;
