//! Test utilities shared across crate-level unit tests.

pub mod clock;
pub mod provider;
pub mod storage;

pub use clock::{until, ManualClock};
pub use provider::{RedirectResponse, ScriptedProvider};
pub use storage::FlakyFlagStore;
