//! Upload timing and retry policy.

pub mod retry;
pub mod stats;
