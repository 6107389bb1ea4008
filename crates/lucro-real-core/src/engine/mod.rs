//! End-to-end liability computation and revenue scenario re-runs.

pub mod pipeline;

#[cfg(feature = "scenarios")]
pub mod scenario;
