//! Public API layer: stable entry points for callers.

mod runner;

pub use runner::StatRunner;
