//! Thunderbit Registry - live bits shared across workflows

pub mod registry;

pub use registry::{IndexStats, RuntimeRegistry};
