//! # Vigil Configuration
//!
//! Typed configuration for the quality gate: YAML loading with upward
//! discovery, serde-backed defaults, value clamping, and the compiled
//! include/exclude admission sets.

pub mod patterns;
pub mod settings;

pub use patterns::*;
pub use settings::*;
