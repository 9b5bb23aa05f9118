//! # Vigil Core
//!
//! Shared foundation for the Vigil post-write quality gate: the validation
//! data model, error types, subprocess orchestration, per-path locking, and
//! logging initialization. Everything here is consumed by the engine and CLI
//! crates; nothing in this crate talks to an external tool directly.

pub mod errors;
pub mod logging;
pub mod path_lock;
pub mod process;
pub mod types;

pub use errors::*;
pub use path_lock::*;
pub use process::*;
pub use types::*;
