//! # Vigil Engine
//!
//! The per-file validation → auto-fix → verification pipeline behind the
//! Vigil post-write hook.
//!
//! ## Pipeline
//! - Version-aware Biome command construction (majors 1.x and 2.x)
//! - Parallel validator fan-out with per-task timeouts and result caching
//! - Conflict-aware fix ordering and bucketed sequential application
//! - Backup/rollback around every fix window
//! - Post-fix re-validation with integrity checks and effectiveness grading
//!
//! Failures never propagate past [`hook::PostWriteHook`]: the gate degrades
//! to warnings so the writing agent is never blocked.

pub mod adapters;
pub mod autofix_engine;
pub mod biome_validator;
pub mod conflict_resolution;
pub mod fix_verification;
pub mod hook;
pub mod output_parser;
pub mod typescript_validator;
pub mod validator;
pub mod validator_manager;
pub mod version_detection;


pub use adapters::*;
pub use autofix_engine::*;
pub use biome_validator::*;
pub use conflict_resolution::*;
pub use fix_verification::*;
pub use hook::*;
pub use output_parser::*;
pub use typescript_validator::*;
pub use validator::*;
pub use validator_manager::*;
pub use version_detection::*;
