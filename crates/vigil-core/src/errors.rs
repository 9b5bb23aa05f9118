//! # Vigil Error Types
//!
//! Error handling for the quality-gate pipeline. Every component catches at
//! its public boundary and reports structurally; these variants exist so the
//! reports can say precisely what went wrong.

use std::path::PathBuf;

use thiserror::Error;

/// Vigil pipeline errors
#[derive(Error, Debug)]
pub enum VigilError {
    #[error("Tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("Failed to spawn command `{command}`: {reason}")]
    SpawnFailed { command: String, reason: String },

    #[error("Command `{command}` timed out after {timeout_ms}ms")]
    CommandTimeout { command: String, timeout_ms: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Failed to parse tool output: {reason}")]
    OutputParse { reason: String },

    #[error("Fix application failed in {stage}: {reason}")]
    FixFailed { stage: String, reason: String },

    #[error("Backup failed for {path}: {reason}")]
    BackupFailed { path: PathBuf, reason: String },

    #[error("File integrity violation: {reason}")]
    IntegrityViolation { reason: String },

    #[error("Configuration error: {field} - {reason}")]
    ConfigError { field: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

/// Result type for Vigil operations
pub type VigilResult<T> = Result<T, VigilError>;
