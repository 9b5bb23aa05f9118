//! Validator capability trait shared by the concrete tool validators.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use vigil_core::types::{FileRecord, ValidationResult};

/// Per-invocation context handed to every validator.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub workspace_root: PathBuf,
    /// Per-validator budget
    pub timeout: Duration,
    pub cancel: CancellationToken,
}

/// One external quality checker. Validators never fail at the trait level:
/// spawn errors, timeouts, and missing tools are all encoded into the
/// returned [`ValidationResult`].
#[async_trait]
pub trait Validator: Send + Sync {
    fn name(&self) -> &'static str;

    fn enabled(&self) -> bool;

    async fn validate(&self, file: &FileRecord, ctx: &ValidationContext) -> ValidationResult;
}
