//! # Auto-Fix Engine
//!
//! Applies an ordered fix plan by driving Biome's fix mode once per
//! category bucket (formatting, then imports, then safe lint), with a
//! sibling backup for rollback. The file on disk is authoritative: content
//! is read back after every invocation. Any mid-sequence error restores the
//! original bytes, so the gate never leaves a half-fixed file behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vigil_config::{AutoFixConfig, BiomeConfig};
use vigil_core::process::run_command;
use vigil_core::types::FileRecord;
use vigil_core::VigilError;

use crate::adapters::{AdapterFactory, FixOptions};
use crate::biome_validator::{resolve_biome_binary, with_binary};
use crate::conflict_resolution::{FixCategory, FixPlan};
use crate::version_detection::VersionDetector;

/// Bucket application order.
const BUCKET_ORDER: [FixCategory; 3] = [
    FixCategory::Formatting,
    FixCategory::Imports,
    FixCategory::SafeLint,
];

/// Counters for one fix run. `fixed_issues` is the engine's claim; only
/// verification confirms it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixStatistics {
    pub total_issues: usize,
    pub fixed_issues: usize,
    pub remaining_issues: usize,
    pub duration_ms: u64,
    /// One per bucket invocation, bounded by `maxAttempts`
    pub attempts: u32,
}

/// Outcome of one fix run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixResult {
    pub success: bool,
    /// Whether the content on disk differs from the pre-fix content
    pub modified: bool,
    /// Authoritative post-run content
    pub content: String,
    pub statistics: FixStatistics,
    pub errors: Vec<String>,
    pub applied_fixes: Vec<Uuid>,
}

impl FixResult {
    fn no_op(content: String, total_issues: usize, duration_ms: u64) -> Self {
        Self {
            success: true,
            modified: false,
            content,
            statistics: FixStatistics {
                total_issues,
                fixed_issues: 0,
                remaining_issues: total_issues,
                duration_ms,
                attempts: 0,
            },
            errors: Vec::new(),
            applied_fixes: Vec::new(),
        }
    }
}

pub struct AutoFixEngine {
    detector: Arc<VersionDetector>,
    workspace_root: PathBuf,
    timeout: Duration,
    auto_fix: AutoFixConfig,
    biome: BiomeConfig,
}

impl AutoFixEngine {
    pub fn new(
        detector: Arc<VersionDetector>,
        workspace_root: PathBuf,
        timeout: Duration,
        auto_fix: AutoFixConfig,
        biome: BiomeConfig,
    ) -> Self {
        Self {
            detector,
            workspace_root,
            timeout,
            auto_fix,
            biome,
        }
    }

    /// Apply `plan` to the file. `total_issues` is the pre-fix issue count
    /// used for statistics. The caller must hold the path lock for the
    /// whole fix → verify window.
    pub async fn apply(
        &self,
        file: &FileRecord,
        plan: &FixPlan,
        total_issues: usize,
        cancel: &CancellationToken,
    ) -> FixResult {
        let started = Instant::now();

        if !self.auto_fix.enabled || plan.is_empty() {
            return FixResult::no_op(file.content.clone(), total_issues, 0);
        }

        let Some(binary) = resolve_biome_binary(&self.workspace_root) else {
            return FixResult {
                success: false,
                modified: false,
                content: file.content.clone(),
                statistics: FixStatistics {
                    total_issues,
                    remaining_issues: total_issues,
                    duration_ms: started.elapsed().as_millis() as u64,
                    ..Default::default()
                },
                errors: vec!["Biome not found; fixes were not applied".to_string()],
                applied_fixes: Vec::new(),
            };
        };

        let backup_path = backup_path_for(&file.path);
        let backup_created = match tokio::fs::write(&backup_path, file.content.as_bytes()).await {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    "failed to create backup {}: {err}",
                    backup_path.display()
                );
                false
            }
        };

        let pin = self.version_pin();
        let detected = self.detector.detect("biome", pin.as_deref(), cancel).await;
        let adapter = AdapterFactory::for_version(detected.version);
        let fix_argv = with_binary(
            &binary,
            adapter.fix_command(
                &file.path,
                &FixOptions {
                    unsafe_fixes: false,
                    config_path: self.biome.config_path.clone(),
                },
            ),
        );

        let mut attempts = 0u32;
        let mut errors: Vec<String> = Vec::new();
        let mut applied_fixes: Vec<Uuid> = Vec::new();
        let mut current_content = file.content.clone();
        let mut keep_backup = false;

        for category in BUCKET_ORDER {
            let bucket = plan.bucket(category);
            if bucket.is_empty() {
                continue;
            }
            if attempts >= self.auto_fix.max_attempts {
                debug!(
                    "fix attempt ceiling ({}) reached, leaving {} bucket unapplied",
                    self.auto_fix.max_attempts,
                    category.label()
                );
                break;
            }
            attempts += 1;
            debug!(
                "applying {} bucket ({} fixes) to {}",
                category.label(),
                bucket.len(),
                file.path.display()
            );

            let output = match run_command(
                &fix_argv,
                Some(&self.workspace_root),
                self.timeout,
                cancel,
            )
            .await
            {
                Ok(output) => output,
                Err(VigilError::Cancelled) => {
                    errors.push("fix sequence cancelled".to_string());
                    break;
                }
                Err(err) => {
                    errors.push(format!("{} bucket: {err}", category.label()));
                    break;
                }
            };

            if output.timed_out {
                errors.push(format!(
                    "{} bucket: fix command timed out after {}ms",
                    category.label(),
                    self.timeout.as_millis()
                ));
                break;
            }
            if !output.completed_with_diagnostics() {
                let detail = output.stderr.lines().next().unwrap_or("").trim();
                errors.push(format!(
                    "{} bucket: fix command exited with {:?}: {detail}",
                    category.label(),
                    output.exit_code
                ));
                break;
            }

            // Disk is authoritative after every invocation.
            match tokio::fs::read_to_string(&file.path).await {
                Ok(content) => current_content = content,
                Err(err) => {
                    errors.push(format!("failed to read file back after fix: {err}"));
                    break;
                }
            }

            applied_fixes.extend(bucket.iter().map(|d| d.id));
        }

        let mut success = errors.is_empty();
        let mut modified = success && current_content != file.content;

        if !success {
            // Leave the disk byte-identical to the pre-invocation content.
            if let Err(err) = self
                .restore_original(&file.path, &backup_path, backup_created, &file.content)
                .await
            {
                warn!("rollback failed for {}: {err}", file.path.display());
                errors.push(format!("rollback failed: {err}"));
                keep_backup = backup_created;
            }
            modified = false;
            success = false;
            applied_fixes.clear();
            current_content = file.content.clone();
        }

        if backup_created && !keep_backup {
            if let Err(err) = tokio::fs::remove_file(&backup_path).await {
                debug!("failed to remove backup {}: {err}", backup_path.display());
            }
        }

        let fixed_issues = if modified { applied_fixes.len() } else { 0 };
        let statistics = FixStatistics {
            total_issues,
            fixed_issues,
            remaining_issues: total_issues.saturating_sub(fixed_issues),
            duration_ms: started.elapsed().as_millis() as u64,
            attempts,
        };

        if modified {
            info!(
                "applied {} fix bucket(s) to {} in {}ms",
                attempts,
                file.path.display(),
                statistics.duration_ms
            );
        }

        FixResult {
            success,
            modified,
            content: current_content,
            statistics,
            errors,
            applied_fixes,
        }
    }

    fn version_pin(&self) -> Option<String> {
        let pin = self.biome.version.trim();
        (!pin.is_empty() && pin != "auto").then(|| pin.to_string())
    }

    async fn restore_original(
        &self,
        path: &Path,
        backup_path: &Path,
        backup_created: bool,
        original_content: &str,
    ) -> std::io::Result<()> {
        if backup_created {
            tokio::fs::copy(backup_path, path).await.map(|_| ())
        } else {
            tokio::fs::write(path, original_content.as_bytes()).await
        }
    }
}

pub fn backup_path_for(path: &Path) -> PathBuf {
    let mut backup = path.as_os_str().to_os_string();
    backup.push(".backup");
    PathBuf::from(backup)
}
