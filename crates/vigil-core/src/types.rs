//! # Validation Data Model
//!
//! The shapes that flow through the pipeline: the file under validation, the
//! diagnostics produced by validators, and the aggregated per-run response.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use crate::errors::VigilResult;

/// Extensions treated as code for delimiter-balance integrity checks.
pub const CODE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts"];

/// A file under validation. Created once per hook invocation; the content is
/// replaced only by the auto-fix engine reading the file back from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path to the file
    pub path: PathBuf,
    /// Current file content
    pub content: String,
    /// Lowercased extension without the dot
    pub extension: String,
    /// Whether the file existed on disk when the record was created
    pub exists: bool,
    /// Size in bytes
    pub size: u64,
    /// Last-modified time as epoch seconds, when available
    pub modified_at: Option<i64>,
}

impl FileRecord {
    /// Build a record from an in-memory write event without touching disk.
    pub fn from_content(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        let path = path.into();
        let content = content.into();
        let extension = extension_of(&path);
        let size = content.len() as u64;
        Self {
            path,
            content,
            extension,
            exists: true,
            size,
            modified_at: None,
        }
    }

    /// Build a record by reading the file from disk. Absent files yield an
    /// empty record with `exists = false`.
    pub async fn load(path: impl Into<PathBuf>) -> VigilResult<Self> {
        let path = path.into();
        let extension = extension_of(&path);

        let metadata = tokio::fs::metadata(&path).await.ok();
        let Some(metadata) = metadata else {
            return Ok(Self {
                path,
                content: String::new(),
                extension,
                exists: false,
                size: 0,
                modified_at: None,
            });
        };

        let bytes = tokio::fs::read(&path).await?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        let modified_at = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64);

        Ok(Self {
            path,
            content,
            extension,
            exists: true,
            size: metadata.len(),
            modified_at,
        })
    }

    /// Refresh content and metadata from disk, keeping the same path.
    pub async fn reload(&mut self) -> VigilResult<()> {
        *self = Self::load(self.path.clone()).await?;
        Ok(())
    }

    pub fn is_json(&self) -> bool {
        matches!(self.extension.as_str(), "json" | "jsonc")
    }

    pub fn is_code(&self) -> bool {
        CODE_EXTENSIONS.contains(&self.extension.as_str())
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// Map an external tool's severity label onto the internal scale.
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "error" | "fatal" => Self::Error,
            "warning" | "warn" => Self::Warning,
            _ => Self::Info,
        }
    }
}

/// One diagnostic produced by a validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Owning file path (absolute internally, relativized for reports)
    pub file: String,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
    pub severity: Severity,
    pub message: String,
    /// Name of the validator that produced this issue
    pub source: String,
    /// Whether the tool advertises a safe fix for this issue
    pub fixable: bool,
    /// Set after the auto-fix engine claims this issue was addressed
    pub fixed: bool,
}

/// Identity tuple used to compare issues across validation runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IssueKey {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl Issue {
    pub fn key(&self) -> IssueKey {
        IssueKey {
            file: self.file.clone(),
            line: self.line,
            column: self.column,
            message: self.message.clone(),
        }
    }
}

/// Per-validator outcome status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Success,
    Warning,
    Error,
}

/// Outcome of one validator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub validator: String,
    pub status: ValidationStatus,
    pub issues: Vec<Issue>,
    pub duration_ms: u64,
    /// Populated when the validator itself failed (spawn error, timeout)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Informational note, e.g. a missing-tool skip
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ValidationResult {
    /// A completed run; status is derived from the issue severities so the
    /// `status = success ⇒ no error issues` invariant holds by construction.
    pub fn completed(validator: impl Into<String>, issues: Vec<Issue>, duration_ms: u64) -> Self {
        let status = if issues.iter().any(|i| i.severity == Severity::Error) {
            ValidationStatus::Error
        } else if issues.is_empty() {
            ValidationStatus::Success
        } else {
            ValidationStatus::Warning
        };
        Self {
            validator: validator.into(),
            status,
            issues,
            duration_ms,
            error: None,
            note: None,
        }
    }

    /// The validator itself failed: no issues, only an error string.
    pub fn failed(validator: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            validator: validator.into(),
            status: ValidationStatus::Error,
            issues: Vec::new(),
            duration_ms,
            error: Some(error.into()),
            note: None,
        }
    }

    /// The underlying tool is unavailable; validation degrades to a no-op
    /// success so a missing binary never blocks the agent.
    pub fn tool_missing(validator: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            validator: validator.into(),
            status: ValidationStatus::Success,
            issues: Vec::new(),
            duration_ms: 0,
            error: None,
            note: Some(note.into()),
        }
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }
}

/// Summary counters across all validators of one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_issues: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
    pub successful_validators: usize,
    pub failed_validators: usize,
}

/// Wall-clock accounting for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationPerformance {
    pub total_duration_ms: u64,
    /// Sum of per-validator durations divided by wall-clock, clamped to [0,1]
    pub parallel_efficiency: f64,
}

/// Aggregated outcome of running all enabled validators against one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub success: bool,
    pub results: Vec<ValidationResult>,
    pub summary: ValidationSummary,
    pub performance: ValidationPerformance,
    pub cached: bool,
}

impl ValidationResponse {
    /// Aggregate per-validator results into the run-level response.
    pub fn aggregate(results: Vec<ValidationResult>, wall_clock_ms: u64) -> Self {
        let mut summary = ValidationSummary::default();
        let mut compute_ms = 0u64;

        for result in &results {
            compute_ms += result.duration_ms;
            if result.error.is_some() {
                summary.failed_validators += 1;
            } else {
                summary.successful_validators += 1;
            }
            for issue in &result.issues {
                summary.total_issues += 1;
                match issue.severity {
                    Severity::Error => summary.error_count += 1,
                    Severity::Warning => summary.warning_count += 1,
                    Severity::Info => summary.info_count += 1,
                }
            }
        }

        let parallel_efficiency = if wall_clock_ms == 0 {
            1.0
        } else {
            (compute_ms as f64 / wall_clock_ms as f64).clamp(0.0, 1.0)
        };

        let success = summary.error_count == 0
            && !results.iter().any(|r| r.status == ValidationStatus::Error);

        Self {
            success,
            results,
            summary,
            performance: ValidationPerformance {
                total_duration_ms: wall_clock_ms,
                parallel_efficiency,
            },
            cached: false,
        }
    }

    /// Every issue across all validators, in stable validator order.
    pub fn all_issues(&self) -> Vec<Issue> {
        self.results
            .iter()
            .flat_map(|r| r.issues.iter().cloned())
            .collect()
    }

    pub fn fixable_issues(&self) -> Vec<Issue> {
        self.results
            .iter()
            .flat_map(|r| r.issues.iter().filter(|i| i.fixable).cloned())
            .collect()
    }
}
