//! # Post-Write Hook
//!
//! The orchestrator the agent adapter calls after every write: admission by
//! include/exclude patterns, enrichment from disk, parallel validation,
//! optional auto-fix behind the per-path lock, verification, and a compact
//! report. The hook catches everything: no event, however malformed, and no
//! collaborator failure may propagate an error to the caller.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vigil_config::{ConfigError, PatternSet, VigilConfig};
use vigil_core::path_lock::PathLockRegistry;
use vigil_core::types::{FileRecord, Issue};
use vigil_core::{VigilError, VigilResult};

use crate::autofix_engine::AutoFixEngine;
use crate::conflict_resolution::ConflictResolver;
use crate::fix_verification::FixVerifier;
use crate::validator_manager::ValidatorManager;

pub const HOOK_NAME: &str = "vigil-post-write";

/// Agent tools whose writes the gate processes.
pub const SUPPORTED_TOOLS: &[&str] = &["Write", "Edit", "MultiEdit"];

pub const SKIP_PATTERN_MISMATCH: &str = "skipped-pattern-mismatch";
pub const SKIP_DISABLED: &str = "skipped-disabled";
pub const SKIP_UNSUPPORTED_TOOL: &str = "skipped-unsupported-tool";
pub const SKIP_NO_FILE: &str = "skipped-no-file-path";

/// One agent write event, as received on stdin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookEvent {
    #[serde(default)]
    pub hook_event_name: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: ToolInput,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolInput {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub edits: Vec<EditOperation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditOperation {
    pub old_string: String,
    pub new_string: String,
}

/// The structured report emitted back to the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookReport {
    pub success: bool,
    pub modified: bool,
    pub issues_found: usize,
    pub issues_fixed: usize,
    pub messages: Vec<String>,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl HookReport {
    fn skip(reason: &str, message: impl Into<String>) -> Self {
        Self {
            success: true,
            modified: false,
            issues_found: 0,
            issues_fixed: 0,
            messages: vec![message.into()],
            execution_time_ms: 0,
            reason: Some(reason.to_string()),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            modified: false,
            issues_found: 0,
            issues_fixed: 0,
            messages: vec![message.into()],
            execution_time_ms: 0,
            reason: None,
        }
    }
}

pub struct PostWriteHook {
    config: Arc<VigilConfig>,
    workspace_root: PathBuf,
    patterns: PatternSet,
    manager: Arc<ValidatorManager>,
    engine: AutoFixEngine,
    verifier: FixVerifier,
    locks: PathLockRegistry,
}

impl PostWriteHook {
    pub fn new(config: Arc<VigilConfig>, workspace_root: PathBuf) -> Result<Self, ConfigError> {
        let patterns = PatternSet::compile(&config.include, &config.exclude)?;
        let manager = Arc::new(ValidatorManager::new(config.clone(), workspace_root.clone()));
        let engine = AutoFixEngine::new(
            manager.detector(),
            workspace_root.clone(),
            Duration::from_millis(config.timeout),
            config.auto_fix.clone(),
            config.validators.biome.clone(),
        );
        let verifier = FixVerifier::new(manager.clone());

        Ok(Self {
            config,
            workspace_root,
            patterns,
            manager,
            engine,
            verifier,
            locks: PathLockRegistry::new(),
        })
    }

    pub fn manager(&self) -> Arc<ValidatorManager> {
        self.manager.clone()
    }

    /// Process one write event. Never panics, never returns an error: every
    /// internal failure becomes a warning log plus a non-success report.
    pub async fn run(&self, event: HookEvent, cancel: &CancellationToken) -> HookReport {
        let started = Instant::now();
        let mut report = match self.execute(&event, cancel).await {
            Ok(report) => report,
            Err(err) => {
                warn!("[{HOOK_NAME}] {err}");
                HookReport::failure(simplify_error(&err))
            }
        };
        report.execution_time_ms = started.elapsed().as_millis() as u64;
        report
    }

    async fn execute(
        &self,
        event: &HookEvent,
        cancel: &CancellationToken,
    ) -> VigilResult<HookReport> {
        // ADMITTED
        if !self.config.enabled {
            return Ok(HookReport::skip(SKIP_DISABLED, "Vigil is disabled"));
        }

        if let Some(tool) = event.tool_name.as_deref() {
            if !SUPPORTED_TOOLS.contains(&tool) {
                return Ok(HookReport::skip(
                    SKIP_UNSUPPORTED_TOOL,
                    format!("Skipped: tool {tool} is not gated"),
                ));
            }
        }

        let Some(file_path) = event.tool_input.file_path.as_deref() else {
            return Ok(HookReport::skip(
                SKIP_NO_FILE,
                "Skipped: event carried no file path",
            ));
        };
        let path = absolutize(file_path, &self.workspace_root);

        if !self.patterns.admits(&path, &self.workspace_root) {
            debug!("[{HOOK_NAME}] {} rejected by patterns", path.display());
            return Ok(HookReport::skip(
                SKIP_PATTERN_MISMATCH,
                format!(
                    "Skipped: {} does not match the configured patterns",
                    display_relative(&path, &self.workspace_root)
                ),
            ));
        }

        // ENRICHED
        let file = match &event.tool_input.content {
            Some(content) => {
                let mut record = FileRecord::from_content(&path, content.clone());
                if let Ok(metadata) = tokio::fs::metadata(&path).await {
                    record.size = metadata.len();
                }
                record
            }
            None => FileRecord::load(&path).await?,
        };

        // VALIDATED
        let response = self.manager.validate(&file, cancel, false).await?;

        let mut seen = HashSet::new();
        let issues: Vec<Issue> = response
            .all_issues()
            .into_iter()
            .filter(|issue| seen.insert(issue.key()))
            .collect();

        let mut messages = Vec::new();
        for result in &response.results {
            if let Some(note) = &result.note {
                messages.push(note.clone());
            }
        }
        if issues.is_empty() {
            messages.push("No issues found".to_string());
        } else {
            messages.push(format!(
                "Found {} issue(s) ({} error(s), {} warning(s))",
                issues.len(),
                response.summary.error_count,
                response.summary.warning_count
            ));
        }

        let issues_found = issues.len();
        let any_fixable = issues.iter().any(|i| i.fixable);

        if !self.config.auto_fix.enabled || !any_fixable {
            return Ok(HookReport {
                success: response.success,
                modified: false,
                issues_found,
                issues_fixed: 0,
                messages,
                execution_time_ms: 0,
                reason: None,
            });
        }

        // FIXED — the path lock covers the whole backup → fix → verify
        // window so concurrent invocations on the same file serialize.
        let _guard = self.locks.lock(&path).await;

        let plan = ConflictResolver::plan(&issues);
        if plan.is_empty() {
            messages.push("No safely applicable fixes".to_string());
            return Ok(HookReport {
                success: response.success,
                modified: false,
                issues_found,
                issues_fixed: 0,
                messages,
                execution_time_ms: 0,
                reason: None,
            });
        }

        let fix = self.engine.apply(&file, &plan, issues_found, cancel).await;
        for error in &fix.errors {
            messages.push(first_line(error).to_string());
        }

        if !fix.success {
            return Ok(HookReport {
                success: false,
                modified: false,
                issues_found,
                issues_fixed: 0,
                messages,
                execution_time_ms: 0,
                reason: None,
            });
        }
        if !fix.modified {
            messages.push("Fixes produced no changes".to_string());
            return Ok(HookReport {
                success: response.success,
                modified: false,
                issues_found,
                issues_fixed: 0,
                messages,
                execution_time_ms: 0,
                reason: None,
            });
        }

        // VERIFIED
        let fixed_file = FileRecord::load(&path).await?;
        let verification = self.verifier.verify(&file, &fixed_file, &issues, cancel).await;

        let issues_fixed = verification.comparison.resolved.len();
        messages.push(format!("Fixed {issues_fixed} of {issues_found} issue(s)"));
        messages.push(format!("Fix effectiveness: {}", verification.effectiveness));
        messages.extend(verification.warnings.iter().cloned());

        // An integrity failure means the byte change cannot be trusted, so
        // the report claims no modification.
        let modified = verification.integrity.passed();

        info!(
            "[{HOOK_NAME}] {}: {issues_fixed}/{issues_found} fixed, grade {}",
            display_relative(&path, &self.workspace_root),
            verification.effectiveness
        );

        Ok(HookReport {
            success: verification.success,
            modified,
            issues_found,
            issues_fixed,
            messages,
            execution_time_ms: 0,
            reason: None,
        })
    }
}

fn absolutize(file_path: &str, workspace_root: &Path) -> PathBuf {
    let path = PathBuf::from(file_path);
    if path.is_absolute() {
        path
    } else {
        workspace_root.join(path)
    }
}

fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("").trim()
}

/// Reduce an error chain to a single agent-readable line.
fn simplify_error(err: &VigilError) -> String {
    first_line(&err.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hook_with(config: VigilConfig, root: &Path) -> PostWriteHook {
        PostWriteHook::new(Arc::new(config), root.to_path_buf()).unwrap()
    }

    fn write_event(path: &Path, content: &str) -> HookEvent {
        HookEvent {
            hook_event_name: Some("PostToolUse".to_string()),
            tool_name: Some("Write".to_string()),
            tool_input: ToolInput {
                file_path: Some(path.display().to_string()),
                content: Some(content.to_string()),
                edits: Vec::new(),
            },
        }
    }

    fn offline_config() -> VigilConfig {
        // Validators stay enabled but the tools are absent in CI; the gate
        // must degrade to success in that case.
        let mut config = VigilConfig::default();
        config.validators.biome.enabled = false;
        config.validators.typescript.enabled = false;
        config
    }

    #[tokio::test]
    async fn disabled_gate_skips_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = offline_config();
        config.enabled = false;
        let hook = hook_with(config, dir.path());

        let event = write_event(&dir.path().join("a.ts"), "const x = 1;");
        let report = hook.run(event, &CancellationToken::new()).await;

        assert!(report.success);
        assert!(!report.modified);
        assert_eq!(report.reason.as_deref(), Some(SKIP_DISABLED));
    }

    #[tokio::test]
    async fn pattern_mismatch_skips_with_reason() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = offline_config();
        config.include = vec!["**/*.ts".to_string()];
        config.exclude = vec!["**/generated/**".to_string()];
        let hook = hook_with(config, dir.path());

        let event = write_event(&dir.path().join("src/generated/api.ts"), "const x = 1;");
        let report = hook.run(event, &CancellationToken::new()).await;

        assert!(report.success);
        assert!(!report.modified);
        assert_eq!(report.reason.as_deref(), Some(SKIP_PATTERN_MISMATCH));
        assert!(report.messages.iter().any(|m| m.contains("Skipped")));
    }

    #[tokio::test]
    async fn unsupported_tool_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let hook = hook_with(offline_config(), dir.path());

        let mut event = write_event(&dir.path().join("a.ts"), "const x = 1;");
        event.tool_name = Some("Bash".to_string());
        let report = hook.run(event, &CancellationToken::new()).await;

        assert!(report.success);
        assert_eq!(report.reason.as_deref(), Some(SKIP_UNSUPPORTED_TOOL));
    }

    #[tokio::test]
    async fn missing_file_path_is_skipped_not_failed() {
        let dir = tempfile::tempdir().unwrap();
        let hook = hook_with(offline_config(), dir.path());

        let event = HookEvent::default();
        let report = hook.run(event, &CancellationToken::new()).await;

        assert!(report.success);
        assert_eq!(report.reason.as_deref(), Some(SKIP_NO_FILE));
    }

    #[tokio::test]
    async fn clean_file_reports_success_without_modification() {
        let dir = tempfile::tempdir().unwrap();
        let hook = hook_with(offline_config(), dir.path());

        let path = dir.path().join("a.ts");
        std::fs::write(&path, "const x = 1;\n").unwrap();
        let report = hook
            .run(write_event(&path, "const x = 1;\n"), &CancellationToken::new())
            .await;

        assert!(report.success);
        assert!(!report.modified);
        assert_eq!(report.issues_found, 0);
        assert!(report.messages.iter().any(|m| m == "No issues found"));
    }

    #[tokio::test]
    async fn absent_file_is_permitted() {
        let dir = tempfile::tempdir().unwrap();
        let hook = hook_with(offline_config(), dir.path());

        let mut event = write_event(&dir.path().join("missing.ts"), "");
        event.tool_input.content = None;
        let report = hook.run(event, &CancellationToken::new()).await;

        assert!(report.success);
        assert_eq!(report.issues_found, 0);
    }

    #[tokio::test]
    async fn cancellation_becomes_a_failure_report_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = VigilConfig::default();
        config.validators.biome.version = "2.x".to_string();
        let hook = hook_with(config, dir.path());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = hook
            .run(write_event(&dir.path().join("a.ts"), "const x = 1;"), &cancel)
            .await;

        assert!(!report.success);
        assert!(!report.modified);
    }

    #[test]
    fn event_parses_from_agent_json() {
        let raw = r#"{
            "hook_event_name": "PostToolUse",
            "tool_name": "Edit",
            "tool_input": {
                "file_path": "/work/src/a.ts",
                "edits": [{"old_string": "let", "new_string": "const"}]
            }
        }"#;
        let event: HookEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.tool_name.as_deref(), Some("Edit"));
        assert_eq!(event.tool_input.edits.len(), 1);
        assert!(event.tool_input.content.is_none());
    }

    #[test]
    fn report_serializes_with_agent_field_names() {
        let report = HookReport {
            success: true,
            modified: true,
            issues_found: 2,
            issues_fixed: 2,
            messages: vec!["Fixed 2 of 2 issue(s)".to_string()],
            execution_time_ms: 120,
            reason: None,
        };
        let value = serde_json::to_value(&report).unwrap();
        for key in [
            "success",
            "modified",
            "issues_found",
            "issues_fixed",
            "messages",
            "execution_time_ms",
        ] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        assert!(value.get("reason").is_none());
    }
}
