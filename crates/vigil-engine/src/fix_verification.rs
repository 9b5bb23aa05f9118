//! # Fix Verification
//!
//! Proves a fix run was a net improvement: checks the file's physical
//! integrity, re-validates the new content with the cache bypassed, diffs
//! the issue sets, and grades effectiveness. The grade is informational;
//! `success` is the authoritative bit.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use vigil_core::types::{FileRecord, Issue, IssueKey, ValidationResponse};

use crate::validator_manager::ValidatorManager;

/// Post-fix size must stay within this ratio band of the original.
pub const SIZE_RATIO_MIN: f64 = 0.1;
pub const SIZE_RATIO_MAX: f64 = 10.0;

/// Qualitative grade for a fix run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effectiveness {
    Excellent,
    Good,
    Partial,
    Poor,
    Failed,
}

impl fmt::Display for Effectiveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Partial => "partial",
            Self::Poor => "poor",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Issue-set diff between the pre-fix and post-fix runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueComparison {
    /// In the original run, absent from the new one
    pub resolved: Vec<Issue>,
    /// Present in both runs
    pub remaining: Vec<Issue>,
    /// Introduced by the fix
    pub new_issues: Vec<Issue>,
    /// resolved ÷ original count; 1.0 when there was nothing to resolve
    pub success_rate: f64,
}

/// Physical health of the post-fix file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileIntegrity {
    pub exists: bool,
    pub valid_syntax: bool,
    pub reasonable_size: bool,
    pub is_empty: bool,
    pub encoding_preserved: bool,
    pub size: u64,
    pub corruption_indicators: Vec<String>,
}

impl FileIntegrity {
    pub fn passed(&self) -> bool {
        self.exists
            && self.valid_syntax
            && self.reasonable_size
            && self.encoding_preserved
            && self.corruption_indicators.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationMetrics {
    pub duration_ms: u64,
    pub integrity_ms: u64,
    pub revalidation_ms: u64,
}

/// Full verification outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub success: bool,
    pub effectiveness: Effectiveness,
    pub comparison: IssueComparison,
    pub integrity: FileIntegrity,
    pub response: ValidationResponse,
    pub metrics: VerificationMetrics,
    pub warnings: Vec<String>,
}

pub struct FixVerifier {
    manager: Arc<ValidatorManager>,
}

impl FixVerifier {
    pub fn new(manager: Arc<ValidatorManager>) -> Self {
        Self { manager }
    }

    /// Verify the fixed file against the pre-fix issue set.
    pub async fn verify(
        &self,
        original: &FileRecord,
        fixed: &FileRecord,
        original_issues: &[Issue],
        cancel: &CancellationToken,
    ) -> VerificationResult {
        let started = Instant::now();
        let mut warnings = Vec::new();

        let integrity = check_integrity(original, fixed).await;
        let integrity_ms = started.elapsed().as_millis() as u64;
        if !integrity.valid_syntax {
            warnings.push("fixed file has invalid syntax".to_string());
        }
        for indicator in &integrity.corruption_indicators {
            warnings.push(format!("corruption indicator: {indicator}"));
        }

        // Re-validate with the cache bypassed; the fixed content must be
        // judged fresh.
        let revalidation_started = Instant::now();
        let response = match self.manager.validate(fixed, cancel, true).await {
            Ok(response) => response,
            Err(err) => {
                warn!("re-validation failed during verification: {err}");
                warnings.push(format!("verification exception: {err}"));
                ValidationResponse::aggregate(Vec::new(), 0)
            }
        };
        let revalidation_ms = revalidation_started.elapsed().as_millis() as u64;

        let comparison = compare_issues(original_issues, &response.all_issues());
        if !comparison.new_issues.is_empty() {
            warnings.push(format!(
                "new issues introduced by fix: {}",
                comparison.new_issues.len()
            ));
        }

        let effectiveness = assess_effectiveness(&integrity, &comparison);
        let original_count = original_issues.len();
        let success = integrity.passed()
            && response.success
            && comparison.new_issues.len() <= comparison.resolved.len()
            && (!comparison.resolved.is_empty() || original_count == 0);

        debug!(
            "verification of {}: {} resolved, {} remaining, {} new, grade {}",
            fixed.path.display(),
            comparison.resolved.len(),
            comparison.remaining.len(),
            comparison.new_issues.len(),
            effectiveness
        );

        VerificationResult {
            success,
            effectiveness,
            comparison,
            integrity,
            response,
            metrics: VerificationMetrics {
                duration_ms: started.elapsed().as_millis() as u64,
                integrity_ms,
                revalidation_ms,
            },
            warnings,
        }
    }
}

/// Split issue sets by identity tuple into resolved / remaining / new.
pub fn compare_issues(original: &[Issue], new: &[Issue]) -> IssueComparison {
    let original_keys: HashSet<IssueKey> = original.iter().map(Issue::key).collect();
    let new_keys: HashSet<IssueKey> = new.iter().map(Issue::key).collect();

    let mut resolved: Vec<Issue> = original
        .iter()
        .filter(|i| !new_keys.contains(&i.key()))
        .cloned()
        .collect();
    for issue in &mut resolved {
        issue.fixed = true;
    }

    let remaining: Vec<Issue> = original
        .iter()
        .filter(|i| new_keys.contains(&i.key()))
        .cloned()
        .collect();

    let new_issues: Vec<Issue> = new
        .iter()
        .filter(|i| !original_keys.contains(&i.key()))
        .cloned()
        .collect();

    let success_rate = if original.is_empty() {
        1.0
    } else {
        resolved.len() as f64 / original.len() as f64
    };

    IssueComparison {
        resolved,
        remaining,
        new_issues,
        success_rate,
    }
}

/// Grade the run. Integrity trumps everything; new issues cap the grade.
pub fn assess_effectiveness(
    integrity: &FileIntegrity,
    comparison: &IssueComparison,
) -> Effectiveness {
    if !integrity.passed() {
        return Effectiveness::Failed;
    }

    let new_count = comparison.new_issues.len();
    let resolved_count = comparison.resolved.len();
    let rate = comparison.success_rate;

    if new_count > resolved_count {
        return Effectiveness::Poor;
    }
    if new_count > 0 && rate >= 0.7 {
        return Effectiveness::Partial;
    }

    if rate >= 0.9 {
        Effectiveness::Excellent
    } else if rate >= 0.7 {
        Effectiveness::Good
    } else if rate >= 0.3 {
        Effectiveness::Partial
    } else if rate > 0.0 {
        Effectiveness::Poor
    } else {
        Effectiveness::Failed
    }
}

/// Stat, decode, and sanity-check the post-fix file.
pub async fn check_integrity(original: &FileRecord, fixed: &FileRecord) -> FileIntegrity {
    let mut indicators = Vec::new();

    let metadata = tokio::fs::metadata(&fixed.path).await.ok();
    let exists = metadata.is_some();
    let size = metadata.map(|m| m.len()).unwrap_or(0);
    if !exists {
        indicators.push("file missing after fix".to_string());
    }

    // Encoding round-trip: the bytes on disk must still be valid UTF-8.
    let raw = tokio::fs::read(&fixed.path).await.unwrap_or_default();
    let encoding_preserved = std::str::from_utf8(&raw).is_ok();
    if exists && !encoding_preserved {
        indicators.push("encoding no longer valid UTF-8".to_string());
    }

    let is_empty = size == 0 || fixed.content.trim().is_empty();
    if is_empty && !original.content.trim().is_empty() {
        indicators.push("file emptied by fix".to_string());
    }

    let reasonable_size = if original.size == 0 {
        true
    } else {
        let ratio = size as f64 / original.size as f64;
        (SIZE_RATIO_MIN..=SIZE_RATIO_MAX).contains(&ratio)
    };
    if !reasonable_size {
        indicators.push(format!(
            "size changed from {} to {size} bytes",
            original.size
        ));
    }

    let valid_syntax = if is_empty {
        true
    } else if fixed.is_json() {
        let parses = serde_json::from_str::<serde_json::Value>(&fixed.content).is_ok();
        if !parses {
            indicators.push("invalid JSON".to_string());
        }
        parses
    } else if fixed.is_code() {
        let balanced = balanced_delimiters(&fixed.content);
        if !balanced {
            indicators.push("unbalanced delimiters".to_string());
        }
        balanced
    } else {
        let healthy = control_characters_ok(&raw);
        if !healthy {
            indicators.push("excessive control characters".to_string());
        }
        healthy
    };

    FileIntegrity {
        exists,
        valid_syntax,
        reasonable_size,
        is_empty,
        encoding_preserved,
        size,
        corruption_indicators: indicators,
    }
}

/// Check `()`, `[]`, `{}` balance outside strings and comments.
pub fn balanced_delimiters(content: &str) -> bool {
    let mut stack: Vec<char> = Vec::new();
    let mut chars = content.chars().peekable();
    let mut in_string: Option<char> = None;
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    while let Some(c) = chars.next() {
        if in_line_comment {
            if c == '\n' {
                in_line_comment = false;
            }
            continue;
        }
        if in_block_comment {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                in_block_comment = false;
            }
            continue;
        }
        if let Some(quote) = in_string {
            if c == '\\' {
                chars.next();
            } else if c == quote {
                in_string = None;
            } else if c == '\n' && quote != '`' {
                // Unterminated single-line string; stop tracking it.
                in_string = None;
            }
            continue;
        }

        match c {
            '"' | '\'' | '`' => in_string = Some(c),
            '/' if chars.peek() == Some(&'/') => {
                chars.next();
                in_line_comment = true;
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                in_block_comment = true;
            }
            '(' | '[' | '{' => stack.push(c),
            ')' => {
                if stack.pop() != Some('(') {
                    return false;
                }
            }
            ']' => {
                if stack.pop() != Some('[') {
                    return false;
                }
            }
            '}' => {
                if stack.pop() != Some('{') {
                    return false;
                }
            }
            _ => {}
        }
    }

    stack.is_empty()
}

/// Non-code files: less than 1% NUL bytes and less than 5% control bytes
/// (tabs and newlines excluded).
fn control_characters_ok(raw: &[u8]) -> bool {
    if raw.is_empty() {
        return true;
    }
    let total = raw.len() as f64;
    let nul_count = raw.iter().filter(|&&b| b == 0).count() as f64;
    let control_count = raw
        .iter()
        .filter(|&&b| b < 0x20 && !matches!(b, b'\n' | b'\r' | b'\t'))
        .count() as f64;

    nul_count / total < 0.01 && control_count / total < 0.05
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::types::Severity;

    fn issue(line: u32, message: &str) -> Issue {
        Issue {
            file: "src/a.ts".to_string(),
            line,
            column: 1,
            severity: Severity::Error,
            message: message.to_string(),
            source: "biome".to_string(),
            fixable: true,
            fixed: false,
        }
    }

    fn healthy_integrity() -> FileIntegrity {
        FileIntegrity {
            exists: true,
            valid_syntax: true,
            reasonable_size: true,
            is_empty: false,
            encoding_preserved: true,
            size: 100,
            corruption_indicators: Vec::new(),
        }
    }

    #[test]
    fn comparison_splits_resolved_remaining_new() {
        let original = vec![issue(1, "a"), issue(2, "b"), issue(3, "c")];
        let new = vec![issue(2, "b"), issue(9, "brand new")];

        let comparison = compare_issues(&original, &new);
        assert_eq!(comparison.resolved.len(), 2);
        assert!(comparison.resolved.iter().all(|i| i.fixed));
        assert_eq!(comparison.remaining.len(), 1);
        assert_eq!(comparison.new_issues.len(), 1);
        assert!((comparison.success_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_original_set_has_full_success_rate() {
        let comparison = compare_issues(&[], &[]);
        assert!((comparison.success_rate - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn effectiveness_ladder() {
        let integrity = healthy_integrity();

        let grade = |resolved: usize, new: usize, original: usize| {
            let comparison = IssueComparison {
                resolved: (0..resolved).map(|i| issue(i as u32, "r")).collect(),
                remaining: Vec::new(),
                new_issues: (0..new).map(|i| issue(100 + i as u32, "n")).collect(),
                success_rate: if original == 0 {
                    1.0
                } else {
                    resolved as f64 / original as f64
                },
            };
            assess_effectiveness(&integrity, &comparison)
        };

        assert_eq!(grade(10, 0, 10), Effectiveness::Excellent);
        assert_eq!(grade(8, 0, 10), Effectiveness::Good);
        assert_eq!(grade(5, 0, 10), Effectiveness::Partial);
        assert_eq!(grade(1, 0, 10), Effectiveness::Poor);
        assert_eq!(grade(0, 0, 10), Effectiveness::Failed);
        // New issues outnumbering resolutions is poor regardless of rate.
        assert_eq!(grade(1, 2, 10), Effectiveness::Poor);
        // Some new issues with a high rate degrades to partial.
        assert_eq!(grade(9, 1, 10), Effectiveness::Partial);
    }

    #[test]
    fn failed_integrity_grades_failed() {
        let mut integrity = healthy_integrity();
        integrity.valid_syntax = false;
        integrity.corruption_indicators.push("unbalanced delimiters".to_string());

        let comparison = compare_issues(&[issue(1, "a")], &[]);
        assert_eq!(
            assess_effectiveness(&integrity, &comparison),
            Effectiveness::Failed
        );
    }

    #[test]
    fn delimiter_balance_handles_strings_and_comments() {
        assert!(balanced_delimiters("const x = { a: [1, 2], b: (3) };"));
        assert!(balanced_delimiters(r#"const s = "not a { brace";"#));
        assert!(balanced_delimiters("// { unbalanced in comment\nconst x = 1;"));
        assert!(balanced_delimiters("/* { */ const x = 1;"));
        assert!(balanced_delimiters("const t = `template { with brace`;"));
        assert!(!balanced_delimiters("function broken() { return [1, 2; }"));
        assert!(!balanced_delimiters("const x = ((1);"));
    }

    #[tokio::test]
    async fn integrity_flags_emptied_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ts");
        std::fs::write(&path, "").unwrap();

        let original = FileRecord::from_content(&path, "const x = 1;");
        let fixed = FileRecord::load(&path).await.unwrap();
        let integrity = check_integrity(&original, &fixed).await;

        assert!(integrity.is_empty);
        assert!(!integrity.passed());
        assert!(integrity
            .corruption_indicators
            .iter()
            .any(|i| i.contains("emptied")));
    }

    #[tokio::test]
    async fn integrity_accepts_healthy_code_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ts");
        let content = "const x = 1;\nlet y = \"hello\";\n";
        std::fs::write(&path, content).unwrap();

        let original = FileRecord::from_content(&path, "const x=1;let y=\"hello\"\n");
        let fixed = FileRecord::load(&path).await.unwrap();
        let integrity = check_integrity(&original, &fixed).await;

        assert!(integrity.passed());
        assert!(!integrity.is_empty);
        assert!(integrity.encoding_preserved);
    }

    #[tokio::test]
    async fn integrity_flags_size_explosion() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ts");
        std::fs::write(&path, "x".repeat(2000)).unwrap();

        let original = FileRecord::from_content(&path, "const x = 1;");
        let fixed = FileRecord::load(&path).await.unwrap();
        let integrity = check_integrity(&original, &fixed).await;

        assert!(!integrity.reasonable_size);
        assert!(!integrity.passed());
    }

    #[tokio::test]
    async fn empty_original_and_empty_fixed_pass() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ts");
        std::fs::write(&path, "").unwrap();

        let original = FileRecord::from_content(&path, "");
        let fixed = FileRecord::load(&path).await.unwrap();
        let integrity = check_integrity(&original, &fixed).await;

        assert!(integrity.is_empty);
        assert!(integrity.passed());
    }
}
