//! # Diagnostic Output Parsing
//!
//! Turns Biome's JSON diagnostics into the uniform [`Issue`] shape. The
//! parser is deliberately tolerant: unexpected JSON shapes degrade field by
//! field, invalid JSON falls back to a text scraper, and a completely
//! unreadable payload yields an empty list plus a warning instead of an
//! error.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Value};

use vigil_core::types::{Issue, Severity};

/// Parse outcome: issues plus an optional warning for the owning
/// ValidationResult.
#[derive(Debug, Default)]
pub struct ParsedOutput {
    pub issues: Vec<Issue>,
    pub warning: Option<String>,
}

/// Parse a diagnostics payload from `source` (the validator name). `cwd` is
/// used to relativize file paths.
pub fn parse_diagnostics(raw: &str, source: &str, cwd: &Path) -> ParsedOutput {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ParsedOutput::default();
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => parse_json(&value, source, cwd),
        Err(_) => parse_text(trimmed, source, cwd),
    }
}

fn parse_json(value: &Value, source: &str, cwd: &Path) -> ParsedOutput {
    let diagnostics = value
        .get("diagnostics")
        .and_then(|d| d.as_array())
        .cloned()
        .unwrap_or_default();

    let issues = diagnostics
        .iter()
        .map(|diag| parse_one(diag, source, cwd))
        .collect();

    ParsedOutput {
        issues,
        warning: None,
    }
}

fn parse_one(diag: &Value, source: &str, cwd: &Path) -> Issue {
    let file = diag
        .pointer("/location/path/file")
        .or_else(|| diag.pointer("/location/path"))
        .or_else(|| diag.get("file"))
        .and_then(|v| v.as_str())
        .unwrap_or("<unknown>");

    let line = position_field(diag, "line");
    let column = position_field(diag, "column");

    let severity = diag
        .get("severity")
        .and_then(|v| v.as_str())
        .map(Severity::from_label)
        .unwrap_or(Severity::Info);

    let message = diag
        .get("description")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .or_else(|| diag.get("message").map(extract_message))
        .unwrap_or_default();

    Issue {
        file: relativize(file, cwd),
        line,
        column,
        severity,
        message,
        source: source.to_string(),
        fixable: is_fixable(diag),
        fixed: false,
    }
}

fn position_field(diag: &Value, field: &str) -> u32 {
    diag.pointer(&format!("/location/{field}"))
        .or_else(|| diag.get(field))
        .and_then(|v| v.as_u64())
        .map(|n| n.max(1) as u32)
        .unwrap_or(1)
}

/// Messages arrive either as a plain string or as a structured
/// {content, elements[]} form whose element contents are joined with
/// spaces.
fn extract_message(message: &Value) -> String {
    match message {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            let mut parts = Vec::new();
            if let Some(content) = map.get("content").and_then(|v| v.as_str()) {
                parts.push(content.to_string());
            }
            if let Some(elements) = map.get("elements").and_then(|v| v.as_array()) {
                for element in elements {
                    if let Some(content) = element.get("content").and_then(|v| v.as_str()) {
                        parts.push(content.to_string());
                    } else if let Some(text) = element.as_str() {
                        parts.push(text.to_string());
                    }
                }
            }
            parts.join(" ")
        }
        Value::Array(items) => items
            .iter()
            .map(extract_message)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

/// A diagnostic is fixable iff it declares at least one suggested fix.
fn is_fixable(diag: &Value) -> bool {
    if let Some(flag) = diag.get("fixable").and_then(|v| v.as_bool()) {
        return flag;
    }
    for field in ["suggestedFixes", "suggested_fixes", "fixes"] {
        if let Some(fixes) = diag.get(field).and_then(|v| v.as_array()) {
            if !fixes.is_empty() {
                return true;
            }
        }
    }
    if let Some(advices) = diag.pointer("/advices/advices").and_then(|v| v.as_array()) {
        return !advices.is_empty();
    }
    false
}

/// Text fallback: scrape any `file:line:col message` lines.
fn parse_text(raw: &str, source: &str, cwd: &Path) -> ParsedOutput {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?P<file>[^:\s][^:\n]*):(?P<line>\d+):(?P<col>\d+):?\s*(?P<msg>.+)$")
            .expect("valid regex")
    });

    let issues: Vec<Issue> = pattern
        .captures_iter(raw)
        .map(|captures| Issue {
            file: relativize(&captures["file"], cwd),
            line: captures["line"].parse().unwrap_or(1),
            column: captures["col"].parse().unwrap_or(1),
            severity: Severity::Info,
            message: captures["msg"].trim().to_string(),
            source: source.to_string(),
            fixable: false,
            fixed: false,
        })
        .collect();

    let warning = issues
        .is_empty()
        .then(|| format!("{source} output was not parseable as diagnostics"));

    ParsedOutput { issues, warning }
}

fn relativize(file: &str, cwd: &Path) -> String {
    Path::new(file)
        .strip_prefix(cwd)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| file.to_string())
}

/// Serialize issues back into the canonical diagnostics JSON shape the
/// parser accepts. The parser and this serializer round-trip.
pub fn serialize_diagnostics(issues: &[Issue]) -> Value {
    json!({
        "diagnostics": issues
            .iter()
            .map(|issue| {
                json!({
                    "location": {
                        "path": { "file": issue.file },
                        "line": issue.line,
                        "column": issue.column,
                    },
                    "severity": severity_label(issue.severity),
                    "description": issue.message,
                    "fixable": issue.fixable,
                })
            })
            .collect::<Vec<_>>(),
    })
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn cwd() -> PathBuf {
        PathBuf::from("/work")
    }

    #[test]
    fn parses_structured_diagnostics() {
        let raw = r#"{
            "diagnostics": [{
                "location": { "path": { "file": "/work/src/a.ts" }, "line": 3, "column": 7 },
                "severity": "error",
                "description": "Formatter would have printed this file differently",
                "fixable": true
            }]
        }"#;

        let parsed = parse_diagnostics(raw, "biome", &cwd());
        assert_eq!(parsed.issues.len(), 1);
        let issue = &parsed.issues[0];
        assert_eq!(issue.file, "src/a.ts");
        assert_eq!((issue.line, issue.column), (3, 7));
        assert_eq!(issue.severity, Severity::Error);
        assert!(issue.fixable);
        assert!(parsed.warning.is_none());
    }

    #[test]
    fn severity_labels_map_onto_scale() {
        for (label, expected) in [
            ("error", Severity::Error),
            ("warning", Severity::Warning),
            ("warn", Severity::Warning),
            ("hint", Severity::Info),
        ] {
            let raw = format!(
                r#"{{"diagnostics":[{{"severity":"{label}","description":"x"}}]}}"#
            );
            let parsed = parse_diagnostics(&raw, "biome", &cwd());
            assert_eq!(parsed.issues[0].severity, expected, "label {label}");
        }
    }

    #[test]
    fn structured_message_concatenates_elements() {
        let raw = r#"{
            "diagnostics": [{
                "message": {
                    "content": "Unexpected",
                    "elements": [{"content": "var"}, {"content": "usage"}]
                }
            }]
        }"#;
        let parsed = parse_diagnostics(raw, "biome", &cwd());
        assert_eq!(parsed.issues[0].message, "Unexpected var usage");
    }

    #[test]
    fn missing_positions_default_to_one() {
        let raw = r#"{"diagnostics":[{"description":"oops"}]}"#;
        let parsed = parse_diagnostics(raw, "biome", &cwd());
        assert_eq!((parsed.issues[0].line, parsed.issues[0].column), (1, 1));
    }

    #[test]
    fn advices_imply_fixable() {
        let raw = r#"{
            "diagnostics": [{
                "description": "Use const",
                "advices": { "advices": [{"log": "replace let with const"}] }
            }]
        }"#;
        let parsed = parse_diagnostics(raw, "biome", &cwd());
        assert!(parsed.issues[0].fixable);
    }

    #[test]
    fn invalid_json_falls_back_to_text_mode() {
        let raw = "src/a.ts:12:4: Missing semicolon\nnot a diagnostic line\n";
        let parsed = parse_diagnostics(raw, "biome", &cwd());
        assert_eq!(parsed.issues.len(), 1);
        assert_eq!(parsed.issues[0].file, "src/a.ts");
        assert_eq!(parsed.issues[0].line, 12);
        assert_eq!(parsed.issues[0].message, "Missing semicolon");
    }

    #[test]
    fn unreadable_payload_yields_warning_not_error() {
        let parsed = parse_diagnostics("complete nonsense", "biome", &cwd());
        assert!(parsed.issues.is_empty());
        assert!(parsed.warning.is_some());
    }

    #[test]
    fn empty_payload_is_clean() {
        let parsed = parse_diagnostics("", "biome", &cwd());
        assert!(parsed.issues.is_empty());
        assert!(parsed.warning.is_none());
    }

    #[test]
    fn serializer_round_trips() {
        let issues = vec![
            Issue {
                file: "src/a.ts".to_string(),
                line: 3,
                column: 7,
                severity: Severity::Error,
                message: "Formatter would have printed this file differently".to_string(),
                source: "biome".to_string(),
                fixable: true,
                fixed: false,
            },
            Issue {
                file: "src/b.ts".to_string(),
                line: 1,
                column: 1,
                severity: Severity::Warning,
                message: "Unused import".to_string(),
                source: "biome".to_string(),
                fixable: true,
                fixed: false,
            },
        ];

        let serialized = serialize_diagnostics(&issues).to_string();
        let parsed = parse_diagnostics(&serialized, "biome", &cwd());

        assert_eq!(parsed.issues.len(), issues.len());
        for (round_tripped, original) in parsed.issues.iter().zip(&issues) {
            assert_eq!(round_tripped.key(), original.key());
            assert_eq!(round_tripped.severity, original.severity);
            assert_eq!(round_tripped.fixable, original.fixable);
        }
    }
}
