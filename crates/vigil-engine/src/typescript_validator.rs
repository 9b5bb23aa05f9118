//! # TypeScript Validator
//!
//! Runs `tsc --noEmit` and converts compiler diagnostics into issues. With a
//! resolved tsconfig the compiler checks the surrounding project and we keep
//! only diagnostics for the target file; without one the file is checked on
//! its own. Almost nothing the compiler reports is safely auto-fixable, so
//! `fixable` is restricted to a short allow-list of mechanical cleanups.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use vigil_config::TypeScriptConfig;
use vigil_core::process::{find_in_path, run_command};
use vigil_core::types::{FileRecord, Issue, Severity, ValidationResult};
use vigil_core::VigilError;

use crate::biome_validator::with_binary;
use crate::validator::{ValidationContext, Validator};

pub const TYPESCRIPT_VALIDATOR_NAME: &str = "typescript";

/// Compiler codes whose fixes are mechanical enough to auto-apply:
/// missing semicolons and unused imports/locals.
pub const SAFE_FIX_CODES: &[&str] = &["TS1005", "TS6133", "TS6192", "TS6196"];

pub struct TypeScriptValidator {
    config: TypeScriptConfig,
}

impl TypeScriptValidator {
    pub fn new(config: TypeScriptConfig) -> Self {
        Self { config }
    }

    fn resolve_tsconfig(&self, workspace_root: &Path) -> Option<PathBuf> {
        if let Some(path) = &self.config.config_path {
            return Some(path.clone());
        }
        let default = workspace_root.join("tsconfig.json");
        default.is_file().then_some(default)
    }
}

#[async_trait]
impl Validator for TypeScriptValidator {
    fn name(&self) -> &'static str {
        TYPESCRIPT_VALIDATOR_NAME
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn validate(&self, file: &FileRecord, ctx: &ValidationContext) -> ValidationResult {
        let started = Instant::now();

        let Some(binary) = resolve_tsc_binary(&ctx.workspace_root) else {
            warn!("tsc binary not found, skipping validation");
            return ValidationResult::tool_missing(
                self.name(),
                "TypeScript compiler not found; install typescript to enable this validator",
            );
        };

        let mut command = vec![
            "tsc".to_string(),
            "--noEmit".to_string(),
            "--pretty".to_string(),
            "false".to_string(),
        ];
        match self.resolve_tsconfig(&ctx.workspace_root) {
            Some(tsconfig) => {
                command.push("--project".to_string());
                command.push(tsconfig.display().to_string());
            }
            None => command.push(file.path.display().to_string()),
        }
        let argv = with_binary(&binary, command);
        debug!("running {}", argv.join(" "));

        let output = match run_command(&argv, Some(&ctx.workspace_root), ctx.timeout, &ctx.cancel)
            .await
        {
            Ok(output) => output,
            Err(VigilError::Cancelled) => {
                return ValidationResult::failed(
                    self.name(),
                    "cancelled",
                    started.elapsed().as_millis() as u64,
                );
            }
            Err(err) => {
                return ValidationResult::failed(
                    self.name(),
                    err.to_string(),
                    started.elapsed().as_millis() as u64,
                );
            }
        };

        let elapsed = started.elapsed().as_millis() as u64;

        if output.timed_out {
            return ValidationResult::failed(
                self.name(),
                format!("tsc timed out after {}ms", ctx.timeout.as_millis()),
                elapsed,
            );
        }

        let issues = parse_tsc_output(
            &output.stdout,
            self.name(),
            &ctx.workspace_root,
            Some(&file.path),
        );

        // tsc exits nonzero whenever it reports diagnostics; only an output
        // with neither diagnostics nor a clean exit is a tool failure.
        if issues.is_empty() && !matches!(output.exit_code, Some(0) | Some(1) | Some(2)) {
            let detail = output.stderr.lines().next().unwrap_or("").trim().to_string();
            return ValidationResult::failed(
                self.name(),
                format!("tsc exited with {:?}: {detail}", output.exit_code),
                elapsed,
            );
        }

        ValidationResult::completed(self.name(), issues, elapsed)
    }
}

/// Parse `file(line,col): severity TSxxxx: message` lines. When `target` is
/// given, diagnostics for other files in the project are dropped.
pub fn parse_tsc_output(
    stdout: &str,
    source: &str,
    cwd: &Path,
    target: Option<&Path>,
) -> Vec<Issue> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(
            r"(?m)^(?P<file>[^()\n]+?)\((?P<line>\d+),(?P<col>\d+)\):\s*(?P<sev>error|warning|message)\s+(?P<code>TS\d+):\s*(?P<msg>.+)$",
        )
        .expect("valid regex")
    });

    let target_relative = target.map(|t| relativize(t, cwd));

    pattern
        .captures_iter(stdout)
        .filter_map(|captures| {
            let file = relativize(Path::new(captures["file"].trim()), cwd);
            if let Some(wanted) = &target_relative {
                if &file != wanted {
                    return None;
                }
            }

            let code = &captures["code"];
            let severity = match &captures["sev"] {
                "error" => Severity::Error,
                "warning" => Severity::Warning,
                _ => Severity::Info,
            };

            Some(Issue {
                file,
                line: captures["line"].parse().unwrap_or(1),
                column: captures["col"].parse().unwrap_or(1),
                severity,
                message: format!("{code}: {}", captures["msg"].trim()),
                source: source.to_string(),
                fixable: SAFE_FIX_CODES.contains(&code),
                fixed: false,
            })
        })
        .collect()
}

fn relativize(path: &Path, cwd: &Path) -> String {
    path.strip_prefix(cwd)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| path.display().to_string())
}

/// Resolution order: workspace-local install, PATH, npx.
pub fn resolve_tsc_binary(workspace_root: &Path) -> Option<Vec<String>> {
    let local = workspace_root.join("node_modules/.bin/tsc");
    if local.is_file() {
        return Some(vec![local.display().to_string()]);
    }
    if find_in_path("tsc").is_some() {
        return Some(vec!["tsc".to_string()]);
    }
    if find_in_path("npx").is_some() {
        return Some(vec!["npx".to_string(), "tsc".to_string()]);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "\
src/app.ts(4,12): error TS2322: Type 'string' is not assignable to type 'number'.
src/app.ts(9,1): error TS1005: ';' expected.
src/app.ts(2,8): error TS6133: 'util' is declared but its value is never read.
src/other.ts(1,1): error TS2304: Cannot find name 'foo'.
";

    #[test]
    fn parses_compiler_diagnostics() {
        let issues = parse_tsc_output(OUTPUT, "typescript", Path::new("/w"), None);
        assert_eq!(issues.len(), 4);
        assert_eq!(issues[0].file, "src/app.ts");
        assert_eq!((issues[0].line, issues[0].column), (4, 12));
        assert_eq!(issues[0].severity, Severity::Error);
        assert!(issues[0].message.starts_with("TS2322:"));
    }

    #[test]
    fn project_diagnostics_are_filtered_to_target() {
        let issues = parse_tsc_output(
            OUTPUT,
            "typescript",
            Path::new("/w"),
            Some(Path::new("/w/src/app.ts")),
        );
        assert_eq!(issues.len(), 3);
        assert!(issues.iter().all(|i| i.file == "src/app.ts"));
    }

    #[test]
    fn only_allow_listed_codes_are_fixable() {
        let issues = parse_tsc_output(OUTPUT, "typescript", Path::new("/w"), None);
        let fixable: Vec<_> = issues.iter().filter(|i| i.fixable).collect();
        assert_eq!(fixable.len(), 2);
        assert!(fixable[0].message.starts_with("TS1005:"));
        assert!(fixable[1].message.starts_with("TS6133:"));
    }

    #[test]
    fn garbage_output_parses_to_nothing() {
        let issues = parse_tsc_output("not diagnostics at all", "typescript", Path::new("/w"), None);
        assert!(issues.is_empty());
    }
}
