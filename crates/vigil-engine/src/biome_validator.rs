//! # Biome Validator
//!
//! Runs `biome check` against one file with the JSON reporter and maps the
//! diagnostics into issues. The binary is resolved from the workspace's
//! `node_modules/.bin`, then PATH, then an `npx` prefix; when none resolves
//! the validator degrades to a no-op success so a missing tool never blocks
//! the agent.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use vigil_config::BiomeConfig;
use vigil_core::process::{find_in_path, run_command};
use vigil_core::types::{FileRecord, ValidationResult};
use vigil_core::VigilError;

use crate::adapters::{AdapterFactory, CheckOptions};
use crate::output_parser::parse_diagnostics;
use crate::validator::{ValidationContext, Validator};
use crate::version_detection::VersionDetector;

pub const BIOME_VALIDATOR_NAME: &str = "biome";

pub struct BiomeValidator {
    config: BiomeConfig,
    detector: Arc<VersionDetector>,
}

impl BiomeValidator {
    pub fn new(config: BiomeConfig, detector: Arc<VersionDetector>) -> Self {
        Self { config, detector }
    }

    fn version_pin(&self) -> Option<&str> {
        let pin = self.config.version.trim();
        (!pin.is_empty() && pin != "auto").then_some(pin)
    }
}

#[async_trait]
impl Validator for BiomeValidator {
    fn name(&self) -> &'static str {
        BIOME_VALIDATOR_NAME
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn validate(&self, file: &FileRecord, ctx: &ValidationContext) -> ValidationResult {
        let started = Instant::now();

        let Some(binary) = resolve_biome_binary(&ctx.workspace_root) else {
            warn!("biome binary not found, skipping validation");
            return ValidationResult::tool_missing(
                self.name(),
                "Biome not found; install @biomejs/biome to enable this validator",
            );
        };

        let detected = self
            .detector
            .detect("biome", self.version_pin(), &ctx.cancel)
            .await;
        let adapter = AdapterFactory::for_version(detected.version);

        let options = CheckOptions {
            reporter_json: true,
            config_path: self.config.config_path.clone(),
            ..Default::default()
        };
        let argv = with_binary(&binary, adapter.check_command(&file.path, &options));
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
                format!("biome timed out after {}ms", ctx.timeout.as_millis()),
                elapsed,
            );
        }

        // Exit code 1 is a normal diagnostics run; anything beyond that with
        // no parsable stdout is a tool failure.
        if !output.completed_with_diagnostics() && output.stdout.trim().is_empty() {
            let detail = first_line(&output.stderr);
            return ValidationResult::failed(
                self.name(),
                format!("biome exited with {:?}: {detail}", output.exit_code),
                elapsed,
            );
        }

        let parsed = parse_diagnostics(&output.stdout, self.name(), &ctx.workspace_root);
        let mut result = ValidationResult::completed(self.name(), parsed.issues, elapsed);
        result.note = parsed.warning;
        result
    }
}

/// Resolution order: workspace-local install, PATH, npx.
pub fn resolve_biome_binary(workspace_root: &Path) -> Option<Vec<String>> {
    let local = workspace_root.join("node_modules/.bin/biome");
    if local.is_file() {
        return Some(vec![local.display().to_string()]);
    }
    if find_in_path("biome").is_some() {
        return Some(vec!["biome".to_string()]);
    }
    if find_in_path("npx").is_some() {
        return Some(vec!["npx".to_string(), "biome".to_string()]);
    }
    None
}

/// Replace the logical argv[0] with the resolved binary invocation.
pub fn with_binary(binary: &[String], command: Vec<String>) -> Vec<String> {
    binary
        .iter()
        .cloned()
        .chain(command.into_iter().skip(1))
        .collect()
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("").trim()
}
