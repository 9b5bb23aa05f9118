//! Configuration schema and loading.
//!
//! `vigil.yaml` is discovered by walking upward from the working directory;
//! a missing file yields full defaults. Unknown keys are ignored and
//! out-of-range values are clamped, so a hand-edited config can never stop
//! the gate from running.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Config file names probed during upward discovery.
pub const CONFIG_FILE_NAMES: &[&str] = &["vigil.yaml", "vigil.yml"];

/// Floor applied to `timeout` after loading.
pub const MIN_TIMEOUT_MS: u64 = 100;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid pattern `{pattern}`: {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Master configuration consumed by the pipeline. All keys are optional in
/// the YAML; every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VigilConfig {
    /// Master switch; false skips validation entirely
    pub enabled: bool,
    /// Glob patterns a file must match to be admitted
    pub include: Vec<String>,
    /// Glob patterns that reject a file outright
    pub exclude: Vec<String>,
    pub validators: ValidatorsConfig,
    pub auto_fix: AutoFixConfig,
    /// Per-validator millisecond budget
    pub timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidatorsConfig {
    pub biome: BiomeConfig,
    pub typescript: TypeScriptConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BiomeConfig {
    pub enabled: bool,
    /// "auto", "1.x", or "2.x"
    pub version: String,
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeScriptConfig {
    pub enabled: bool,
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoFixConfig {
    pub enabled: bool,
    /// Ceiling on external fix invocations per file
    pub max_attempts: u32,
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include: vec![
                "**/*.ts".to_string(),
                "**/*.tsx".to_string(),
                "**/*.js".to_string(),
                "**/*.jsx".to_string(),
                "**/*.json".to_string(),
            ],
            exclude: vec![
                "**/node_modules/**".to_string(),
                "**/dist/**".to_string(),
                "**/build/**".to_string(),
                "**/*.min.js".to_string(),
            ],
            validators: ValidatorsConfig::default(),
            auto_fix: AutoFixConfig::default(),
            timeout: 5000,
        }
    }
}

impl Default for BiomeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            version: "auto".to_string(),
            config_path: None,
        }
    }
}

impl Default for TypeScriptConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            config_path: None,
        }
    }
}

impl Default for AutoFixConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
        }
    }
}

impl VigilConfig {
    /// Load from an explicit path, or discover `vigil.yaml` upward from
    /// `start_dir`. Returns the config plus the file it came from, if any.
    pub fn load(
        explicit: Option<&Path>,
        start_dir: &Path,
    ) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let source = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => discover_config_file(start_dir),
        };

        let mut config = match &source {
            Some(path) => {
                debug!("loading config from {}", path.display());
                let raw = std::fs::read_to_string(path)?;
                serde_yaml::from_str::<VigilConfig>(&raw)?
            }
            None => {
                debug!("no config file found, using defaults");
                VigilConfig::default()
            }
        };

        config.clamp();
        Ok((config, source))
    }

    /// Enforce value floors so a bad config degrades instead of breaking.
    pub fn clamp(&mut self) {
        if self.auto_fix.max_attempts == 0 {
            self.auto_fix.max_attempts = 1;
        }
        if self.timeout < MIN_TIMEOUT_MS {
            self.timeout = MIN_TIMEOUT_MS;
        }
    }

    /// Fingerprint of the options that participate in the validation cache
    /// key: enabled validator set and their config paths.
    pub fn cache_fingerprint(&self) -> String {
        format!(
            "biome={}:{}:{};ts={}:{}",
            self.validators.biome.enabled,
            self.validators.biome.version,
            self.validators
                .biome
                .config_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            self.validators.typescript.enabled,
            self.validators
                .typescript
                .config_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        )
    }
}

fn discover_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut dir = Some(start_dir);
    while let Some(current) = dir {
        for name in CONFIG_FILE_NAMES {
            let candidate = current.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        dir = current.parent();
    }
    None
}

/// Commented template written by `vigil init`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Vigil post-write quality gate configuration.
# Every key is optional; the values shown are the defaults.

enabled: true

# Files the gate processes. Exclude wins over include.
include:
  - "**/*.ts"
  - "**/*.tsx"
  - "**/*.js"
  - "**/*.jsx"
  - "**/*.json"
exclude:
  - "**/node_modules/**"
  - "**/dist/**"
  - "**/build/**"
  - "**/*.min.js"

validators:
  biome:
    enabled: true
    # "auto" detects the installed major; pin with "1.x" or "2.x"
    version: auto
    # configPath: ./biome.json
  typescript:
    enabled: true
    # configPath: ./tsconfig.json

autoFix:
  enabled: true
  maxAttempts: 3

# Per-validator budget in milliseconds
timeout: 5000
"#;
