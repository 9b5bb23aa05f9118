//! # Validator Manager
//!
//! Fans out all enabled validators in parallel for one file and aggregates
//! their results. Responses are cached by a hash of the path, normalized
//! content, enabled validator set, validator config paths, and the detected
//! tool version, so repeated validation of unchanged content is free.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use vigil_config::VigilConfig;
use vigil_core::types::{FileRecord, ValidationResponse, ValidationResult};
use vigil_core::{VigilError, VigilResult};

use crate::biome_validator::BiomeValidator;
use crate::typescript_validator::TypeScriptValidator;
use crate::validator::{ValidationContext, Validator};
use crate::version_detection::VersionDetector;

/// Validation cache bounds.
pub const VALIDATION_CACHE_CAPACITY: u64 = 256;
pub const VALIDATION_CACHE_TTL: Duration = Duration::from_secs(300);

/// Extra headroom on the outer per-task timeout so the validator's own
/// subprocess timeout fires first and produces the better error message.
const SCHEDULING_SLOP: Duration = Duration::from_millis(250);

pub struct ValidatorManager {
    validators: Vec<Arc<dyn Validator>>,
    cache: Cache<u64, ValidationResponse>,
    config: Arc<VigilConfig>,
    detector: Arc<VersionDetector>,
    workspace_root: PathBuf,
}

impl ValidatorManager {
    pub fn new(config: Arc<VigilConfig>, workspace_root: PathBuf) -> Self {
        let detector = Arc::new(VersionDetector::new(workspace_root.clone()));
        let validators: Vec<Arc<dyn Validator>> = vec![
            Arc::new(BiomeValidator::new(
                config.validators.biome.clone(),
                detector.clone(),
            )),
            Arc::new(TypeScriptValidator::new(
                config.validators.typescript.clone(),
            )),
        ];

        Self {
            validators,
            cache: Cache::builder()
                .max_capacity(VALIDATION_CACHE_CAPACITY)
                .time_to_live(VALIDATION_CACHE_TTL)
                .build(),
            config,
            detector,
            workspace_root,
        }
    }

    pub fn detector(&self) -> Arc<VersionDetector> {
        self.detector.clone()
    }

    pub fn workspace_root(&self) -> &PathBuf {
        &self.workspace_root
    }

    /// Approximate number of cached responses.
    pub fn cache_entries(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Drop every cached response. Called on any config change.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
    }

    /// Run all enabled validators against `file`. Set `bypass_cache` when
    /// re-validating freshly fixed content.
    pub async fn validate(
        &self,
        file: &FileRecord,
        cancel: &CancellationToken,
        bypass_cache: bool,
    ) -> VigilResult<ValidationResponse> {
        let enabled: Vec<Arc<dyn Validator>> = self
            .validators
            .iter()
            .filter(|v| v.enabled())
            .cloned()
            .collect();

        if enabled.is_empty() {
            return Ok(ValidationResponse::aggregate(Vec::new(), 0));
        }

        let key = self.cache_key(file, &enabled).await;
        if !bypass_cache {
            if let Some(mut hit) = self.cache.get(&key).await {
                debug!("validation cache hit for {}", file.path.display());
                hit.cached = true;
                return Ok(hit);
            }
        }

        let started = Instant::now();
        let ctx = ValidationContext {
            workspace_root: self.workspace_root.clone(),
            timeout: Duration::from_millis(self.config.timeout),
            cancel: cancel.clone(),
        };

        // Launch every validator as its own task and settle all of them:
        // one failure or timeout must not short-circuit the others.
        let mut handles = Vec::with_capacity(enabled.len());
        for validator in &enabled {
            let validator = validator.clone();
            let file = file.clone();
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move {
                let name = validator.name();
                match tokio::time::timeout(ctx.timeout + SCHEDULING_SLOP, validator.validate(&file, &ctx))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => ValidationResult::failed(
                        name,
                        format!("validator timed out after {}ms", ctx.timeout.as_millis()),
                        ctx.timeout.as_millis() as u64,
                    ),
                }
            }));
        }

        let settled = futures::future::join_all(handles).await;
        let mut results = Vec::with_capacity(settled.len());
        for (outcome, validator) in settled.into_iter().zip(&enabled) {
            match outcome {
                Ok(result) => results.push(result),
                Err(join_error) => results.push(ValidationResult::failed(
                    validator.name(),
                    format!("validator task failed: {join_error}"),
                    0,
                )),
            }
        }

        // Partial results obtained before cancellation are discarded.
        if cancel.is_cancelled() {
            return Err(VigilError::Cancelled);
        }

        let response =
            ValidationResponse::aggregate(results, started.elapsed().as_millis() as u64);
        self.cache.insert(key, response.clone()).await;
        Ok(response)
    }

    async fn cache_key(&self, file: &FileRecord, enabled: &[Arc<dyn Validator>]) -> u64 {
        let mut hasher = DefaultHasher::new();
        file.path.hash(&mut hasher);
        normalize_content(&file.content).hash(&mut hasher);
        for validator in enabled {
            validator.name().hash(&mut hasher);
        }
        self.config.cache_fingerprint().hash(&mut hasher);

        // The adapter choice depends on the detected version, so it is part
        // of the key; detection itself is memoized for 60 seconds.
        if self.config.validators.biome.enabled {
            let pin = self.config.validators.biome.version.clone();
            let pin = (pin.trim() != "auto" && !pin.trim().is_empty()).then_some(pin);
            let cancel = CancellationToken::new();
            let detected = self
                .detector
                .detect("biome", pin.as_deref(), &cancel)
                .await;
            detected.version.to_string().hash(&mut hasher);
        }

        hasher.finish()
    }
}

fn normalize_content(content: &str) -> String {
    content.replace("\r\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_config::VigilConfig;

    fn manager_with(config: VigilConfig, root: &std::path::Path) -> ValidatorManager {
        ValidatorManager::new(Arc::new(config), root.to_path_buf())
    }

    fn disabled_validators_config() -> VigilConfig {
        let mut config = VigilConfig::default();
        config.validators.biome.enabled = false;
        config.validators.typescript.enabled = false;
        config
    }

    #[tokio::test]
    async fn no_enabled_validators_is_a_clean_success() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with(disabled_validators_config(), dir.path());
        let file = FileRecord::from_content(dir.path().join("a.ts"), "const x = 1;");
        let cancel = CancellationToken::new();

        let response = manager.validate(&file, &cancel, false).await.unwrap();
        assert!(response.success);
        assert!(response.results.is_empty());
        assert!(!response.cached);
    }

    #[tokio::test]
    async fn second_run_is_a_cache_hit_with_identical_content() {
        // With both tools absent, validators degrade to no-op successes,
        // which still exercises the cache path deterministically.
        let dir = tempfile::tempdir().unwrap();
        let _env = crate::test_support::env_lock();
        let original_path = std::env::var_os("PATH");
        std::env::set_var("PATH", "");

        let mut config = VigilConfig::default();
        config.validators.biome.version = "2.x".to_string();
        let manager = manager_with(config, dir.path());
        let file = FileRecord::from_content(dir.path().join("a.ts"), "const x = 1;");
        let cancel = CancellationToken::new();

        let first = manager.validate(&file, &cancel, false).await.unwrap();
        let second = manager.validate(&file, &cancel, false).await.unwrap();

        if let Some(path) = original_path {
            std::env::set_var("PATH", path);
        }

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.success, second.success);
        assert_eq!(first.summary.total_issues, second.summary.total_issues);
        assert_eq!(first.results.len(), second.results.len());
    }

    #[tokio::test]
    async fn cancellation_discards_partial_results() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = VigilConfig::default();
        config.validators.biome.version = "2.x".to_string();
        let manager = manager_with(config, dir.path());
        let file = FileRecord::from_content(dir.path().join("a.ts"), "const x = 1;");

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = manager.validate(&file, &cancel, false).await;
        assert!(matches!(result, Err(VigilError::Cancelled)));
    }

    #[tokio::test]
    async fn cache_key_distinguishes_content() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with(disabled_validators_config(), dir.path());
        let a = FileRecord::from_content(dir.path().join("a.ts"), "const x = 1;");
        let b = FileRecord::from_content(dir.path().join("a.ts"), "const x = 2;");

        let enabled: Vec<Arc<dyn Validator>> = Vec::new();
        let key_a = manager.cache_key(&a, &enabled).await;
        let key_b = manager.cache_key(&b, &enabled).await;
        assert_ne!(key_a, key_b);

        // CRLF and LF content hash the same after normalization.
        let crlf = FileRecord::from_content(dir.path().join("a.ts"), "const x = 1;\r\nlet y;\r\n");
        let lf = FileRecord::from_content(dir.path().join("a.ts"), "const x = 1;\nlet y;\n");
        assert_eq!(
            manager.cache_key(&crlf, &enabled).await,
            manager.cache_key(&lf, &enabled).await
        );
    }
}
