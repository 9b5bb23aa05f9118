//! # Tool Version Detection
//!
//! Resolves the installed Biome major so the right adapter can be chosen.
//! Detection order: config pin, package manifest, CLI probe, hard default.
//! Results are memoized for 60 seconds.

use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use vigil_core::process::run_command;

/// Timeout applied to each CLI probe candidate.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a detection result stays memoized.
pub const VERSION_CACHE_TTL: Duration = Duration::from_secs(60);

/// Major used when nothing else resolves.
pub const DEFAULT_VERSION: ToolVersion = ToolVersion {
    major: 2,
    minor: 0,
    patch: 0,
};

/// A semantic version triple. Malformed inputs parse to 0.0.0 rather than
/// failing; partial inputs fill missing fields with zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ToolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ToolVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Tolerant parse: strips range prefixes (`^ ~ >= <= > < =` and a
    /// leading `v`), accepts partial versions ("1" → 1.0.0), and maps
    /// garbage to 0.0.0.
    pub fn parse(input: &str) -> Self {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN
            .get_or_init(|| Regex::new(r"(\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("valid regex"));

        let trimmed = input
            .trim()
            .trim_start_matches(['^', '~', '>', '<', '=', 'v'])
            .trim();

        let Some(captures) = pattern.captures(trimmed) else {
            return Self::new(0, 0, 0);
        };

        let part = |index: usize| {
            captures
                .get(index)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(0)
        };
        Self::new(part(1), part(2), part(3))
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Where a detected version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionSource {
    Manifest,
    Cli,
    Config,
    Default,
}

impl fmt::Display for VersionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Manifest => "manifest",
            Self::Cli => "cli",
            Self::Config => "config",
            Self::Default => "default",
        };
        f.write_str(label)
    }
}

/// A detection outcome with provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedVersion {
    pub version: ToolVersion,
    pub source: VersionSource,
    pub captured_at: DateTime<Utc>,
}

impl DetectedVersion {
    fn now(version: ToolVersion, source: VersionSource) -> Self {
        Self {
            version,
            source,
            captured_at: Utc::now(),
        }
    }
}

/// Detects external tool versions with a 60-second memo.
pub struct VersionDetector {
    workspace_root: PathBuf,
    cache: Cache<String, DetectedVersion>,
    probe_timeout: Duration,
}

impl VersionDetector {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self {
            workspace_root,
            cache: Cache::builder()
                .max_capacity(16)
                .time_to_live(VERSION_CACHE_TTL)
                .build(),
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    /// Resolve `tool` to a version triple. `pin` is the config override
    /// ("1.x" / "2.x"); "auto", empty, or `None` means detect.
    pub async fn detect(
        &self,
        tool: &str,
        pin: Option<&str>,
        cancel: &CancellationToken,
    ) -> DetectedVersion {
        if let Some(pinned) = pin_to_version(pin) {
            return DetectedVersion::now(pinned, VersionSource::Config);
        }

        if let Some(hit) = self.cache.get(tool).await {
            return hit;
        }

        let detected = self.detect_uncached(tool, cancel).await;
        self.cache.insert(tool.to_string(), detected.clone()).await;
        detected
    }

    /// Drop all memoized detections.
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    async fn detect_uncached(&self, tool: &str, cancel: &CancellationToken) -> DetectedVersion {
        if let Some(version) = self.manifest_version(tool).await {
            debug!("detected {tool} {version} from package manifest");
            return DetectedVersion::now(version, VersionSource::Manifest);
        }

        if let Some(version) = self.probe_version(tool, cancel).await {
            debug!("detected {tool} {version} from CLI probe");
            return DetectedVersion::now(version, VersionSource::Cli);
        }

        debug!("no {tool} version detected, defaulting to {DEFAULT_VERSION}");
        DetectedVersion::now(DEFAULT_VERSION, VersionSource::Default)
    }

    /// Look the tool up under dependencies / devDependencies of the
    /// workspace `package.json`.
    async fn manifest_version(&self, tool: &str) -> Option<ToolVersion> {
        let manifest_path = self.workspace_root.join("package.json");
        let raw = tokio::fs::read_to_string(&manifest_path).await.ok()?;
        let manifest: serde_json::Value = serde_json::from_str(&raw).ok()?;

        let keys = [format!("@biomejs/{tool}"), tool.to_string()];
        for section in ["dependencies", "devDependencies"] {
            let Some(deps) = manifest.get(section).and_then(|v| v.as_object()) else {
                continue;
            };
            for key in &keys {
                if let Some(range) = deps.get(key).and_then(|v| v.as_str()) {
                    return Some(ToolVersion::parse(range));
                }
            }
        }
        None
    }

    /// Spawn up to three probe candidates; first parseable version wins.
    /// Failures are silent.
    async fn probe_version(&self, tool: &str, cancel: &CancellationToken) -> Option<ToolVersion> {
        let candidates: [Vec<String>; 3] = [
            vec![tool.to_string(), "--version".to_string()],
            vec!["npx".to_string(), tool.to_string(), "--version".to_string()],
            vec![
                "npx".to_string(),
                format!("@biomejs/{tool}"),
                "--version".to_string(),
            ],
        ];

        for argv in &candidates {
            let output = match run_command(
                argv,
                Some(&self.workspace_root),
                self.probe_timeout,
                cancel,
            )
            .await
            {
                Ok(output) if output.succeeded() => output,
                _ => continue,
            };

            if let Some(version) = extract_version(&output.stdout) {
                return Some(version);
            }
        }
        None
    }
}

fn pin_to_version(pin: Option<&str>) -> Option<ToolVersion> {
    match pin.map(str::trim) {
        Some("1.x") | Some("1") => Some(ToolVersion::new(1, 0, 0)),
        Some("2.x") | Some("2") => Some(ToolVersion::new(2, 0, 0)),
        _ => None,
    }
}

/// Pull the first version-looking token out of probe output.
fn extract_version(stdout: &str) -> Option<ToolVersion> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern =
        PATTERN.get_or_init(|| Regex::new(r"(\d+(?:\.\d+){0,2})").expect("valid regex"));

    let matched = pattern.find(stdout)?;
    Some(ToolVersion::parse(matched.as_str()))
}
