//! # Biome Command Adapters
//!
//! Major versions of Biome disagree about fix flags and color handling.
//! Each major gets an adapter that knows how to build its argv; the factory
//! picks one from the detected version. Registering a future major is one
//! more variant here, with no caller changes.
//!
//! Commands are built with the logical tool name as argv[0]; callers swap in
//! the resolved binary (direct path, PATH lookup, or an `npx` prefix).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::version_detection::ToolVersion;

/// Options for a diagnostics (check) invocation.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Apply safe fixes while checking
    pub fix: bool,
    /// Allow unsafe fixes (never set by the pipeline)
    pub unsafe_fixes: bool,
    /// Request the JSON reporter
    pub reporter_json: bool,
    /// Tool config override
    pub config_path: Option<PathBuf>,
}

/// Options for a fix invocation.
#[derive(Debug, Clone, Default)]
pub struct FixOptions {
    pub unsafe_fixes: bool,
    pub config_path: Option<PathBuf>,
}

/// Version-specific command construction for Biome.
pub trait BiomeAdapter: Send + Sync {
    fn major(&self) -> u32;

    /// Argv for a diagnostics run against one file.
    fn check_command(&self, file: &Path, options: &CheckOptions) -> Vec<String>;

    /// Argv for a fix run against one file.
    fn fix_command(&self, file: &Path, options: &FixOptions) -> Vec<String>;

    /// The fix flag as a single embeddable string, for callers that splice
    /// it into their own command lines.
    fn fix_flag(&self, unsafe_fixes: bool) -> &'static str;
}

/// Biome 1.x: `--apply` / `--apply-unsafe`.
pub struct BiomeV1Adapter;

impl BiomeAdapter for BiomeV1Adapter {
    fn major(&self) -> u32 {
        1
    }

    fn check_command(&self, file: &Path, options: &CheckOptions) -> Vec<String> {
        let mut argv = vec!["biome".to_string(), "check".to_string()];
        if options.reporter_json {
            argv.push("--reporter=json".to_string());
        }
        if options.fix {
            argv.push(self.fix_flag(options.unsafe_fixes).to_string());
        }
        push_config(&mut argv, options.config_path.as_deref());
        argv.push(file.display().to_string());
        argv
    }

    fn fix_command(&self, file: &Path, options: &FixOptions) -> Vec<String> {
        let mut argv = vec![
            "biome".to_string(),
            "check".to_string(),
            self.fix_flag(options.unsafe_fixes).to_string(),
        ];
        push_config(&mut argv, options.config_path.as_deref());
        argv.push(file.display().to_string());
        argv
    }

    fn fix_flag(&self, unsafe_fixes: bool) -> &'static str {
        if unsafe_fixes {
            "--apply-unsafe"
        } else {
            "--apply"
        }
    }
}

/// Biome 2.x: `--write`, with `--unsafe` as a separate flag. The JSON
/// reporter emits no colors; other reporters need `--no-colors`.
pub struct BiomeV2Adapter;

impl BiomeAdapter for BiomeV2Adapter {
    fn major(&self) -> u32 {
        2
    }

    fn check_command(&self, file: &Path, options: &CheckOptions) -> Vec<String> {
        let mut argv = vec!["biome".to_string(), "check".to_string()];
        if options.reporter_json {
            argv.push("--reporter=json".to_string());
        } else {
            argv.push("--no-colors".to_string());
        }
        if options.fix {
            argv.push("--write".to_string());
            if options.unsafe_fixes {
                argv.push("--unsafe".to_string());
            }
        }
        push_config(&mut argv, options.config_path.as_deref());
        argv.push(file.display().to_string());
        argv
    }

    fn fix_command(&self, file: &Path, options: &FixOptions) -> Vec<String> {
        let mut argv = vec![
            "biome".to_string(),
            "check".to_string(),
            "--write".to_string(),
        ];
        if options.unsafe_fixes {
            argv.push("--unsafe".to_string());
        }
        push_config(&mut argv, options.config_path.as_deref());
        argv.push(file.display().to_string());
        argv
    }

    fn fix_flag(&self, unsafe_fixes: bool) -> &'static str {
        if unsafe_fixes {
            "--write --unsafe"
        } else {
            "--write"
        }
    }
}

/// Maps a detected version onto an adapter. Unknown majors get the 2.x
/// adapter.
pub struct AdapterFactory;

impl AdapterFactory {
    pub fn for_version(version: ToolVersion) -> Arc<dyn BiomeAdapter> {
        match version.major {
            1 => Arc::new(BiomeV1Adapter),
            _ => Arc::new(BiomeV2Adapter),
        }
    }
}

fn push_config(argv: &mut Vec<String>, config_path: Option<&Path>) {
    if let Some(path) = config_path {
        argv.push("--config-path".to_string());
        argv.push(path.display().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_uses_apply_flags() {
        let adapter = BiomeV1Adapter;
        let argv = adapter.fix_command(Path::new("/w/a.ts"), &FixOptions::default());
        assert_eq!(argv, vec!["biome", "check", "--apply", "/w/a.ts"]);
        assert_eq!(adapter.fix_flag(true), "--apply-unsafe");
    }

    #[test]
    fn v2_uses_write_flags() {
        let adapter = BiomeV2Adapter;
        let argv = adapter.fix_command(Path::new("/w/a.ts"), &FixOptions::default());
        assert_eq!(argv, vec!["biome", "check", "--write", "/w/a.ts"]);

        let argv = adapter.fix_command(
            Path::new("/w/a.ts"),
            &FixOptions {
                unsafe_fixes: true,
                config_path: None,
            },
        );
        assert_eq!(argv, vec!["biome", "check", "--write", "--unsafe", "/w/a.ts"]);
    }

    #[test]
    fn check_commands_request_json_reporter() {
        let options = CheckOptions {
            reporter_json: true,
            ..Default::default()
        };
        let v1 = BiomeV1Adapter.check_command(Path::new("a.ts"), &options);
        let v2 = BiomeV2Adapter.check_command(Path::new("a.ts"), &options);
        assert!(v1.contains(&"--reporter=json".to_string()));
        assert!(v2.contains(&"--reporter=json".to_string()));
        assert!(!v2.contains(&"--no-colors".to_string()));
    }

    #[test]
    fn v2_suppresses_colors_without_json_reporter() {
        let argv = BiomeV2Adapter.check_command(Path::new("a.ts"), &CheckOptions::default());
        assert!(argv.contains(&"--no-colors".to_string()));
    }

    #[test]
    fn config_path_is_forwarded() {
        let options = FixOptions {
            unsafe_fixes: false,
            config_path: Some(PathBuf::from("./biome.json")),
        };
        let argv = BiomeV2Adapter.fix_command(Path::new("a.ts"), &options);
        let pos = argv.iter().position(|a| a == "--config-path").unwrap();
        assert_eq!(argv[pos + 1], "./biome.json");
    }

    #[test]
    fn factory_maps_majors() {
        assert_eq!(AdapterFactory::for_version(ToolVersion::new(1, 9, 4)).major(), 1);
        assert_eq!(AdapterFactory::for_version(ToolVersion::new(2, 0, 0)).major(), 2);
        // Unknown majors fall forward to the 2.x adapter.
        assert_eq!(AdapterFactory::for_version(ToolVersion::new(3, 1, 0)).major(), 2);
        assert_eq!(AdapterFactory::for_version(ToolVersion::new(0, 0, 0)).major(), 2);
    }
}
