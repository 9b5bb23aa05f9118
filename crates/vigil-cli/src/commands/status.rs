// `vigil status` - configuration and tool availability overview.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use vigil_config::{PatternSet, VigilConfig};
use vigil_engine::{resolve_biome_binary, resolve_tsc_binary, VersionDetector};

pub async fn run(config_path: Option<&Path>, cwd: &Path) -> Result<()> {
    let (config, source) = VigilConfig::load(config_path, cwd)?;
    let patterns = PatternSet::compile(&config.include, &config.exclude)?;

    println!("{}", "Vigil status".bold());
    match &source {
        Some(path) => println!("  config: {}", path.display()),
        None => println!("  config: defaults (no vigil.yaml found)"),
    }
    println!(
        "  gate: {}",
        if config.enabled {
            "enabled".green().to_string()
        } else {
            "disabled".red().to_string()
        }
    );
    println!(
        "  auto-fix: {} (max {} attempt(s))",
        on_off(config.auto_fix.enabled),
        config.auto_fix.max_attempts
    );
    println!("  timeout: {}ms per validator", config.timeout);
    println!(
        "  patterns: {} include, {} exclude",
        patterns.include_count(),
        patterns.exclude_count()
    );

    println!("{}", "Validators".bold());
    let biome_binary = resolve_biome_binary(cwd);
    println!(
        "  biome: {} ({})",
        on_off(config.validators.biome.enabled),
        match &biome_binary {
            Some(argv) => format!("via {}", argv.join(" ")),
            None => "not found".red().to_string(),
        }
    );
    if config.validators.biome.enabled && biome_binary.is_some() {
        let detector = VersionDetector::new(cwd.to_path_buf());
        let pin = config.validators.biome.version.trim();
        let pin = (pin != "auto" && !pin.is_empty()).then_some(pin);
        let detected = detector
            .detect("biome", pin, &CancellationToken::new())
            .await;
        println!(
            "    version: {} (source: {})",
            detected.version, detected.source
        );
    }
    println!(
        "  typescript: {} ({})",
        on_off(config.validators.typescript.enabled),
        match resolve_tsc_binary(cwd) {
            Some(argv) => format!("via {}", argv.join(" ")),
            None => "not found".red().to_string(),
        }
    );

    Ok(())
}

fn on_off(enabled: bool) -> String {
    if enabled {
        "on".green().to_string()
    } else {
        "off".dimmed().to_string()
    }
}
