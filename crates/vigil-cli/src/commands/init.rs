// `vigil init` - write the default configuration file.

use std::path::Path;

use anyhow::{bail, Result};
use colored::Colorize;

use vigil_config::DEFAULT_CONFIG_TEMPLATE;

pub fn run(cwd: &Path, force: bool) -> Result<()> {
    let target = cwd.join("vigil.yaml");

    if target.exists() && !force {
        bail!(
            "{} already exists; re-run with --force to overwrite",
            target.display()
        );
    }

    std::fs::write(&target, DEFAULT_CONFIG_TEMPLATE)?;
    println!("{} Wrote {}", "✓".green(), target.display());
    println!("Next: run {} to register the hook", "vigil install".bold());
    Ok(())
}
