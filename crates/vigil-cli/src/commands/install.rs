// `vigil install` / `vigil uninstall` - agent settings registration.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use crate::settings::{install_hook, resolve_settings_path, uninstall_hook};

pub fn run_install(cwd: &Path, explicit: Option<&Path>) -> Result<()> {
    let settings_path = resolve_settings_path(cwd, explicit);

    if install_hook(&settings_path)? {
        println!(
            "{} Registered the hook in {}",
            "✓".green(),
            settings_path.display()
        );
    } else {
        println!(
            "{} Hook already registered in {}",
            "·".dimmed(),
            settings_path.display()
        );
    }
    Ok(())
}

pub fn run_uninstall(cwd: &Path, explicit: Option<&Path>) -> Result<()> {
    let settings_path = resolve_settings_path(cwd, explicit);
    let removed = uninstall_hook(&settings_path)?;

    if removed > 0 {
        println!(
            "{} Removed {removed} hook entr{} from {}",
            "✓".green(),
            if removed == 1 { "y" } else { "ies" },
            settings_path.display()
        );
    } else {
        println!("{} No vigil hook entries found", "·".dimmed());
    }
    Ok(())
}
