// Agent settings editing.
//
// `vigil install` registers the hook under PostToolUse in the agent's
// settings JSON. Unknown fields are preserved verbatim, the edit is
// idempotent, and writes go through a temp file plus rename.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};

pub const DEFAULT_SETTINGS_PATH: &str = ".claude/settings.json";

/// Matcher for the agent tools the gate processes.
pub const HOOK_MATCHER: &str = "Write|Edit|MultiEdit";

/// Command registered in the settings file.
pub const HOOK_COMMAND: &str = "vigil hook";

pub fn resolve_settings_path(cwd: &Path, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => cwd.join(DEFAULT_SETTINGS_PATH),
    }
}

/// Add the hook entry unless an equivalent one exists. Returns true when
/// the file was changed.
pub fn install_hook(settings_path: &Path) -> Result<bool> {
    let mut settings = read_settings(settings_path)?;

    let post_tool_use = settings
        .entry("hooks")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .context("`hooks` is not an object")?
        .entry("PostToolUse")
        .or_insert_with(|| json!([]));
    let entries = post_tool_use
        .as_array_mut()
        .context("`hooks.PostToolUse` is not an array")?;

    if entries.iter().any(entry_is_vigil) {
        return Ok(false);
    }

    entries.push(json!({
        "matcher": HOOK_MATCHER,
        "hooks": [{
            "type": "command",
            "command": HOOK_COMMAND,
            "timeout": 30,
        }],
    }));

    write_settings(settings_path, &settings)?;
    Ok(true)
}

/// Remove every entry install added. Returns how many were removed.
pub fn uninstall_hook(settings_path: &Path) -> Result<usize> {
    let mut settings = read_settings(settings_path)?;

    let Some(entries) = settings
        .get_mut("hooks")
        .and_then(|h| h.get_mut("PostToolUse"))
        .and_then(|p| p.as_array_mut())
    else {
        return Ok(0);
    };

    let before = entries.len();
    entries.retain(|entry| !entry_is_vigil(entry));
    let removed = before - entries.len();

    if removed > 0 {
        write_settings(settings_path, &settings)?;
    }
    Ok(removed)
}

fn entry_is_vigil(entry: &Value) -> bool {
    entry
        .get("hooks")
        .and_then(|h| h.as_array())
        .map(|hooks| {
            hooks.iter().any(|hook| {
                hook.get("command")
                    .and_then(|c| c.as_str())
                    .map(|c| c.starts_with("vigil"))
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false)
}

fn read_settings(path: &Path) -> Result<Map<String, Value>> {
    if !path.exists() {
        return Ok(Map::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("{} does not contain a JSON object", path.display()),
    }
}

fn write_settings(path: &Path, settings: &Map<String, Value>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let pretty = serde_json::to_string_pretty(&Value::Object(settings.clone()))?;
    let temp = path.with_extension("json.tmp");
    std::fs::write(&temp, format!("{pretty}\n"))
        .with_context(|| format!("failed to write {}", temp.display()))?;
    std::fs::rename(&temp, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}
