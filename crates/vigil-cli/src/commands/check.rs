// `vigil check <file>` - one-shot validation without fixing.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use vigil_config::VigilConfig;
use vigil_engine::{HookEvent, PostWriteHook, ToolInput};

use crate::output::shape_report;

pub async fn run(config_path: Option<&Path>, cwd: &Path, file: &Path) -> Result<()> {
    let (mut config, _source) = VigilConfig::load(config_path, cwd)?;
    // Check is read-only; the fix stage stays off regardless of config.
    config.auto_fix.enabled = false;

    let hook = PostWriteHook::new(Arc::new(config), cwd.to_path_buf())?;
    let event = HookEvent {
        hook_event_name: Some("Check".to_string()),
        tool_name: Some("Write".to_string()),
        tool_input: ToolInput {
            file_path: Some(file.display().to_string()),
            content: None,
            edits: Vec::new(),
        },
    };

    let report = hook.run(event, &CancellationToken::new()).await;
    let shaped = shape_report(report, cwd);
    println!("{}", serde_json::to_string_pretty(&shaped)?);
    Ok(())
}
