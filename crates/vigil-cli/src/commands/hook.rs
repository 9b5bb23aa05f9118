// `vigil hook` - the agent-facing entry point.
//
// Reads one write event from stdin, runs the gate, and prints the shaped
// report to stdout. This command always exits 0: a broken event, a missing
// config, or any internal failure becomes a non-success report, never a
// nonzero exit that could interrupt the agent.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use vigil_config::VigilConfig;
use vigil_engine::{HookEvent, HookReport, PostWriteHook, HOOK_NAME};

use crate::output::shape_report;

pub async fn run(config_path: Option<&Path>, cwd: &Path) -> Result<()> {
    let report = match execute(config_path, cwd).await {
        Ok(report) => report,
        Err(err) => {
            warn!("[{HOOK_NAME}] {err}");
            HookReport {
                success: false,
                modified: false,
                issues_found: 0,
                issues_fixed: 0,
                messages: vec![err.to_string().lines().next().unwrap_or("").to_string()],
                execution_time_ms: 0,
                reason: None,
            }
        }
    };

    let shaped = shape_report(report, cwd);
    println!("{}", serde_json::to_string(&shaped)?);
    Ok(())
}

async fn execute(config_path: Option<&Path>, cwd: &Path) -> Result<HookReport> {
    let mut raw = String::new();
    tokio::io::stdin().read_to_string(&mut raw).await?;
    let event: HookEvent = serde_json::from_str(&raw)?;

    let (config, _source) = VigilConfig::load(config_path, cwd)?;
    let hook = PostWriteHook::new(Arc::new(config), cwd.to_path_buf())?;

    // Propagate Ctrl-C into the pipeline so child processes are killed
    // rather than orphaned.
    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_on_signal.cancel();
        }
    });

    Ok(hook.run(event, &cancel).await)
}
