// Report shaping for the agent boundary.
//
// The engine's report may quote raw tool output; before it reaches stdout
// every message is stripped of terminal escapes, cut to one line, made
// path-relative, deduplicated, and the list is capped.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use vigil_engine::HookReport;

/// Maximum messages forwarded to the agent; the rest collapse into a tail.
pub const MAX_MESSAGES: usize = 10;

/// Final presentation pass over a hook report.
pub fn shape_report(mut report: HookReport, cwd: &Path) -> HookReport {
    let cwd_prefix = format!("{}/", cwd.display());

    let mut shaped: Vec<String> = Vec::new();
    for message in &report.messages {
        let cleaned = first_line(&strip_ansi(message))
            .replace(&cwd_prefix, "")
            .trim()
            .to_string();
        if cleaned.is_empty() || shaped.contains(&cleaned) {
            continue;
        }
        shaped.push(cleaned);
    }

    if shaped.len() > MAX_MESSAGES {
        let overflow = shaped.len() - MAX_MESSAGES;
        shaped.truncate(MAX_MESSAGES);
        shaped.push(format!("+{overflow} more"));
    }

    report.messages = shaped;
    report
}

/// Remove CSI/OSC escape sequences and stray escapes.
pub fn strip_ansi(text: &str) -> String {
    static CSI: OnceLock<Regex> = OnceLock::new();
    static OSC: OnceLock<Regex> = OnceLock::new();
    static STRAY: OnceLock<Regex> = OnceLock::new();

    let csi = CSI.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("valid regex"));
    let osc = OSC.get_or_init(|| {
        Regex::new(r"\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)").expect("valid regex")
    });
    let stray = STRAY.get_or_init(|| Regex::new(r"\x1b.").expect("valid regex"));

    let text = csi.replace_all(text, "");
    let text = osc.replace_all(&text, "");
    stray.replace_all(&text, "").into_owned()
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn report_with(messages: Vec<String>) -> HookReport {
        HookReport {
            success: true,
            modified: false,
            issues_found: 0,
            issues_fixed: 0,
            messages,
            execution_time_ms: 1,
            reason: None,
        }
    }

    #[test]
    fn strips_color_codes() {
        let colored = "\x1b[31merror\x1b[0m: something";
        assert_eq!(strip_ansi(colored), "error: something");
    }

    #[test]
    fn strips_osc_sequences() {
        let linked = "\x1b]8;;http://example.com\x07link\x1b]8;;\x07 done";
        assert_eq!(strip_ansi(linked), "link done");
    }

    #[test]
    fn messages_are_single_line_relative_and_deduped() {
        let cwd = PathBuf::from("/work");
        let report = report_with(vec![
            "Found 1 issue(s) in /work/src/a.ts\nstack trace line".to_string(),
            "Found 1 issue(s) in /work/src/a.ts".to_string(),
            "".to_string(),
        ]);

        let shaped = shape_report(report, &cwd);
        assert_eq!(shaped.messages, vec!["Found 1 issue(s) in src/a.ts"]);
    }

    #[test]
    fn message_list_is_capped() {
        let cwd = PathBuf::from("/work");
        let report = report_with((0..15).map(|i| format!("message {i}")).collect());

        let shaped = shape_report(report, &cwd);
        assert_eq!(shaped.messages.len(), MAX_MESSAGES + 1);
        assert_eq!(shaped.messages.last().unwrap(), "+5 more");
    }
}
