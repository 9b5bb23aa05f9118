//! # Logging Initialization
//!
//! Tracing setup for the gate. Hook mode must keep stdout machine-readable,
//! so all log output goes to stderr.

use tracing_subscriber::filter::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` overrides the verbosity flags. Safe to call more than once;
/// later calls are no-ops.
pub fn init_logging(verbose: bool, quiet: bool) {
    let default_directive = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
