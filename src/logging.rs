//! Log setup.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `talkcsv=debug`.
pub const LOG_ENV: &str = "TALKCSV_LOG";

/// Install a stderr subscriber filtered by `TALKCSV_LOG` (default `warn`).
///
/// Safe to call more than once; later calls are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
