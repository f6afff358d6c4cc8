//! Logging setup for the CLI.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

/// Initialize a compact subscriber on stderr, keeping stdout free for
/// the JSON results. RUST_LOG wins when set; otherwise the given
/// default filter applies.
pub(crate) fn init(default_filter: &str) -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .with_context(|| format!("invalid log level/filter '{default_filter}'"))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("telemetry setup failed: {err}"))
}
