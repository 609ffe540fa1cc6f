//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Output format of the global subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TelemetryFormat {
    #[default]
    Text,
    Json,
}

/// Install the global fmt subscriber. Filter comes from `RUST_LOG`
/// (default `info`). Fails instead of panicking when a subscriber is
/// already installed.
pub fn init_tracing(format: TelemetryFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    match format {
        TelemetryFormat::Text => builder.try_init(),
        TelemetryFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("tracing subscriber already installed: {e}"))
}
