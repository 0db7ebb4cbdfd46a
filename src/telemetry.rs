use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber. The `SIGNOFF_LOG` environment
/// variable overrides the configured level.
pub fn init_telemetry(log_level: &str, json_logs: bool) -> Result<()> {
    let filter = EnvFilter::try_from_env("SIGNOFF_LOG")
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    if json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to initialize telemetry: {}", e))?;
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to initialize telemetry: {}", e))?;
    }
    tracing::debug!(log_level, json_logs, "telemetry initialized");
    Ok(())
}
