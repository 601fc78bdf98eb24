//! Runtime configuration loader for Bottastic.
//!
//! Reads `config.toml` from the data directory (`~/.bottastic/` in
//! production) and deserializes it into [`RuntimeConfig`]. Falls back to
//! defaults when the file is missing or malformed.

use std::path::Path;

use bottastic_types::config::RuntimeConfig;

/// Smallest worker pool the runtime will build.
const MIN_WORKER_THREADS: usize = 1;

/// Load runtime configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`RuntimeConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_runtime_config(data_dir: &Path) -> RuntimeConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return RuntimeConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return RuntimeConfig::default();
        }
    };

    match toml::from_str::<RuntimeConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            RuntimeConfig::default()
        }
    }
}

/// Resolve the worker pool size.
///
/// A command-line override wins over `config.toml`. At least one worker is
/// always used.
pub fn resolve_worker_threads(config: &RuntimeConfig, cli_override: Option<usize>) -> usize {
    cli_override
        .unwrap_or(config.worker_threads)
        .max(MIN_WORKER_THREADS)
}
