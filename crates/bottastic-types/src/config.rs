//! Runtime configuration types for Bottastic.
//!
//! `RuntimeConfig` represents the top-level `config.toml` that controls the
//! blocking-call worker pool and the echo logging flags.

use serde::{Deserialize, Serialize};

/// Upper bound on the default worker count.
const MAX_DEFAULT_WORKERS: usize = 32;

/// Top-level configuration for a Bottastic process.
///
/// Loaded from `~/.bottastic/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Threads in the shared blocking-call worker pool.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Log every message the bot sends.
    #[serde(default)]
    pub echo_sent: bool,

    /// Log every text message routed to the bot.
    #[serde(default)]
    pub echo_received: bool,
}

/// `min(32, cpus + 4)`: transport calls are short and I/O bound.
pub fn default_worker_threads() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpus + 4).min(MAX_DEFAULT_WORKERS)
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            echo_sent: false,
            echo_received: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_config_default_values() {
        let config = RuntimeConfig::default();
        assert!(config.worker_threads >= 5);
        assert!(config.worker_threads <= MAX_DEFAULT_WORKERS);
        assert!(!config.echo_sent);
        assert!(!config.echo_received);
    }

    #[test]
    fn test_runtime_config_deserialize_with_defaults() {
        let config: RuntimeConfig = toml::from_str("").unwrap();
        assert_eq!(config.worker_threads, default_worker_threads());
        assert!(!config.echo_sent);
    }

    #[test]
    fn test_runtime_config_deserialize_with_values() {
        let toml_str = r#"
worker_threads = 2
echo_sent = true
echo_received = true
"#;
        let config: RuntimeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.worker_threads, 2);
        assert!(config.echo_sent);
        assert!(config.echo_received);
    }
}
