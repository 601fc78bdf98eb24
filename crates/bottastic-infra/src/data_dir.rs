//! Data directory resolution.

use std::path::PathBuf;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "BOTTASTIC_DATA_DIR";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `BOTTASTIC_DATA_DIR` environment variable
/// 2. `~/.bottastic` in the user's home directory
pub fn resolve_data_dir() -> PathBuf {
    resolve_from(std::env::var_os(DATA_DIR_ENV).map(PathBuf::from))
}

fn resolve_from(env_override: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = env_override.filter(|dir| !dir.as_os_str().is_empty()) {
        return dir;
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".bottastic");
    }

    // Last resort: current directory
    PathBuf::from(".bottastic")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins() {
        let dir = resolve_from(Some(PathBuf::from("/tmp/bottastic-test")));
        assert_eq!(dir, PathBuf::from("/tmp/bottastic-test"));
    }

    #[test]
    fn empty_override_is_ignored() {
        let dir = resolve_from(Some(PathBuf::new()));
        assert!(dir.ends_with(".bottastic"));
    }

    #[test]
    fn default_is_dot_bottastic() {
        assert!(resolve_from(None).ends_with(".bottastic"));
    }
}
