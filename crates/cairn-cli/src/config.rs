//! Configuration file discovery.

use anyhow::{Context, Result};
use cairn_core::EngineConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "cairn.yaml";

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "CAIRN_CONFIG";

/// Resolve which file to load: explicit flag, then `CAIRN_CONFIG`, then
/// `./cairn.yaml` if present.
pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    local.exists().then_some(local)
}

/// Load the engine configuration, falling back to defaults when no file
/// is found.
pub fn load(explicit: Option<&Path>) -> Result<EngineConfig> {
    match resolve_path(explicit) {
        Some(path) => {
            debug!(path = %path.display(), "Loading configuration");
            EngineConfig::from_file(&path)
                .with_context(|| format!("failed to load {}", path.display()))
        }
        None => {
            debug!("No configuration file, using defaults");
            Ok(EngineConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_explicit_path_wins() {
        let path = Path::new("/etc/cairn/engine.yaml");
        assert_eq!(resolve_path(Some(path)), Some(path.to_path_buf()));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("cairn-cli-{}.yaml", std::process::id()));
        std::fs::write(&path, "loader:\n  max_concurrent_loads: 2\n").unwrap();

        let config = load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.loader.max_concurrent_loads, 2);
        assert_eq!(config.cache, EngineConfig::default().cache);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = load(Some(Path::new("/nonexistent/cairn.yaml")));
        assert!(result.is_err());
    }
}
