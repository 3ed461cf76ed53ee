//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, OffloadConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/offload/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("offload/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("offload.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load config from a TOML file.
pub fn load_from_file(path: &Path) -> Result<OffloadConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Merge two configs, with `overlay` taking precedence field-by-field.
///
/// Unlike `hooteconf`'s nested-section merge, the config surface here is a
/// single flat struct plus one nested `tunables` block, so a straight
/// per-field overlay (falling back to `base` wherever `overlay` still holds
/// its own default) is sufficient.
pub fn merge_configs(base: OffloadConfig, overlay: OffloadConfig) -> OffloadConfig {
    let default = OffloadConfig::default();

    OffloadConfig {
        endpoint: if overlay.endpoint != default.endpoint {
            overlay.endpoint
        } else {
            base.endpoint
        },
        tunables: crate::tunables::TunablesConfig {
            server_timeout_secs: if overlay.tunables.server_timeout_secs
                != default.tunables.server_timeout_secs
            {
                overlay.tunables.server_timeout_secs
            } else {
                base.tunables.server_timeout_secs
            },
            heartbeat_interval_secs: if overlay.tunables.heartbeat_interval_secs
                != default.tunables.heartbeat_interval_secs
            {
                overlay.tunables.heartbeat_interval_secs
            } else {
                base.tunables.heartbeat_interval_secs
            },
            token_acquire_timeout_secs: if overlay.tunables.token_acquire_timeout_secs
                != default.tunables.token_acquire_timeout_secs
            {
                overlay.tunables.token_acquire_timeout_secs
            } else {
                base.tunables.token_acquire_timeout_secs
            },
            frame_await_timeout_secs: if overlay.tunables.frame_await_timeout_secs
                != default.tunables.frame_await_timeout_secs
            {
                overlay.tunables.frame_await_timeout_secs
            } else {
                base.tunables.frame_await_timeout_secs
            },
        },
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut OffloadConfig, sources: &mut ConfigSources) {
    if let Ok(v) = env::var("OFFLOAD_ENDPOINT") {
        config.endpoint = v;
        sources.env_overrides.push("OFFLOAD_ENDPOINT".to_string());
    }
    if let Ok(v) = env::var("OFFLOAD_SERVER_TIMEOUT_SECS") {
        if let Ok(secs) = v.parse() {
            config.tunables.server_timeout_secs = secs;
            sources
                .env_overrides
                .push("OFFLOAD_SERVER_TIMEOUT_SECS".to_string());
        }
    }
    if let Ok(v) = env::var("OFFLOAD_HEARTBEAT_INTERVAL_SECS") {
        if let Ok(secs) = v.parse() {
            config.tunables.heartbeat_interval_secs = secs;
            sources
                .env_overrides
                .push("OFFLOAD_HEARTBEAT_INTERVAL_SECS".to_string());
        }
    }
    if let Ok(v) = env::var("OFFLOAD_TOKEN_ACQUIRE_TIMEOUT_SECS") {
        if let Ok(secs) = v.parse() {
            config.tunables.token_acquire_timeout_secs = secs;
            sources
                .env_overrides
                .push("OFFLOAD_TOKEN_ACQUIRE_TIMEOUT_SECS".to_string());
        }
    }
    if let Ok(v) = env::var("OFFLOAD_FRAME_AWAIT_TIMEOUT_SECS") {
        if let Ok(secs) = v.parse() {
            config.tunables.frame_await_timeout_secs = secs;
            sources
                .env_overrides
                .push("OFFLOAD_FRAME_AWAIT_TIMEOUT_SECS".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files();
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
endpoint = "tcp://localhost:5580"
"#;
        let config: OffloadConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.endpoint, "tcp://localhost:5580");
        assert_eq!(config.tunables.server_timeout_secs, 10);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
endpoint = "tcp://gpu-host:5580"

[tunables]
server_timeout_secs = 20
heartbeat_interval_secs = 2
token_acquire_timeout_secs = 3
frame_await_timeout_secs = 3
"#;
        let config: OffloadConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.endpoint, "tcp://gpu-host:5580");
        assert_eq!(config.tunables.server_timeout_secs, 20);
        assert_eq!(config.tunables.heartbeat_interval_secs, 2);
        assert_eq!(config.tunables.token_acquire_timeout_secs, 3);
        assert_eq!(config.tunables.frame_await_timeout_secs, 3);
    }

    #[test]
    fn test_merge_overlay_wins() {
        let base = OffloadConfig {
            endpoint: "tcp://base:5580".to_string(),
            ..Default::default()
        };
        let overlay = OffloadConfig {
            endpoint: "tcp://override:5580".to_string(),
            ..Default::default()
        };
        let merged = merge_configs(base, overlay);
        assert_eq!(merged.endpoint, "tcp://override:5580");
    }
}
