//! Minimal configuration loading for the offload client.
//!
//! This crate provides configuration loading with minimal dependencies,
//! designed to be imported by `offload-proto` without pulling in the rest
//! of its dependency tree.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/offload/config.toml` (system)
//! 2. `~/.config/offload/config.toml` (user)
//! 3. `./offload.toml` (local override)
//! 4. Environment variables (`OFFLOAD_*`)
//!
//! # Example Config
//!
//! ```toml
//! endpoint = "tcp://compute-host:5580"
//!
//! [tunables]
//! server_timeout_secs = 10
//! heartbeat_interval_secs = 1
//! token_acquire_timeout_secs = 1
//! frame_await_timeout_secs = 1
//! ```

pub mod loader;
pub mod tunables;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use tunables::TunablesConfig;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffloadConfig {
    /// Server endpoint, e.g. `tcp://host:port` or `ipc:///path`.
    #[serde(default = "OffloadConfig::default_endpoint")]
    pub endpoint: String,

    /// Timing knobs for the connection/producer state machines.
    #[serde(default)]
    pub tunables: TunablesConfig,
}

impl OffloadConfig {
    fn default_endpoint() -> String {
        "tcp://localhost:5580".to_string()
    }

    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/offload/config.toml`
    /// 3. `~/.config/offload/config.toml`
    /// 4. `./offload.toml`
    /// 5. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    ///
    /// If `config_path` is provided, it takes precedence over the local
    /// `./offload.toml` override. System and user configs still load first.
    pub fn load_from(config_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and return information about sources.
    pub fn load_with_sources() -> Result<(Self, ConfigSources), ConfigError> {
        Self::load_with_sources_from(None)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&std::path::Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = OffloadConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            let file_config = loader::load_from_file(&path)?;
            config = loader::merge_configs(config, file_config);
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# Offload client configuration\n\n");
        output.push_str(&format!("endpoint = \"{}\"\n", self.endpoint));

        output.push_str("\n[tunables]\n");
        output.push_str(&format!(
            "server_timeout_secs = {}\n",
            self.tunables.server_timeout_secs
        ));
        output.push_str(&format!(
            "heartbeat_interval_secs = {}\n",
            self.tunables.heartbeat_interval_secs
        ));
        output.push_str(&format!(
            "token_acquire_timeout_secs = {}\n",
            self.tunables.token_acquire_timeout_secs
        ));
        output.push_str(&format!(
            "frame_await_timeout_secs = {}\n",
            self.tunables.frame_await_timeout_secs
        ));

        output
    }
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            tunables: TunablesConfig::default(),
        }
    }
}
