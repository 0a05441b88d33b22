//! Layered settings for ndnrtc-stream.
//!
//! These are the orchestrator's own settings: which executables to run,
//! which camera to capture, how the stats overlay is drawn and tailed. They
//! are distinct from the streaming client's config file, which is generated
//! per run.
//!
//! # Usage
//!
//! ```rust,no_run
//! use streamconf::StreamToolConfig;
//!
//! let config = StreamToolConfig::load().expect("Failed to load settings");
//! println!("client: {}", config.tools.ndnrtc_client);
//! println!("instance: {}", config.client.instance_name);
//! ```
//!
//! # Settings File Locations
//!
//! Files are loaded in order (later wins, table by table):
//! 1. `/etc/ndnrtc-stream/config.toml` (system)
//! 2. `~/.config/ndnrtc-stream/config.toml` (user)
//! 3. `./ndnrtc-stream.toml` or the `--settings` path (local override)
//! 4. Environment variables (`NDNRTC_STREAM_*`)
//!
//! # Example
//!
//! ```toml
//! [tools]
//! ndnrtc_client = "/opt/ndnrtc/bin/ndnrtc-client"
//!
//! [capture]
//! device = "/dev/video2"
//!
//! [preview]
//! font_file = "~/fonts/DejaVuSansMono.ttf"
//!
//! [client]
//! run_time = 3600
//! ```

pub mod client;
pub mod loader;
pub mod tools;

pub use client::{ClientConfig, LogConfig, OverlayConfig, TailConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};
pub use tools::{CaptureConfig, PreviewConfig, ToolsConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Settings loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse settings file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to render settings: {0}")]
    Render(String),
}

/// Complete orchestrator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StreamToolConfig {
    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub preview: PreviewConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub tail: TailConfig,

    #[serde(default)]
    pub overlay: OverlayConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl StreamToolConfig {
    /// Load settings from all standard sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load settings, letting `settings_path` replace the local override.
    pub fn load_from(settings_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(settings_path)?;
        Ok(config)
    }

    /// Load settings and report which files and variables contributed.
    pub fn load_with_sources_from(
        settings_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let files = loader::discover_config_files_with_override(settings_path);
        let (mut config, mut sources) = Self::load_files(&files)?;

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Load and merge an explicit list of files, without env overrides.
    pub fn load_files(files: &[PathBuf]) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in files {
            let table = loader::load_table(path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path.clone());
        }

        let origin = files
            .last()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("<defaults>"));
        let config = loader::from_table(merged, &origin)?;

        Ok((config, sources))
    }

    /// Serialize settings to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let body = toml::to_string_pretty(self).map_err(|e| ConfigError::Render(e.to_string()))?;
        Ok(format!("# ndnrtc-stream settings\n\n{body}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = StreamToolConfig::default();
        assert_eq!(config.client.instance_name, "rtc-stream");
        assert_eq!(config.overlay.file_name, "overlay.txt");
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_to_toml_round_trips() {
        let config = StreamToolConfig::default();
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[tools]"));
        assert!(rendered.contains("[client]"));

        let reparsed: StreamToolConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_load_files_later_wins() {
        let dir = TempDir::new().unwrap();
        let system = dir.path().join("system.toml");
        let local = dir.path().join("local.toml");
        fs::write(&system, "[client]\nrun_time = 100\nstream_name = \"desk\"\n").unwrap();
        fs::write(&local, "[client]\nrun_time = 200\n").unwrap();

        let (config, sources) =
            StreamToolConfig::load_files(&[system.clone(), local.clone()]).unwrap();

        assert_eq!(config.client.run_time, 200);
        assert_eq!(config.client.stream_name, "desk");
        assert_eq!(sources.files, vec![system, local]);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = StreamToolConfig::load_files(&[missing]).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }
}
