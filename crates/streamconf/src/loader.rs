//! Settings file discovery, loading, table merging, and environment overlay.

use crate::{ConfigError, StreamToolConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "NDNRTC_STREAM_";

/// Information about where settings came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Settings files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode settings
    pub env_overrides: Vec<String>,
}

/// Discover settings files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover settings files, optionally with a CLI override path.
///
/// A CLI path replaces the local `./ndnrtc-stream.toml` and is returned even
/// when missing, so that a typo surfaces as a read error instead of silently
/// falling back to defaults.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/ndnrtc-stream/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("ndnrtc-stream/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    let local = PathBuf::from("ndnrtc-stream.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a settings file into a raw TOML table.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_table(&contents, path)
}

fn parse_table(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Merge `overlay` into `base`. Nested tables merge key by key; any other
/// value in `overlay` replaces the one in `base`.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Turn a merged table into typed settings; missing keys take defaults.
pub fn from_table(table: toml::Table, origin: &Path) -> Result<StreamToolConfig, ConfigError> {
    let mut config: StreamToolConfig =
        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse {
                path: origin.to_path_buf(),
                message: e.to_string(),
            })?;

    if let Some(font) = config.preview.font_file.take() {
        config.preview.font_file = Some(expand_path(&font.to_string_lossy()));
    }

    Ok(config)
}

/// Apply `NDNRTC_STREAM_*` overrides from the process environment.
pub fn apply_env_overrides(config: &mut StreamToolConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, env::vars());
}

/// Apply overrides from an explicit set of variables.
pub fn apply_overrides_from<I>(config: &mut StreamToolConfig, sources: &mut ConfigSources, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let Some(name) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };

        let applied = match name {
            "FFMPEG" => {
                config.tools.ffmpeg = value;
                true
            }
            "FFPLAY" => {
                config.tools.ffplay = value;
                true
            }
            "CLIENT" => {
                config.tools.ndnrtc_client = value;
                true
            }
            "NDNSEC" => {
                config.tools.ndnsec = value;
                true
            }
            "NFD_STATUS" => {
                config.tools.nfd_status = value;
                true
            }
            "CAPTURE_FORMAT" => {
                config.capture.format = value;
                true
            }
            "CAPTURE_DEVICE" => {
                config.capture.device = value;
                true
            }
            "INSTANCE" => {
                config.client.instance_name = value;
                true
            }
            "RUN_TIME" => match value.parse() {
                Ok(run_time) => {
                    config.client.run_time = run_time;
                    true
                }
                Err(_) => false,
            },
            "CHECK_FORWARDER" => match value.parse() {
                Ok(check) => {
                    config.client.check_forwarder = check;
                    true
                }
                Err(_) => false,
            },
            "LOG_LEVEL" => {
                config.log.level = value;
                true
            }
            _ => false,
        };

        if applied {
            sources.env_overrides.push(key);
        }
    }
}

/// Expand `~` and a leading `$VAR` in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(stripped);
        }
        return PathBuf::from(path);
    }

    if let Some(stripped) = path.strip_prefix('$') {
        // $VAR/rest/of/path
        let (var_name, rest) = match stripped.find('/') {
            Some(slash_pos) => (&stripped[..slash_pos], Some(&stripped[slash_pos + 1..])),
            None => (stripped, None),
        };
        return match (env::var(var_name), rest) {
            (Ok(value), Some(rest)) => PathBuf::from(value).join(rest),
            (Ok(value), None) => PathBuf::from(value),
            (Err(_), _) => PathBuf::from(path),
        };
    }

    PathBuf::from(path)
}
