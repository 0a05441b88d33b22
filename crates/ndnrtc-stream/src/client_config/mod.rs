//! Streaming client configuration.
//!
//! Either loads a user-supplied config file verbatim, or builds one from the
//! typed templates with CLI overrides applied. Both paths end in a
//! [`StreamConfig`] that is rendered once into the run directory, before any
//! child process starts.

pub mod document;
pub mod parser;
pub mod template;

pub use document::{Group, Setting, Value};
pub use parser::{parse_document, ParseError};
pub use template::{
    CoderSettings, ConsumerTemplate, GeneralSection, LogLevel, ProducerTemplate, StatGathering,
};

use std::fs;
use std::path::{Path, PathBuf};

use streamconf::ClientConfig;
use tracing::debug;

use crate::error::ConfigError;
use crate::options::{FetchOptions, PublishOptions, Resolution};

/// Which side of the stream a config describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Consumer,
    Producer,
}

impl Role {
    fn stat_gathering_path(self) -> &'static str {
        match self {
            Role::Consumer => "consume.basic.stat_gathering",
            Role::Producer => "produce.stat_gathering",
        }
    }
}

/// A complete client config document plus what the orchestrator needs to
/// know about it.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    role: Role,
    document: Group,
    stats: Option<StatGathering>,
    origin: Option<PathBuf>,
}

impl StreamConfig {
    /// Wrap a document, picking up its statistics-gathering descriptor.
    pub fn from_document(role: Role, document: Group, origin: Option<PathBuf>) -> Self {
        let stats = document
            .lookup(role.stat_gathering_path())
            .and_then(StatGathering::from_value);
        Self {
            role,
            document,
            stats,
            origin,
        }
    }

    /// Load and parse a user-supplied config file.
    pub fn load(path: &Path, role: Role) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let document = parse_document(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(path = %path.display(), settings = document.len(), "loaded client config");
        Ok(Self::from_document(role, document, Some(path.to_path_buf())))
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn document(&self) -> &Group {
        &self.document
    }

    /// Statistics the client was asked to write, if any.
    pub fn stats(&self) -> Option<&StatGathering> {
        self.stats.as_ref()
    }

    /// The user file this config came from; `None` when generated.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// Where the client writes the stat file: `<log_path>/<stat name>.stat`.
    pub fn stat_file(&self, default_dir: &Path) -> Option<PathBuf> {
        let stats = self.stats.as_ref()?;
        let dir = self
            .document
            .lookup("general.log_path")
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(|| default_dir.to_path_buf());
        Some(dir.join(format!("{}.stat", stats.name)))
    }

    pub fn render(&self) -> String {
        self.document.to_string()
    }

    /// Render the config to `path`.
    pub fn write_to(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, self.render()).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(path = %path.display(), "wrote client config");
        Ok(())
    }
}

/// Everything composition needs besides the user's options.
#[derive(Debug, Clone)]
pub struct ComposeEnv<'a> {
    pub run_dir: &'a Path,
    pub client: &'a ClientConfig,
    /// Sink base path (consumer) or source pipe (producer).
    pub media_pipe: PathBuf,
    pub resolution: Resolution,
    pub stats: StatGathering,
}

/// Parse the requested resolution, falling back to `default`.
pub fn resolve_resolution(requested: Option<&str>, default: &str) -> Result<Resolution, ConfigError> {
    Ok(requested.unwrap_or(default).parse()?)
}

/// Prefix to fetch from: the stream prefix with the instance name appended,
/// unless it is already there.
pub fn consumer_base_prefix(stream_prefix: &str, instance_name: &str) -> String {
    let trimmed = stream_prefix.trim_end_matches('/');
    let suffix = format!("/{}", instance_name);
    if trimmed.ends_with(&suffix) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, suffix)
    }
}

fn general_section(env: &ComposeEnv<'_>, verbose: bool) -> GeneralSection {
    let mut general = GeneralSection::new(env.run_dir);
    if verbose {
        general.log_level = LogLevel::All;
    }
    general
}

/// Build the consumer config for `fetch`, returning it with the base prefix.
pub fn compose_consumer_config(
    options: &FetchOptions,
    env: &ComposeEnv<'_>,
) -> Result<(StreamConfig, String), ConfigError> {
    let common = &options.common;
    let base_prefix = consumer_base_prefix(&common.stream_prefix, &env.client.instance_name);

    if let Some(path) = &common.config_file {
        return Ok((StreamConfig::load(path, Role::Consumer)?, base_prefix));
    }

    let template = ConsumerTemplate {
        general: general_section(env, common.verbose),
        interest_lifetime: 2000,
        jitter_size: 150,
        stats: Some(env.stats.clone()),
        base_prefix: base_prefix.clone(),
        stream_name: common
            .stream_name
            .clone()
            .unwrap_or_else(|| env.client.stream_name.clone()),
        thread_to_fetch: common
            .thread
            .clone()
            .unwrap_or_else(|| env.client.thread_name.clone()),
        sink: env.media_pipe.clone(),
    };

    Ok((
        StreamConfig::from_document(Role::Consumer, template.to_document(), None),
        base_prefix,
    ))
}

/// Build the producer config for `publish`.
pub fn compose_producer_config(
    options: &PublishOptions,
    env: &ComposeEnv<'_>,
) -> Result<StreamConfig, ConfigError> {
    let common = &options.common;

    if let Some(path) = &common.config_file {
        return StreamConfig::load(path, Role::Producer);
    }

    let mut coder = CoderSettings::new(env.resolution.width, env.resolution.height);
    if let Some(bitrate) = common.bitrate {
        if bitrate == 0 {
            return Err(ConfigError::Invalid("bitrate must be positive".to_string()));
        }
        coder = coder.with_bitrate(bitrate);
    }

    let template = ProducerTemplate {
        general: general_section(env, common.verbose),
        stats: Some(env.stats.clone()),
        stream_name: common
            .stream_name
            .clone()
            .unwrap_or_else(|| env.client.stream_name.clone()),
        segment_size: 1000,
        freshness: 2000,
        source: env.media_pipe.clone(),
        thread_name: common
            .thread
            .clone()
            .unwrap_or_else(|| env.client.thread_name.clone()),
        coder,
    };

    Ok(StreamConfig::from_document(
        Role::Producer,
        template.to_document(),
        None,
    ))
}
