//! Error types for a streaming run.
//!
//! Everything except `Launch` and `Io` happens before any child process is
//! started, so those variants abort the run with nothing to clean up.

use std::path::PathBuf;
use thiserror::Error;

use crate::client_config::ParseError;
use crate::options::ResolutionError;

/// Top-level error type for publish/fetch runs.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Run directory or named pipe creation failed.
    #[error("workspace error: {message} ({path}): {source}")]
    Workspace {
        message: String,
        path: PathBuf,
        source: std::io::Error,
    },

    /// Client configuration could not be loaded, built or written.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// No usable signing identity, or a certificate could not be dumped.
    #[error("identity error: {0}")]
    Identity(String),

    /// A child process could not be spawned.
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        source: std::io::Error,
    },

    /// The environment is not ready to stream (e.g. no local forwarder).
    #[error("preflight check failed: {0}")]
    Preflight(String),

    /// Unexpected I/O failure after launch.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while composing the streaming client's configuration or trust policy.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid resolution: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse { path: PathBuf, source: ParseError },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0}")]
    Invalid(String),
}

impl StreamError {
    pub(crate) fn workspace(
        message: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        StreamError::Workspace {
            message: message.into(),
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
