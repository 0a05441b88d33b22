//! Per-command options, already separated from CLI parsing.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Video frame size, written `WIDTHxHEIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{input:?} is not of the form WIDTHxHEIGHT")]
pub struct ResolutionError {
    pub input: String,
}

impl FromStr for Resolution {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ResolutionError {
            input: s.to_string(),
        };

        let mut parts = s.split('x');
        let (Some(width), Some(height), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(err());
        };

        Ok(Resolution {
            width: width.parse().map_err(|_| err())?,
            height: height.parse().map_err(|_| err())?,
        })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Options shared by `publish` and `fetch`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamOptions {
    /// Name under which the stream is published or fetched.
    pub stream_prefix: String,
    /// Signing identity requested by the user.
    pub identity: Option<String>,
    /// Raw `WIDTHxHEIGHT` string; validated when the config is composed.
    pub video_size: Option<String>,
    /// Target encoding bitrate in Kbps.
    pub bitrate: Option<u32>,
    /// User-supplied client config, used verbatim.
    pub config_file: Option<PathBuf>,
    /// User-supplied trust schema, used verbatim.
    pub trust_schema: Option<PathBuf>,
    /// Stream name override inside the client config.
    pub stream_name: Option<String>,
    /// Encoding thread to publish or fetch.
    pub thread: Option<String>,
    /// Client log verbosity.
    pub verbose: bool,
}

/// `publish` options.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishOptions {
    pub common: StreamOptions,
}

/// `fetch` options.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchOptions {
    pub common: StreamOptions,
    /// Certificate to use as the trust anchor.
    pub certificate: Option<PathBuf>,
}
