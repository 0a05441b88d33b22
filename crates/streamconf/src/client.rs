//! Streaming session settings - client defaults, stats tailing, overlay, logging.

use serde::{Deserialize, Serialize};

/// Defaults applied to the streaming client when the CLI doesn't override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Instance name appended to stream prefixes and passed as `-i`.
    /// Default: rtc-stream
    #[serde(default = "ClientConfig::default_instance_name")]
    pub instance_name: String,

    /// Run-time ceiling understood by the client itself (`-t`).
    /// Default: 10000
    #[serde(default = "ClientConfig::default_run_time")]
    pub run_time: u64,

    /// Stream name inside the generated client config.
    /// Default: camera
    #[serde(default = "ClientConfig::default_stream_name")]
    pub stream_name: String,

    /// Encoding thread published, and fetched.
    /// Default: t
    #[serde(default = "ClientConfig::default_thread_name")]
    pub thread_name: String,

    /// Prefix of the per-run statistics identifier.
    /// Default: overlay-stats
    #[serde(default = "ClientConfig::default_stat_prefix")]
    pub stat_prefix: String,

    /// Video resolution used when none is given.
    /// Default: 1280x720
    #[serde(default = "ClientConfig::default_resolution")]
    pub default_resolution: String,

    /// Probe the local forwarder before launching anything.
    /// Default: true
    #[serde(default = "ClientConfig::default_check_forwarder")]
    pub check_forwarder: bool,
}

impl ClientConfig {
    fn default_instance_name() -> String {
        "rtc-stream".to_string()
    }

    fn default_run_time() -> u64 {
        10_000
    }

    fn default_stream_name() -> String {
        "camera".to_string()
    }

    fn default_thread_name() -> String {
        "t".to_string()
    }

    fn default_stat_prefix() -> String {
        "overlay-stats".to_string()
    }

    fn default_resolution() -> String {
        "1280x720".to_string()
    }

    fn default_check_forwarder() -> bool {
        true
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            instance_name: Self::default_instance_name(),
            run_time: Self::default_run_time(),
            stream_name: Self::default_stream_name(),
            thread_name: Self::default_thread_name(),
            stat_prefix: Self::default_stat_prefix(),
            default_resolution: Self::default_resolution(),
            check_forwarder: Self::default_check_forwarder(),
        }
    }
}

/// Stat file tailing intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailConfig {
    /// Sleep between reads when no new line is available.
    /// Default: 50
    #[serde(default = "TailConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Sleep before reopening after an open or read failure.
    /// Default: 200
    #[serde(default = "TailConfig::default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

impl TailConfig {
    fn default_poll_interval_ms() -> u64 {
        50
    }

    fn default_retry_interval_ms() -> u64 {
        200
    }
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::default_poll_interval_ms(),
            retry_interval_ms: Self::default_retry_interval_ms(),
        }
    }
}

/// Overlay file settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Overlay file name inside the run directory.
    /// Default: overlay.txt
    #[serde(default = "OverlayConfig::default_file_name")]
    pub file_name: String,
}

impl OverlayConfig {
    fn default_file_name() -> String {
        "overlay.txt".to_string()
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            file_name: Self::default_file_name(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error).
    /// Default: info
    #[serde(default = "LogConfig::default_level")]
    pub level: String,
}

impl LogConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_defaults() {
        let client = ClientConfig::default();
        assert_eq!(client.instance_name, "rtc-stream");
        assert_eq!(client.run_time, 10_000);
        assert_eq!(client.stream_name, "camera");
        assert_eq!(client.stat_prefix, "overlay-stats");
        assert_eq!(client.default_resolution, "1280x720");
        assert!(client.check_forwarder);
    }

    #[test]
    fn test_tail_defaults() {
        let tail = TailConfig::default();
        assert_eq!(tail.poll_interval_ms, 50);
        assert_eq!(tail.retry_interval_ms, 200);
    }
}
