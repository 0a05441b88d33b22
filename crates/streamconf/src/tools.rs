//! External tool settings - executables and the devices they talk to.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Executable names (or absolute paths) of the collaborating tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Video source tool used to capture the camera when publishing.
    /// Default: ffmpeg
    #[serde(default = "ToolsConfig::default_ffmpeg")]
    pub ffmpeg: String,

    /// Preview tool rendering raw frames plus the stats overlay.
    /// Default: ffplay
    #[serde(default = "ToolsConfig::default_ffplay")]
    pub ffplay: String,

    /// NDN real-time streaming client.
    /// Default: ndnrtc-client
    #[serde(default = "ToolsConfig::default_ndnrtc_client")]
    pub ndnrtc_client: String,

    /// Identity and certificate management tool.
    /// Default: ndnsec
    #[serde(default = "ToolsConfig::default_ndnsec")]
    pub ndnsec: String,

    /// Forwarder status probe.
    /// Default: nfd-status
    #[serde(default = "ToolsConfig::default_nfd_status")]
    pub nfd_status: String,
}

impl ToolsConfig {
    fn default_ffmpeg() -> String {
        "ffmpeg".to_string()
    }

    fn default_ffplay() -> String {
        "ffplay".to_string()
    }

    fn default_ndnrtc_client() -> String {
        "ndnrtc-client".to_string()
    }

    fn default_ndnsec() -> String {
        "ndnsec".to_string()
    }

    fn default_nfd_status() -> String {
        "nfd-status".to_string()
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: Self::default_ffmpeg(),
            ffplay: Self::default_ffplay(),
            ndnrtc_client: Self::default_ndnrtc_client(),
            ndnsec: Self::default_ndnsec(),
            nfd_status: Self::default_nfd_status(),
        }
    }
}

/// Camera capture settings handed to the video source tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Input format (ffmpeg `-f`).
    /// Default: avfoundation on macOS, v4l2 elsewhere
    #[serde(default = "CaptureConfig::default_format")]
    pub format: String,

    /// Capture device (ffmpeg `-i`).
    /// Default: 0 on macOS, /dev/video0 elsewhere
    #[serde(default = "CaptureConfig::default_device")]
    pub device: String,

    /// Capture frame rate.
    /// Default: 25
    #[serde(default = "CaptureConfig::default_framerate")]
    pub framerate: u32,

    /// Raw pixel format shared by capture, client and preview.
    /// Default: 0rgb
    #[serde(default = "CaptureConfig::default_pixel_format")]
    pub pixel_format: String,
}

impl CaptureConfig {
    fn default_format() -> String {
        if cfg!(target_os = "macos") {
            "avfoundation".to_string()
        } else {
            "v4l2".to_string()
        }
    }

    fn default_device() -> String {
        if cfg!(target_os = "macos") {
            "0".to_string()
        } else {
            "/dev/video0".to_string()
        }
    }

    fn default_framerate() -> u32 {
        25
    }

    fn default_pixel_format() -> String {
        "0rgb".to_string()
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            format: Self::default_format(),
            device: Self::default_device(),
            framerate: Self::default_framerate(),
            pixel_format: Self::default_pixel_format(),
        }
    }
}

/// Preview window settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Font used to draw the overlay. The preview tool's default when unset.
    #[serde(default)]
    pub font_file: Option<PathBuf>,

    /// Overlay font size.
    /// Default: 20
    #[serde(default = "PreviewConfig::default_font_size")]
    pub font_size: u32,
}

impl PreviewConfig {
    fn default_font_size() -> u32 {
        20
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            font_file: None,
            font_size: Self::default_font_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tools_defaults() {
        let tools = ToolsConfig::default();
        assert_eq!(tools.ffmpeg, "ffmpeg");
        assert_eq!(tools.ffplay, "ffplay");
        assert_eq!(tools.ndnrtc_client, "ndnrtc-client");
        assert_eq!(tools.ndnsec, "ndnsec");
    }

    #[test]
    fn test_capture_defaults_follow_platform() {
        let capture = CaptureConfig::default();
        assert_eq!(capture.framerate, 25);
        assert_eq!(capture.pixel_format, "0rgb");
        if cfg!(target_os = "macos") {
            assert_eq!(capture.format, "avfoundation");
        } else {
            assert_eq!(capture.format, "v4l2");
        }
    }
}
