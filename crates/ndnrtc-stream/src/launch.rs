//! Command lines of the collaborating tools.

use std::path::Path;

use streamconf::{CaptureConfig, PreviewConfig, ToolsConfig};

use crate::options::Resolution;

/// A program plus its arguments, and the short name its output is filed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
}

impl LaunchSpec {
    fn new(name: &str, program: &str) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn path(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }
}

fn drawtext_filter(overlay: &Path, preview: &PreviewConfig) -> String {
    let mut filter = format!(
        "drawtext=textfile={}:reload=1: x=10: y=10: fontcolor=white",
        overlay.display()
    );
    if let Some(font) = &preview.font_file {
        filter.push_str(&format!(": fontfile={}", font.display()));
    }
    filter.push_str(&format!(
        ": fontsize={}: box=1: boxcolor=0x00000000@0.3",
        preview.font_size
    ));
    filter
}

/// Preview window: raw frames from `pipe` with the stats overlay drawn on top.
pub fn preview_command(
    tools: &ToolsConfig,
    preview: &PreviewConfig,
    capture: &CaptureConfig,
    overlay: &Path,
    pipe: &Path,
    resolution: Resolution,
) -> LaunchSpec {
    LaunchSpec::new("preview", &tools.ffplay)
        .arg("-f")
        .arg("rawvideo")
        .arg("-vf")
        .arg(drawtext_filter(overlay, preview))
        .arg("-pixel_format")
        .arg(capture.pixel_format.as_str())
        .arg("-video_size")
        .arg(resolution.to_string())
        .arg("-i")
        .path(pipe)
}

/// Camera capture, copied raw into both the client's source pipe and the
/// preview pipe.
pub fn capture_command(
    tools: &ToolsConfig,
    capture: &CaptureConfig,
    resolution: Resolution,
    source: &Path,
    preview: &Path,
) -> LaunchSpec {
    LaunchSpec::new("capture", &tools.ffmpeg)
        .arg("-y")
        .arg("-f")
        .arg(capture.format.as_str())
        .arg("-pixel_format")
        .arg(capture.pixel_format.as_str())
        .arg("-framerate")
        .arg(capture.framerate.to_string())
        .arg("-video_size")
        .arg(resolution.to_string())
        .arg("-i")
        .arg(capture.device.as_str())
        .arg("-map")
        .arg("0:v")
        .arg("-c")
        .arg("copy")
        .arg("-f")
        .arg("rawvideo")
        .path(source)
        .arg("-map")
        .arg("0:v")
        .arg("-c")
        .arg("copy")
        .arg("-f")
        .arg("rawvideo")
        .path(preview)
}

/// Inputs of a streaming client invocation.
#[derive(Debug, Clone)]
pub struct ClientInvocation<'a> {
    pub config_file: &'a Path,
    pub identity: Option<&'a str>,
    pub policy: &'a Path,
    pub run_time: u64,
    pub instance_name: &'a str,
}

pub fn client_command(tools: &ToolsConfig, invocation: &ClientInvocation<'_>) -> LaunchSpec {
    let mut spec = LaunchSpec::new("client", &tools.ndnrtc_client)
        .arg("-v")
        .arg("-c")
        .path(invocation.config_file);
    if let Some(identity) = invocation.identity {
        spec = spec.arg("-s").arg(identity);
    }
    spec.arg("-p")
        .path(invocation.policy)
        .arg("-t")
        .arg(invocation.run_time.to_string())
        .arg("-i")
        .arg(invocation.instance_name)
}
