//! Typed builders for the client configs this tool generates.
//!
//! Each builder carries the fields of one stream entry plus the general
//! section, and turns into a [`Group`] document in one step.

use std::path::PathBuf;

use super::document::{Group, Value};

/// Client log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Default,
    Debug,
    All,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Default => "default",
            LogLevel::Debug => "debug",
            LogLevel::All => "all",
        }
    }
}

/// `general` section.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralSection {
    pub log_level: LogLevel,
    pub log_file: String,
    pub log_path: PathBuf,
    pub use_fec: bool,
    pub use_avsync: bool,
    pub connect_host: String,
    pub connect_port: u32,
}

impl GeneralSection {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_level: LogLevel::Default,
            log_file: "ndnrtc-client.log".to_string(),
            log_path: log_path.into(),
            use_fec: true,
            use_avsync: true,
            connect_host: "localhost".to_string(),
            connect_port: 6363,
        }
    }

    fn to_group(&self) -> Group {
        Group::new()
            .with("log_level", self.log_level.as_str())
            .with("log_file", self.log_file.as_str())
            .with("log_path", self.log_path.to_string_lossy().into_owned())
            .with("use_fec", self.use_fec)
            .with("use_avsync", self.use_avsync)
            .with(
                "ndnnetwork",
                Group::new()
                    .with("connect_host", self.connect_host.as_str())
                    .with("connect_port", self.connect_port),
            )
    }
}

/// One statistics-gathering entry: which metrics the client writes, and the
/// identifier that names its stat file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatGathering {
    pub name: String,
    pub statistics: Vec<String>,
}

impl StatGathering {
    pub fn new(name: impl Into<String>, statistics: &[&str]) -> Self {
        Self {
            name: name.into(),
            statistics: statistics.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub(crate) fn to_value(&self) -> Value {
        Value::List(vec![Value::Group(
            Group::new().with("name", self.name.as_str()).with(
                "statistics",
                Value::List(self.statistics.iter().map(|s| Value::from(s.as_str())).collect()),
            ),
        )])
    }

    /// Read the first entry of a `stat_gathering` list.
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        let entry = value.as_seq()?.first()?.as_group()?;
        let name = entry.get("name")?.as_str()?.to_string();
        let statistics = entry
            .get("statistics")?
            .as_seq()?
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        Some(Self { name, statistics })
    }
}

/// Consumer config: one fetched stream written into a sink.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerTemplate {
    pub general: GeneralSection,
    pub interest_lifetime: u32,
    pub jitter_size: u32,
    pub stats: Option<StatGathering>,
    pub base_prefix: String,
    pub stream_name: String,
    pub thread_to_fetch: String,
    /// Sink base path; the client appends `.WIDTHxHEIGHT` when writing.
    pub sink: PathBuf,
}

impl ConsumerTemplate {
    pub fn to_document(&self) -> Group {
        let mut basic = Group::new().with(
            "video",
            Group::new()
                .with("interest_lifetime", self.interest_lifetime)
                .with("jitter_size", self.jitter_size),
        );
        if let Some(stats) = &self.stats {
            basic.set("stat_gathering", stats.to_value());
        }

        let stream = Group::new()
            .with("type", "video")
            .with("base_prefix", self.base_prefix.as_str())
            .with("name", self.stream_name.as_str())
            .with("thread_to_fetch", self.thread_to_fetch.as_str())
            .with(
                "sink",
                Group::new()
                    .with("name", self.sink.to_string_lossy().into_owned())
                    .with("type", "pipe")
                    .with("write_frame_info", false),
            );

        Group::new().with("general", self.general.to_group()).with(
            "consume",
            Group::new()
                .with("basic", basic)
                .with("streams", Value::List(vec![Value::Group(stream)])),
        )
    }
}

/// Encoder settings of a published thread.
#[derive(Debug, Clone, PartialEq)]
pub struct CoderSettings {
    pub frame_rate: u32,
    pub gop: u32,
    pub start_bitrate: u32,
    pub max_bitrate: u32,
    pub encode_width: u32,
    pub encode_height: u32,
    pub drop_frames: bool,
}

impl CoderSettings {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            frame_rate: 30,
            gop: 30,
            start_bitrate: 1000,
            max_bitrate: 10000,
            encode_width: width,
            encode_height: height,
            drop_frames: true,
        }
    }

    /// Target a bitrate; the ceiling never drops below it.
    pub fn with_bitrate(mut self, kbps: u32) -> Self {
        self.start_bitrate = kbps;
        self.max_bitrate = self.max_bitrate.max(kbps);
        self
    }

    fn to_group(&self) -> Group {
        Group::new()
            .with("frame_rate", self.frame_rate)
            .with("gop", self.gop)
            .with("start_bitrate", self.start_bitrate)
            .with("max_bitrate", self.max_bitrate)
            .with("encode_width", self.encode_width)
            .with("encode_height", self.encode_height)
            .with("drop_frames", self.drop_frames)
    }
}

/// Producer config: one stream read from a raw-frame source.
#[derive(Debug, Clone, PartialEq)]
pub struct ProducerTemplate {
    pub general: GeneralSection,
    pub stats: Option<StatGathering>,
    pub stream_name: String,
    pub segment_size: u32,
    pub freshness: u32,
    pub source: PathBuf,
    pub thread_name: String,
    pub coder: CoderSettings,
}

impl ProducerTemplate {
    pub fn to_document(&self) -> Group {
        let thread = Group::new()
            .with("name", self.thread_name.as_str())
            .with("coder", self.coder.to_group());

        let stream = Group::new()
            .with("type", "video")
            .with("name", self.stream_name.as_str())
            .with("segment_size", self.segment_size)
            .with("freshness", self.freshness)
            .with(
                "source",
                Group::new()
                    .with("name", self.source.to_string_lossy().into_owned())
                    .with("type", "pipe"),
            )
            .with("threads", Value::List(vec![Value::Group(thread)]));

        let mut produce = Group::new();
        if let Some(stats) = &self.stats {
            produce.set("stat_gathering", stats.to_value());
        }
        produce.set("streams", Value::List(vec![Value::Group(stream)]));

        Group::new()
            .with("general", self.general.to_group())
            .with("produce", produce)
    }
}
