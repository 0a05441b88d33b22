//! Catalogue of the client metrics the overlay knows how to show.

/// How a metric's raw value turns into what is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Shown as read.
    Instant,
    /// Monotonic counter, shown as a per-second rate.
    Counter,
    /// Monotonic byte counter, shown as kbit/s.
    ByteCounter,
}

impl MetricKind {
    pub fn is_derivative(self) -> bool {
        !matches!(self, MetricKind::Instant)
    }

    /// Factor applied to a per-second rate before display.
    pub fn rate_scale(self) -> f64 {
        match self {
            MetricKind::ByteCounter => 8.0 / 1000.0,
            _ => 1.0,
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            MetricKind::Instant => "",
            MetricKind::Counter => "/s",
            MetricKind::ByteCounter => "kbit/s",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricInfo {
    pub id: &'static str,
    pub caption: &'static str,
    pub kind: MetricKind,
}

const fn metric(id: &'static str, caption: &'static str, kind: MetricKind) -> MetricInfo {
    MetricInfo { id, caption, kind }
}

const CATALOGUE: &[MetricInfo] = &[
    // consumer
    metric("isent", "interests", MetricKind::Counter),
    metric("segNumRcvd", "segments", MetricKind::Counter),
    metric("appNacks", "app nacks", MetricKind::Counter),
    metric("nacks", "nacks", MetricKind::Counter),
    metric("timeouts", "timeouts", MetricKind::Counter),
    metric("bytesRcvd", "received", MetricKind::ByteCounter),
    metric("framesAcq", "frames acquired", MetricKind::Counter),
    metric("jitterPlay", "playback jitter, ms", MetricKind::Instant),
    metric("jitterTar", "target jitter, ms", MetricKind::Instant),
    metric("latEst", "latency est., ms", MetricKind::Instant),
    metric("rttEst", "rtt est., ms", MetricKind::Instant),
    metric("drd", "drd est., ms", MetricKind::Instant),
    metric("lambdaD", "pipeline size", MetricKind::Instant),
    // producer
    metric("framesCaptured", "frames captured", MetricKind::Counter),
    metric("processed", "frames encoded", MetricKind::Counter),
    metric("dropped", "frames dropped", MetricKind::Counter),
    metric("irecvd", "interests", MetricKind::Counter),
    metric("segPublished", "segments", MetricKind::Counter),
    metric("bytesPublished", "published", MetricKind::ByteCounter),
    metric("encodingRate", "encoding rate", MetricKind::Instant),
];

/// Metrics requested from a consumer.
pub const CONSUMER_METRICS: &[&str] = &[
    "isent",
    "segNumRcvd",
    "appNacks",
    "nacks",
    "timeouts",
    "bytesRcvd",
    "framesAcq",
    "jitterPlay",
    "jitterTar",
    "latEst",
    "rttEst",
    "drd",
    "lambdaD",
];

/// Metrics requested from a producer.
pub const PRODUCER_METRICS: &[&str] = &[
    "framesCaptured",
    "processed",
    "dropped",
    "irecvd",
    "segPublished",
    "bytesPublished",
    "encodingRate",
];

/// Look up a metric identifier; `None` for metrics the overlay ignores.
pub fn lookup(id: &str) -> Option<&'static MetricInfo> {
    CATALOGUE.iter().find(|m| m.id == id)
}

/// Widest caption, with its unit, among `ids`.
pub fn caption_width<'a>(ids: impl IntoIterator<Item = &'a str>) -> usize {
    ids.into_iter()
        .filter_map(lookup)
        .map(|m| display_caption(m).chars().count())
        .max()
        .unwrap_or(0)
}

/// Caption with its unit suffix, e.g. `received, kbit/s`.
pub fn display_caption(info: &MetricInfo) -> String {
    match info.kind.unit() {
        "" => info.caption.to_string(),
        unit => format!("{}, {}", info.caption, unit),
    }
}
