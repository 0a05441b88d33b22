//! Live statistics: follow the client's stat file and keep the preview
//! overlay current.

pub mod metrics;
pub mod overlay;
pub mod tail;

pub use metrics::{MetricKind, CONSUMER_METRICS, PRODUCER_METRICS};
pub use overlay::OverlayState;
pub use tail::{StatTail, TailTimings};

use std::io;
use std::path::PathBuf;
use std::time::Instant;

use tracing::warn;

/// Fresh statistics identifier, `<prefix>-<8 hex chars>`.
pub fn stat_id(prefix: &str) -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &uuid[..8])
}

/// Write the caption-only overlay, then start feeding stat lines into it.
pub fn start_overlay(
    mut overlay: OverlayState,
    stat_file: impl Into<PathBuf>,
    timings: TailTimings,
) -> io::Result<StatTail> {
    overlay.write()?;
    StatTail::start(stat_file, timings, move |line| {
        if let Err(e) = overlay.update(line, Instant::now()) {
            warn!(path = %overlay.path().display(), "failed to write overlay: {}", e);
        }
    })
}
