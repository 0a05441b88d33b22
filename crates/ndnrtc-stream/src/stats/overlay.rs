//! Overlay text shown on top of the preview.
//!
//! [`OverlayState`] turns stat lines into `caption value` rows and republishes
//! the overlay file after every line. The preview tool re-reads that file
//! continuously, so every write goes through a temp file plus rename.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tempfile::NamedTempFile;
use tracing::{debug, trace};

use super::metrics::{self, MetricInfo};

/// Field separator of the client's stat file.
pub const FIELD_DELIMITER: char = '\t';

const VALUE_WIDTH: usize = 10;

#[derive(Debug, Clone, Copy)]
struct Sample {
    value: f64,
    at: Instant,
}

/// Rendered overlay plus the baselines needed for rate metrics.
#[derive(Debug)]
pub struct OverlayState {
    path: PathBuf,
    caption: String,
    metrics: Vec<String>,
    width: usize,
    previous: HashMap<String, Sample>,
    rows: Vec<(String, String)>,
}

impl OverlayState {
    /// `metrics` is the ordered statistics list the client was configured with.
    pub fn new(path: impl Into<PathBuf>, caption: impl Into<String>, metrics: Vec<String>) -> Self {
        let width = metrics::caption_width(metrics.iter().map(String::as_str));
        Self {
            path: path.into(),
            caption: caption.into(),
            metrics,
            width,
            previous: HashMap::new(),
            rows: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows of the latest update, in declaration order.
    pub fn rows(&self) -> &[(String, String)] {
        &self.rows
    }

    /// Fold one stat line into the state and republish the overlay file.
    pub fn update(&mut self, line: &str, now: Instant) -> io::Result<()> {
        self.apply(line, now);
        self.write()
    }

    /// Fold one stat line into the state without touching the file.
    pub fn apply(&mut self, line: &str, now: Instant) {
        let line = line.trim_end_matches(['\n', '\r']);
        let mut fields = line.split(FIELD_DELIMITER);
        let id = fields.next().unwrap_or_default();
        let values: Vec<&str> = fields.collect();
        trace!(id, fields = values.len(), "stat line");

        let mut rows = Vec::with_capacity(self.metrics.len());
        for (index, name) in self.metrics.iter().enumerate() {
            let Some(info) = metrics::lookup(name) else {
                continue;
            };
            let Some(value) = values
                .get(index)
                .and_then(|raw| raw.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
            else {
                debug!(metric = %name, "missing or malformed field, skipped");
                continue;
            };

            let shown = if info.kind.is_derivative() {
                match rate(&mut self.previous, info, value, now) {
                    Some(rate) => rate,
                    None => continue,
                }
            } else {
                value
            };

            rows.push((metrics::display_caption(info), format_value(shown)));
        }
        self.rows = rows;
    }

    /// Full overlay text: status caption, then one row per shown metric.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(64 * (self.rows.len() + 1));
        out.push_str(&self.caption);
        out.push('\n');
        for (caption, value) in &self.rows {
            out.push_str(&format!(
                "{caption:<w$} {value:>v$}\n",
                w = self.width,
                v = VALUE_WIDTH
            ));
        }
        out
    }

    /// Atomically replace the overlay file with the current rendering.
    pub fn write(&self) -> io::Result<()> {
        let text = self.render();
        write_atomic(&self.path, |file| file.write_all(text.as_bytes()))
    }
}

/// Per-second rate of a counter; `None` when there is nothing to show.
fn rate(
    previous: &mut HashMap<String, Sample>,
    info: &MetricInfo,
    value: f64,
    now: Instant,
) -> Option<f64> {
    let current = Sample { value, at: now };
    let Some(last) = previous.get(info.id).copied() else {
        previous.insert(info.id.to_string(), current);
        return None;
    };

    // no increase is a stale sample; the baseline stays put
    let elapsed = now.saturating_duration_since(last.at).as_secs_f64();
    if value <= last.value || elapsed <= 0.0 {
        return None;
    }

    previous.insert(info.id.to_string(), current);
    Some((value - last.value) / elapsed * info.kind.rate_scale())
}

/// Integers print bare, anything fractional with two decimals.
pub fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// Write `path` via a sibling temp file and rename.
///
/// If `fill` fails the temp file is discarded and `path` keeps its previous
/// contents.
pub fn write_atomic<F>(path: &Path, fill: F) -> io::Result<()>
where
    F: FnOnce(&mut fs::File) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    fill(tmp.as_file_mut())?;
    tmp.as_file_mut().flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn consumer_metrics() -> Vec<String> {
        ["isent", "segNumRcvd", "appNacks", "jitterPlay", "bytesRcvd"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn state(dir: &TempDir) -> OverlayState {
        OverlayState::new(
            dir.path().join("overlay.txt"),
            "fetching /ndnrtc/first-stream",
            consumer_metrics(),
        )
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(10.0), "10");
        assert_eq!(format_value(0.0), "0");
        assert_eq!(format_value(2.5), "2.50");
        assert_eq!(format_value(1.0 / 3.0), "0.33");
    }

    #[test]
    fn test_first_sample_shows_only_instant_metrics() {
        let dir = TempDir::new().unwrap();
        let mut overlay = state(&dir);

        overlay
            .update("overlay-stats-123\t10\t5\t0\t12.5\t4000\n", Instant::now())
            .unwrap();

        let text = fs::read_to_string(overlay.path()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("fetching /ndnrtc/first-stream"));
        let rest: Vec<_> = lines.collect();
        assert_eq!(rest.len(), 1);
        assert!(rest[0].starts_with("playback jitter, ms"));
        assert!(rest[0].ends_with("12.50"));
    }

    #[test]
    fn test_rates_after_second_sample() {
        let dir = TempDir::new().unwrap();
        let mut overlay = state(&dir);
        let t0 = Instant::now();

        overlay.apply("id\t10\t5\t0\t1\t1000", t0);
        overlay.apply("id\t30\t10\t0\t1\t3000", t0 + Duration::from_secs(2));

        let rows: HashMap<_, _> = overlay.rows().iter().cloned().collect();
        assert_eq!(rows["interests, /s"], "10");
        assert_eq!(rows["segments, /s"], "2.50");
        // 2000 bytes over 2s = 1000 B/s = 8 kbit/s
        assert_eq!(rows["received, kbit/s"], "8");
        // appNacks did not move
        assert!(!rows.contains_key("app nacks, /s"));
        assert_eq!(rows["playback jitter, ms"], "1");
    }

    #[test]
    fn test_repeated_line_is_stable_for_instant_and_hides_counters() {
        let dir = TempDir::new().unwrap();
        let mut overlay = state(&dir);
        let t0 = Instant::now();
        let line = "id\t10\t5\t0\t7";

        overlay.update(line, t0).unwrap();
        let first = fs::read_to_string(overlay.path()).unwrap();
        overlay.update(line, t0 + Duration::from_secs(1)).unwrap();
        let second = fs::read_to_string(overlay.path()).unwrap();

        assert_eq!(first, second);
        assert!(!second.contains("interests"));
    }

    #[test]
    fn test_unchanged_counter_keeps_baseline() {
        let dir = TempDir::new().unwrap();
        let mut overlay = state(&dir);
        let t0 = Instant::now();

        overlay.apply("id\t10", t0);
        overlay.apply("id\t10", t0 + Duration::from_secs(1));
        overlay.apply("id\t20", t0 + Duration::from_secs(2));

        // rate is measured from the first sample, not the stale one
        assert_eq!(overlay.rows(), &[("interests, /s".to_string(), "5".to_string())]);
    }

    #[test]
    fn test_decreasing_counter_keeps_baseline() {
        let dir = TempDir::new().unwrap();
        let mut overlay = state(&dir);
        let t0 = Instant::now();

        overlay.apply("id\t100", t0);
        overlay.apply("id\t4", t0 + Duration::from_secs(1));
        assert!(overlay.rows().is_empty());

        // measured against 100 at t0, not the lower sample
        overlay.apply("id\t108", t0 + Duration::from_secs(2));
        assert_eq!(overlay.rows(), &[("interests, /s".to_string(), "4".to_string())]);
    }

    #[test]
    fn test_non_finite_fields_are_skipped() {
        let dir = TempDir::new().unwrap();
        let metrics = vec!["jitterPlay".to_string(), "lambdaD".to_string(), "rttEst".to_string()];
        let mut overlay = OverlayState::new(dir.path().join("o.txt"), "fetching /a", metrics);

        overlay.apply("id\tnan\tinf\t30", Instant::now());
        assert_eq!(overlay.rows(), &[("rtt est., ms".to_string(), "30".to_string())]);
    }

    #[test]
    fn test_malformed_and_unknown_fields_are_skipped() {
        let dir = TempDir::new().unwrap();
        let metrics = vec!["dArr".to_string(), "jitterPlay".to_string(), "rttEst".to_string()];
        let mut overlay = OverlayState::new(dir.path().join("o.txt"), "publishing /a", metrics);

        overlay.apply("id\t1\tnot-a-number\t30", Instant::now());
        assert_eq!(overlay.rows(), &[("rtt est., ms".to_string(), "30".to_string())]);

        // short line: trailing metrics simply absent
        overlay.apply("id\t1", Instant::now());
        assert!(overlay.rows().is_empty());
    }

    #[test]
    fn test_rows_are_aligned() {
        let dir = TempDir::new().unwrap();
        let mut overlay = state(&dir);
        let t0 = Instant::now();
        overlay.apply("id\t0\t0\t0\t3\t0", t0);
        overlay.apply("id\t1\t0\t0\t3\t0", t0 + Duration::from_secs(1));

        let text = overlay.render();
        let rows: Vec<_> = text.lines().skip(1).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), rows[1].len());
    }

    #[test]
    fn test_failed_write_keeps_previous_overlay() {
        let dir = TempDir::new().unwrap();
        let mut overlay = state(&dir);
        overlay.update("id\t1\t1\t1\t9", Instant::now()).unwrap();
        let before = fs::read_to_string(overlay.path()).unwrap();

        let result = write_atomic(overlay.path(), |file| {
            file.write_all(b"fetching /half-writ")?;
            Err(io::Error::other("crashed mid-render"))
        });
        assert!(result.is_err());

        assert_eq!(fs::read_to_string(overlay.path()).unwrap(), before);
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_initial_write_has_only_caption() {
        let dir = TempDir::new().unwrap();
        let overlay = state(&dir);
        overlay.write().unwrap();
        assert_eq!(
            fs::read_to_string(overlay.path()).unwrap(),
            "fetching /ndnrtc/first-stream\n"
        );
    }
}
