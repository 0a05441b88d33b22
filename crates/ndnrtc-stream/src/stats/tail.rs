//! Follow a growing stat file from a background thread.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use streamconf::TailConfig;
use tracing::{debug, info, trace, warn};

/// Polling intervals of a [`StatTail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailTimings {
    /// Sleep when no new data is available.
    pub poll: Duration,
    /// Sleep before reopening after an open or read error.
    pub retry: Duration,
}

impl Default for TailTimings {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(50),
            retry: Duration::from_millis(200),
        }
    }
}

impl From<&TailConfig> for TailTimings {
    fn from(config: &TailConfig) -> Self {
        Self {
            poll: Duration::from_millis(config.poll_interval_ms),
            retry: Duration::from_millis(config.retry_interval_ms),
        }
    }
}

/// Handle to a running tail.
///
/// Only lines appended after the file is opened are reported. The file may
/// not exist yet; opening is retried until it does or the tail is stopped.
/// A file that is removed, replaced or truncated is reopened and read from
/// its start, since everything in it is new.
pub struct StatTail {
    path: PathBuf,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl StatTail {
    /// Start following `path`, calling `on_line` for each complete line.
    pub fn start<F>(path: impl Into<PathBuf>, timings: TailTimings, on_line: F) -> io::Result<Self>
    where
        F: FnMut(&str) + Send + 'static,
    {
        let path = path.into();
        let running = Arc::new(AtomicBool::new(true));

        let running_for_thread = Arc::clone(&running);
        let path_for_thread = path.clone();

        let thread_handle = thread::Builder::new()
            .name("stat-tail".to_string())
            .spawn(move || run_tail_loop(&path_for_thread, &running_for_thread, timings, on_line))?;

        info!(path = %path.display(), "following stat file");

        Ok(Self {
            path,
            running,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the loop and wait for the thread to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            debug!("waiting for stat tail to stop...");
            if handle.join().is_err() {
                warn!("stat tail thread panicked");
            }
            debug!(path = %self.path.display(), "stat tail stopped");
        }
    }
}

impl Drop for StatTail {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_at(path: &Path, from: SeekFrom) -> io::Result<BufReader<File>> {
    let mut file = File::open(path)?;
    file.seek(from)?;
    Ok(BufReader::new(file))
}

/// Whether `path` no longer names the file `reader` is reading, or that file
/// shrank below the read position.
fn file_replaced(path: &Path, reader: &mut BufReader<File>) -> bool {
    let on_disk = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(_) => return true,
    };
    let Ok(open) = reader.get_ref().metadata() else {
        return true;
    };
    if on_disk.dev() != open.dev() || on_disk.ino() != open.ino() {
        return true;
    }
    match reader.stream_position() {
        Ok(position) => on_disk.len() < position,
        Err(_) => true,
    }
}

fn run_tail_loop<F>(path: &Path, running: &AtomicBool, timings: TailTimings, mut on_line: F)
where
    F: FnMut(&str),
{
    let mut reader: Option<BufReader<File>> = None;
    let mut pending = String::new();
    // where to seek on the next open: end on first sight, start after a rewrite
    let mut reopen_from = SeekFrom::End(0);

    while running.load(Ordering::Acquire) {
        if reader.is_none() {
            match open_at(path, reopen_from) {
                Ok(opened) => {
                    debug!(path = %path.display(), ?reopen_from, "opened stat file");
                    pending.clear();
                    reader = Some(opened);
                }
                Err(e) => {
                    trace!(path = %path.display(), "stat file not readable yet: {}", e);
                    thread::sleep(timings.retry);
                    continue;
                }
            }
        }

        let Some(current) = reader.as_mut() else {
            continue;
        };

        match current.read_line(&mut pending) {
            Ok(0) => {
                if file_replaced(path, current) {
                    debug!(path = %path.display(), "stat file was replaced or truncated, reopening");
                    reader = None;
                    reopen_from = SeekFrom::Start(0);
                    continue;
                }
                thread::sleep(timings.poll);
            }
            Ok(_) => {
                // a line without its newline is still being written
                if pending.ends_with('\n') {
                    on_line(&pending);
                    pending.clear();
                }
            }
            Err(e) => {
                debug!(path = %path.display(), "stat file read failed, reopening: {}", e);
                reader = None;
                thread::sleep(timings.retry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use std::sync::mpsc;
    use std::time::Instant;
    use tempfile::TempDir;

    fn fast() -> TailTimings {
        TailTimings {
            poll: Duration::from_millis(5),
            retry: Duration::from_millis(10),
        }
    }

    fn append(path: &Path, text: &str) {
        let mut file = OpenOptions::new().append(true).create(true).open(path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();
    }

    /// Append `probe` until the tail reports it, proving the file is open.
    fn wait_until_following(path: &Path, rx: &mpsc::Receiver<String>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            append(path, "probe\n");
            if let Ok(line) = rx.recv_timeout(Duration::from_millis(50)) {
                assert_eq!(line, "probe\n");
                // let any earlier probe still in flight arrive, then drop it
                thread::sleep(Duration::from_millis(50));
                while rx.try_recv().is_ok() {}
                return;
            }
        }
        panic!("tail never picked up {}", path.display());
    }

    #[test]
    fn test_only_new_lines_are_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats.stat");
        fs::write(&path, "old\t1\nold\t2\n").unwrap();

        let (tx, rx) = mpsc::channel();
        let mut tail = StatTail::start(&path, fast(), move |line| {
            let _ = tx.send(line.to_string());
        })
        .unwrap();

        wait_until_following(&path, &rx);
        append(&path, "new\t3\n");

        let line = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(line, "new\t3\n");

        tail.stop();
        assert!(!tail.is_running());
    }

    #[test]
    fn test_partial_line_waits_for_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats.stat");
        fs::write(&path, "").unwrap();

        let (tx, rx) = mpsc::channel();
        let _tail = StatTail::start(&path, fast(), move |line| {
            let _ = tx.send(line.to_string());
        })
        .unwrap();

        wait_until_following(&path, &rx);
        append(&path, "id\t10");
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        append(&path, "\t20\n");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "id\t10\t20\n");
    }

    #[test]
    fn test_waits_for_late_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late.stat");

        let (tx, rx) = mpsc::channel();
        let mut tail = StatTail::start(&path, fast(), move |line| {
            let _ = tx.send(line.to_string());
        })
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        assert!(tail.is_running());

        wait_until_following(&path, &rx);
        append(&path, "id\t1\n");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "id\t1\n");

        tail.stop();
    }

    #[test]
    fn test_follows_recreated_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats.stat");
        fs::write(&path, "").unwrap();

        let (tx, rx) = mpsc::channel();
        let mut tail = StatTail::start(&path, fast(), move |line| {
            let _ = tx.send(line.to_string());
        })
        .unwrap();
        wait_until_following(&path, &rx);

        fs::remove_file(&path).unwrap();
        thread::sleep(Duration::from_millis(100));
        for n in 0..20 {
            append(&path, &format!("id\t{}\n", n));
        }

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "id\t0\n");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "id\t1\n");
        tail.stop();
    }

    #[test]
    fn test_follows_truncated_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats.stat");
        fs::write(&path, "old\t1\nold\t2\n").unwrap();

        let (tx, rx) = mpsc::channel();
        let mut tail = StatTail::start(&path, fast(), move |line| {
            let _ = tx.send(line.to_string());
        })
        .unwrap();
        wait_until_following(&path, &rx);

        fs::write(&path, "").unwrap();
        thread::sleep(Duration::from_millis(100));
        append(&path, "after\t3\n");

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "after\t3\n");
        tail.stop();
    }

    #[test]
    fn test_stop_is_prompt_and_repeatable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("never.stat");

        let mut tail = StatTail::start(&path, fast(), |_| {}).unwrap();
        let started = Instant::now();
        tail.stop();
        tail.stop();

        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_timings_from_settings() {
        let timings = TailTimings::from(&TailConfig::default());
        assert_eq!(timings, TailTimings::default());
    }
}
