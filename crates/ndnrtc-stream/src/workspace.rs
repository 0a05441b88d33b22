//! Per-run working directory and named pipes.
//!
//! Every run gets a fresh directory under the system temp dir. The generated
//! client config, trust policy, certificates, pipes, stat file, overlay and
//! captured child output all live there, and the whole directory goes away
//! at teardown.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{Result, StreamError};

/// Prefix of every run directory name.
pub const RUN_DIR_PREFIX: &str = "ndnrtc-stream.";

/// The disposable working area of one command invocation.
#[derive(Debug)]
pub struct RunContext {
    dir: Option<TempDir>,
    path: PathBuf,
    pipes: Vec<PathBuf>,
}

impl RunContext {
    /// Create a uniquely named run directory in the system temp dir.
    pub fn create(prefix: &str) -> Result<Self> {
        Self::create_in(std::env::temp_dir(), prefix)
    }

    /// Create a uniquely named run directory inside `parent`.
    pub fn create_in(parent: impl AsRef<Path>, prefix: &str) -> Result<Self> {
        let parent = parent.as_ref();
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(parent)
            .map_err(|e| StreamError::workspace("failed to create run directory", parent, e))?;
        let path = dir.path().to_path_buf();

        debug!(path = %path.display(), "created run directory");

        Ok(Self {
            dir: Some(dir),
            path,
            pipes: Vec::new(),
        })
    }

    /// The run directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of `name` inside the run directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Pipes created so far.
    pub fn pipes(&self) -> &[PathBuf] {
        &self.pipes
    }

    /// Create a FIFO named `name` in the run directory.
    ///
    /// An existing path is left alone and returned as-is.
    pub fn create_pipe(&mut self, name: &str) -> Result<PathBuf> {
        let path = self.file(name);

        if path.exists() {
            debug!(path = %path.display(), "pipe already exists");
        } else {
            mkfifo(&path).map_err(|e| StreamError::workspace("failed to create pipe", &path, e))?;
            debug!(path = %path.display(), "created pipe");
        }

        if !self.pipes.contains(&path) {
            self.pipes.push(path.clone());
        }
        Ok(path)
    }

    /// Remove the run directory and everything in it.
    ///
    /// Never fails; problems are logged. Safe to call more than once.
    pub fn teardown(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };

        match dir.close() {
            Ok(()) => debug!(path = %self.path.display(), "removed run directory"),
            Err(e) => warn!(path = %self.path.display(), "failed to remove run directory: {}", e),
        }
        self.pipes.clear();
    }
}

impl Drop for RunContext {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn mkfifo(path: &Path) -> io::Result<()> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // SAFETY: c_path is a valid NUL-terminated string that outlives the call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
