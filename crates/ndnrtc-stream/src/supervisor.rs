//! Child process supervision.
//!
//! One child is the driver: its exit ends the run. The others are
//! passengers whose output is drained to files in the run directory. Every
//! output stream gets its own drain task so no child ever blocks on a full
//! pipe.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Result, StreamError};
use crate::launch::LaunchSpec;

/// How long shutdown waits for drain tasks once their child is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    /// Exited on its own, with its exit code if it had one.
    Exited(Option<i32>),
    /// Sent a terminate signal by the supervisor.
    Terminated,
}

/// Where a child's output stream goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    Discard,
    /// Copied verbatim into a file.
    File(PathBuf),
    /// Forwarded line by line to the debug log.
    Trace,
}

impl OutputMode {
    fn stdio(&self) -> Stdio {
        match self {
            OutputMode::Discard => Stdio::null(),
            _ => Stdio::piped(),
        }
    }
}

/// A launched tool.
#[derive(Debug)]
pub struct ChildProcess {
    spec: LaunchSpec,
    child: Option<Child>,
    state: ProcessState,
    drains: Vec<JoinHandle<()>>,
}

impl ChildProcess {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &LaunchSpec {
        &self.spec
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Whether a live OS handle is still held.
    pub fn has_handle(&self) -> bool {
        self.child.is_some()
    }

    /// SIGTERM the child unless it already exited. Never escalates.
    fn terminate(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(process = %self.spec.name, %status, "already exited");
                self.state = ProcessState::Exited(status.code());
                self.child = None;
            }
            Ok(None) => {
                if let Some(pid) = child.id() {
                    debug!(process = %self.spec.name, pid, "sending SIGTERM");
                    // SAFETY: pid belongs to a child we have not reaped yet.
                    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
                    if rc != 0 {
                        warn!(
                            process = %self.spec.name,
                            "failed to signal: {}",
                            io::Error::last_os_error()
                        );
                    }
                }
                self.state = ProcessState::Terminated;
            }
            Err(e) => warn!(process = %self.spec.name, "failed to poll: {}", e),
        }
    }

    async fn reap(&mut self) {
        if let Some(mut child) = self.child.take() {
            match child.wait().await {
                Ok(status) => {
                    debug!(process = %self.spec.name, %status, "reaped");
                    if self.state == ProcessState::Running {
                        self.state = ProcessState::Exited(status.code());
                    }
                }
                Err(e) => warn!(process = %self.spec.name, "failed to wait: {}", e),
            }
        }

        for drain in self.drains.drain(..) {
            if tokio::time::timeout(DRAIN_GRACE, drain).await.is_err() {
                warn!(process = %self.spec.name, "output drain did not finish");
            }
        }
    }
}

/// How a supervised run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    DriverExited(ExitStatus),
    Interrupted,
}

/// Owns every child of a run.
#[derive(Debug)]
pub struct Supervisor {
    log_dir: PathBuf,
    children: Vec<ChildProcess>,
    driver: Option<usize>,
    stopping: bool,
}

impl Supervisor {
    /// `log_dir` receives the captured output files.
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            children: Vec::new(),
            driver: None,
            stopping: false,
        }
    }

    pub fn children(&self) -> &[ChildProcess] {
        &self.children
    }

    pub fn state(&self, name: &str) -> ProcessState {
        self.children
            .iter()
            .find(|c| c.name() == name)
            .map(ChildProcess::state)
            .unwrap_or(ProcessState::NotStarted)
    }

    /// `<log_dir>/<name>.<stream>.log`
    pub fn log_file(&self, name: &str, stream: &str) -> PathBuf {
        self.log_dir.join(format!("{}.{}.log", name, stream))
    }

    /// Spawn a child. Returns once the process exists.
    pub fn launch(&mut self, spec: LaunchSpec, stdout: OutputMode, stderr: OutputMode) -> Result<()> {
        if self.stopping {
            return Err(StreamError::Io(io::Error::new(
                io::ErrorKind::Interrupted,
                format!("not launching {}: run is stopping", spec.name),
            )));
        }

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(stdout.stdio())
            .stderr(stderr.stdio())
            .spawn()
            .map_err(|e| StreamError::Launch {
                program: spec.program.clone(),
                source: e,
            })?;

        info!(process = %spec.name, pid = ?child.id(), program = %spec.program, "started");
        debug!(process = %spec.name, args = ?spec.args, "arguments");

        let mut drains = Vec::new();
        if let Some(out) = child.stdout.take() {
            drains.push(tokio::spawn(drain(spec.name.clone(), out, stdout)));
        }
        if let Some(err) = child.stderr.take() {
            drains.push(tokio::spawn(drain(spec.name.clone(), err, stderr)));
        }

        self.children.push(ChildProcess {
            spec,
            child: Some(child),
            state: ProcessState::Running,
            drains,
        });
        Ok(())
    }

    /// Launch a helper whose output is captured to files.
    pub fn launch_passenger(&mut self, spec: LaunchSpec) -> Result<()> {
        let stdout = OutputMode::File(self.log_file(&spec.name, "stdout"));
        let stderr = OutputMode::File(self.log_file(&spec.name, "stderr"));
        self.launch(spec, stdout, stderr)
    }

    /// Launch the child whose exit ends the run.
    pub fn launch_driver(&mut self, spec: LaunchSpec) -> Result<()> {
        let stderr = OutputMode::File(self.log_file(&spec.name, "stderr"));
        self.launch(spec, OutputMode::Trace, stderr)?;
        self.driver = Some(self.children.len() - 1);
        Ok(())
    }

    /// Wait until the driver exits or `interrupt` completes, then stop
    /// everything still running.
    pub async fn wait_for_driver<F>(&mut self, interrupt: F) -> Result<RunOutcome>
    where
        F: Future,
    {
        let Some(index) = self.driver else {
            return Err(StreamError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "no driver process launched",
            )));
        };
        let Some(driver) = self.children[index].child.as_mut() else {
            self.stop_all();
            return Ok(RunOutcome::Interrupted);
        };

        let outcome = tokio::select! {
            status = driver.wait() => RunOutcome::DriverExited(status?),
            _ = interrupt => RunOutcome::Interrupted,
        };

        if let RunOutcome::DriverExited(status) = outcome {
            let driver = &mut self.children[index];
            info!(process = %driver.name(), %status, "driver exited");
            driver.state = ProcessState::Exited(status.code());
            driver.child = None;
        }

        self.stop_all();
        Ok(outcome)
    }

    /// Terminate every child still running. Safe before any launch and safe
    /// to call repeatedly; only the first call signals.
    pub fn stop_all(&mut self) {
        if self.stopping {
            return;
        }
        self.stopping = true;

        debug!(children = self.children.len(), "stopping child processes");
        for child in &mut self.children {
            child.terminate();
        }
    }

    /// Stop everything, reap every child and finish draining its output.
    pub async fn shutdown(&mut self) {
        self.stop_all();
        for child in &mut self.children {
            child.reap().await;
        }
        debug!("child processes stopped");
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.stop_all();
    }
}

async fn drain<R>(name: String, stream: R, mode: OutputMode)
where
    R: AsyncRead + Unpin,
{
    let result = match &mode {
        OutputMode::Discard => Ok(()),
        OutputMode::File(path) => drain_to_file(stream, path).await,
        OutputMode::Trace => drain_to_log(&name, stream).await,
    };

    match result {
        Ok(()) => debug!(process = %name, ?mode, "output closed"),
        Err(e) => warn!(process = %name, "stopped draining output: {}", e),
    }
}

async fn drain_to_file<R>(mut stream: R, path: &Path) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut file = tokio::fs::File::create(path).await?;
    tokio::io::copy(&mut stream, &mut file).await?;
    Ok(())
}

async fn drain_to_log<R>(name: &str, stream: R) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Some(line) = lines.next_line().await? {
        debug!(process = %name, "{}", line);
    }
    Ok(())
}
