//! The part of a run shared by `publish` and `fetch`: overlay, children,
//! supervision and cleanup.

use std::future::Future;
use std::path::PathBuf;

use streamconf::StreamToolConfig;
use tracing::{debug, info, warn};

use crate::client_config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::launch::LaunchSpec;
use crate::stats::{self, OverlayState, StatTail, TailTimings};
use crate::supervisor::{RunOutcome, Supervisor};
use crate::workspace::RunContext;

/// A session together with the children it is about to start.
pub struct Prepared {
    pub session: Session,
    pub passengers: Vec<LaunchSpec>,
    pub driver: LaunchSpec,
}

impl Prepared {
    pub async fn supervise<F>(self, interrupt: F) -> Result<RunOutcome>
    where
        F: Future,
    {
        self.session
            .supervise(self.passengers, self.driver, interrupt)
            .await
    }
}

/// A prepared run directory plus everything started inside it.
pub struct Session {
    run: RunContext,
    supervisor: Supervisor,
    tail: Option<StatTail>,
}

impl Session {
    pub fn new(run: RunContext) -> Self {
        let supervisor = Supervisor::new(run.path());
        Self {
            run,
            supervisor,
            tail: None,
        }
    }

    pub fn run(&self) -> &RunContext {
        &self.run
    }

    pub fn run_mut(&mut self) -> &mut RunContext {
        &mut self.run
    }

    /// Write the initial overlay and, when the client reports statistics,
    /// start tailing them. Returns the overlay path for the preview.
    pub fn start_overlay(
        &mut self,
        config: &StreamConfig,
        caption: String,
        settings: &StreamToolConfig,
    ) -> Result<PathBuf> {
        let overlay_path = self.run.file(&settings.overlay.file_name);
        let metrics = config
            .stats()
            .map(|s| s.statistics.clone())
            .unwrap_or_default();
        let overlay = OverlayState::new(&overlay_path, caption, metrics);

        match config.stat_file(self.run.path()) {
            Some(stat_file) => {
                let tail = stats::start_overlay(overlay, stat_file, TailTimings::from(&settings.tail))
                    .map_err(|e| StreamError::workspace("failed to start overlay", &overlay_path, e))?;
                self.tail = Some(tail);
            }
            None => {
                info!("client config gathers no statistics, overlay stays static");
                overlay
                    .write()
                    .map_err(|e| StreamError::workspace("failed to write overlay", &overlay_path, e))?;
            }
        }

        Ok(overlay_path)
    }

    /// Start the passengers in order, then the driver.
    pub fn launch(&mut self, passengers: Vec<LaunchSpec>, driver: LaunchSpec) -> Result<()> {
        for spec in passengers {
            self.supervisor.launch_passenger(spec)?;
        }
        self.supervisor.launch_driver(driver)
    }

    /// Launch, wait for the driver or `interrupt`, then tear everything down.
    ///
    /// Children already started are stopped even when a later launch fails.
    pub async fn supervise<F>(
        mut self,
        passengers: Vec<LaunchSpec>,
        driver: LaunchSpec,
        interrupt: F,
    ) -> Result<RunOutcome>
    where
        F: Future,
    {
        let result = match self.launch(passengers, driver) {
            Ok(()) => self.supervisor.wait_for_driver(interrupt).await,
            Err(e) => Err(e),
        };
        self.finish().await;
        result
    }

    /// Stop children and the tail, then remove the run directory.
    pub async fn finish(mut self) {
        self.supervisor.shutdown().await;
        if let Some(tail) = self.tail.take() {
            stop_tail(tail).await;
        }
        debug!(path = %self.run.path().display(), "cleaning up");
        self.run.teardown();
    }
}

/// Join the tail thread off the async workers.
async fn stop_tail(mut tail: StatTail) {
    if let Err(e) = tokio::task::spawn_blocking(move || tail.stop()).await {
        warn!("stat tail shutdown failed: {}", e);
    }
}
