//! Environment checks run before anything is launched.

use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, StreamError};

/// Fail unless the local NDN forwarder answers `nfd_status`.
pub async fn check_forwarder(nfd_status: &str) -> Result<()> {
    let status = Command::new(nfd_status)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|e| {
            StreamError::Preflight(format!("NFD is not running ({} failed: {})", nfd_status, e))
        })?;

    if !status.success() {
        return Err(StreamError::Preflight(format!(
            "NFD is not running ({} exited with {}); please start NFD first",
            nfd_status, status
        )));
    }

    debug!("forwarder is up");
    Ok(())
}
