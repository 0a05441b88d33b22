//! `publish <stream_prefix>`: capture the camera and publish it.

use std::future::Future;

use streamconf::StreamToolConfig;
use tracing::info;

use super::session::{Prepared, Session};
use crate::client_config::{compose_producer_config, resolve_resolution, ComposeEnv, StatGathering};
use crate::error::Result;
use crate::identity::{compose_producer_signing_identity, IdentityStore};
use crate::launch::{capture_command, client_command, preview_command, ClientInvocation};
use crate::options::PublishOptions;
use crate::policy::compose_producer_policy;
use crate::preflight::check_forwarder;
use crate::stats::{stat_id, PRODUCER_METRICS};
use crate::supervisor::RunOutcome;
use crate::workspace::{RunContext, RUN_DIR_PREFIX};

/// Name of the generated producer config in the run directory.
pub const PRODUCER_CONFIG_FILE: &str = "producer.cfg";
/// Pipe the client reads captured frames from.
pub const SOURCE_PIPE: &str = "source";
/// Pipe the preview reads captured frames from.
pub const PREVIEW_PIPE: &str = "preview";

pub async fn publish<F>(
    options: &PublishOptions,
    settings: &StreamToolConfig,
    store: &dyn IdentityStore,
    interrupt: F,
) -> Result<RunOutcome>
where
    F: Future,
{
    tokio::pin!(interrupt);

    let prepared = tokio::select! {
        prepared = prepare(options, settings, store) => prepared?,
        _ = &mut interrupt => {
            info!("interrupted during setup");
            return Ok(RunOutcome::Interrupted);
        }
    };

    prepared.supervise(interrupt).await
}

async fn prepare(
    options: &PublishOptions,
    settings: &StreamToolConfig,
    store: &dyn IdentityStore,
) -> Result<Prepared> {
    let common = &options.common;
    let resolution = resolve_resolution(
        common.video_size.as_deref(),
        &settings.client.default_resolution,
    )?;

    if settings.client.check_forwarder {
        check_forwarder(&settings.tools.nfd_status).await?;
    }

    let identity = compose_producer_signing_identity(common, store).await?;
    info!(identity = %identity, prefix = %common.stream_prefix, %resolution, "publishing");

    let mut session = Session::new(RunContext::create(RUN_DIR_PREFIX)?);
    let source_pipe = session.run_mut().create_pipe(SOURCE_PIPE)?;
    let preview_pipe = session.run_mut().create_pipe(PREVIEW_PIPE)?;

    let run_dir = session.run().path().to_path_buf();
    let env = ComposeEnv {
        run_dir: &run_dir,
        client: &settings.client,
        media_pipe: source_pipe.clone(),
        resolution,
        stats: StatGathering::new(stat_id(&settings.client.stat_prefix), PRODUCER_METRICS),
    };
    let config = compose_producer_config(options, &env)?;
    let config_path = session.run().file(PRODUCER_CONFIG_FILE);
    config.write_to(&config_path)?;

    let policy = compose_producer_policy(common, &run_dir)?;

    let overlay = session.start_overlay(
        &config,
        format!("publishing {}", common.stream_prefix),
        settings,
    )?;

    let preview = preview_command(
        &settings.tools,
        &settings.preview,
        &settings.capture,
        &overlay,
        &preview_pipe,
        resolution,
    );
    let capture = capture_command(
        &settings.tools,
        &settings.capture,
        resolution,
        &source_pipe,
        &preview_pipe,
    );
    let client = client_command(
        &settings.tools,
        &ClientInvocation {
            config_file: &config_path,
            identity: Some(&identity),
            policy: policy.path(),
            run_time: settings.client.run_time,
            instance_name: &settings.client.instance_name,
        },
    );

    Ok(Prepared {
        session,
        passengers: vec![preview, capture],
        driver: client,
    })
}
