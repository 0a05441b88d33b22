//! `fetch <stream_prefix>`: consume a stream and preview it.

use std::future::Future;

use streamconf::StreamToolConfig;
use tracing::{debug, info};

use super::session::{Prepared, Session};
use crate::client_config::{
    compose_consumer_config, resolve_resolution, ComposeEnv, StatGathering,
};
use crate::error::Result;
use crate::identity::{resolve_fetch_identity, IdentityStore};
use crate::launch::{client_command, preview_command, ClientInvocation};
use crate::options::FetchOptions;
use crate::policy::compose_consumer_policy;
use crate::preflight::check_forwarder;
use crate::stats::{stat_id, CONSUMER_METRICS};
use crate::supervisor::RunOutcome;
use crate::workspace::{RunContext, RUN_DIR_PREFIX};

/// Name of the generated consumer config in the run directory.
pub const CONSUMER_CONFIG_FILE: &str = "consumer.cfg";
/// Sink base name; the client writes frames to `sink.WIDTHxHEIGHT`.
pub const SINK_NAME: &str = "sink";

pub async fn fetch<F>(
    options: &FetchOptions,
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
    options: &FetchOptions,
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

    let mut session = Session::new(RunContext::create(RUN_DIR_PREFIX)?);
    let sink_pipe = session
        .run_mut()
        .create_pipe(&format!("{}.{}", SINK_NAME, resolution))?;

    let run_dir = session.run().path().to_path_buf();
    let env = ComposeEnv {
        run_dir: &run_dir,
        client: &settings.client,
        media_pipe: run_dir.join(SINK_NAME),
        resolution,
        stats: StatGathering::new(stat_id(&settings.client.stat_prefix), CONSUMER_METRICS),
    };
    let (config, base_prefix) = compose_consumer_config(options, &env)?;
    let config_path = session.run().file(CONSUMER_CONFIG_FILE);
    config.write_to(&config_path)?;
    info!(base_prefix = %base_prefix, %resolution, "fetching");

    let policy = compose_consumer_policy(options, store, &run_dir).await?;
    let identity = resolve_fetch_identity(common, store).await?;
    debug!(identity = ?identity, policy = %policy.path().display(), "trust settings");

    let overlay = session.start_overlay(&config, format!("fetching {}", base_prefix), settings)?;

    let preview = preview_command(
        &settings.tools,
        &settings.preview,
        &settings.capture,
        &overlay,
        &sink_pipe,
        resolution,
    );
    let client = client_command(
        &settings.tools,
        &ClientInvocation {
            config_file: &config_path,
            identity: identity.as_deref(),
            policy: policy.path(),
            run_time: settings.client.run_time,
            instance_name: &settings.client.instance_name,
        },
    );

    Ok(Prepared {
        session,
        passengers: vec![preview],
        driver: client,
    })
}
