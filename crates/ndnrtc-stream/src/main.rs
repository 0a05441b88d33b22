//! ndnrtc-stream - publish and fetch real-time video over NDN
//!
//! Subcommands:
//! - `ndnrtc-stream publish <stream_prefix>` - capture the camera and publish it
//! - `ndnrtc-stream fetch <stream_prefix>` - fetch a stream and preview it

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use streamconf::StreamToolConfig;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use ndnrtc_stream::commands;
use ndnrtc_stream::identity::Ndnsec;
use ndnrtc_stream::{FetchOptions, PublishOptions, RunOutcome, StreamOptions};

#[derive(Parser)]
#[command(name = "ndnrtc-stream")]
#[command(about = "Publish and fetch real-time video over NDN")]
#[command(version)]
#[command(after_help = "Examples:\n  ndnrtc-stream publish /ndnrtc/first-stream\n  ndnrtc-stream fetch /ndnrtc/first-stream")]
struct Cli {
    /// Debug logging, and verbose client logs
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file replacing ./ndnrtc-stream.toml
    #[arg(long, global = true, value_name = "PATH", env = "NDNRTC_STREAM_SETTINGS")]
    settings: Option<PathBuf>,

    /// Print the effective settings and where they came from, then exit
    #[arg(long)]
    print_settings: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture the camera and publish it under a prefix
    Publish {
        #[command(flatten)]
        stream: StreamArgs,
    },

    /// Fetch a stream published under a prefix and preview it
    Fetch {
        #[command(flatten)]
        stream: StreamArgs,

        /// Certificate to trust as the stream's anchor
        #[arg(long, value_name = "FILE")]
        cert: Option<PathBuf>,
    },
}

#[derive(Args)]
struct StreamArgs {
    /// Stream prefix, e.g. /ndnrtc/first-stream
    stream_prefix: String,

    /// NDN identity used to sign data (default identity when omitted)
    #[arg(short, long)]
    identity: Option<String>,

    /// Video resolution, WIDTHxHEIGHT
    #[arg(short = 's', long, value_name = "WxH")]
    video_size: Option<String>,

    /// Target encoding bitrate in Kbps
    #[arg(short, long)]
    bitrate: Option<u32>,

    /// ndnrtc-client config file, used instead of the generated one
    #[arg(short, long, value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Trust schema verification policy
    #[arg(short, long, value_name = "FILE")]
    trust_schema: Option<PathBuf>,

    /// Stream name inside the client config
    #[arg(short = 'n', long)]
    stream_name: Option<String>,

    /// Encoding thread to publish or fetch
    #[arg(long)]
    thread: Option<String>,
}

impl StreamArgs {
    fn into_options(self, verbose: bool) -> StreamOptions {
        StreamOptions {
            stream_prefix: self.stream_prefix,
            identity: self.identity,
            video_size: self.video_size,
            bitrate: self.bitrate,
            config_file: self.config_file,
            trust_schema: self.trust_schema,
            stream_name: self.stream_name,
            thread: self.thread,
            verbose,
        }
    }
}

fn init_tracing(verbose: bool, level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { level }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_settings(settings: Option<&std::path::Path>) -> Result<()> {
    let (config, sources) = StreamToolConfig::load_with_sources_from(settings)
        .context("failed to load settings")?;

    if sources.files.is_empty() {
        println!("# no settings files found, using defaults");
    }
    for file in &sources.files {
        println!("# from {}", file.display());
    }
    for var in &sources.env_overrides {
        println!("# env {}", var);
    }
    println!("{}", config.to_toml()?);
    Ok(())
}

async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_settings {
        return print_settings(cli.settings.as_deref());
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        bail!("a subcommand is required");
    };

    let settings = StreamToolConfig::load_from(cli.settings.as_deref())
        .context("failed to load settings")?;
    init_tracing(cli.verbose, &settings.log.level);

    let store = Ndnsec::new(settings.tools.ndnsec.as_str());

    let outcome = match command {
        Commands::Publish { stream } => {
            let options = PublishOptions {
                common: stream.into_options(cli.verbose),
            };
            debug!("cli options: {}", serde_json::to_string_pretty(&options)?);
            commands::publish(&options, &settings, &store, interrupted())
                .await
                .with_context(|| format!("publish {} failed", options.common.stream_prefix))?
        }
        Commands::Fetch { stream, cert } => {
            let options = FetchOptions {
                common: stream.into_options(cli.verbose),
                certificate: cert,
            };
            debug!("cli options: {}", serde_json::to_string_pretty(&options)?);
            commands::fetch(&options, &settings, &store, interrupted())
                .await
                .with_context(|| format!("fetch {} failed", options.common.stream_prefix))?
        }
    };

    match outcome {
        RunOutcome::Interrupted => {
            warn!("caught stop signal, child processes stopped");
            eprintln!("stopped");
        }
        RunOutcome::DriverExited(status) if status.success() => {
            info!("streaming client finished");
        }
        RunOutcome::DriverExited(status) => {
            bail!("{} exited with {}", settings.tools.ndnrtc_client, status);
        }
    }

    Ok(())
}
