//! ndnrtc-stream - publish and fetch real-time video over NDN.
//!
//! The crate does no encoding or networking itself. It wires together the
//! NDN streaming client (`ndnrtc-client`), a camera capture tool (`ffmpeg`)
//! and a preview tool (`ffplay`) through named pipes, a generated client
//! config and trust policy, and keeps a live statistics overlay on the
//! preview.
//!
//! - [`workspace`]: per-run directory and named pipes
//! - [`client_config`]: client config model, parser and composition
//! - [`policy`]: trust policy selection
//! - [`identity`]: signing identities via `ndnsec`
//! - [`supervisor`]: child processes and shutdown
//! - [`stats`]: stat file tail and overlay rendering
//! - [`commands`]: the `publish` and `fetch` runs

pub mod client_config;
pub mod commands;
pub mod error;
pub mod identity;
pub mod launch;
pub mod options;
pub mod policy;
pub mod preflight;
pub mod stats;
pub mod supervisor;
pub mod workspace;

pub use error::{ConfigError, Result, StreamError};
pub use options::{FetchOptions, PublishOptions, Resolution, StreamOptions};
pub use supervisor::RunOutcome;
