//! The `publish` and `fetch` runs.
//!
//! Both follow the same order: validate the resolution, probe the
//! forwarder, create the run directory and pipes, write the client config
//! and trust policy, start the overlay, then launch and supervise. Any
//! failure before launch leaves no child process behind.

mod fetch;
mod publish;
mod session;

pub use fetch::{fetch, CONSUMER_CONFIG_FILE, SINK_NAME};
pub use publish::{publish, PREVIEW_PIPE, PRODUCER_CONFIG_FILE, SOURCE_PIPE};
pub use session::{Prepared, Session};
