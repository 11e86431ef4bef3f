//! Log output of the daemon.

use std::io::IsTerminal as _;
use tracing::level_filters::LevelFilter;
use tracing_journald::Layer as JournaldLayer;
use tracing_subscriber::{
    layer::SubscriberExt as _, util::SubscriberInitExt as _, util::TryInitError,
    EnvFilter,
};

/// Installs the global subscriber, filtered by `RUST_LOG` with INFO as the
/// default level.
///
/// Under systemd (stderr is not a terminal) events go to journald tagged with
/// `syslog_identifier`, otherwise or when journald is unreachable to stderr.
pub fn init(syslog_identifier: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let journald = (!std::io::stderr().is_terminal())
        .then(|| journald(syslog_identifier))
        .flatten();
    let stderr = journald
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(journald)
        .with(stderr)
        .try_init()
}

fn journald(syslog_identifier: &str) -> Option<JournaldLayer> {
    match tracing_journald::layer() {
        Ok(layer) => Some(layer.with_syslog_identifier(syslog_identifier.to_owned())),
        Err(e) => {
            eprintln!("callmon: journald unavailable, logging to stderr: {e}");
            None
        }
    }
}
