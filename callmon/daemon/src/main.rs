use callmon_daemon::{
    config::{Cli, Config},
    telemetry,
};
use clap::Parser;
use color_eyre::eyre::Result;
use std::time::Duration;

const SYSLOG_IDENTIFIER: &str = "callmon";

/// A blocked read of the event source must not hold the process on exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    color_eyre::install()?;
    telemetry::init(SYSLOG_IDENTIFIER)?;

    let config = Config::from_cli(&Cli::parse());
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = rt.block_on(callmon_daemon::run(config));
    rt.shutdown_timeout(SHUTDOWN_TIMEOUT);

    result
}
