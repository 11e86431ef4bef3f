//! Call monitoring daemon: reads call state events, tracks each call with a
//! [`callmon::CallSession`] and appends the finished records to the daily call
//! log.

pub mod config;
pub mod events;
pub mod monitor;
pub mod telemetry;

use callmon::cell::NoCellInfo;
use callmon::{
    CellInfoProvider, DailyCsvSink, ManualClock, SessionContext, SystemClock,
    TracingDiagnostics,
};
use callmon_modem::ModemCellInfo;
use color_eyre::eyre::{Result, WrapErr};
use config::{Config, EventSource};
use monitor::CallMonitor;
use std::fs::File;
use std::io::{self, BufReader};
use std::sync::Arc;
use tokio::signal::unix::{self, SignalKind};
use tracing::{info, warn};

type Provider = Box<dyn CellInfoProvider + Send>;

/// Runs until the event source is exhausted or a termination signal arrives.
pub async fn run(config: Config) -> Result<()> {
    let provider: Provider = match &config.modem {
        Some(modem) => {
            info!(device = %modem.device, "using modem for cell information");
            Box::new(ModemCellInfo::open(modem)?)
        }
        None => {
            warn!("no modem configured, cells will be recorded as unknown");
            Box::new(NoCellInfo)
        }
    };
    let sink = DailyCsvSink::new(&config.log_dir);
    info!(dir = %sink.dir().display(), "writing call records");

    let monitor = if config.replay {
        let clock = Arc::new(ManualClock::new(0));
        let ctx = SessionContext::new(clock.clone(), Arc::new(TracingDiagnostics));
        CallMonitor::new(ctx, provider, sink).with_replay_clock(clock)
    } else {
        let ctx = SessionContext::new(Arc::new(SystemClock), Arc::new(TracingDiagnostics));
        CallMonitor::new(ctx, provider, sink)
    };
    let monitor = monitor.with_json_echo(config.json);

    let events = config.events.clone();
    let task = tokio::task::spawn_blocking(move || run_blocking(monitor, &events));

    let mut sigterm = unix::signal(SignalKind::terminate())?;
    let mut sigint = unix::signal(SignalKind::interrupt())?;

    tokio::select! {
        result = task => {
            let records = result.wrap_err("event loop panicked")??;
            info!(records, "event source exhausted");
        }
        _ = sigterm.recv() => warn!("received SIGTERM"),
        _ = sigint.recv()  => warn!("received SIGINT"),
    }

    Ok(())
}

fn run_blocking(
    mut monitor: CallMonitor<Provider, DailyCsvSink>,
    events: &EventSource,
) -> Result<usize> {
    match events {
        EventSource::Stdin => monitor.run(io::stdin().lock()),
        EventSource::File(path) => {
            let file = File::open(path).wrap_err_with(|| {
                format!("Failed to open event file '{}'", path.display())
            })?;
            monitor.run(BufReader::new(file))
        }
    }
}
