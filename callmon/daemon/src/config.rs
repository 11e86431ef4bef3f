use callmon_modem::ModemConfig;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Cell information source, no modem means no cell information.
    pub modem: Option<ModemConfig>,

    /// Directory of the daily call logs.
    pub log_dir: PathBuf,

    pub events: EventSource,

    /// Take time from event timestamps instead of the system clock.
    pub replay: bool,

    /// Print each record as JSON on stdout.
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSource {
    Stdin,
    File(PathBuf),
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Self {
        let modem = cli.modem.as_ref().map(|device| ModemConfig {
            device: device.clone(),
            baud_rate: cli.baud_rate,
            timeout: Duration::from_millis(cli.at_timeout_ms),
            retries: cli.at_retries,
            ..ModemConfig::default()
        });

        let events = match cli.events.as_deref() {
            None | Some("-") => EventSource::Stdin,
            Some(path) => EventSource::File(PathBuf::from(path)),
        };

        Self {
            modem,
            log_dir: cli.log_dir.clone(),
            events,
            replay: cli.replay,
            json: cli.json,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[arg(
        short = 'm',
        long = "modem",
        env = "CALLMON_MODEM",
        help = "AT port of the modem, e.g. /dev/ttyUSB2"
    )]
    pub modem: Option<String>,

    #[arg(long = "baud-rate", default_value = "115200", help = "Baud rate of the AT port")]
    pub baud_rate: u32,

    #[arg(
        long = "at-timeout-ms",
        default_value = "5000",
        help = "Timeout of a single AT command attempt"
    )]
    pub at_timeout_ms: u64,

    #[arg(long = "at-retries", default_value = "3", help = "Retries per AT command")]
    pub at_retries: usize,

    #[arg(
        short = 'd',
        long = "log-dir",
        env = "CALLMON_LOG_DIR",
        default_value = "/var/log/callmon",
        help = "Directory of the daily call logs"
    )]
    pub log_dir: PathBuf,

    #[arg(
        short = 'e',
        long = "events",
        help = "File to read call events from, stdin when absent or '-'"
    )]
    pub events: Option<String>,

    #[arg(long = "replay", help = "Use event timestamps as the clock")]
    pub replay: bool,

    #[arg(long = "json", help = "Also print every call record as JSON on stdout")]
    pub json: bool,
}
