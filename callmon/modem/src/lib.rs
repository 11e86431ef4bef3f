//! [`CellInfoProvider`] backed by a Quectel EC2x modem AT port.

mod at;
pub mod parser;

pub use at::{AtModem, AtPort};

use callmon::cell::{CellInfo, CellInfoProvider, CellLocation};
use callmon::SignalStrength;
use color_eyre::eyre::Result;
use serialport::SerialPort;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModemConfig {
    pub device: String,
    pub baud_rate: u32,
    /// Per attempt.
    pub timeout: Duration,
    pub retries: usize,
    pub retry_delay: Duration,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB2".to_owned(),
            baud_rate: 115_200,
            timeout: Duration::from_secs(5),
            retries: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Answers cell queries by issuing AT commands, one at a time.
///
/// Command failures are logged and surface as "no information", the resolver
/// then falls back or degrades.
pub struct ModemCellInfo<T> {
    modem: Mutex<AtModem<T>>,
}

impl ModemCellInfo<Box<dyn SerialPort>> {
    pub fn open(config: &ModemConfig) -> Result<Self> {
        let mut modem = AtModem::open(config)?;
        modem.ensure_ready()?;

        Ok(Self::new(modem))
    }
}

impl<T: AtPort> ModemCellInfo<T> {
    pub fn new(modem: AtModem<T>) -> Self {
        Self {
            modem: Mutex::new(modem),
        }
    }

    fn query(&self, commands: &[&str]) -> Option<String> {
        let mut modem = self.modem.lock().unwrap_or_else(|e| e.into_inner());
        let mut last = None;
        for command in commands {
            match modem.command(command) {
                Ok(response) => last = Some(response),
                Err(e) => {
                    warn!(command, error = ?e, "modem query failed");
                    return None;
                }
            }
        }

        last
    }
}

impl<T: AtPort> CellInfoProvider for ModemCellInfo<T> {
    fn visible_cells(&self) -> Option<Vec<CellInfo>> {
        let response = self.query(&["AT+QENG=\"servingcell\""])?;
        let serving = match parser::parse_serving_cell(&response) {
            Ok(Some(serving)) => serving,
            Ok(None) => {
                debug!("modem has no serving cell");
                return Some(vec![]);
            }
            Err(e) => {
                warn!(error = ?e, "failed to parse serving cell");
                return None;
            }
        };

        let mut cells = vec![serving];
        if let Some(response) = self.query(&["AT+QENG=\"neighbourcell\""]) {
            cells.extend(parser::parse_neighbour_cells(&response));
        }
        debug!(cell_count = cells.len(), "visible cells");

        Some(cells)
    }

    fn network_operator(&self) -> Option<String> {
        let response = self.query(&["AT+COPS=3,2", "AT+COPS?"])?;
        parser::parse_operator(&response)
    }

    fn cell_location(&self) -> Option<CellLocation> {
        let response = self.query(&["AT+CREG=2", "AT+CREG?"])?;
        parser::parse_registration(&response).map(CellLocation::Gsm)
    }

    fn signal_strength(&self) -> SignalStrength {
        self.query(&["AT+CSQ"])
            .map_or(SignalStrength::UNKNOWN, |r| parser::parse_signal_quality(&r))
    }
}
