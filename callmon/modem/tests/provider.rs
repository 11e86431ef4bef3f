use callmon::cell::{CellInfo, CellInfoProvider, CellLocation, GsmLocation, LteCell};
use callmon::diagnostics::CollectingDiagnostics;
use callmon::{resolve, CellIdentity, SignalStrength};
use callmon_modem::{AtModem, AtPort, ModemCellInfo, ModemConfig};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use test_log::test;

/// Answers each written command line from a script, unknown commands get `ERROR`.
#[derive(Clone, Default)]
struct ScriptedPort {
    replies: HashMap<&'static str, &'static str>,
    pending: Arc<Mutex<VecDeque<u8>>>,
    written: Arc<Mutex<Vec<String>>>,
}

impl ScriptedPort {
    fn new(replies: &[(&'static str, &'static str)]) -> Self {
        Self {
            replies: replies.iter().copied().collect(),
            ..Self::default()
        }
    }

    fn written(&self) -> Vec<String> {
        self.written.lock().unwrap().clone()
    }

    /// Queues bytes as if the modem sent them after the reader gave up.
    fn push_late_reply(&self, reply: &str) {
        self.pending.lock().unwrap().extend(reply.bytes());
    }
}

impl AtPort for ScriptedPort {
    fn discard_input(&mut self) -> io::Result<()> {
        self.pending.lock().unwrap().clear();
        Ok(())
    }
}

impl Write for ScriptedPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let command = String::from_utf8_lossy(buf).trim().to_owned();
        let reply = self.replies.get(command.as_str()).copied().unwrap_or("\r\nERROR\r\n");
        // echo first, like a modem with ATE1
        let mut pending = self.pending.lock().unwrap();
        pending.extend(format!("{command}\r\n").bytes());
        pending.extend(reply.bytes());
        self.written.lock().unwrap().push(command);

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for ScriptedPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut pending = self.pending.lock().unwrap();
        if pending.is_empty() {
            return Err(io::ErrorKind::TimedOut.into());
        }
        // dribble the reply in small chunks
        let n = buf.len().min(pending.len()).min(7);
        for (slot, byte) in buf.iter_mut().zip(pending.drain(..n)) {
            *slot = byte;
        }

        Ok(n)
    }
}

fn config() -> ModemConfig {
    ModemConfig {
        timeout: Duration::from_millis(50),
        retries: 1,
        retry_delay: Duration::ZERO,
        ..ModemConfig::default()
    }
}

fn provider(port: &ScriptedPort) -> ModemCellInfo<ScriptedPort> {
    ModemCellInfo::new(AtModem::new(port.clone(), &config()))
}

const LTE_SERVING: &str = "\r\n+QENG: \"servingcell\",\"NOCONN\",\"LTE\",\"FDD\",214,07,\"3473C2F\",301,6300,20,5,5,\"4B0\",-95,-13,-70,25,99\r\n\r\nOK\r\n";
const LTE_NEIGHBOURS: &str = "\r\n+QENG: \"neighbourcell intra\",\"LTE\",6300,12,-10,-99,-70,3,37,7,16\r\n\r\nOK\r\n";

#[test]
fn serving_cell_comes_first() {
    // Arrange
    let port = ScriptedPort::new(&[
        ("AT+QENG=\"servingcell\"", LTE_SERVING),
        ("AT+QENG=\"neighbourcell\"", LTE_NEIGHBOURS),
    ]);
    let modem = provider(&port);

    // Act
    let cells = modem.visible_cells().unwrap();

    // Assert
    assert_eq!(cells.len(), 2);
    assert_eq!(
        cells[1],
        CellInfo::Lte(LteCell {
            pci: Some(12),
            ..LteCell::default()
        })
    );
    let identity = resolve(&modem, &CollectingDiagnostics::new());
    assert_eq!(identity.to_string(), "LTE_214_07_1200_55000111_301");
}

#[test]
fn searching_modem_yields_empty_list_and_legacy_fallback() {
    // Arrange
    let port = ScriptedPort::new(&[
        ("AT+QENG=\"servingcell\"", "\r\n+QENG: \"servingcell\",\"SEARCH\"\r\n\r\nOK\r\n"),
        ("AT+COPS=3,2", "\r\nOK\r\n"),
        ("AT+COPS?", "\r\n+COPS: 0,2,\"21407\",2\r\n\r\nOK\r\n"),
        ("AT+CREG=2", "\r\nOK\r\n"),
        ("AT+CREG?", "\r\n+CREG: 2,1,\"0064\",\"7D0\",2\r\n\r\nOK\r\n"),
    ]);
    let modem = provider(&port);

    // Act
    let cells = modem.visible_cells();
    let identity = resolve(&modem, &CollectingDiagnostics::new());

    // Assert
    assert_eq!(cells, Some(vec![]));
    assert_eq!(
        modem.cell_location(),
        Some(CellLocation::Gsm(GsmLocation {
            lac: 100,
            cell_id: 2000
        }))
    );
    assert_eq!(identity.to_string(), "LEGACY-GSM_214_07_100_2000");
}

#[test]
fn failing_commands_are_retried_then_give_up() {
    // Arrange
    let port = ScriptedPort::new(&[]);
    let modem = provider(&port);

    // Act
    let cells = modem.visible_cells();
    let identity = resolve(&modem, &CollectingDiagnostics::new());

    // Assert
    assert_eq!(cells, None);
    assert_eq!(identity, CellIdentity::Unknown);
    let attempts = port
        .written()
        .iter()
        .filter(|c| c.as_str() == "AT+QENG=\"servingcell\"")
        .count();
    assert_eq!(attempts, 4);
}

#[test]
fn signal_strength_reads_csq() {
    let port = ScriptedPort::new(&[("AT+CSQ", "\r\n+CSQ: 17,99\r\n\r\nOK\r\n")]);

    assert_eq!(provider(&port).signal_strength(), SignalStrength(17));
    assert_eq!(
        provider(&ScriptedPort::new(&[])).signal_strength(),
        SignalStrength::UNKNOWN
    );
}

#[test]
fn late_replies_are_not_taken_for_the_next_answer() {
    // Arrange
    let port = ScriptedPort::new(&[
        ("AT+CREG=2", "\r\nOK\r\n"),
        ("AT+CREG?", "\r\n+CREG: 2,1,\"0064\",\"7D0\",2\r\n\r\nOK\r\n"),
    ]);
    let modem = provider(&port);
    port.push_late_reply("\r\n+CREG: 2,1,\"FFFF\",\"1\",2\r\n\r\nOK\r\n");

    // Act
    let location = modem.cell_location();

    // Assert
    assert_eq!(
        location,
        Some(CellLocation::Gsm(GsmLocation {
            lac: 100,
            cell_id: 2000
        }))
    );
}
