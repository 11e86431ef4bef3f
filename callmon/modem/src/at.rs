use color_eyre::eyre::{eyre, Result, WrapErr};
use serialport::{ClearBuffer, SerialPort};
use std::{
    io::{self, ErrorKind, Read, Write},
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

use crate::ModemConfig;

/// Blocking read timeout of the serial port, responses are polled until the
/// per command timeout expires.
const PORT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Byte channel to the modem's AT interface.
pub trait AtPort: Read + Write {
    /// Drops whatever the modem sent that nobody read yet.
    fn discard_input(&mut self) -> io::Result<()>;
}

impl AtPort for Box<dyn SerialPort> {
    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

/// Line oriented AT command channel.
pub struct AtModem<T> {
    port: T,
    retries: usize,
    timeout: Duration,
    retry_delay: Duration,
}

impl AtModem<Box<dyn SerialPort>> {
    /// Opens the configured serial device.
    pub fn open(config: &ModemConfig) -> Result<Self> {
        let port = serialport::new(&config.device, config.baud_rate)
            .timeout(PORT_READ_TIMEOUT)
            .open()
            .wrap_err_with(|| format!("Failed to open serial port '{}'", config.device))?;

        Ok(Self::new(port, config))
    }
}

impl<T: AtPort> AtModem<T> {
    pub fn new(port: T, config: &ModemConfig) -> Self {
        Self {
            port,
            retries: config.retries,
            timeout: config.timeout,
            retry_delay: config.retry_delay,
        }
    }

    /// Sends a command with the configured retries and timeout.
    pub fn command(&mut self, command: &str) -> Result<String> {
        self.send_command_with_retry(command, self.retries, self.timeout)
    }

    /// Sends a command until it answers `OK` or the retries run out.
    pub fn send_command_with_retry(
        &mut self,
        command: &str,
        retries: usize,
        timeout: Duration,
    ) -> Result<String> {
        debug!(command, "sending AT command");
        let cmd = format!("{command}\r\n");
        let mut last_err = eyre!("no attempt made");

        for attempt in 0..=retries {
            if attempt > 0 {
                debug!(command, attempt, "retrying AT command");
                thread::sleep(self.retry_delay);
            }

            // late replies to an earlier attempt or command
            self.port
                .discard_input()
                .wrap_err("Failed to discard pending modem input")?;
            self.port
                .write_all(cmd.as_bytes())
                .and_then(|()| self.port.flush())
                .wrap_err_with(|| format!("Failed to write '{command}'"))?;

            match self.read_response(timeout) {
                Ok(response) => {
                    debug!(command, %response, "AT command response");
                    return Ok(response);
                }
                Err(e) => {
                    warn!(command, attempt, error = %e, "AT command failed");
                    last_err = e;
                }
            }
        }

        Err(last_err.wrap_err(format!(
            "Command '{command}' failed after {retries} retries"
        )))
    }

    /// Checks that the modem answers at all.
    pub fn ensure_ready(&mut self) -> Result<()> {
        self.send_command_with_retry("AT", 5, Duration::from_secs(1))
            .map(|_| ())
            .wrap_err("Modem not responding")
    }

    fn read_response(&mut self, timeout: Duration) -> Result<String> {
        let mut response = String::new();
        let mut buf = [0u8; 1024];
        let start = Instant::now();

        while start.elapsed() < timeout {
            match self.port.read(&mut buf) {
                Ok(n) if n > 0 => {
                    response.push_str(&String::from_utf8_lossy(&buf[..n]));
                    let verdict =
                        final_result(&response).map(|r| r.map_err(str::to_owned));
                    match verdict {
                        Some(Ok(())) => return Ok(response),
                        Some(Err(line)) => {
                            return Err(eyre!("modem answered '{line}'"));
                        }
                        None => {}
                    }
                }
                Ok(_) => thread::sleep(Duration::from_millis(10)),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {}
                Err(e) => return Err(e).wrap_err("Failed to read from port"),
            }
        }

        Err(eyre!("timed out after {timeout:?}, partial response {response:?}"))
    }
}

/// Looks for the final result code among the complete lines received so far.
fn final_result(response: &str) -> Option<Result<(), &str>> {
    let complete = &response[..response.rfind('\n')? + 1];

    complete.lines().map(str::trim).find_map(|line| match line {
        "OK" => Some(Ok(())),
        "ERROR" => Some(Err(line)),
        _ if line.starts_with("+CME ERROR") || line.starts_with("+CMS ERROR") => {
            Some(Err(line))
        }
        _ => None,
    })
}
