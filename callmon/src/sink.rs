//! Destinations for finished call records.

use crate::clock::EpochMillis;
use crate::record::{CallRecord, RECORD_DELIMITER, RECORD_HEADER};
use chrono::{DateTime, Utc};
use std::{
    fs::File,
    io::{self, ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("start time {0} cannot be mapped to a calendar day")]
    InvalidStartTime(EpochMillis),

    #[error("failed to write call record to {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Append-only target for call records.
pub trait RecordSink: Send + Sync {
    fn append(
        &self,
        record: &CallRecord,
        start_time: EpochMillis,
    ) -> Result<(), SinkError>;
}

/// Appends records to one CSV file per UTC day, `calls_<YYYY-MM-DD>.csv`.
#[derive(Debug)]
pub struct DailyCsvSink {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl DailyCsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File the record of a call started at `start_time` goes to.
    pub fn path_for(&self, start_time: EpochMillis) -> Result<PathBuf, SinkError> {
        let day = DateTime::<Utc>::from_timestamp_millis(start_time)
            .filter(|_| start_time > 0)
            .ok_or(SinkError::InvalidStartTime(start_time))?;

        Ok(self
            .dir
            .join(format!("calls_{}.csv", day.format("%Y-%m-%d"))))
    }

    fn write_line(path: &Path, line: &str) -> io::Result<()> {
        let mut file = match File::options().create_new(true).append(true).open(path)
        {
            Ok(mut file) => {
                info!(path = %path.display(), "starting new call log");
                write!(file, "{RECORD_HEADER}{RECORD_DELIMITER}")?;
                file
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                File::options().append(true).open(path)?
            }
            Err(e) => return Err(e),
        };

        file.write_all(line.as_bytes())?;
        file.flush()
    }
}

impl RecordSink for DailyCsvSink {
    fn append(
        &self,
        record: &CallRecord,
        start_time: EpochMillis,
    ) -> Result<(), SinkError> {
        let path = self.path_for(start_time)?;
        let line = record.to_line();

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        std::fs::create_dir_all(&self.dir)
            .and_then(|()| Self::write_line(&path, &line))
            .map_err(|source| SinkError::Io {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), "call record appended");

        Ok(())
    }
}

impl<S: RecordSink + ?Sized> RecordSink for std::sync::Arc<S> {
    fn append(
        &self,
        record: &CallRecord,
        start_time: EpochMillis,
    ) -> Result<(), SinkError> {
        (**self).append(record, start_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellIdentity;
    use crate::session::{CallDirection, DisconnectionSide, SignalStrength};
    use std::fs;
    use test_log::test;

    // 2024-03-01T23:59:59.500Z
    const LATE_EVENING: EpochMillis = 1_709_337_599_500;

    fn record(duration: u64) -> CallRecord {
        CallRecord {
            direction: CallDirection::Mo,
            prefix: "214070".into(),
            duration,
            time_to_alert: 2_000,
            time_to_connect: 5_000,
            disconnection_side: DisconnectionSide::Nw,
            disconnection_cause: "NORMAL".into(),
            start_cell: CellIdentity::Unknown,
            start_signal: SignalStrength(-90),
            end_cell: CellIdentity::Unknown,
            end_signal: SignalStrength(-95),
            srvcc_elapsed: 0,
            anomalies: vec![],
        }
    }

    #[test]
    fn it_partitions_by_utc_day() {
        let sink = DailyCsvSink::new("/var/log/callmon");

        assert_eq!(
            sink.path_for(LATE_EVENING).unwrap(),
            Path::new("/var/log/callmon/calls_2024-03-01.csv")
        );
        assert_eq!(
            sink.path_for(LATE_EVENING + 500).unwrap(),
            Path::new("/var/log/callmon/calls_2024-03-02.csv")
        );
    }

    #[test]
    fn it_rejects_start_times_without_a_day() {
        let sink = DailyCsvSink::new("/tmp");

        assert!(matches!(
            sink.path_for(0),
            Err(SinkError::InvalidStartTime(0))
        ));
        assert!(matches!(
            sink.path_for(i64::MAX),
            Err(SinkError::InvalidStartTime(i64::MAX))
        ));
    }

    #[test]
    fn it_appends_with_a_single_header() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let sink = DailyCsvSink::new(dir.path().join("nested/calls"));

        // Act
        sink.append(&record(15_000), LATE_EVENING).unwrap();
        sink.append(&record(16_000), LATE_EVENING - 1_000).unwrap();
        sink.append(&record(17_000), LATE_EVENING + 1_000).unwrap();

        // Assert
        let first_day = fs::read_to_string(sink.path_for(LATE_EVENING).unwrap()).unwrap();
        let lines: Vec<&str> = first_day.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], RECORD_HEADER);
        assert_eq!(lines[1].parse::<CallRecord>().unwrap(), record(15_000));
        assert_eq!(lines[2].parse::<CallRecord>().unwrap(), record(16_000));

        let next_day =
            fs::read_to_string(sink.path_for(LATE_EVENING + 1_000).unwrap()).unwrap();
        assert_eq!(next_day.lines().count(), 2);
    }

    #[test]
    fn concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let sink = std::sync::Arc::new(DailyCsvSink::new(dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for j in 0..25 {
                        sink.append(&record(i * 100 + j), LATE_EVENING).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let contents = fs::read_to_string(sink.path_for(LATE_EVENING).unwrap()).unwrap();
        let records: Vec<CallRecord> = contents
            .lines()
            .skip(1)
            .map(|line| line.parse().unwrap())
            .collect();
        assert_eq!(records.len(), 200);
    }
}
