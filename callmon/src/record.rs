//! Flat, fixed-order representation of an ended call.

use crate::cell::{CellIdentity, CellIdentityParseError};
use crate::session::{
    CallDirection, CallSession, ClockAnomaly, DisconnectionSide, LifecycleError,
    Operation, SignalStrength,
};
use serde::Serialize;
use std::str::FromStr;

pub const FIELD_DELIMITER: char = ',';
pub const RECORD_DELIMITER: char = '\n';
pub const FIELD_COUNT: usize = 12;

pub const RECORD_HEADER: &str = "direction,prefix,duration,time_to_alert,\
time_to_connect,disconnection_side,disconnection_cause,start_cell,\
start_signal,end_cell,end_signal,srvcc_elapsed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRecord {
    pub direction: CallDirection,
    pub prefix: String,
    pub duration: u64,
    pub time_to_alert: u64,
    pub time_to_connect: u64,
    pub disconnection_side: DisconnectionSide,
    pub disconnection_cause: String,
    pub start_cell: CellIdentity,
    pub start_signal: SignalStrength,
    pub end_cell: CellIdentity,
    pub end_signal: SignalStrength,
    pub srvcc_elapsed: u64,
    /// Not part of the line, travels alongside it.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub anomalies: Vec<ClockAnomaly>,
}

impl CallRecord {
    pub fn from_session(session: &CallSession) -> Result<Self, LifecycleError> {
        let not_ended = LifecycleError::NotEnded(Operation::Record);
        let metrics = session.metrics().ok_or(not_ended)?;
        let end_cell = session.end_cell().ok_or(not_ended)?;

        Ok(Self {
            direction: session.direction(),
            prefix: session.msisdn_prefix().unwrap_or_default().to_owned(),
            duration: metrics.duration,
            time_to_alert: metrics.time_to_alert,
            time_to_connect: metrics.time_to_connect,
            disconnection_side: session.disconnection_side(),
            disconnection_cause: session.disconnection_cause().to_owned(),
            start_cell: session.start_cell().clone(),
            start_signal: session.start_signal(),
            end_cell: end_cell.clone(),
            end_signal: session.end_signal(),
            srvcc_elapsed: metrics.srvcc_elapsed,
            anomalies: metrics.anomalies,
        })
    }

    pub fn fields(&self) -> [String; FIELD_COUNT] {
        [
            self.direction.to_string(),
            self.prefix.clone(),
            self.duration.to_string(),
            self.time_to_alert.to_string(),
            self.time_to_connect.to_string(),
            self.disconnection_side.to_string(),
            self.disconnection_cause.clone(),
            self.start_cell.to_string(),
            self.start_signal.to_string(),
            self.end_cell.to_string(),
            self.end_signal.to_string(),
            self.srvcc_elapsed.to_string(),
        ]
    }

    /// The record as one line, record delimiter included.
    pub fn to_line(&self) -> String {
        let mut line = self.fields().join(&FIELD_DELIMITER.to_string());
        line.push(RECORD_DELIMITER);
        line
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RecordParseError {
    #[error("expected {expected} fields, found {0}", expected = FIELD_COUNT)]
    FieldCount(usize),

    #[error("invalid {field} value {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("invalid {field}")]
    Cell {
        field: &'static str,
        #[source]
        source: CellIdentityParseError,
    },
}

impl FromStr for CallRecord {
    type Err = RecordParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.strip_suffix(RECORD_DELIMITER).unwrap_or(s);
        let line = line.strip_suffix('\r').unwrap_or(line);
        let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
        let [
            direction,
            prefix,
            duration,
            time_to_alert,
            time_to_connect,
            side,
            cause,
            start_cell,
            start_signal,
            end_cell,
            end_signal,
            srvcc_elapsed,
        ] = fields[..]
        else {
            return Err(RecordParseError::FieldCount(fields.len()));
        };

        Ok(Self {
            direction: parse_field("direction", direction)?,
            prefix: prefix.to_owned(),
            duration: parse_field("duration", duration)?,
            time_to_alert: parse_field("time_to_alert", time_to_alert)?,
            time_to_connect: parse_field("time_to_connect", time_to_connect)?,
            disconnection_side: parse_field("disconnection_side", side)?,
            disconnection_cause: cause.to_owned(),
            start_cell: parse_cell("start_cell", start_cell)?,
            start_signal: parse_field("start_signal", start_signal)?,
            end_cell: parse_cell("end_cell", end_cell)?,
            end_signal: parse_field("end_signal", end_signal)?,
            srvcc_elapsed: parse_field("srvcc_elapsed", srvcc_elapsed)?,
            anomalies: Vec::new(),
        })
    }
}

fn parse_field<T: FromStr>(
    field: &'static str,
    value: &str,
) -> Result<T, RecordParseError> {
    value.parse().map_err(|_| RecordParseError::InvalidField {
        field,
        value: value.to_owned(),
    })
}

fn parse_cell(
    field: &'static str,
    value: &str,
) -> Result<CellIdentity, RecordParseError> {
    value
        .parse()
        .map_err(|source| RecordParseError::Cell { field, source })
}

/// Replaces record and field delimiters with spaces.
pub(crate) fn sanitize_field(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            FIELD_DELIMITER | RECORD_DELIMITER | '\r' => ' ',
            c => c,
        })
        .collect()
}
