//! Lifecycle of a single call.

mod metrics;
mod shared;

pub use metrics::{ClockAnomaly, KpiMetrics, Metric, Timeline};
pub use shared::SharedSession;

use crate::cell::{self, CellIdentity, CellInfoProvider};
use crate::clock::{Clock, EpochMillis, SystemClock};
use crate::diagnostics::{Diagnostic, Diagnostics, TracingDiagnostics};
use crate::record::sanitize_field;
use derive_more::Display;
use serde::Serialize;
use std::{fmt, str::FromStr, sync::Arc};
use tracing::debug;

/// Cause reported until the telephony stack tells us otherwise.
pub const UNKNOWN_CAUSE: &str = "UNKNOWN";

const PREFIX_DIGITS: usize = 6;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallDirection {
    /// Mobile originated.
    #[display("MO")]
    #[serde(rename = "MO")]
    Mo,
    /// Mobile terminated.
    #[display("MT")]
    #[serde(rename = "MT")]
    Mt,
}

impl FromStr for CallDirection {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MO" => Ok(Self::Mo),
            "MT" => Ok(Self::Mt),
            _ => Err(ParseEnumError::new("call direction", s)),
        }
    }
}

/// Which end released the call.
#[derive(Debug, Display, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DisconnectionSide {
    #[display("UE")]
    #[serde(rename = "UE")]
    Ue,
    #[display("NW")]
    #[serde(rename = "NW")]
    Nw,
    /// E.g. the monitor ran in the background and missed the release.
    #[default]
    #[display("UNK")]
    #[serde(rename = "UNK")]
    Unknown,
}

impl FromStr for DisconnectionSide {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UE" => Ok(Self::Ue),
            "NW" => Ok(Self::Nw),
            "UNK" | "UNKNOWN" => Ok(Self::Unknown),
            _ => Err(ParseEnumError::new("disconnection side", s)),
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Signal strength as reported by the radio, `99` when unknown.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[display("{_0}")]
#[serde(transparent)]
pub struct SignalStrength(pub i32);

impl SignalStrength {
    pub const UNKNOWN: Self = Self(99);

    pub fn is_known(self) -> bool {
        self != Self::UNKNOWN
    }
}

impl Default for SignalStrength {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl FromStr for SignalStrength {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    #[display("initiated")]
    Initiated,
    #[display("alerting")]
    Alerting,
    #[display("active")]
    Active,
    #[display("ended")]
    Ended,
}

/// Lifecycle operations that can be rejected.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    #[display("mark_alerting")]
    Alerting,
    #[display("mark_active")]
    Active,
    #[display("mark_srvcc")]
    Srvcc,
    #[display("end")]
    End,
    #[display("record")]
    Record,
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("{0} called after the call ended")]
    AlreadyEnded(Operation),

    #[error("{operation} is not valid while the call is {state}")]
    InvalidTransition {
        operation: Operation,
        state: CallState,
    },

    #[error("{0} already recorded, keeping the first timestamp")]
    AlreadyRecorded(Operation),

    #[error("{0} requires an ended call")]
    NotEnded(Operation),
}

/// Collaborators shared by every session of a host.
#[derive(Clone)]
pub struct SessionContext {
    clock: Arc<dyn Clock>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl SessionContext {
    pub fn new(clock: Arc<dyn Clock>, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self { clock, diagnostics }
    }

    pub fn clock(&self) -> &dyn Clock {
        &*self.clock
    }

    pub fn diagnostics(&self) -> &dyn Diagnostics {
        &*self.diagnostics
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), Arc::new(TracingDiagnostics))
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext").finish_non_exhaustive()
    }
}

/// One call, from dial or ring until it is released.
///
/// Lifecycle marks are set-once: a repeated or out of order mark is rejected
/// with a [`LifecycleError`] and reported to diagnostics, the session state is
/// left untouched.
#[derive(Debug)]
pub struct CallSession {
    ctx: SessionContext,
    direction: CallDirection,
    msisdn_prefix: Option<String>,
    state: CallState,
    timeline: Timeline,
    start_cell: CellIdentity,
    end_cell: Option<CellIdentity>,
    start_signal: SignalStrength,
    end_signal: SignalStrength,
    disconnection_side: DisconnectionSide,
    disconnection_cause: String,
}

impl CallSession {
    /// Starts tracking a call attempt and snapshots the serving cell.
    pub fn create<P>(
        ctx: &SessionContext,
        direction: CallDirection,
        initial_signal: SignalStrength,
        provider: &P,
    ) -> Self
    where
        P: CellInfoProvider + ?Sized,
    {
        let start = ctx.clock.now();
        let start_cell = cell::resolve(provider, ctx.diagnostics());
        debug!(%direction, %start_cell, start, "call session created");

        Self {
            ctx: ctx.clone(),
            direction,
            msisdn_prefix: None,
            state: CallState::Initiated,
            timeline: Timeline::new(start),
            start_cell,
            end_cell: None,
            start_signal: initial_signal,
            end_signal: SignalStrength::UNKNOWN,
            disconnection_side: DisconnectionSide::Unknown,
            disconnection_cause: UNKNOWN_CAUSE.to_owned(),
        }
    }

    /// Far end started ringing.
    pub fn mark_alerting(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            CallState::Initiated => {
                self.timeline.alerting = Some(self.ctx.clock.now());
                self.state = CallState::Alerting;
                Ok(())
            }
            CallState::Alerting => self.reject(LifecycleError::AlreadyRecorded(
                Operation::Alerting,
            )),
            _ => self.reject_transition(Operation::Alerting),
        }
    }

    /// Call was answered.
    pub fn mark_active(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            CallState::Initiated | CallState::Alerting => {
                self.timeline.active = Some(self.ctx.clock.now());
                self.state = CallState::Active;
                Ok(())
            }
            CallState::Active => {
                self.reject(LifecycleError::AlreadyRecorded(Operation::Active))
            }
            CallState::Ended => self.reject_transition(Operation::Active),
        }
    }

    /// Voice moved from packet switched (VoLTE) to circuit switched access.
    pub fn mark_srvcc(&mut self) -> Result<(), LifecycleError> {
        if self.state == CallState::Ended {
            return self.reject_transition(Operation::Srvcc);
        }
        if self.timeline.srvcc.is_some() {
            return self.reject(LifecycleError::AlreadyRecorded(Operation::Srvcc));
        }

        self.timeline.srvcc = Some(self.ctx.clock.now());
        Ok(())
    }

    /// Releases the call, snapshots the serving cell again and returns the
    /// call KPIs.
    pub fn end<P>(
        &mut self,
        side: DisconnectionSide,
        final_signal: SignalStrength,
        provider: &P,
    ) -> Result<KpiMetrics, LifecycleError>
    where
        P: CellInfoProvider + ?Sized,
    {
        if self.state == CallState::Ended {
            return self.reject_transition(Operation::End);
        }

        let end = self.ctx.clock.now();
        self.timeline.end = Some(end);
        self.state = CallState::Ended;
        self.disconnection_side = side;
        self.end_signal = final_signal;
        let end_cell = cell::resolve(provider, self.ctx.diagnostics());
        debug!(%side, %end_cell, end, "call session ended");
        self.end_cell = Some(end_cell);

        let metrics = KpiMetrics::from_timeline(&self.timeline)
            .ok_or(LifecycleError::NotEnded(Operation::End))?;
        for anomaly in &metrics.anomalies {
            self.ctx
                .diagnostics
                .report(Diagnostic::ClockAnomaly(*anomaly));
        }

        Ok(metrics)
    }

    pub fn set_disconnection_cause(&mut self, cause: &str) {
        self.disconnection_cause = self.sanitized("disconnection_cause", cause);
    }

    pub fn is_cause_known(&self) -> bool {
        self.disconnection_cause != UNKNOWN_CAUSE
    }

    pub fn set_prefix(&mut self, msisdn_prefix: &str) {
        self.msisdn_prefix = Some(self.sanitized("msisdn_prefix", msisdn_prefix));
    }

    pub fn set_direction(&mut self, direction: CallDirection) {
        self.direction = direction;
    }

    /// KPIs derived from the timestamps, `None` until the call has ended.
    pub fn metrics(&self) -> Option<KpiMetrics> {
        KpiMetrics::from_timeline(&self.timeline)
    }

    pub fn direction(&self) -> CallDirection {
        self.direction
    }

    pub fn msisdn_prefix(&self) -> Option<&str> {
        self.msisdn_prefix.as_deref()
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn start_time(&self) -> EpochMillis {
        self.timeline.start
    }

    pub fn start_cell(&self) -> &CellIdentity {
        &self.start_cell
    }

    pub fn end_cell(&self) -> Option<&CellIdentity> {
        self.end_cell.as_ref()
    }

    pub fn start_signal(&self) -> SignalStrength {
        self.start_signal
    }

    pub fn end_signal(&self) -> SignalStrength {
        self.end_signal
    }

    pub fn disconnection_side(&self) -> DisconnectionSide {
        self.disconnection_side
    }

    pub fn disconnection_cause(&self) -> &str {
        &self.disconnection_cause
    }

    fn sanitized(&self, field: &'static str, value: &str) -> String {
        let clean = sanitize_field(value);
        if clean != value {
            self.ctx
                .diagnostics
                .report(Diagnostic::FieldSanitized { field });
        }

        clean
    }

    fn reject_transition<T>(&self, operation: Operation) -> Result<T, LifecycleError> {
        let err = match self.state {
            CallState::Ended => LifecycleError::AlreadyEnded(operation),
            state => LifecycleError::InvalidTransition { operation, state },
        };

        self.reject(err)
    }

    fn reject<T>(&self, err: LifecycleError) -> Result<T, LifecycleError> {
        let operation = match err {
            LifecycleError::AlreadyEnded(op)
            | LifecycleError::AlreadyRecorded(op)
            | LifecycleError::NotEnded(op)
            | LifecycleError::InvalidTransition { operation: op, .. } => op,
        };
        self.ctx.diagnostics.report(Diagnostic::SequencingViolation {
            operation,
            state: self.state,
        });

        Err(err)
    }
}

/// First six digits of a phone number, ignoring `+` and separators.
pub fn msisdn_prefix(number: &str) -> String {
    number
        .chars()
        .filter(char::is_ascii_digit)
        .take(PREFIX_DIGITS)
        .collect()
}
