//! Diagnostic events raised while tracking a call.
//!
//! Nothing in this crate fails outward on a telemetry problem. Degraded cell
//! lookups, out of order call events and clock jumps are instead reported to a
//! [`Diagnostics`] sink that is injected through the
//! [`SessionContext`](crate::session::SessionContext).

use crate::cell::{LegacyFamily, RadioTech};
use crate::session::{CallState, ClockAnomaly, Operation};
use derive_more::Display;
use std::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    #[display("no cell information available from the provider")]
    CellInfoUnavailable,

    #[display("serving {rat} cell is missing identity fields")]
    IncompleteCellInfo { rat: RadioTech },

    #[display("serving cell uses unsupported radio technology {rat}")]
    UnsupportedRat { rat: String },

    #[display("network operator {operator:?} is not a numeric MCC+MNC")]
    MalformedOperator { operator: String },

    #[display("cell location is not a {family}-family location")]
    LegacyInterpretationFailed { family: LegacyFamily },

    #[display("cell location matched no known family: {location}")]
    CellLocationUnresolved { location: String },

    #[display("{operation} rejected while call is {state}")]
    SequencingViolation {
        operation: Operation,
        state: CallState,
    },

    #[display("{_0}")]
    ClockAnomaly(ClockAnomaly),

    #[display("{field} contained record delimiters and was sanitized")]
    FieldSanitized { field: &'static str },
}

pub trait Diagnostics: Send + Sync + 'static {
    fn report(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::SequencingViolation { .. }
            | Diagnostic::ClockAnomaly(_)
            | Diagnostic::FieldSanitized { .. } => {
                warn!(%diagnostic, "call tracking diagnostic")
            }
            Diagnostic::LegacyInterpretationFailed { .. } => {
                debug!(%diagnostic, "call tracking diagnostic")
            }
            _ => info!(%diagnostic, "call tracking diagnostic"),
        }
    }
}

/// Keeps every reported diagnostic in memory.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    events: Mutex<Vec<Diagnostic>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Diagnostic> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(diagnostic);
    }
}
