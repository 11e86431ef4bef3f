//! Call KPI tracking.
//!
//! A [`CallSession`] records the lifecycle timestamps of one call, snapshots the
//! serving cell at the start and at the end of the call through a
//! [`CellInfoProvider`], and is finally flattened into a [`CallRecord`] that a
//! [`RecordSink`] appends to the call log.

pub mod cell;
pub mod clock;
pub mod diagnostics;
pub mod record;
pub mod session;
pub mod sink;

pub use cell::{resolve, CellIdentity, CellInfoProvider};
pub use clock::{Clock, EpochMillis, ManualClock, SystemClock};
pub use diagnostics::{Diagnostic, Diagnostics, TracingDiagnostics};
pub use record::CallRecord;
pub use session::{
    CallDirection, CallSession, CallState, DisconnectionSide, KpiMetrics,
    LifecycleError, SessionContext, SharedSession, SignalStrength,
};
pub use sink::{DailyCsvSink, RecordSink, SinkError};
