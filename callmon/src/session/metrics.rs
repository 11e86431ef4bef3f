use crate::clock::EpochMillis;
use derive_more::Display;
use serde::Serialize;

/// Raw lifecycle timestamps of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeline {
    pub start: EpochMillis,
    pub alerting: Option<EpochMillis>,
    pub active: Option<EpochMillis>,
    pub srvcc: Option<EpochMillis>,
    pub end: Option<EpochMillis>,
}

impl Timeline {
    pub fn new(start: EpochMillis) -> Self {
        Self {
            start,
            alerting: None,
            active: None,
            srvcc: None,
            end: None,
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[display("duration")]
    Duration,
    #[display("time_to_alert")]
    TimeToAlert,
    #[display("time_to_connect")]
    TimeToConnect,
    #[display("srvcc_elapsed")]
    SrvccElapsed,
}

/// A derived duration that came out negative and was clamped to zero.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[display("{metric} was {raw}ms, clamped to 0")]
pub struct ClockAnomaly {
    pub metric: Metric,
    pub raw: i64,
}

/// Timing KPIs of an ended call, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KpiMetrics {
    /// Talk time when answered, time to failure otherwise.
    pub duration: u64,
    pub time_to_alert: u64,
    pub time_to_connect: u64,
    pub srvcc_elapsed: u64,
    pub anomalies: Vec<ClockAnomaly>,
}

impl KpiMetrics {
    /// `None` until the call has ended.
    pub fn from_timeline(timeline: &Timeline) -> Option<Self> {
        let end = timeline.end?;
        let mut anomalies = Vec::new();
        let mut elapsed = |metric, from: EpochMillis, to: EpochMillis| {
            let raw = to.saturating_sub(from);
            u64::try_from(raw).unwrap_or_else(|_| {
                anomalies.push(ClockAnomaly { metric, raw });
                0
            })
        };

        let start = timeline.start;
        let duration =
            elapsed(Metric::Duration, timeline.active.unwrap_or(start), end);
        let time_to_alert = timeline
            .alerting
            .map_or(0, |t| elapsed(Metric::TimeToAlert, start, t));
        let time_to_connect = timeline
            .active
            .map_or(0, |t| elapsed(Metric::TimeToConnect, start, t));
        let srvcc_elapsed = timeline
            .srvcc
            .map_or(0, |t| elapsed(Metric::SrvccElapsed, start, t));

        Some(Self {
            duration,
            time_to_alert,
            time_to_connect,
            srvcc_elapsed,
            anomalies,
        })
    }

    pub fn is_consistent(&self) -> bool {
        self.anomalies.is_empty()
    }
}
