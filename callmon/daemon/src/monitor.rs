use crate::events::{parse_line, CallEvent, TimedEvent};
use callmon::session::msisdn_prefix;
use callmon::{
    CallRecord, CallSession, CellInfoProvider, DisconnectionSide, ManualClock,
    RecordSink, SessionContext, SignalStrength,
};
use color_eyre::eyre::{Result, WrapErr};
use std::io::BufRead;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Drives one call session at a time from a stream of call events and hands
/// every finished call to the sink.
pub struct CallMonitor<P, S> {
    ctx: SessionContext,
    /// Set in replay mode, event timestamps move it.
    replay_clock: Option<Arc<ManualClock>>,
    provider: P,
    sink: S,
    echo_json: bool,
    current: Option<CallSession>,
}

impl<P, S> CallMonitor<P, S>
where
    P: CellInfoProvider,
    S: RecordSink,
{
    pub fn new(ctx: SessionContext, provider: P, sink: S) -> Self {
        Self {
            ctx,
            replay_clock: None,
            provider,
            sink,
            echo_json: false,
            current: None,
        }
    }

    /// Replays recorded events: time only moves with the event timestamps.
    pub fn with_replay_clock(self, clock: Arc<ManualClock>) -> Self {
        Self {
            replay_clock: Some(clock),
            ..self
        }
    }

    /// Also prints every record as JSON on stdout.
    pub fn with_json_echo(self, echo_json: bool) -> Self {
        Self { echo_json, ..self }
    }

    pub fn has_open_call(&self) -> bool {
        self.current.is_some()
    }

    /// Consumes events until the reader is exhausted, returns the number of
    /// records written.
    pub fn run<R: BufRead>(&mut self, reader: R) -> Result<usize> {
        let mut records = 0;
        for (idx, line) in reader.lines().enumerate() {
            let line = line.wrap_err("Failed to read call events")?;
            if self.handle_line(&line).is_some() {
                records += 1;
            }
            debug!(line = idx + 1, "event handled");
        }
        if self.current.is_some() {
            warn!("event source ended with a call still open, dropping it");
        }

        Ok(records)
    }

    /// Applies one input line, malformed lines are logged and skipped.
    pub fn handle_line(&mut self, line: &str) -> Option<CallRecord> {
        match parse_line(line) {
            Ok(Some(event)) => self.apply(event),
            Ok(None) => None,
            Err(e) => {
                warn!(line, error = %e, "skipping malformed event");
                None
            }
        }
    }

    pub fn apply(&mut self, timed: TimedEvent) -> Option<CallRecord> {
        match (&self.replay_clock, timed.at) {
            (Some(clock), Some(at)) => clock.set(at),
            (Some(_), None) => {
                warn!(event = ?timed.event, "replayed event has no timestamp, skipping");
                return None;
            }
            (None, Some(at)) => debug!(at, "ignoring event timestamp in live mode"),
            (None, None) => {}
        }

        if let CallEvent::Start { direction, signal } = timed.event {
            if let Some(open) = self.current.take() {
                warn!(
                    start_time = open.start_time(),
                    state = %open.state(),
                    "new call started while another was open, discarding it"
                );
            }
            let signal = self.signal_or_current(signal);
            let session = CallSession::create(&self.ctx, direction, signal, &self.provider);
            info!(%direction, start_cell = %session.start_cell(), "call started");
            self.current = Some(session);
            return None;
        }

        let Some(session) = self.current.as_mut() else {
            warn!(event = ?timed.event, "no open call, ignoring event");
            return None;
        };

        // rejected lifecycle marks are already reported through diagnostics
        match timed.event {
            CallEvent::Start { .. } => {}
            CallEvent::Number(number) => session.set_prefix(&msisdn_prefix(&number)),
            CallEvent::Direction(direction) => session.set_direction(direction),
            CallEvent::Alerting => {
                let _ = session.mark_alerting();
            }
            CallEvent::Active => {
                let _ = session.mark_active();
            }
            CallEvent::Srvcc => {
                let _ = session.mark_srvcc();
            }
            CallEvent::Cause(cause) => session.set_disconnection_cause(&cause),
            CallEvent::End { side, signal } => return self.finish(side, signal),
        }

        None
    }

    fn finish(
        &mut self,
        side: DisconnectionSide,
        signal: Option<SignalStrength>,
    ) -> Option<CallRecord> {
        let signal = self.signal_or_current(signal);
        let mut session = self.current.take()?;
        let metrics = session.end(side, signal, &self.provider).ok()?;
        let record = match CallRecord::from_session(&session) {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, "failed to build call record");
                return None;
            }
        };
        info!(
            duration = metrics.duration,
            time_to_alert = metrics.time_to_alert,
            time_to_connect = metrics.time_to_connect,
            srvcc_elapsed = metrics.srvcc_elapsed,
            %side,
            cause = session.disconnection_cause(),
            "call ended"
        );

        if let Err(e) = self.sink.append(&record, session.start_time()) {
            error!(error = ?e, "failed to store call record");
        }
        if self.echo_json {
            match serde_json::to_string(&record) {
                Ok(json) => println!("{json}"),
                Err(e) => warn!(error = %e, "failed to serialize call record"),
            }
        }

        Some(record)
    }

    fn signal_or_current(&self, signal: Option<SignalStrength>) -> SignalStrength {
        signal.unwrap_or_else(|| self.provider.signal_strength())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callmon::cell::{CellInfo, CellLocation, LteCell, NoCellInfo};
    use callmon::diagnostics::CollectingDiagnostics;
    use callmon::{CallDirection, EpochMillis, SinkError};
    use std::sync::Mutex;
    use test_log::test;

    #[derive(Default)]
    struct MemorySink {
        records: Mutex<Vec<(CallRecord, EpochMillis)>>,
    }

    impl RecordSink for MemorySink {
        fn append(
            &self,
            record: &CallRecord,
            start_time: EpochMillis,
        ) -> Result<(), SinkError> {
            self.records
                .lock()
                .unwrap()
                .push((record.clone(), start_time));
            Ok(())
        }
    }

    struct FailingSink;

    impl RecordSink for FailingSink {
        fn append(&self, _: &CallRecord, start_time: EpochMillis) -> Result<(), SinkError> {
            Err(SinkError::InvalidStartTime(start_time))
        }
    }

    struct Lte;

    impl CellInfoProvider for Lte {
        fn visible_cells(&self) -> Option<Vec<CellInfo>> {
            Some(vec![CellInfo::Lte(LteCell {
                mcc: Some("214".into()),
                mnc: Some("07".into()),
                tac: Some(1200),
                cell_id: Some(55000111),
                pci: Some(301),
            })])
        }

        fn network_operator(&self) -> Option<String> {
            None
        }

        fn cell_location(&self) -> Option<CellLocation> {
            None
        }

        fn signal_strength(&self) -> SignalStrength {
            SignalStrength(21)
        }
    }

    fn replay_monitor<P: CellInfoProvider>(
        provider: P,
    ) -> CallMonitor<P, Arc<MemorySink>> {
        let clock = Arc::new(ManualClock::new(0));
        let ctx = SessionContext::new(clock.clone(), Arc::new(CollectingDiagnostics::new()));

        CallMonitor::new(ctx, provider, Arc::new(MemorySink::default()))
            .with_replay_clock(clock)
    }

    #[test]
    fn replayed_call_produces_a_record() {
        // Arrange
        let mut monitor = replay_monitor(Lte);
        let input = "\
            # first call\n\
            @1700000000000 start MO -90\n\
            @1700000000100 number +214070123456\n\
            @1700000002000 alerting\n\
            @1700000005000 active\n\
            @1700000020000 cause NORMAL\n\
            @1700000020000 end NW -95\n";

        // Act
        let records = monitor.run(input.as_bytes()).unwrap();

        // Assert
        assert_eq!(records, 1);
        let stored = monitor.sink.records.lock().unwrap();
        let (record, start_time) = &stored[0];
        assert_eq!(*start_time, 1_700_000_000_000);
        assert_eq!(
            record.to_line(),
            "MO,214070,15000,2000,5000,NW,NORMAL,LTE_214_07_1200_55000111_301,-90,\
             LTE_214_07_1200_55000111_301,-95,0\n"
        );
    }

    #[test]
    fn missing_signal_comes_from_the_provider() {
        let mut monitor = replay_monitor(Lte);

        monitor.handle_line("@1000 start MT");
        let record = monitor.handle_line("@4000 end UE").unwrap();

        assert_eq!(record.start_signal, SignalStrength(21));
        assert_eq!(record.end_signal, SignalStrength(21));
        assert_eq!(record.direction, CallDirection::Mt);
        assert_eq!(record.disconnection_side, DisconnectionSide::Ue);
        assert_eq!(record.duration, 3_000);
    }

    #[test]
    fn restart_discards_the_open_call() {
        // Arrange
        let mut monitor = replay_monitor(NoCellInfo);
        monitor.handle_line("@1000 start MO 10");
        monitor.handle_line("@2000 alerting");

        // Act
        monitor.handle_line("@5000 start MO 11");
        let record = monitor.handle_line("@6000 end UE 12").unwrap();

        // Assert
        assert_eq!(record.time_to_alert, 0);
        assert_eq!(record.duration, 1_000);
        assert_eq!(record.start_signal, SignalStrength(11));
        assert_eq!(monitor.sink.records.lock().unwrap().len(), 1);
    }

    #[test]
    fn bad_lines_are_skipped() {
        let mut monitor = replay_monitor(NoCellInfo);

        assert_eq!(monitor.handle_line("@1000 hangup"), None);
        assert_eq!(monitor.handle_line("@1000 alerting"), None);
        // replay needs a timestamp
        assert_eq!(monitor.handle_line("start MO"), None);
        assert!(!monitor.has_open_call());

        monitor.handle_line("@1000 start MO");
        assert!(monitor.has_open_call());
        assert_eq!(monitor.handle_line("@1500 end SOMEONE"), None);
        assert!(monitor.has_open_call());
    }

    #[test]
    fn out_of_order_events_do_not_stop_the_call() {
        let mut monitor = replay_monitor(NoCellInfo);
        let input = "\
            @1000 start MO 10\n\
            @2000 active\n\
            @2500 alerting\n\
            @3000 active\n\
            @9000 end NW 10\n";

        let records = monitor.run(input.as_bytes()).unwrap();

        assert_eq!(records, 1);
        let stored = monitor.sink.records.lock().unwrap();
        assert_eq!(stored[0].0.time_to_alert, 0);
        assert_eq!(stored[0].0.time_to_connect, 1_000);
        assert_eq!(stored[0].0.duration, 7_000);
    }

    #[test]
    fn sink_failure_still_returns_the_record() {
        // Arrange
        let clock = Arc::new(ManualClock::new(0));
        let ctx = SessionContext::new(clock.clone(), Arc::new(CollectingDiagnostics::new()));
        let mut monitor = CallMonitor::new(ctx, Lte, FailingSink)
            .with_replay_clock(clock)
            .with_json_echo(true);

        // Act
        monitor.handle_line("@1000 start MO -80");
        monitor.handle_line("@1500 cause NORMAL");
        let record = monitor.handle_line("@4000 end NW -85");

        // Assert
        let record = record.unwrap();
        assert_eq!(record.duration, 3_000);
        assert_eq!(record.disconnection_cause, "NORMAL");
        assert_eq!(record.end_signal, SignalStrength(-85));
        assert!(!monitor.has_open_call());
    }
}
