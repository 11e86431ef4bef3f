//! Line protocol for call state events.
//!
//! ```text
//! # comment
//! @1700000000000 start MO -90
//! @1700000000150 number +214070123456
//! @1700000002000 alerting
//! @1700000005000 active
//! @1700000020000 cause NORMAL
//! @1700000020000 end NW -95
//! ```

use callmon::session::ParseEnumError;
use callmon::{CallDirection, DisconnectionSide, EpochMillis, SignalStrength};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    Start {
        direction: CallDirection,
        signal: Option<SignalStrength>,
    },
    Number(String),
    Direction(CallDirection),
    Alerting,
    Active,
    Srvcc,
    Cause(String),
    End {
        side: DisconnectionSide,
        signal: Option<SignalStrength>,
    },
}

/// An event with the instant it happened at, when the source knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    pub at: Option<EpochMillis>,
    pub event: CallEvent,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventParseError {
    #[error("unknown event {0:?}")]
    UnknownEvent(String),

    #[error("{event} is missing its {argument}")]
    MissingArgument {
        event: &'static str,
        argument: &'static str,
    },

    #[error("unexpected trailing input {0:?}")]
    TrailingInput(String),

    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),

    #[error("invalid signal strength {0:?}")]
    InvalidSignal(String),

    #[error(transparent)]
    InvalidValue(#[from] ParseEnumError),
}

/// Parses one input line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<TimedEvent>, EventParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (at, rest) = match line.strip_prefix('@') {
        Some(stamped) => {
            let (stamp, rest) = stamped.split_once(char::is_whitespace).unwrap_or((stamped, ""));
            let at = stamp
                .parse()
                .map_err(|_| EventParseError::InvalidTimestamp(stamp.to_owned()))?;
            (Some(at), rest.trim_start())
        }
        None => (None, line),
    };

    Ok(Some(TimedEvent {
        at,
        event: rest.parse()?,
    }))
}

impl FromStr for CallEvent {
    type Err = EventParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, args) = s.trim().split_once(char::is_whitespace).unwrap_or((s.trim(), ""));
        let args = args.trim();
        let mut words = args.split_whitespace();
        let name = name.to_ascii_lowercase();

        let event = match name.as_str() {
            "start" => CallEvent::Start {
                direction: required(words.next(), "start", "direction")?.parse()?,
                signal: signal(words.next())?,
            },
            // free text, may contain spaces
            "number" | "cause" if !args.is_empty() => {
                return Ok(match name.as_str() {
                    "number" => CallEvent::Number(args.to_owned()),
                    _ => CallEvent::Cause(args.to_owned()),
                });
            }
            "number" => return Err(missing("number", "msisdn")),
            "cause" => return Err(missing("cause", "text")),
            "direction" => {
                CallEvent::Direction(required(words.next(), "direction", "direction")?.parse()?)
            }
            "alerting" => CallEvent::Alerting,
            "active" => CallEvent::Active,
            "srvcc" => CallEvent::Srvcc,
            "end" => CallEvent::End {
                side: required(words.next(), "end", "side")?.parse()?,
                signal: signal(words.next())?,
            },
            other => return Err(EventParseError::UnknownEvent(other.to_owned())),
        };

        let trailing: Vec<&str> = words.collect();
        if !trailing.is_empty() {
            return Err(EventParseError::TrailingInput(trailing.join(" ")));
        }

        Ok(event)
    }
}

fn missing(event: &'static str, argument: &'static str) -> EventParseError {
    EventParseError::MissingArgument { event, argument }
}

fn required<'a>(
    word: Option<&'a str>,
    event: &'static str,
    argument: &'static str,
) -> Result<&'a str, EventParseError> {
    word.ok_or_else(|| missing(event, argument))
}

fn signal(word: Option<&str>) -> Result<Option<SignalStrength>, EventParseError> {
    word.map(|w| {
        w.parse()
            .map_err(|_| EventParseError::InvalidSignal(w.to_owned()))
    })
    .transpose()
}
