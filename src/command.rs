//! The command grammar (`spec.md` §4.6) and its raw wire representation.
//!
//! # Design
//! The command set is closed and small; rather than match on the raw
//! string at every call site, it is parsed once into [`Command`], a tagged
//! variant with one case per grammar row (`spec.md` §9). This mirrors the
//! way the teacher turns MQTT settings paths into a typed `Settings` value
//! via `Miniconf` before any application code runs, rather than comparing
//! path strings in the hot path.
use std::time::Instant;

use crate::sample::AxisId;

/// A raw command payload as delivered by the bus callback, plus its
/// arrival time. Created by the bus client callback, consumed by the
/// Dispatcher (`spec.md` §3).
#[derive(Debug, Clone)]
pub struct CommandRecord {
    pub payload: Vec<u8>,
    pub arrived_at: Instant,
}

impl CommandRecord {
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload, arrived_at: Instant::now() }
    }
}

/// A parsed command, per the grammar in `spec.md` §4.6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    SetRate(i64),
    SetAmp(AxisId, i64),
    SetFreq(AxisId, i64),
    Move(AxisId, i64),
    Stop(AxisId),
}

/// Why a command string failed to parse; each variant names the grammar
/// row whose shape or name mismatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The command keyword as written, e.g. `"MOVE"`, or `"?"` if the
    /// payload did not even contain a recognizable keyword.
    pub command: String,
}

impl Command {
    /// Parse one command line per the slash-delimited, case-sensitive
    /// grammar in `spec.md` §4.6. UTF-8 decoding failure or an unknown
    /// keyword both produce a [`ParseError`].
    pub fn parse(payload: &[u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(payload).map_err(|_| ParseError { command: "?".into() })?;
        let mut parts = text.split('/');
        let keyword = parts.next().unwrap_or("");

        match keyword {
            "STATUS" => {
                if parts.next().is_some() {
                    return Err(ParseError { command: "STATUS".into() });
                }
                Ok(Command::Status)
            }
            "SET_RATE" => {
                let rate = parts.next().and_then(|s| s.parse::<i64>().ok());
                match (rate, parts.next()) {
                    (Some(rate), None) => Ok(Command::SetRate(rate)),
                    _ => Err(ParseError { command: "SET_RATE".into() }),
                }
            }
            "SET_AMP" => parse_axis_int(parts).map(|(axis, v)| Command::SetAmp(axis, v))
                .ok_or(ParseError { command: "SET_AMP".into() }),
            "SET_FREQ" => parse_axis_int(parts).map(|(axis, v)| Command::SetFreq(axis, v))
                .ok_or(ParseError { command: "SET_FREQ".into() }),
            "MOVE" => parse_axis_int(parts).map(|(axis, v)| Command::Move(axis, v))
                .ok_or(ParseError { command: "MOVE".into() }),
            "STOP" => {
                let axis = parts.next().and_then(AxisId::parse);
                match (axis, parts.next()) {
                    (Some(axis), None) => Ok(Command::Stop(axis)),
                    _ => Err(ParseError { command: "STOP".into() }),
                }
            }
            other => Err(ParseError { command: other.to_string() }),
        }
    }

    /// The subject name used in the result message (`spec.md` §6.2).
    pub fn subject(&self) -> &'static str {
        match self {
            Command::Status => "STATUS",
            Command::SetRate(_) => "SET_RATE",
            Command::SetAmp(..) => "SET_AMP",
            Command::SetFreq(..) => "SET_FREQ",
            Command::Move(..) => "MOVE",
            Command::Stop(_) => "STOP",
        }
    }
}

fn parse_axis_int<'a>(mut parts: impl Iterator<Item = &'a str>) -> Option<(AxisId, i64)> {
    let axis = parts.next().and_then(AxisId::parse)?;
    let value = parts.next().and_then(|s| s.parse::<i64>().ok())?;
    if parts.next().is_some() {
        return None;
    }
    Some((axis, value))
}
