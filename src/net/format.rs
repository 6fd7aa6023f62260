//! Wire formatting for the position (`spec.md` §6.1) and result
//! (`spec.md` §6.2) message bodies.
//!
//! # Design
//! Formatting writes decimal integers with `itoa::Buffer`, a stack-
//! allocated formatter, directly into a caller-supplied, reused `String`
//! rather than building a new heap allocation per field — the no-heap-
//! per-field discipline the Publisher operates under (`spec.md` §4.5),
//! the hosted analogue of the fixed scratch buffers the teacher's
//! `net::telemetry` formats its `no_std` telemetry into.
use crate::command::Command;
use crate::sample::{AxisId, PositionSample};

/// Channel of a result message, per `spec.md` §6.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Command,
    Status,
    Error,
}

impl Channel {
    fn as_str(self) -> &'static str {
        match self {
            Channel::Command => "COMMAND",
            Channel::Status => "STATUS",
            Channel::Error => "ERROR",
        }
    }
}

/// Outcome of a result message, per `spec.md` §6.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "SUCCESS",
            Outcome::Failed => "FAILED",
        }
    }
}

/// Either a named axis or one of the non-axis scopes permitted by
/// `spec.md` §6.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Axis(AxisId),
    All,
    System,
}

impl Scope {
    fn write_into(self, buf: &mut String) {
        match self {
            Scope::Axis(axis) => buf.push_str(axis.name()),
            Scope::All => buf.push_str("ALL"),
            Scope::System => buf.push_str("SYSTEM"),
        }
    }
}

/// Append one position record to `buf` in the `<ts>/<x>/<y>/<z>/<r>`
/// format, without a trailing separator. The caller joins records with
/// `\n` (`spec.md` §6.1).
pub fn write_position(buf: &mut String, sample: &PositionSample) {
    let mut ints = itoa::Buffer::new();
    buf.push_str(ints.format(sample.timestamp_ns));
    for axis in [AxisId::X, AxisId::Y, AxisId::Z, AxisId::R] {
        buf.push('/');
        match sample.get(axis) {
            Some(value) => buf.push_str(ints.format(value)),
            None => buf.push_str("NaN"),
        }
    }
}

/// Concatenate a batch of position records into a single bus message, one
/// record per line, per `spec.md` §4.5.
pub fn format_batch(samples: &[PositionSample]) -> String {
    let mut buf = String::with_capacity(samples.len() * 48);
    for (i, sample) in samples.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        write_position(&mut buf, sample);
    }
    buf
}

/// Format a result message body, per `spec.md` §6.2. `detail` may itself
/// contain `/` or `\n`; consumers are expected to treat everything after
/// the fifth `/` as one field.
pub fn format_result(
    timestamp_ns: u64,
    channel: Channel,
    subject: &str,
    scope: Scope,
    outcome: Outcome,
    detail: &str,
) -> String {
    let mut buf = String::with_capacity(64 + detail.len());
    let mut ints = itoa::Buffer::new();
    buf.push_str(ints.format(timestamp_ns));
    buf.push('/');
    buf.push_str(channel.as_str());
    buf.push('/');
    buf.push_str(subject);
    buf.push('/');
    scope.write_into(&mut buf);
    buf.push('/');
    buf.push_str(outcome.as_str());
    buf.push('/');
    buf.push_str(detail);
    buf
}

/// The `scope` field for a command's result: the axis it targets, or
/// `SYSTEM`/`ALL` for commands with no single axis.
pub fn command_scope(command: &Command) -> Scope {
    match command {
        Command::Status => Scope::System,
        Command::SetRate(_) => Scope::System,
        Command::SetAmp(axis, _)
        | Command::SetFreq(axis, _)
        | Command::Move(axis, _)
        | Command::Stop(axis) => Scope::Axis(*axis),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_line_marks_missing_axis_as_nan() {
        let mut sample = PositionSample::empty(1_735_689_123_457_789_000);
        sample.set(AxisId::X, 999_730);
        sample.set(AxisId::Z, -224_330);
        sample.set(AxisId::R, -600_530);
        let mut buf = String::new();
        write_position(&mut buf, &sample);
        assert_eq!(buf, "1735689123457789000/999730/NaN/-224330/-600530");
    }

    #[test]
    fn batch_joins_records_with_newline() {
        let a = PositionSample::empty(1);
        let b = PositionSample::empty(2);
        let batch = format_batch(&[a, b]);
        assert_eq!(batch.lines().count(), 2);
        assert!(batch.contains('\n'));
    }

    #[test]
    fn empty_batch_formats_to_empty_string() {
        assert_eq!(format_batch(&[]), "");
    }

    #[test]
    fn result_message_has_six_slash_delimited_fields() {
        let msg = format_result(
            42,
            Channel::Command,
            "MOVE",
            Scope::Axis(AxisId::X),
            Outcome::Success,
            "ok",
        );
        assert_eq!(msg, "42/COMMAND/MOVE/X/SUCCESS/ok");
    }

    #[test]
    fn result_detail_may_contain_slashes() {
        let msg = format_result(
            1,
            Channel::Error,
            "MOVE",
            Scope::Axis(AxisId::R),
            Outcome::Failed,
            "a/b/c",
        );
        let mut fields = msg.splitn(6, '/');
        assert_eq!(fields.next(), Some("1"));
        assert_eq!(fields.next(), Some("ERROR"));
        assert_eq!(fields.next(), Some("MOVE"));
        assert_eq!(fields.next(), Some("R"));
        assert_eq!(fields.next(), Some("FAILED"));
        assert_eq!(fields.next(), Some("a/b/c"));
    }
}
