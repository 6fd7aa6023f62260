//! The Dispatcher: consumes commands, invokes the Device Access Layer,
//! and publishes exactly one result per command (`spec.md` §4.6).
//!
//! # Design
//! Single-threaded consumer of the bounded [`CommandQueue`]. Every parse,
//! topology, or device failure is folded into a `FAILED` result rather
//! than propagated, per the error taxonomy in `spec.md` §7 — the
//! Dispatcher never itself produces a process-level error.
use std::sync::Arc;
use std::time::Instant;

use crate::command::{Command, CommandRecord, ParseError};
use crate::dal::Dal;
use crate::net::bus::{BusClient, Qos};
use crate::net::format::{self, Channel, Outcome, Scope};
use crate::net::queue::CommandQueue;
use crate::status::SharedContext;
use crate::topology::TopologyMap;
use crate::config::{MAX_SAMPLE_RATE_HZ, MIN_SAMPLE_RATE_HZ};

/// Run the Dispatcher loop until `shared.is_running()` returns `false` and
/// the queue has drained.
pub fn run(
    dal: &Dal,
    topology: &TopologyMap,
    queue: &CommandQueue,
    bus: &dyn BusClient,
    result_topic: &str,
    shared: &Arc<SharedContext>,
    epoch: Instant,
) {
    while let Some(record) = queue.pop_blocking(|| shared.is_running()) {
        let outcome = handle(dal, topology, &record, shared);
        publish_outcome(bus, result_topic, epoch, &record, outcome);
    }
}

/// The result of dispatching one command: everything [`format::format_result`]
/// needs, already resolved.
struct Dispatched {
    subject: &'static str,
    scope: Scope,
    outcome: Outcome,
    detail: String,
}

fn publish_outcome(
    bus: &dyn BusClient,
    result_topic: &str,
    epoch: Instant,
    record: &CommandRecord,
    dispatched: Dispatched,
) {
    let timestamp_ns = epoch.elapsed().as_nanos() as u64;
    log::trace!(
        "dispatcher: result for {} ready {:?} after arrival",
        dispatched.subject,
        record.arrived_at.elapsed()
    );
    let message = format::format_result(
        timestamp_ns,
        Channel::Command,
        dispatched.subject,
        dispatched.scope,
        dispatched.outcome,
        &dispatched.detail,
    );
    if let Err(err) = bus.publish(result_topic, message.as_bytes(), Qos::AtLeastOnce, false) {
        log::warn!("dispatcher: failed to publish result for {}: {err}", dispatched.subject);
    }
}

fn handle(
    dal: &Dal,
    topology: &TopologyMap,
    record: &CommandRecord,
    shared: &Arc<SharedContext>,
) -> Dispatched {
    let command = match Command::parse(&record.payload) {
        Ok(command) => command,
        Err(ParseError { command }) => {
            return Dispatched {
                subject: "UNKNOWN",
                scope: Scope::System,
                outcome: Outcome::Failed,
                detail: format!("Invalid {command} command format"),
            };
        }
    };

    let subject = command.subject();
    let scope = format::command_scope(&command);

    match command {
        Command::Status => status_snapshot(dal, topology, shared),
        Command::SetRate(rate) => set_rate(shared, rate),
        Command::SetAmp(axis, mv) => {
            axis_scoped(topology, axis, subject, scope, |slot, phys_axis| {
                dal.set_amplitude(slot, phys_axis, mv as i32)
            })
        }
        Command::SetFreq(axis, mhz) => {
            axis_scoped(topology, axis, subject, scope, |slot, phys_axis| {
                dal.set_frequency(slot, phys_axis, mhz as i32)
            })
        }
        Command::Move(axis, pos) => move_axis(dal, topology, axis, pos),
        Command::Stop(axis) => {
            axis_scoped(topology, axis, subject, scope, |slot, phys_axis| {
                dal.set_move_enable(slot, phys_axis, false)
            })
        }
    }
}

/// Resolve `axis` via the Topology Map and run `op` against its physical
/// address, turning the result into a `Dispatched` outcome. Shared by
/// every axis-scoped command except `MOVE`, which needs its own two-step
/// rollback sequence.
fn axis_scoped(
    topology: &TopologyMap,
    axis: crate::sample::AxisId,
    subject: &'static str,
    scope: Scope,
    op: impl FnOnce(usize, u8) -> Result<(), crate::error::DeviceError>,
) -> Dispatched {
    let Some(address) = topology.resolve(axis) else {
        return Dispatched {
            subject,
            scope,
            outcome: Outcome::Failed,
            detail: "Axis not connected".into(),
        };
    };
    match op(address.slot, address.axis) {
        Ok(()) => Dispatched { subject, scope, outcome: Outcome::Success, detail: "ok".into() },
        Err(err) => Dispatched { subject, scope, outcome: Outcome::Failed, detail: err.to_string() },
    }
}

fn move_axis(dal: &Dal, topology: &TopologyMap, axis: crate::sample::AxisId, pos: i64) -> Dispatched {
    let scope = Scope::Axis(axis);
    let Some(address) = topology.resolve(axis) else {
        return Dispatched {
            subject: "MOVE",
            scope,
            outcome: Outcome::Failed,
            detail: "Axis not connected".into(),
        };
    };

    if let Err(err) = dal.set_target(address.slot, address.axis, pos as i32) {
        return Dispatched {
            subject: "MOVE",
            scope,
            outcome: Outcome::Failed,
            detail: format!("failed to set target: {err}"),
        };
    }

    match dal.set_move_enable(address.slot, address.axis, true) {
        Ok(()) => Dispatched { subject: "MOVE", scope, outcome: Outcome::Success, detail: "ok".into() },
        Err(err) => {
            // Partial success: target was set but enable failed. Attempt a
            // best-effort rollback, per `spec.md` §4.6/§7.
            let _ = dal.set_move_enable(address.slot, address.axis, false);
            Dispatched {
                subject: "MOVE",
                scope,
                outcome: Outcome::Failed,
                detail: format!("failed to enable move: {err}"),
            }
        }
    }
}

fn set_rate(shared: &Arc<SharedContext>, rate: i64) -> Dispatched {
    if rate < MIN_SAMPLE_RATE_HZ as i64 || rate > MAX_SAMPLE_RATE_HZ as i64 {
        return Dispatched {
            subject: "SET_RATE",
            scope: Scope::System,
            outcome: Outcome::Failed,
            detail: format!(
                "Invalid rate (must be {}-{} Hz)",
                MIN_SAMPLE_RATE_HZ, MAX_SAMPLE_RATE_HZ
            ),
        };
    }
    // The Sampler reloads the interval at the top of its next tick; this
    // result publishes immediately, per `spec.md` §4.6.
    shared.counters.set_sample_rate(rate as u32);
    Dispatched {
        subject: "SET_RATE",
        scope: Scope::System,
        outcome: Outcome::Success,
        detail: format!("rate set to {rate} Hz"),
    }
}

fn status_snapshot(dal: &Dal, topology: &TopologyMap, shared: &Arc<SharedContext>) -> Dispatched {
    let mut detail = String::new();
    for (i, controller) in dal.controllers().iter().enumerate() {
        if i > 0 {
            detail.push_str("; ");
        }
        detail.push_str(&format!("Controller {} (ID={}", i, controller.controller_id));
        detail.push(')');
    }
    detail.push_str(&format!(
        "; Sample Rate={} Hz; captured={}; published={}; dropped={}",
        shared.counters.sample_rate_hz(),
        shared.counters.captured(),
        shared.counters.published(),
        shared.counters.dropped(),
    ));

    for (axis, address) in topology.iter_connected() {
        let position = dal.read_position(address.slot, address.axis).ok();
        let status = dal.read_status(address.slot, address.axis).ok();
        let amplitude = dal.read_amplitude(address.slot, address.axis).ok();
        let frequency = dal.read_frequency(address.slot, address.axis).ok();
        let target_range = dal.read_target_range(address.slot, address.axis).ok();
        detail.push_str(&format!(
            "; {}: pos={:?} status={:?} ref_valid={} eot_fwd={} eot_bkwd={} in_target={} error={} amp={:?} freq={:?} target_range={:?}",
            axis.name(),
            position,
            status.map(|s| s.moving),
            status.is_some_and(|s| s.ref_valid()),
            status.is_some_and(|s| s.eot_fwd()),
            status.is_some_and(|s| s.eot_bkwd()),
            status.is_some_and(|s| s.in_target()),
            status.is_some_and(|s| s.error()),
            amplitude,
            frequency,
            target_range,
        ));
    }

    Dispatched { subject: "STATUS", scope: Scope::System, outcome: Outcome::Success, detail }
}
