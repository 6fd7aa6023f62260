//! Stage network management module
//!
//! # Design
//! Mirrors the role the teacher's `net` module plays for `NetworkUsers`:
//! the place that owns the bus client and the set of cooperating users
//! built on top of it. Here the two users are the Publisher and the
//! Dispatcher (`spec.md` §4.5/§4.6) rather than a telemetry client and a
//! settings client, and the bus is `rumqttc` rather than `minimq`
//! (`spec.md` §6.3, see `net::bus` and `DESIGN.md`).
pub mod bus;
pub mod dispatcher;
pub mod format;
pub mod publisher;
pub mod queue;
