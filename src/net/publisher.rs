//! The Publisher: drains the Sample Ring in periodic batches and
//! publishes the position topic (`spec.md` §4.5).
//!
//! # Design
//! Runs at a much lower cadence than the Sampler, the same relationship
//! the teacher's `telemetry` task (priority 1, scheduled every
//! `telemetry_period` seconds) has to the priority-3 `process` task: the
//! Sampler cannot be slowed by publication, so the Publisher only ever
//! reads the ring, never blocks it.
use std::sync::Arc;
use std::time::Duration;

use crate::net::bus::{BusClient, Qos};
use crate::net::format;
use crate::ring::SampleRing;
use crate::sample::PositionSample;
use crate::status::SharedContext;

/// Run the Publisher loop until `shared.is_running()` returns `false`.
pub fn run(
    bus: &dyn BusClient,
    topic: &str,
    ring: &SampleRing,
    shared: &Arc<SharedContext>,
    batch_max: usize,
    batch_period: Duration,
) {
    let mut scratch = Vec::with_capacity(batch_max);
    while shared.is_running() {
        publish_batch(bus, topic, ring, shared, batch_max, &mut scratch);
        std::thread::sleep(batch_period);
    }
    // Drain whatever accumulated during the final sleep so the last
    // published message is well-formed, per `spec.md` §8 S6.
    publish_batch(bus, topic, ring, shared, batch_max, &mut scratch);
}

fn publish_batch(
    bus: &dyn BusClient,
    topic: &str,
    ring: &SampleRing,
    shared: &Arc<SharedContext>,
    batch_max: usize,
    scratch: &mut Vec<PositionSample>,
) {
    scratch.clear();
    let drained = ring.drain_into(scratch, batch_max);
    if drained == 0 {
        return;
    }

    let payload = format::format_batch(scratch);
    match bus.publish(topic, payload.as_bytes(), Qos::AtMostOnce, false) {
        Ok(()) => shared.counters.record_published(drained as u64),
        Err(err) => {
            // Positions are telemetry, not history: a failed publish drops
            // the whole batch rather than retrying, per `spec.md` §4.5/§7.
            log::warn!("publisher: dropping batch of {drained} records, publish failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingBus {
        published: Mutex<Vec<String>>,
        fail_next: Mutex<bool>,
    }

    impl RecordingBus {
        fn new() -> Self {
            Self { published: Mutex::new(Vec::new()), fail_next: Mutex::new(false) }
        }
    }

    impl BusClient for RecordingBus {
        fn publish(&self, _topic: &str, payload: &[u8], _qos: Qos, _retained: bool) -> Result<(), String> {
            if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
                return Err("simulated failure".into());
            }
            self.published.lock().unwrap().push(String::from_utf8(payload.to_vec()).unwrap());
            Ok(())
        }

        fn subscribe(&self, _topic: &str, _qos: Qos) -> Result<(), String> {
            Ok(())
        }

        fn disconnect(&self) {}
    }

    #[test]
    fn drains_and_publishes_available_records() {
        let ring = SampleRing::with_capacity(16);
        for i in 0..5 {
            assert!(ring.try_push(PositionSample::empty(i)));
        }
        let bus = RecordingBus::new();
        let config = crate::config::Config::default();
        let shared = Arc::new(SharedContext::new(&config));
        let mut scratch = Vec::new();

        publish_batch(&bus, "t", &ring, &shared, 10, &mut scratch);

        assert_eq!(bus.published.lock().unwrap().len(), 1);
        assert_eq!(shared.counters.published(), 5);
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn empty_ring_publishes_nothing() {
        let ring = SampleRing::with_capacity(16);
        let bus = RecordingBus::new();
        let config = crate::config::Config::default();
        let shared = Arc::new(SharedContext::new(&config));
        let mut scratch = Vec::new();

        publish_batch(&bus, "t", &ring, &shared, 10, &mut scratch);

        assert!(bus.published.lock().unwrap().is_empty());
        assert_eq!(shared.counters.published(), 0);
    }

    #[test]
    fn failed_publish_drops_batch_without_crediting_published_counter() {
        let ring = SampleRing::with_capacity(16);
        ring.try_push(PositionSample::empty(1));
        let bus = RecordingBus::new();
        *bus.fail_next.lock().unwrap() = true;
        let config = crate::config::Config::default();
        let shared = Arc::new(SharedContext::new(&config));
        let mut scratch = Vec::new();

        publish_batch(&bus, "t", &ring, &shared, 10, &mut scratch);

        assert!(bus.published.lock().unwrap().is_empty());
        assert_eq!(shared.counters.published(), 0);
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn respects_batch_max_across_multiple_drains() {
        let ring = SampleRing::with_capacity(32);
        for i in 0..20 {
            ring.try_push(PositionSample::empty(i));
        }
        let bus = RecordingBus::new();
        let config = crate::config::Config::default();
        let shared = Arc::new(SharedContext::new(&config));
        let mut scratch = Vec::new();

        publish_batch(&bus, "t", &ring, &shared, 8, &mut scratch);
        assert_eq!(shared.counters.published(), 8);
        publish_batch(&bus, "t", &ring, &shared, 8, &mut scratch);
        assert_eq!(shared.counters.published(), 16);
        publish_batch(&bus, "t", &ring, &shared, 8, &mut scratch);
        assert_eq!(shared.counters.published(), 20);
    }
}
