//! End-to-end scenarios from `spec.md` §8, driven against the library
//! directly with `dal::mock::MockDriver` standing in for hardware and an
//! in-process fake bus standing in for the broker.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use stage_core::command::CommandRecord;
use stage_core::config::Config;
use stage_core::dal::mock::MockDriver;
use stage_core::dal::{Dal, MovingState};
use stage_core::net::bus::{BusClient, Qos};
use stage_core::net::format;
use stage_core::net::queue::CommandQueue;
use stage_core::net::{dispatcher, publisher};
use stage_core::ring::SampleRing;
use stage_core::sample::AxisId;
use stage_core::sampler;
use stage_core::status::SharedContext;
use stage_core::topology::TopologyMap;

struct FakeBus {
    messages: Mutex<Vec<(String, String)>>,
}

impl FakeBus {
    fn new() -> Self {
        Self { messages: Mutex::new(Vec::new()) }
    }

    fn on_topic(&self, topic: &str) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl BusClient for FakeBus {
    fn publish(&self, topic: &str, payload: &[u8], _qos: Qos, _retained: bool) -> Result<(), String> {
        self.messages
            .lock()
            .unwrap()
            .push((topic.to_string(), String::from_utf8_lossy(payload).into_owned()));
        Ok(())
    }

    fn subscribe(&self, _topic: &str, _qos: Qos) -> Result<(), String> {
        Ok(())
    }

    fn disconnect(&self) {}
}

fn build_system(controllers: &[(u16, u8)]) -> (Dal, TopologyMap) {
    let driver = MockDriver::with_controllers(controllers);
    let (dal, enumerated) = Dal::connect_all(Box::new(driver)).unwrap();
    let mut topology = TopologyMap::build(&enumerated, 4, 2222);
    topology.refine_connectivity(&dal);
    (dal, topology)
}

/// S1 Enumeration: two controllers present; a STATUS command's result
/// names both by id and reports a non-zero sample rate.
#[test]
fn s1_enumeration_status_names_every_controller() {
    let (dal, topology) = build_system(&[(4, 3), (2222, 1)]);
    let shared = Arc::new(SharedContext::new(&Config::default()));
    let queue = CommandQueue::with_capacity(8);
    let bus = FakeBus::new();

    queue.push(CommandRecord::new(b"STATUS".to_vec()));
    shared.stop();
    dispatcher::run(&dal, &topology, &queue, &bus, "result", &shared, Instant::now());

    let results = bus.on_topic("result");
    assert_eq!(results.len(), 1);
    assert!(results[0].contains("Controller 0 (ID=4"));
    assert!(results[0].contains("Controller 1 (ID=2222"));
    assert!(results[0].contains("Sample Rate"));
    assert!(results[0].contains("/SUCCESS/"));
}

/// S2 SET_RATE happy path: a valid rate change succeeds and is reflected
/// immediately in the shared counters.
#[test]
fn s2_set_rate_happy_path_updates_live_rate() {
    let (dal, topology) = build_system(&[(4, 3), (2222, 1)]);
    let shared = Arc::new(SharedContext::new(&Config::default()));
    let queue = CommandQueue::with_capacity(8);
    let bus = FakeBus::new();

    queue.push(CommandRecord::new(b"SET_RATE/2000".to_vec()));
    shared.stop();
    dispatcher::run(&dal, &topology, &queue, &bus, "result", &shared, Instant::now());

    assert_eq!(shared.counters.sample_rate_hz(), 2000);
    let results = bus.on_topic("result");
    assert!(results[0].contains("/SET_RATE/SYSTEM/SUCCESS/"));
}

/// S3 SET_RATE rejection: an out-of-range rate fails with the documented
/// detail and leaves the live rate untouched.
#[test]
fn s3_set_rate_rejects_below_minimum() {
    let (dal, topology) = build_system(&[(4, 3), (2222, 1)]);
    let shared = Arc::new(SharedContext::new(&Config::default()));
    let before = shared.counters.sample_rate_hz();
    let queue = CommandQueue::with_capacity(8);
    let bus = FakeBus::new();

    queue.push(CommandRecord::new(b"SET_RATE/50".to_vec()));
    shared.stop();
    dispatcher::run(&dal, &topology, &queue, &bus, "result", &shared, Instant::now());

    assert_eq!(shared.counters.sample_rate_hz(), before);
    let results = bus.on_topic("result");
    assert_eq!(results.len(), 1);
    assert!(results[0].ends_with("FAILED/Invalid rate (must be 100-15000 Hz)"));
}

/// S4 MOVE on absent axis: topology lacks R because controller 2222 was
/// never enumerated; the result is FAILED and no device state changes.
#[test]
fn s4_move_on_absent_axis_fails_cleanly() {
    let (dal, topology) = build_system(&[(4, 3)]);
    assert!(topology.resolve(AxisId::R).is_none());
    let shared = Arc::new(SharedContext::new(&Config::default()));
    let queue = CommandQueue::with_capacity(8);
    let bus = FakeBus::new();

    queue.push(CommandRecord::new(b"MOVE/R/90000".to_vec()));
    shared.stop();
    dispatcher::run(&dal, &topology, &queue, &bus, "result", &shared, Instant::now());

    let results = bus.on_topic("result");
    assert_eq!(results.len(), 1);
    assert!(results[0].ends_with("FAILED/Axis not connected"));
}

/// S5 Position encoding with gap: Y's read fails continuously; the
/// position stream carries `NaN` for Y on every line while X, Z, R stay
/// integers throughout.
#[test]
fn s5_position_stream_encodes_persistent_read_failure_as_nan() {
    let driver = MockDriver::with_controllers(&[(4, 3), (2222, 1)]);
    driver.fail_axis_reads(0, 0); // Y maps to (controller_a, axis 0)
    let (dal, enumerated) = Dal::connect_all(Box::new(driver)).unwrap();
    let mut topology = TopologyMap::build(&enumerated, 4, 2222);
    topology.refine_connectivity(&dal);

    let ring = SampleRing::with_capacity(256);
    let mut config = Config::default();
    config.initial_sample_rate_hz = 5_000;
    let shared = Arc::new(SharedContext::new(&config));
    let epoch = Instant::now();

    let sampler_shared = shared.clone();
    let stop_after = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        sampler_shared.stop();
    });
    sampler::run(&dal, &topology, &ring, &shared, epoch);
    stop_after.join().unwrap();

    assert!(ring.available() > 0);
    let mut samples = Vec::new();
    ring.drain_into(&mut samples, ring.available());
    let batch = format::format_batch(&samples);

    for line in batch.lines() {
        let fields: Vec<&str> = line.split('/').collect();
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[2], "NaN", "Y must read NaN on every tick: {line}");
        assert_ne!(fields[1], "NaN");
        assert_ne!(fields[3], "NaN");
        assert_ne!(fields[4], "NaN");
    }
}

/// S6 Graceful shutdown: clearing the running flag halts the Sampler
/// promptly, and disabling every known axis leaves none still marked
/// moving.
#[test]
fn s6_shutdown_clears_move_enable_on_every_axis() {
    let (dal, topology) = build_system(&[(4, 3), (2222, 1)]);
    for (_, address) in topology.iter_connected() {
        dal.set_move_enable(address.slot, address.axis, true).unwrap();
    }

    dal.shutdown_all(sampler::all_known_axes(&topology).into_iter());

    for (_, address) in topology.iter_connected() {
        let status = dal.read_status(address.slot, address.axis).unwrap();
        assert_eq!(status.moving, MovingState::Idle);
    }
}

/// S6 (sampler half): the loop exits within a bounded time of the running
/// flag clearing, regardless of the configured sample rate.
#[test]
fn s6_sampler_exits_promptly_on_running_flag_clear() {
    let (dal, topology) = build_system(&[(4, 3), (2222, 1)]);
    let ring = SampleRing::with_capacity(64);
    let mut config = Config::default();
    config.initial_sample_rate_hz = 100;
    let shared = Arc::new(SharedContext::new(&config));
    let done = Arc::new(AtomicBool::new(false));

    let stop_shared = shared.clone();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(15));
        stop_shared.stop();
    });

    let start = Instant::now();
    sampler::run(&dal, &topology, &ring, &shared, start);
    done.store(true, Ordering::Relaxed);
    stopper.join().unwrap();

    assert!(done.load(Ordering::Relaxed));
    assert!(start.elapsed() < Duration::from_secs(1));
}

/// Publisher batches are bounded by `batch_max` and the ring conserves
/// captured = published + dropped + buffered across a short run.
#[test]
fn ring_conservation_holds_across_sampler_and_publisher() {
    let (dal, topology) = build_system(&[(4, 3), (2222, 1)]);
    let ring = Arc::new(SampleRing::with_capacity(256));
    let mut config = Config::default();
    config.initial_sample_rate_hz = 5_000;
    let shared = Arc::new(SharedContext::new(&config));
    let bus = FakeBus::new();

    let publisher_ring = ring.clone();
    let publisher_shared = shared.clone();
    let publisher = thread::spawn(move || {
        publisher::run(&bus, "position", &publisher_ring, &publisher_shared, 64, Duration::from_millis(5));
    });

    let sampler_shared = shared.clone();
    let stop_after = thread::spawn(move || {
        thread::sleep(Duration::from_millis(40));
        sampler_shared.stop();
    });

    sampler::run(&dal, &topology, &ring, &shared, Instant::now());
    stop_after.join().unwrap();
    publisher.join().unwrap();

    let buffered = ring.available() as u64;
    let captured = shared.counters.captured();
    let published = shared.counters.published();
    let dropped = shared.counters.dropped();
    assert_eq!(captured, published + dropped + buffered);
}
