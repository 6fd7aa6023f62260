//! Process wiring: construct every component from `spec.md` §2 and run
//! them as cooperating threads until shutdown.
//!
//! # Design
//! The teacher wires its application together in a single `#[init]`
//! function and an RTIC task table; this module is the hosted equivalent
//! — one function that enumerates hardware, builds the Topology Map,
//! connects to the bus, and spawns one thread per long-lived component
//! described in `spec.md` §5, returning join handles the caller waits on.
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::command::CommandRecord;
use crate::config::{Config, COMMAND_TOPIC, POSITION_TOPIC, RESULT_TOPIC, STATUS_TOPIC};
use crate::dal::{Dal, MotionDriver};
use crate::error::CoreError;
use crate::net::bus::{BusClient, Qos, RumqttcBus};
use crate::net::queue::CommandQueue;
use crate::net::{dispatcher, publisher};
use crate::ring::SampleRing;
use crate::sampler;
use crate::status::SharedContext;
use crate::topology::TopologyMap;

/// Every thread and shared value the running core is made of. Dropping
/// this after `join_all` completes tears down the bus client.
pub struct Runtime {
    shared: Arc<SharedContext>,
    handles: Vec<JoinHandle<()>>,
    dal: Arc<Dal>,
    topology: Arc<TopologyMap>,
    bus: Arc<dyn BusClient>,
}

impl Runtime {
    /// Enumerate hardware, connect to the bus, and spawn the Sampler,
    /// Publisher, Dispatcher, and bus event-loop threads.
    ///
    /// Fatal per `spec.md` §7: no controllers enumerated, or the broker is
    /// unreachable at startup.
    pub fn start(config: Config, driver: Box<dyn MotionDriver>) -> Result<Self, CoreError> {
        config
            .validate()
            .map_err(|msg| CoreError::BusUnreachable(format!("invalid configuration: {msg}")))?;

        let (dal, enumerated) = Dal::connect_all(driver)?;
        if enumerated.is_empty() {
            return Err(CoreError::NoControllers);
        }
        let dal = Arc::new(dal);
        let mut topology = TopologyMap::build(&enumerated, config.controller_a, config.controller_b);
        topology.refine_connectivity(&dal);
        let topology = Arc::new(topology);
        let shared = Arc::new(SharedContext::new(&config));
        let ring = Arc::new(SampleRing::with_capacity(config.ring_capacity));
        let command_queue = Arc::new(CommandQueue::with_capacity(config.command_queue_capacity));

        let mut mqtt_options = rumqttc::MqttOptions::new(
            format!("{}-{}", config.client_id_prefix, std::process::id()),
            config.broker.to_string(),
            config.broker_port,
        );
        mqtt_options.set_keep_alive(Duration::from_secs(5));
        let (client, connection) = rumqttc::Client::new(mqtt_options, 256);
        let bus: Arc<dyn BusClient> = Arc::new(RumqttcBus::new(client));

        bus.subscribe(COMMAND_TOPIC, Qos::AtMostOnce)
            .map_err(CoreError::BusUnreachable)?;

        let epoch = Instant::now();
        let mut handles = Vec::new();

        handles.push(spawn_bus_event_loop(connection, command_queue.clone(), shared.clone()));
        handles.push(spawn_sampler(dal.clone(), topology.clone(), ring.clone(), shared.clone(), epoch));
        handles.push(spawn_publisher(bus.clone(), ring, shared.clone(), config.batch_max, config.batch_period_ms));
        handles.push(spawn_dispatcher(dal.clone(), topology.clone(), command_queue, bus.clone(), shared.clone(), epoch));

        bus.publish(STATUS_TOPIC, b"SYSTEM_READY", Qos::AtLeastOnce, false)
            .map_err(CoreError::BusUnreachable)?;
        log::info!("stage-core: {} controller(s) enumerated, running", enumerated.len());

        Ok(Self { shared, handles, dal, topology, bus })
    }

    pub fn shared(&self) -> Arc<SharedContext> {
        self.shared.clone()
    }

    /// Clear the running flag, then block until every thread observes it
    /// and returns, per `spec.md` §5's shutdown bound of one batch period
    /// plus the longest outstanding DAL call.
    pub fn shutdown(mut self) {
        self.shared.stop();
        // Unblocks the bus event-loop thread, which otherwise parks inside
        // a blocking read on the MQTT connection.
        self.bus.disconnect();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        self.dal.shutdown_all(sampler::all_known_axes(&self.topology).into_iter());
        self.dal.close_all();
        log::info!("stage-core: shutdown complete");
    }
}

fn spawn_sampler(
    dal: Arc<Dal>,
    topology: Arc<TopologyMap>,
    ring: Arc<SampleRing>,
    shared: Arc<SharedContext>,
    epoch: Instant,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("sampler".into())
        .spawn(move || sampler::run(&dal, &topology, &ring, &shared, epoch))
        .expect("failed to spawn sampler thread")
}

fn spawn_publisher(
    bus: Arc<dyn BusClient>,
    ring: Arc<SampleRing>,
    shared: Arc<SharedContext>,
    batch_max: usize,
    batch_period_ms: u64,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("publisher".into())
        .spawn(move || {
            publisher::run(
                bus.as_ref(),
                POSITION_TOPIC,
                &ring,
                &shared,
                batch_max,
                Duration::from_millis(batch_period_ms),
            )
        })
        .expect("failed to spawn publisher thread")
}

fn spawn_dispatcher(
    dal: Arc<Dal>,
    topology: Arc<TopologyMap>,
    queue: Arc<CommandQueue>,
    bus: Arc<dyn BusClient>,
    shared: Arc<SharedContext>,
    epoch: Instant,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("dispatcher".into())
        .spawn(move || {
            dispatcher::run(&dal, &topology, &queue, bus.as_ref(), RESULT_TOPIC, &shared, epoch)
        })
        .expect("failed to spawn dispatcher thread")
}

/// Drive the MQTT event loop and append inbound command-topic payloads to
/// the Dispatcher's FIFO. This is the bus-owned callback context described
/// in `spec.md` §5: it does nothing but append to the queue.
fn spawn_bus_event_loop(
    mut connection: rumqttc::Connection,
    queue: Arc<CommandQueue>,
    shared: Arc<SharedContext>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("bus-event-loop".into())
        .spawn(move || {
            // `Connection::iter` blocks until an event arrives or the
            // connection is closed. Shutdown calls `BusClient::disconnect`
            // to force the latter so this thread can be joined.
            for notification in connection.iter() {
                if !shared.is_running() {
                    break;
                }
                match notification {
                    Ok(rumqttc::Event::Incoming(rumqttc::Packet::Publish(publish))) => {
                        if publish.topic == COMMAND_TOPIC {
                            let dropped = queue.push(CommandRecord::new(publish.payload.to_vec()));
                            if dropped {
                                shared.counters.record_command_dropped();
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        log::warn!("bus event loop: connection error: {err}");
                        if !shared.is_running() {
                            break;
                        }
                    }
                }
            }
        })
        .expect("failed to spawn bus event loop thread")
}
