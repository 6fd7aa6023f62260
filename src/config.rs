//! Runtime configuration.
//!
//! # Design
//! Argument parsing and an operator-facing CLI are out of scope for the
//! core (`spec.md` §1); this module only carries the ambient-minimum
//! surface a hosted service needs to be configurable without a command
//! line: a plain struct with values matching the spec's stated defaults,
//! optionally overridden from the environment.
use std::net::{IpAddr, Ipv4Addr};

/// Default controller id resolved to logical axes X, Y, Z (`spec.md` §4.2).
pub const DEFAULT_CONTROLLER_A: u16 = 4;
/// Default controller id resolved to logical axis R (`spec.md` §4.2).
pub const DEFAULT_CONTROLLER_B: u16 = 2222;

/// Minimum accepted sample rate, inclusive (`spec.md` §4.6 SET_RATE).
pub const MIN_SAMPLE_RATE_HZ: u32 = 100;
/// Maximum accepted sample rate, inclusive (`spec.md` §4.6 SET_RATE).
pub const MAX_SAMPLE_RATE_HZ: u32 = 15_000;

pub const POSITION_TOPIC: &str = "microscope/stage/position";
pub const COMMAND_TOPIC: &str = "microscope/stage/command";
pub const RESULT_TOPIC: &str = "microscope/stage/result";
pub const STATUS_TOPIC: &str = "microscope/stage/status";

/// Process-wide configuration, constructed once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Controller id mapped to logical axes X, Y, Z.
    pub controller_a: u16,
    /// Controller id mapped to logical axis R.
    pub controller_b: u16,
    /// Initial sample rate in Hz, must lie within
    /// `[MIN_SAMPLE_RATE_HZ, MAX_SAMPLE_RATE_HZ]`.
    pub initial_sample_rate_hz: u32,
    /// Capacity of the Sample Ring, in records. Must be at least
    /// `4 * batch_max`.
    pub ring_capacity: usize,
    /// Maximum records drained by the Publisher per batch.
    pub batch_max: usize,
    /// Publisher batch period.
    pub batch_period_ms: u64,
    /// MQTT broker address.
    pub broker: IpAddr,
    /// MQTT broker port.
    pub broker_port: u16,
    /// MQTT client id prefix; the process pid is appended to disambiguate
    /// concurrent instances the way the teacher appends a MAC address.
    pub client_id_prefix: String,
    /// Bounded capacity of the Dispatcher's inbound command queue.
    pub command_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            controller_a: DEFAULT_CONTROLLER_A,
            controller_b: DEFAULT_CONTROLLER_B,
            initial_sample_rate_hz: 1_000,
            ring_capacity: 4096,
            batch_max: 256,
            batch_period_ms: 100,
            broker: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            broker_port: 1883,
            client_id_prefix: "stage-core".into(),
            command_queue_capacity: 64,
        }
    }
}

impl Config {
    /// Overlay environment variables onto the defaults.
    ///
    /// Recognized variables: `STAGE_CORE_CONTROLLER_A`,
    /// `STAGE_CORE_CONTROLLER_B`, `STAGE_CORE_SAMPLE_RATE_HZ`,
    /// `STAGE_CORE_RING_CAPACITY`, `STAGE_CORE_BATCH_MAX`,
    /// `STAGE_CORE_BATCH_PERIOD_MS`, `STAGE_CORE_BROKER`,
    /// `STAGE_CORE_BROKER_PORT`. Unset or unparsable variables fall back to
    /// the default value; this mirrors the teacher's use of
    /// `option_env!("BROKER").unwrap_or(...)` at startup.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_u16("STAGE_CORE_CONTROLLER_A") {
            cfg.controller_a = v;
        }
        if let Some(v) = env_u16("STAGE_CORE_CONTROLLER_B") {
            cfg.controller_b = v;
        }
        if let Some(v) = env_parse::<u32>("STAGE_CORE_SAMPLE_RATE_HZ") {
            cfg.initial_sample_rate_hz = v;
        }
        if let Some(v) = env_parse::<usize>("STAGE_CORE_RING_CAPACITY") {
            cfg.ring_capacity = v;
        }
        if let Some(v) = env_parse::<usize>("STAGE_CORE_BATCH_MAX") {
            cfg.batch_max = v;
        }
        if let Some(v) = env_parse::<u64>("STAGE_CORE_BATCH_PERIOD_MS") {
            cfg.batch_period_ms = v;
        }
        if let Some(v) = env_parse::<IpAddr>("STAGE_CORE_BROKER") {
            cfg.broker = v;
        }
        if let Some(v) = env_u16("STAGE_CORE_BROKER_PORT") {
            cfg.broker_port = v;
        }
        cfg
    }

    /// Validate that the initial sample rate and ring sizing satisfy the
    /// invariants in `spec.md` §4.3 and §4.6.
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_SAMPLE_RATE_HZ..=MAX_SAMPLE_RATE_HZ)
            .contains(&self.initial_sample_rate_hz)
        {
            return Err(format!(
                "initial sample rate {} Hz outside [{}, {}]",
                self.initial_sample_rate_hz,
                MIN_SAMPLE_RATE_HZ,
                MAX_SAMPLE_RATE_HZ
            ));
        }
        if self.ring_capacity < 4 * self.batch_max {
            return Err(format!(
                "ring capacity {} must be at least 4x batch_max {}",
                self.ring_capacity, self.batch_max
            ));
        }
        Ok(())
    }
}

fn env_u16(name: &str) -> Option<u16> {
    env_parse(name)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_undersized_ring() {
        let mut cfg = Config::default();
        cfg.ring_capacity = cfg.batch_max;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_rate() {
        let mut cfg = Config::default();
        cfg.initial_sample_rate_hz = 50;
        assert!(cfg.validate().is_err());
    }
}
