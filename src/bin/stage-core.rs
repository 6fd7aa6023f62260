//! stage-core daemon entry point.
//!
//! # Scope
//! Per `spec.md` §1, the operator CLI, its argument parsing, and log line
//! formatting are deliberately out of scope. This binary owns only the
//! process-level concerns SPEC_FULL.md assigns it: logging
//! initialization, building a [`Config`] from the environment, wiring the
//! [`Runtime`], and exiting non-zero on a fatal startup error
//! (`spec.md` §7).
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use stage_core::dal::mock::MockDriver;
use stage_core::dal::MotionDriver;
use stage_core::{Config, Runtime};

fn main() -> ExitCode {
    env_logger::init();

    let config = Config::from_env();
    let driver = default_driver(&config);

    let runtime = match Runtime::start(config, driver) {
        Ok(runtime) => runtime,
        Err(err) => {
            log::error!("stage-core: fatal startup error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let shutdown_requested = Arc::new(AtomicBool::new(false));
    if let Err(err) = signal_hook::flag::register(
        signal_hook::consts::SIGINT,
        shutdown_requested.clone(),
    ) {
        log::warn!("stage-core: failed to register SIGINT handler: {err}");
    }

    while !shutdown_requested.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));
    }

    log::info!("stage-core: SIGINT received, shutting down");
    runtime.shutdown();
    ExitCode::SUCCESS
}

/// The vendor motion-controller library is an external capability
/// (`spec.md` §6.5) not provided by this crate. Absent a concrete driver,
/// the binary runs against the in-memory [`MockDriver`], configured with
/// the two controller ids the Topology Map expects to resolve — any
/// [`MotionDriver`] implementation satisfying `spec.md` §4.1 is a drop-in
/// replacement.
fn default_driver(config: &Config) -> Box<dyn MotionDriver> {
    Box::new(MockDriver::with_controllers(&[
        (config.controller_a, 3),
        (config.controller_b, 1),
    ]))
}
