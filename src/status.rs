//! Shared, read-mostly runtime state: counters, the configured sample
//! rate, and the global running flag.
//!
//! # Design
//! `spec.md` §9 models all process-wide mutable state as a single
//! composite context passed explicitly to every task at construction, with
//! individual atomic fields rather than a lock. This is the hosted
//! equivalent of the `Shared` resources the teacher guards behind RTIC's
//! lock-free priority ceiling: there is no ceiling protocol on a general
//! OS, so each field becomes its own atomic with the ordering relaxed,
//! since every one is purely observational (`spec.md` §5).
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::config::Config;

/// Atomic totals and the live sample rate/interval, shared by every task.
///
/// Single-writer per field: the Sampler owns `captured`/`dropped`, the
/// Publisher owns `published`, the Dispatcher owns the rate and interval.
#[derive(Debug, Default)]
pub struct CounterBlock {
    captured: AtomicU64,
    published: AtomicU64,
    dropped: AtomicU64,
    command_dropped: AtomicU64,
    sample_rate_hz: AtomicU32,
    interval_ns: AtomicU64,
}

impl CounterBlock {
    fn new(initial_rate_hz: u32) -> Self {
        let block = Self::default();
        block.set_sample_rate(initial_rate_hz);
        block
    }

    pub fn captured(&self) -> u64 {
        self.captured.load(Ordering::Relaxed)
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn command_dropped(&self) -> u64 {
        self.command_dropped.load(Ordering::Relaxed)
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz.load(Ordering::Relaxed)
    }

    pub fn interval_ns(&self) -> u64 {
        self.interval_ns.load(Ordering::Relaxed)
    }

    pub fn record_captured(&self) {
        self.captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_published(&self, count: u64) {
        self.published.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_command_dropped(&self) {
        self.command_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Set a new sample rate and recompute the tick interval. Owned by the
    /// Dispatcher; observed by the Sampler at the top of its next tick,
    /// per `spec.md` §4.4/§5.
    pub fn set_sample_rate(&self, hz: u32) {
        self.sample_rate_hz.store(hz, Ordering::Relaxed);
        let interval = 1_000_000_000u64 / hz.max(1) as u64;
        self.interval_ns.store(interval, Ordering::Relaxed);
    }
}

/// The process-wide shared context: counters plus the global running flag.
/// Constructed once at startup and cloned into every task as an `Arc`.
#[derive(Debug, Default)]
pub struct SharedContext {
    pub counters: CounterBlock,
    running: AtomicBool,
}

impl SharedContext {
    pub fn new(config: &Config) -> Self {
        Self {
            counters: CounterBlock::new(config.initial_sample_rate_hz),
            running: AtomicBool::new(true),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Clear the running flag; every task loop observes this at its own
    /// cadence and exits (`spec.md` §5).
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}
