//! stage-core: the real-time sampling and dispatch core for a
//! piezoelectric stage positioning service.
//!
//! # Design
//! The crate is organized the way the teacher's `stabilizer` crate is
//! organized around its hardware/network split: a library of components
//! (`dal`, `topology`, `ring`, `sampler`, `net`, `status`) plus a thin
//! binary (`src/bin/stage-core.rs`) that wires them together. See
//! `SPEC_FULL.md` for the full specification and `DESIGN.md` for the
//! grounding of each module in the teacher or the wider example pack.
pub mod command;
pub mod config;
pub mod dal;
pub mod error;
pub mod net;
pub mod ring;
pub mod runtime;
pub mod sample;
pub mod sampler;
pub mod status;
pub mod topology;

pub use config::Config;
pub use error::CoreError;
pub use runtime::Runtime;
