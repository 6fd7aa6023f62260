//! Error taxonomy for the core.
//!
//! # Design
//! Two error enums cover the two failure classes described in the design:
//! [`DeviceError`] is raised by an individual Device Access Layer operation
//! and is folded into a `FAILED` result detail by the Dispatcher, never
//! propagated further. [`CoreError`] is raised only by initialization and is
//! fatal: the caller logs it and exits the process with a non-zero status.
use thiserror::Error;

/// An error surfaced by a single Device Access Layer operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("controller not found")]
    NotFound,
    #[error("controller is locked by another client")]
    Locked,
    #[error("device I/O error: {0}")]
    Io(String),
    #[error("device operation timed out")]
    Timeout,
    #[error("value out of range")]
    OutOfRange,
}

/// A fatal error encountered during startup.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("no motion controllers were enumerated")]
    NoControllers,
    #[error("failed to reach the message bus at startup: {0}")]
    BusUnreachable(String),
    #[error("device access layer error: {0}")]
    Device(#[from] DeviceError),
}
