//! Device Access Layer: a thin, synchronous wrapper around the vendor
//! motion-controller driver.
//!
//! # Design
//! The vendor driver is an external capability (`spec.md` §6.5); this
//! module defines it as a trait, [`MotionDriver`], the way the teacher
//! defines `AttenuatorInterface` and `PowerMeasurementInterface` as traits
//! over a concrete transport rather than reaching into hardware registers
//! from application code. Any driver satisfying the trait's contract is
//! acceptable; [`mock`] provides an in-memory implementation for tests and
//! for running without hardware attached.
//!
//! Every operation is synchronous and, per the contract in `spec.md` §4.1,
//! expected to complete in a few hundred microseconds; callers other than
//! the Dispatcher must not invoke the layer directly from a deadline-bound
//! loop. [`ControllerState`] wraps each driver handle in a `Mutex`
//! unconditionally: the layer cannot know whether a given concrete driver
//! serializes internally, so it takes the conservative path described in
//! `spec.md` §4.1's "serializes calls against the same handle" contract.
pub mod mock;
pub mod status;

use std::sync::Mutex;

use crate::error::DeviceError;
use crate::topology::EnumeratedController;
pub use status::{AxisFlags, AxisStatus, MovingState};

/// An opaque per-controller handle returned by [`MotionDriver::connect`].
/// The driver alone interprets its contents; callers only ever pass it
/// back to subsequent operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerHandle(pub usize);

/// Information returned by a successful `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectInfo {
    pub handle: ControllerHandle,
    pub firmware_id: u32,
    pub locked: bool,
}

/// The narrow set of operations a motion-controller driver must provide,
/// per `spec.md` §4.1.
pub trait MotionDriver: Send + Sync {
    fn enumerate(&self) -> Result<Vec<EnumeratedController>, DeviceError>;
    fn connect(&self, slot: usize) -> Result<ConnectInfo, DeviceError>;
    fn is_connected(&self, handle: ControllerHandle, axis: u8) -> bool;
    fn read_position(&self, handle: ControllerHandle, axis: u8) -> Result<i32, DeviceError>;
    fn read_status(&self, handle: ControllerHandle, axis: u8) -> Result<AxisStatus, DeviceError>;
    fn set_target(&self, handle: ControllerHandle, axis: u8, pos: i32) -> Result<(), DeviceError>;
    fn set_move_enable(&self, handle: ControllerHandle, axis: u8, on: bool) -> Result<(), DeviceError>;
    fn set_output(&self, handle: ControllerHandle, axis: u8, on: bool) -> Result<(), DeviceError>;
    fn set_amplitude(&self, handle: ControllerHandle, axis: u8, mv: i32) -> Result<(), DeviceError>;
    fn set_frequency(&self, handle: ControllerHandle, axis: u8, mhz: i32) -> Result<(), DeviceError>;
    fn set_target_range(&self, handle: ControllerHandle, axis: u8, range: i32) -> Result<(), DeviceError>;
    fn read_amplitude(&self, handle: ControllerHandle, axis: u8) -> Result<i32, DeviceError>;
    fn read_frequency(&self, handle: ControllerHandle, axis: u8) -> Result<i32, DeviceError>;
    fn read_target_range(&self, handle: ControllerHandle, axis: u8) -> Result<i32, DeviceError>;
    fn close(&self, handle: ControllerHandle);
}

/// Per-slot device state: the driver handle, observed controller id, and
/// which of its up to three axes are connected. Owned by the DAL; borrowed
/// read-only by the Sampler and Dispatcher.
pub struct ControllerState {
    pub slot: usize,
    pub controller_id: u16,
    handle: Mutex<ControllerHandle>,
}

impl ControllerState {
    pub fn new(slot: usize, controller_id: u16, handle: ControllerHandle) -> Self {
        Self {
            slot,
            controller_id,
            handle: Mutex::new(handle),
        }
    }

    fn handle(&self) -> ControllerHandle {
        // Note(unwrap): only ever panics if a prior call to this controller
        // panicked while holding the lock, which would already have
        // poisoned every other handle-taking call on this slot.
        *self.handle.lock().unwrap()
    }
}

/// The device access layer: an enumerated, connected set of controllers
/// plus the driver used to talk to them.
pub struct Dal {
    driver: Box<dyn MotionDriver>,
    controllers: Vec<ControllerState>,
}

impl Dal {
    /// Enumerate and connect every controller the driver reports. Per
    /// `spec.md` §7, a driver-unreachable enumeration failure is fatal and
    /// left to the caller to turn into process exit; a per-controller
    /// connect failure is logged and that slot is simply absent from the
    /// resulting `Dal`.
    pub fn connect_all(driver: Box<dyn MotionDriver>) -> Result<(Self, Vec<EnumeratedController>), DeviceError> {
        let enumerated = driver.enumerate()?;
        let mut controllers = Vec::with_capacity(enumerated.len());
        for c in &enumerated {
            match driver.connect(c.slot) {
                Ok(info) => {
                    if info.locked {
                        log::warn!("controller {} (slot {}) reports locked", c.controller_id, c.slot);
                    }
                    controllers.push(ControllerState::new(c.slot, c.controller_id, info.handle));
                }
                Err(err) => {
                    log::warn!("failed to connect controller {} (slot {}): {err}", c.controller_id, c.slot);
                }
            }
        }
        Ok((Self { driver, controllers }, enumerated))
    }

    pub fn controllers(&self) -> &[ControllerState] {
        &self.controllers
    }

    fn state_for(&self, slot: usize) -> Option<&ControllerState> {
        self.controllers.iter().find(|c| c.slot == slot)
    }

    pub fn is_connected(&self, slot: usize, axis: u8) -> bool {
        self.state_for(slot)
            .map(|s| self.driver.is_connected(s.handle(), axis))
            .unwrap_or(false)
    }

    pub fn read_position(&self, slot: usize, axis: u8) -> Result<i32, DeviceError> {
        let state = self.state_for(slot).ok_or(DeviceError::NotFound)?;
        self.driver.read_position(state.handle(), axis)
    }

    pub fn read_status(&self, slot: usize, axis: u8) -> Result<AxisStatus, DeviceError> {
        let state = self.state_for(slot).ok_or(DeviceError::NotFound)?;
        self.driver.read_status(state.handle(), axis)
    }

    pub fn set_target(&self, slot: usize, axis: u8, pos: i32) -> Result<(), DeviceError> {
        let state = self.state_for(slot).ok_or(DeviceError::NotFound)?;
        self.driver.set_target(state.handle(), axis, pos)
    }

    pub fn set_move_enable(&self, slot: usize, axis: u8, on: bool) -> Result<(), DeviceError> {
        let state = self.state_for(slot).ok_or(DeviceError::NotFound)?;
        self.driver.set_move_enable(state.handle(), axis, on)
    }

    pub fn set_output(&self, slot: usize, axis: u8, on: bool) -> Result<(), DeviceError> {
        let state = self.state_for(slot).ok_or(DeviceError::NotFound)?;
        self.driver.set_output(state.handle(), axis, on)
    }

    pub fn set_amplitude(&self, slot: usize, axis: u8, mv: i32) -> Result<(), DeviceError> {
        let state = self.state_for(slot).ok_or(DeviceError::NotFound)?;
        self.driver.set_amplitude(state.handle(), axis, mv)
    }

    pub fn set_frequency(&self, slot: usize, axis: u8, mhz: i32) -> Result<(), DeviceError> {
        let state = self.state_for(slot).ok_or(DeviceError::NotFound)?;
        self.driver.set_frequency(state.handle(), axis, mhz)
    }

    pub fn set_target_range(&self, slot: usize, axis: u8, range: i32) -> Result<(), DeviceError> {
        let state = self.state_for(slot).ok_or(DeviceError::NotFound)?;
        self.driver.set_target_range(state.handle(), axis, range)
    }

    pub fn read_amplitude(&self, slot: usize, axis: u8) -> Result<i32, DeviceError> {
        let state = self.state_for(slot).ok_or(DeviceError::NotFound)?;
        self.driver.read_amplitude(state.handle(), axis)
    }

    pub fn read_frequency(&self, slot: usize, axis: u8) -> Result<i32, DeviceError> {
        let state = self.state_for(slot).ok_or(DeviceError::NotFound)?;
        self.driver.read_frequency(state.handle(), axis)
    }

    pub fn read_target_range(&self, slot: usize, axis: u8) -> Result<i32, DeviceError> {
        let state = self.state_for(slot).ok_or(DeviceError::NotFound)?;
        self.driver.read_target_range(state.handle(), axis)
    }

    /// Disable movement and output on every connected axis of every known
    /// controller. Called during shutdown, per `spec.md` §5.
    pub fn shutdown_all(&self, axes: impl Iterator<Item = (usize, u8)>) {
        for (slot, axis) in axes {
            if let Err(err) = self.set_move_enable(slot, axis, false) {
                log::warn!("shutdown: failed to disable move on slot {slot} axis {axis}: {err}");
            }
            if let Err(err) = self.set_output(slot, axis, false) {
                log::warn!("shutdown: failed to disable output on slot {slot} axis {axis}: {err}");
            }
        }
    }

    /// Close the driver handle of every connected controller. Called once
    /// at the end of shutdown, after [`shutdown_all`] has disabled move and
    /// output on every axis, per `spec.md` §5's "disable, then close
    /// handles" shutdown order.
    ///
    /// [`shutdown_all`]: Dal::shutdown_all
    pub fn close_all(&self) {
        for controller in &self.controllers {
            self.driver.close(controller.handle());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dal::mock::MockDriver;

    #[test]
    fn connect_all_skips_locked_controllers_gracefully() {
        let driver = MockDriver::with_controllers(&[(4, 3), (2222, 1)]);
        let (dal, enumerated) = Dal::connect_all(Box::new(driver)).unwrap();
        assert_eq!(enumerated.len(), 2);
        assert_eq!(dal.controllers().len(), 2);
    }

    #[test]
    fn read_position_reports_not_found_for_unknown_slot() {
        let driver = MockDriver::with_controllers(&[(4, 3)]);
        let (dal, _) = Dal::connect_all(Box::new(driver)).unwrap();
        assert_eq!(dal.read_position(99, 0), Err(DeviceError::NotFound));
    }

    #[test]
    fn close_all_closes_every_connected_controller_handle() {
        use std::sync::Arc;

        let driver = Arc::new(MockDriver::with_controllers(&[(4, 3), (2222, 1)]));
        let (dal, _) = Dal::connect_all(Box::new(driver.clone())).unwrap();
        assert!(driver.closed_handles().is_empty());

        dal.close_all();

        assert_eq!(driver.closed_handles().len(), 2);
    }
}
