//! An in-memory [`MotionDriver`] used by tests and by the binary when no
//! hardware is attached.
//!
//! Mirrors the way the teacher's `setup` module constructs a `pounder`
//! device only when hardware is detected and otherwise proceeds with
//! `None`: here, the same trait that a real vendor driver would implement
//! is satisfied by a plain data structure, so the rest of the core is
//! exercised identically whether or not real hardware is present.
use std::sync::Mutex;

use crate::dal::status::{AxisFlags, AxisStatus, MovingState};
use crate::dal::{ConnectInfo, ControllerHandle, MotionDriver};
use crate::error::DeviceError;
use crate::topology::EnumeratedController;

#[derive(Debug, Clone, Copy)]
struct AxisState {
    position: i32,
    target: i32,
    moving: bool,
    amplitude_mv: i32,
    frequency_mhz: i32,
    target_range: i32,
    connected: bool,
    fail_reads: bool,
}

impl Default for AxisState {
    fn default() -> Self {
        Self {
            position: 0,
            target: 0,
            moving: false,
            amplitude_mv: 1_000,
            frequency_mhz: 1_000_000,
            target_range: 50,
            connected: true,
            fail_reads: false,
        }
    }
}

struct MockController {
    controller_id: u16,
    axes: [AxisState; 3],
}

/// A fully in-memory motion-controller driver: controllers are configured
/// up front with an id and an axis count, then respond to every DAL
/// operation from plain Rust state instead of hardware.
pub struct MockDriver {
    controllers: Mutex<Vec<MockController>>,
    closed: Mutex<Vec<ControllerHandle>>,
}

impl MockDriver {
    /// Build a driver with one controller per `(controller_id, axis_count)`
    /// pair, enumerated in the given order.
    pub fn with_controllers(controllers: &[(u16, u8)]) -> Self {
        let controllers = controllers
            .iter()
            .map(|&(controller_id, axis_count)| {
                let mut axes = [AxisState::default(); 3];
                for axis in axes.iter_mut().skip(axis_count as usize) {
                    axis.connected = false;
                }
                MockController { controller_id, axes }
            })
            .collect();
        Self { controllers: Mutex::new(controllers), closed: Mutex::new(Vec::new()) }
    }

    /// Handles passed to [`MotionDriver::close`] so far, in call order.
    pub fn closed_handles(&self) -> Vec<ControllerHandle> {
        self.closed.lock().unwrap().clone()
    }

    /// Force every subsequent `read_position` for `(slot, axis)` to fail,
    /// simulating a transient per-sample read error (`spec.md` §7).
    pub fn fail_axis_reads(&self, slot: usize, axis: u8) {
        let mut controllers = self.controllers.lock().unwrap();
        controllers[slot].axes[axis as usize].fail_reads = true;
    }

    pub fn set_position(&self, slot: usize, axis: u8, position: i32) {
        let mut controllers = self.controllers.lock().unwrap();
        controllers[slot].axes[axis as usize].position = position;
    }
}

impl MotionDriver for MockDriver {
    fn enumerate(&self) -> Result<Vec<EnumeratedController>, DeviceError> {
        let controllers = self.controllers.lock().unwrap();
        Ok(controllers
            .iter()
            .enumerate()
            .map(|(slot, c)| EnumeratedController { slot, controller_id: c.controller_id })
            .collect())
    }

    fn connect(&self, slot: usize) -> Result<ConnectInfo, DeviceError> {
        let controllers = self.controllers.lock().unwrap();
        if slot >= controllers.len() {
            return Err(DeviceError::NotFound);
        }
        Ok(ConnectInfo { handle: ControllerHandle(slot), firmware_id: 1, locked: false })
    }

    fn is_connected(&self, handle: ControllerHandle, axis: u8) -> bool {
        let controllers = self.controllers.lock().unwrap();
        controllers[handle.0].axes[axis as usize].connected
    }

    fn read_position(&self, handle: ControllerHandle, axis: u8) -> Result<i32, DeviceError> {
        let controllers = self.controllers.lock().unwrap();
        let axis_state = &controllers[handle.0].axes[axis as usize];
        if axis_state.fail_reads {
            return Err(DeviceError::Timeout);
        }
        Ok(axis_state.position)
    }

    fn read_status(&self, handle: ControllerHandle, axis: u8) -> Result<AxisStatus, DeviceError> {
        let controllers = self.controllers.lock().unwrap();
        let axis_state = &controllers[handle.0].axes[axis as usize];
        let mut flags = AxisFlags::REF_VALID;
        if (axis_state.position - axis_state.target).unsigned_abs()
            <= axis_state.target_range as u32
        {
            flags |= AxisFlags::IN_TARGET;
        }
        Ok(AxisStatus {
            moving: if axis_state.moving { MovingState::Moving } else { MovingState::Idle },
            flags,
        })
    }

    fn set_target(&self, handle: ControllerHandle, axis: u8, pos: i32) -> Result<(), DeviceError> {
        let mut controllers = self.controllers.lock().unwrap();
        controllers[handle.0].axes[axis as usize].target = pos;
        controllers[handle.0].axes[axis as usize].position = pos;
        Ok(())
    }

    fn set_move_enable(&self, handle: ControllerHandle, axis: u8, on: bool) -> Result<(), DeviceError> {
        let mut controllers = self.controllers.lock().unwrap();
        controllers[handle.0].axes[axis as usize].moving = on;
        Ok(())
    }

    fn set_output(&self, _handle: ControllerHandle, _axis: u8, _on: bool) -> Result<(), DeviceError> {
        Ok(())
    }

    fn set_amplitude(&self, handle: ControllerHandle, axis: u8, mv: i32) -> Result<(), DeviceError> {
        let mut controllers = self.controllers.lock().unwrap();
        controllers[handle.0].axes[axis as usize].amplitude_mv = mv;
        Ok(())
    }

    fn set_frequency(&self, handle: ControllerHandle, axis: u8, mhz: i32) -> Result<(), DeviceError> {
        let mut controllers = self.controllers.lock().unwrap();
        controllers[handle.0].axes[axis as usize].frequency_mhz = mhz;
        Ok(())
    }

    fn set_target_range(&self, handle: ControllerHandle, axis: u8, range: i32) -> Result<(), DeviceError> {
        let mut controllers = self.controllers.lock().unwrap();
        controllers[handle.0].axes[axis as usize].target_range = range;
        Ok(())
    }

    fn read_amplitude(&self, handle: ControllerHandle, axis: u8) -> Result<i32, DeviceError> {
        let controllers = self.controllers.lock().unwrap();
        Ok(controllers[handle.0].axes[axis as usize].amplitude_mv)
    }

    fn read_frequency(&self, handle: ControllerHandle, axis: u8) -> Result<i32, DeviceError> {
        let controllers = self.controllers.lock().unwrap();
        Ok(controllers[handle.0].axes[axis as usize].frequency_mhz)
    }

    fn read_target_range(&self, handle: ControllerHandle, axis: u8) -> Result<i32, DeviceError> {
        let controllers = self.controllers.lock().unwrap();
        Ok(controllers[handle.0].axes[axis as usize].target_range)
    }

    fn close(&self, handle: ControllerHandle) {
        self.closed.lock().unwrap().push(handle);
    }
}

/// Lets a test hold onto a [`MockDriver`] by `Arc` while also handing a
/// `Box<dyn MotionDriver>` of the same instance to [`Dal::connect_all`], so
/// the test can later inspect side effects (e.g. which handles were
/// closed) after the `Dal` has taken ownership of its own driver handle.
#[cfg(test)]
impl MotionDriver for std::sync::Arc<MockDriver> {
    fn enumerate(&self) -> Result<Vec<EnumeratedController>, DeviceError> {
        (**self).enumerate()
    }
    fn connect(&self, slot: usize) -> Result<ConnectInfo, DeviceError> {
        (**self).connect(slot)
    }
    fn is_connected(&self, handle: ControllerHandle, axis: u8) -> bool {
        (**self).is_connected(handle, axis)
    }
    fn read_position(&self, handle: ControllerHandle, axis: u8) -> Result<i32, DeviceError> {
        (**self).read_position(handle, axis)
    }
    fn read_status(&self, handle: ControllerHandle, axis: u8) -> Result<AxisStatus, DeviceError> {
        (**self).read_status(handle, axis)
    }
    fn set_target(&self, handle: ControllerHandle, axis: u8, pos: i32) -> Result<(), DeviceError> {
        (**self).set_target(handle, axis, pos)
    }
    fn set_move_enable(&self, handle: ControllerHandle, axis: u8, on: bool) -> Result<(), DeviceError> {
        (**self).set_move_enable(handle, axis, on)
    }
    fn set_output(&self, handle: ControllerHandle, axis: u8, on: bool) -> Result<(), DeviceError> {
        (**self).set_output(handle, axis, on)
    }
    fn set_amplitude(&self, handle: ControllerHandle, axis: u8, mv: i32) -> Result<(), DeviceError> {
        (**self).set_amplitude(handle, axis, mv)
    }
    fn set_frequency(&self, handle: ControllerHandle, axis: u8, mhz: i32) -> Result<(), DeviceError> {
        (**self).set_frequency(handle, axis, mhz)
    }
    fn set_target_range(&self, handle: ControllerHandle, axis: u8, range: i32) -> Result<(), DeviceError> {
        (**self).set_target_range(handle, axis, range)
    }
    fn read_amplitude(&self, handle: ControllerHandle, axis: u8) -> Result<i32, DeviceError> {
        (**self).read_amplitude(handle, axis)
    }
    fn read_frequency(&self, handle: ControllerHandle, axis: u8) -> Result<i32, DeviceError> {
        (**self).read_frequency(handle, axis)
    }
    fn read_target_range(&self, handle: ControllerHandle, axis: u8) -> Result<i32, DeviceError> {
        (**self).read_target_range(handle, axis)
    }
    fn close(&self, handle: ControllerHandle) {
        (**self).close(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_target_moves_reported_position() {
        let driver = MockDriver::with_controllers(&[(4, 3)]);
        let handle = driver.connect(0).unwrap().handle;
        driver.set_target(handle, 1, 5_000).unwrap();
        assert_eq!(driver.read_position(handle, 1).unwrap(), 5_000);
    }

    #[test]
    fn forced_read_failure_surfaces_as_timeout() {
        let driver = MockDriver::with_controllers(&[(4, 3)]);
        driver.fail_axis_reads(0, 0);
        let handle = driver.connect(0).unwrap().handle;
        assert_eq!(driver.read_position(handle, 0), Err(DeviceError::Timeout));
        assert!(driver.read_position(handle, 1).is_ok());
    }

    #[test]
    fn axes_beyond_axis_count_are_disconnected() {
        let driver = MockDriver::with_controllers(&[(2222, 1)]);
        let handle = driver.connect(0).unwrap().handle;
        assert!(driver.is_connected(handle, 0));
        assert!(!driver.is_connected(handle, 1));
    }
}
