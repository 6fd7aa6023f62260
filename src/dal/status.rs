//! Axis status flags reported by `read_status` (`spec.md` §4.1).
use bitflags::bitflags;

/// Motion state of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovingState {
    Idle,
    Moving,
    Pending,
}

bitflags! {
    /// Hardware-reported condition flags for a single axis.
    pub struct AxisFlags: u8 {
        /// The controller has an established zero point for the axis.
        const REF_VALID  = 0b0000_0001;
        /// Forward end-of-travel limit reached.
        const EOT_FWD    = 0b0000_0010;
        /// Backward end-of-travel limit reached.
        const EOT_BKWD   = 0b0000_0100;
        /// The axis is within its configured target range.
        const IN_TARGET  = 0b0000_1000;
        /// The controller reports an error condition on this axis.
        const ERROR      = 0b0001_0000;
    }
}

/// Full status snapshot for one axis, as returned by `read_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisStatus {
    pub moving: MovingState,
    pub flags: AxisFlags,
}

impl AxisStatus {
    pub fn ref_valid(&self) -> bool {
        self.flags.contains(AxisFlags::REF_VALID)
    }

    pub fn eot_fwd(&self) -> bool {
        self.flags.contains(AxisFlags::EOT_FWD)
    }

    pub fn eot_bkwd(&self) -> bool {
        self.flags.contains(AxisFlags::EOT_BKWD)
    }

    pub fn in_target(&self) -> bool {
        self.flags.contains(AxisFlags::IN_TARGET)
    }

    pub fn error(&self) -> bool {
        self.flags.contains(AxisFlags::ERROR)
    }
}
