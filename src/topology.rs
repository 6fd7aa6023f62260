//! The Topology Map: logical axis name to physical (controller, axis) pair.
//!
//! # Design
//! Built once from the observed device set at startup and never mutated
//! afterwards (`spec.md` §4.2); re-enumeration requires a restart. The map
//! from controller id to enumeration slot is resolved by linear scan,
//! first match wins — a small fixed lookup over at most a handful of
//! controllers does not warrant a hash map.
use crate::dal::Dal;
use crate::sample::AxisId;

/// A physical output: an enumeration slot and an axis index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalAddress {
    pub slot: usize,
    pub axis: u8,
}

/// One row of the Topology Map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologyEntry {
    pub axis: AxisId,
    pub address: PhysicalAddress,
    pub connected: bool,
}

/// An enumerated controller: its slot index and the id the driver reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumeratedController {
    pub slot: usize,
    pub controller_id: u16,
}

/// The static logical-to-physical axis mapping, normalized on the
/// streaming-code convention Y=0, X=1, Z=2 on the XYZ controller
/// (`spec.md` §9 Open Questions).
#[derive(Debug, Clone, Copy)]
struct AxisMapping {
    axis: AxisId,
    controller_id: u16,
    axis_index: u8,
}

fn default_mapping(controller_a: u16, controller_b: u16) -> [AxisMapping; 4] {
    [
        AxisMapping { axis: AxisId::X, controller_id: controller_a, axis_index: 1 },
        AxisMapping { axis: AxisId::Y, controller_id: controller_a, axis_index: 0 },
        AxisMapping { axis: AxisId::Z, controller_id: controller_a, axis_index: 2 },
        AxisMapping { axis: AxisId::R, controller_id: controller_b, axis_index: 0 },
    ]
}

/// Immutable-after-init table mapping {X, Y, Z, R} to (controller-slot,
/// axis-index) pairs.
#[derive(Debug, Clone)]
pub struct TopologyMap {
    entries: [TopologyEntry; 4],
}

impl TopologyMap {
    /// Build the map from the set of enumerated controllers, resolving
    /// `controller_a`/`controller_b` ids to slots. Axes whose controller id
    /// was not observed are marked disconnected; the system still starts,
    /// per `spec.md` §4.2.
    pub fn build(
        enumerated: &[EnumeratedController],
        controller_a: u16,
        controller_b: u16,
    ) -> Self {
        let mapping = default_mapping(controller_a, controller_b);
        let mut entries = [TopologyEntry {
            axis: AxisId::X,
            address: PhysicalAddress { slot: 0, axis: 0 },
            connected: false,
        }; 4];

        for (i, m) in mapping.iter().enumerate() {
            let slot = enumerated
                .iter()
                .find(|c| c.controller_id == m.controller_id)
                .map(|c| c.slot);
            entries[i] = TopologyEntry {
                axis: m.axis,
                address: PhysicalAddress {
                    slot: slot.unwrap_or(0),
                    axis: m.axis_index,
                },
                connected: slot.is_some(),
            };
        }
        Self { entries }
    }

    /// Resolve a logical axis to its physical address, if connected.
    pub fn resolve(&self, axis: AxisId) -> Option<PhysicalAddress> {
        self.entries
            .iter()
            .find(|e| e.axis == axis && e.connected)
            .map(|e| e.address)
    }

    /// Iterate the axes that are connected, in a fixed X, Y, Z, R order.
    pub fn iter_connected(&self) -> impl Iterator<Item = (AxisId, PhysicalAddress)> + '_ {
        self.entries
            .iter()
            .filter(|e| e.connected)
            .map(|e| (e.axis, e.address))
    }

    /// All entries, connected or not, for status reporting.
    pub fn entries(&self) -> &[TopologyEntry; 4] {
        &self.entries
    }

    /// Clear `connected` on any axis whose controller enumerated but whose
    /// driver reports that specific axis as absent (e.g. a controller wired
    /// with fewer axes than the mapping expects). Call once after [`build`]
    /// with the [`Dal`] the enumeration came from.
    ///
    /// [`build`]: TopologyMap::build
    pub fn refine_connectivity(&mut self, dal: &Dal) {
        for entry in self.entries.iter_mut() {
            if entry.connected && !dal.is_connected(entry.address.slot, entry.address.axis) {
                entry.connected = false;
            }
        }
    }
}
