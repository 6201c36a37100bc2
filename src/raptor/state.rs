use std::sync::Arc;

use crate::{
    mobility::CarriedVehicle,
    shared::{Distance, Mode, Time},
};

/// Sentinel stop index for the query point itself; access parents point at
/// it instead of a real stop.
pub(crate) const QUERY_POINT: u32 = u32::MAX;

/// The non-time half of a label: money spent so far, the vehicle in hand,
/// and whether the label is inside a paid transit stretch. Kept in arrays
/// parallel to the arrival matrix.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct LabelState {
    pub cost: u32,
    pub vehicle: Option<CarriedVehicle>,
    /// Route of the last transit boarding if only rides and walks happened
    /// since. Boarding while this is set is a free transfer; mobility rides
    /// clear it, so a new stretch pays again.
    pub stretch_route: Option<u32>,
}

/// A relaxation staged by an exploration pass, applied by the allocator
/// under the strict-improvement rule.
#[derive(Debug, Clone)]
pub(crate) struct Update {
    pub stop_idx: u32,
    pub arrival: Time,
    pub state: LabelState,
    pub parent: Parent,
}

/// How a label came to be, with enough detail to rebuild the leg and the
/// predecessor `(round, stop)` to chain from.
#[derive(Debug, Clone)]
pub(crate) struct Parent {
    pub kind: ParentKind,
    pub from_round: u8,
    pub from_stop: u32,
    pub departure: Time,
    pub arrival: Time,
}

#[derive(Debug, Clone)]
pub(crate) enum ParentKind {
    Access {
        mode: Mode,
        walk_distance: Distance,
        ride_distance: Distance,
        cost: u32,
        vehicle_id: Option<Arc<str>>,
    },
    Ride {
        route_idx: u32,
        trip: u32,
        board_pos: u16,
        alight_pos: u16,
        fare: u32,
    },
    MobilityRide {
        mode: Mode,
        vehicle_id: Arc<str>,
        distance: Distance,
        pickup_walk: Distance,
        cost: u32,
    },
    WalkTransfer {
        distance: Distance,
    },
}

impl ParentKind {
    pub fn is_access(&self) -> bool {
        matches!(self, ParentKind::Access { .. })
    }

    pub fn is_ride(&self) -> bool {
        matches!(self, ParentKind::Ride { .. } | ParentKind::MobilityRide { .. })
    }
}
