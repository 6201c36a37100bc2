pub mod access;
pub mod hybrid;
pub mod journey;
pub mod mobility;
pub mod network;
pub mod planner;
pub mod raptor;
pub mod roadgraph;
pub mod shared;

pub mod prelude {
    pub use crate::access::{AccessLimits, AccessOption};
    pub use crate::hybrid::{HybridPlanner, RoutingStrategy, ZoneConfig, ZoneGrid};
    pub use crate::journey::{Journey, Leg, LegKind};
    pub use crate::mobility::{CarriedVehicle, DockStation, FreeVehicle, MobilitySnapshot};
    pub use crate::network::{Network, NetworkTables};
    pub use crate::planner::{
        EmptyReason, Planner, Policy, Preference, RouteRequest, SearchResult,
    };
    pub use crate::roadgraph::{GeoKernel, RoadGraph};
    pub use crate::shared::{Coordinate, Distance, Duration, Mode, Time};
}
