mod reachability;
mod virtualnet;

pub use reachability::{MobilityRouter, ReachableStop};
pub use virtualnet::{VirtualNetworkConfig, synthesize_virtual_network};

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::shared::{Cell, Coordinate, Distance, MIN_PICKUP_BATTERY, Mode};

/// A free-floating shared vehicle as reported by the inventory service.
#[derive(Debug, Clone)]
pub struct FreeVehicle {
    pub id: Arc<str>,
    pub coordinate: Coordinate,
    pub mode: Mode,
    pub battery_pct: f32,
    pub available: bool,
}

/// A docked-bike station. Bikes rented here must be returned to a station.
#[derive(Debug, Clone)]
pub struct DockStation {
    pub id: Arc<str>,
    pub name: Arc<str>,
    pub coordinate: Coordinate,
    pub capacity: u32,
    pub bikes_available: u32,
    pub docks_available: u32,
    pub active: bool,
}

/// Wire row for a free-floating vehicle (GBFS-style feed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub id: String,
    pub lat: f32,
    pub lon: f32,
    pub mode: Mode,
    pub battery_pct: f32,
    #[serde(default = "default_true")]
    pub available: bool,
}

/// Wire row for a dock station (GBFS-style feed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockRecord {
    pub id: String,
    pub name: String,
    pub lat: f32,
    pub lon: f32,
    pub capacity: u32,
    pub bikes_available: u32,
    pub docks_available: u32,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Whether a dock query wants bikes to take or slots to leave one in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DockFilter {
    Pickup,
    Dropoff,
    Any,
}

/// A vehicle the traveler has picked up and is still moving with.
#[derive(Debug, Clone, PartialEq)]
pub struct CarriedVehicle {
    pub mode: Mode,
    pub id: Arc<str>,
    pub battery_pct: f32,
    pub must_return: bool,
}

/// A point-in-time view of the shared-mobility inventory. Immutable once
/// built; the planner swaps whole snapshots between queries.
#[derive(Debug, Default)]
pub struct MobilitySnapshot {
    vehicles: Box<[FreeVehicle]>,
    docks: Box<[DockStation]>,
    vehicle_cells: HashMap<Cell, Box<[u32]>>,
    dock_cells: HashMap<Cell, Box<[u32]>>,
}

impl MobilitySnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_records(vehicles: Vec<VehicleRecord>, docks: Vec<DockRecord>) -> Self {
        let vehicles: Vec<FreeVehicle> = vehicles
            .into_iter()
            .map(|record| FreeVehicle {
                id: record.id.into(),
                coordinate: Coordinate::new(record.lat, record.lon),
                mode: record.mode,
                battery_pct: record.battery_pct,
                available: record.available,
            })
            .collect();
        let docks: Vec<DockStation> = docks
            .into_iter()
            .map(|record| DockStation {
                id: record.id.into(),
                name: record.name.into(),
                coordinate: Coordinate::new(record.lat, record.lon),
                capacity: record.capacity,
                bikes_available: record.bikes_available,
                docks_available: record.docks_available,
                active: record.active,
            })
            .collect();
        Self::new(vehicles, docks)
    }

    pub fn new(vehicles: Vec<FreeVehicle>, docks: Vec<DockStation>) -> Self {
        let mut vehicle_cells: HashMap<Cell, Vec<u32>> = HashMap::new();
        vehicles.iter().enumerate().for_each(|(i, vehicle)| {
            vehicle_cells
                .entry(vehicle.coordinate.to_cell())
                .or_default()
                .push(i as u32);
        });
        let mut dock_cells: HashMap<Cell, Vec<u32>> = HashMap::new();
        docks.iter().enumerate().for_each(|(i, dock)| {
            dock_cells
                .entry(dock.coordinate.to_cell())
                .or_default()
                .push(i as u32);
        });
        debug!(
            "Mobility snapshot: {} vehicles, {} docks",
            vehicles.len(),
            docks.len()
        );
        Self {
            vehicles: vehicles.into(),
            docks: docks.into(),
            vehicle_cells: vehicle_cells
                .into_iter()
                .map(|(cell, idxs)| (cell, idxs.into()))
                .collect(),
            dock_cells: dock_cells
                .into_iter()
                .map(|(cell, idxs)| (cell, idxs.into()))
                .collect(),
        }
    }

    pub fn vehicles(&self) -> &[FreeVehicle] {
        &self.vehicles
    }

    pub fn docks(&self) -> &[DockStation] {
        &self.docks
    }

    /// Rentable free-floating vehicles within `radius` of a point, closest
    /// first. Unavailable or near-empty vehicles are filtered out.
    pub fn vehicles_near(
        &self,
        point: &Coordinate,
        radius: Distance,
        mode_filter: Option<Mode>,
    ) -> Vec<(&FreeVehicle, Distance)> {
        let mut found: Vec<(&FreeVehicle, Distance)> = self
            .cells_within(&self.vehicle_cells, point, radius)
            .filter_map(|idx| {
                let vehicle = &self.vehicles[idx as usize];
                if !vehicle.available
                    || vehicle.battery_pct < MIN_PICKUP_BATTERY
                    || mode_filter.is_some_and(|mode| vehicle.mode != mode)
                {
                    return None;
                }
                let d = vehicle.coordinate.haversine_distance(point);
                (d <= radius).then_some((vehicle, d))
            })
            .collect();
        found.sort_by(|(a_v, a), (b_v, b)| {
            a.partial_cmp(b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a_v.id.cmp(&b_v.id))
        });
        found
    }

    /// Dock stations within `radius`, closest first, filtered by what the
    /// caller needs (bikes for pickup, free slots for dropoff).
    pub fn docks_near(
        &self,
        point: &Coordinate,
        radius: Distance,
        filter: DockFilter,
    ) -> Vec<(&DockStation, Distance)> {
        let mut found: Vec<(&DockStation, Distance)> = self
            .cells_within(&self.dock_cells, point, radius)
            .filter_map(|idx| {
                let dock = &self.docks[idx as usize];
                if !dock.active {
                    return None;
                }
                let usable = match filter {
                    DockFilter::Pickup => dock.bikes_available > 0,
                    DockFilter::Dropoff => dock.docks_available > 0,
                    DockFilter::Any => true,
                };
                if !usable {
                    return None;
                }
                let d = dock.coordinate.haversine_distance(point);
                (d <= radius).then_some((dock, d))
            })
            .collect();
        found.sort_by(|(a_d, a), (b_d, b)| {
            a.partial_cmp(b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a_d.id.cmp(&b_d.id))
        });
        found
    }

    pub fn has_dropoff_dock_near(&self, point: &Coordinate, radius: Distance) -> bool {
        !self.docks_near(point, radius, DockFilter::Dropoff).is_empty()
    }

    fn cells_within<'a>(
        &'a self,
        cells: &'a HashMap<Cell, Box<[u32]>>,
        point: &Coordinate,
        radius: Distance,
    ) -> impl Iterator<Item = u32> + 'a {
        let reach =
            (radius.as_meters() / crate::shared::geo::SPATIAL_CELL_SIZE.as_meters()).ceil() as i32;
        let (origin_x, origin_y) = point.to_cell();
        (-reach..=reach).flat_map(move |x| {
            (-reach..=reach).flat_map(move |y| {
                cells
                    .get(&(origin_x + x, origin_y + y))
                    .into_iter()
                    .flat_map(|idxs| idxs.iter().copied())
            })
        })
    }
}
