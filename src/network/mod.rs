mod entities;
mod source;

pub use entities::*;
pub use source::{NetworkTables, RouteRecord, StopRecord, TransferRecord};

pub(crate) use source::walk_transfer_record;

use std::{collections::HashMap, sync::Arc};

use thiserror::Error;
use tracing::warn;

use crate::shared::{Cell, Coordinate, Distance, SPATIAL_CELL_SIZE};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Preprocessed network is missing or empty")]
    EmptyNetwork,
}

/// Entries dropped during the build because they were inconsistent. One
/// summary warning is logged; the query path never sees them.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuildReport {
    pub skipped_routes: usize,
    pub skipped_trips: usize,
    pub skipped_transfers: usize,
}

impl BuildReport {
    fn total(&self) -> usize {
        self.skipped_routes + self.skipped_trips + self.skipped_transfers
    }
}

/// The read-only transit network: flat tables plus the lookup indices the
/// solver needs in O(1). Built once at startup; queries never mutate it.
#[derive(Debug, Default)]
pub struct Network {
    pub stops: Box<[Stop]>,
    pub routes: Box<[Route]>,
    /// Parallel with `routes`.
    pub timetables: Box<[Timetable]>,
    pub transfers: Box<[WalkTransfer]>,

    pub(crate) stop_lookup: HashMap<Arc<str>, u32>,
    pub(crate) route_lookup: HashMap<Arc<str>, u32>,
    /// `stop_index -> [transfer_index, ...]` (outgoing directions).
    pub(crate) stop_to_transfers: Box<[Box<[u32]>]>,
    /// `stop_index -> [route_index, ...]`, the precomputed serving-route
    /// index the route-scan bootstrap reads.
    pub(crate) routes_through_stop: Box<[Box<[u32]>]>,
    /// Spatial hash over stops for radius queries.
    pub(crate) stop_cells: HashMap<Cell, Box<[u32]>>,

    bounds: BoundingBox,
    report: BuildReport,
}

impl Network {
    /// Builds the store from the preprocessed tables, dropping and counting
    /// inconsistent entries.
    pub fn from_tables(tables: NetworkTables) -> Result<Self, Error> {
        if tables.is_empty() {
            return Err(Error::EmptyNetwork);
        }
        let mut network = Network::default();
        let mut report = BuildReport::default();
        network.load_stops(tables.stops);
        network.load_routes(tables.routes, &mut report);
        network.load_transfers(tables.transfers, &mut report);
        if network.routes.is_empty() {
            return Err(Error::EmptyNetwork);
        }
        network.generate_stop_adjacency();
        network.generate_geo_hash();
        network.bounds = BoundingBox::around(network.stops.iter().map(|stop| stop.coordinate));
        if report.total() > 0 {
            warn!(
                "Dropped inconsistent network entries: {} routes, {} trips, {} transfers",
                report.skipped_routes, report.skipped_trips, report.skipped_transfers
            );
        }
        network.report = report;
        Ok(network)
    }

    pub fn build_report(&self) -> BuildReport {
        self.report
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    pub fn stop_by_id(&self, id: &str) -> Option<&Stop> {
        let stop_index = self.stop_lookup.get(id)?;
        Some(&self.stops[*stop_index as usize])
    }

    pub fn route_by_id(&self, id: &str) -> Option<&Route> {
        let index = self.route_lookup.get(id)?;
        Some(&self.routes[*index as usize])
    }

    pub fn timetable(&self, route_idx: u32) -> &Timetable {
        &self.timetables[route_idx as usize]
    }

    /// The routes whose stop sequence contains this stop.
    pub fn routes_through(&self, stop_idx: u32) -> &[u32] {
        &self.routes_through_stop[stop_idx as usize]
    }

    /// Outgoing walk transfers from a stop.
    pub fn transfers_from(&self, stop_idx: u32) -> impl Iterator<Item = &WalkTransfer> {
        self.stop_to_transfers[stop_idx as usize]
            .iter()
            .map(|transfer_idx| &self.transfers[*transfer_idx as usize])
    }

    /// Spatial query: stop indices within `distance` of a coordinate
    /// (great-circle), closest first.
    pub fn stops_by_coordinate(
        &self,
        coordinate: &Coordinate,
        distance: Distance,
    ) -> Vec<(u32, Distance)> {
        let reach = (distance.as_meters() / SPATIAL_CELL_SIZE.as_meters()).ceil() as i32;
        let (origin_x, origin_y) = coordinate.to_cell();
        let mut found: Vec<(u32, Distance)> = Vec::new();
        for x in -reach..=reach {
            for y in -reach..=reach {
                let Some(stop_idxs) = self.stop_cells.get(&(origin_x + x, origin_y + y)) else {
                    continue;
                };
                for stop_idx in stop_idxs.iter() {
                    let stop = &self.stops[*stop_idx as usize];
                    let d = stop.coordinate.haversine_distance(coordinate);
                    if d <= distance {
                        found.push((*stop_idx, d));
                    }
                }
            }
        }
        found.sort_by(|(a_idx, a), (b_idx, b)| {
            a.partial_cmp(b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a_idx.cmp(b_idx))
        });
        found
    }
}

/// Service area of the network, padded so a query point at the last stop's
/// curb still counts as inside.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoundingBox {
    pub north: f32,
    pub south: f32,
    pub east: f32,
    pub west: f32,
}

impl BoundingBox {
    const PADDING_DEG: f32 = 0.01;

    pub fn around(coordinates: impl Iterator<Item = Coordinate>) -> Self {
        let mut bounds = BoundingBox {
            north: f32::MIN,
            south: f32::MAX,
            east: f32::MIN,
            west: f32::MAX,
        };
        for coordinate in coordinates {
            bounds.north = bounds.north.max(coordinate.latitude);
            bounds.south = bounds.south.min(coordinate.latitude);
            bounds.east = bounds.east.max(coordinate.longitude);
            bounds.west = bounds.west.min(coordinate.longitude);
        }
        bounds.north += Self::PADDING_DEG;
        bounds.south -= Self::PADDING_DEG;
        bounds.east += Self::PADDING_DEG;
        bounds.west -= Self::PADDING_DEG;
        bounds
    }

    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        coordinate.latitude <= self.north
            && coordinate.latitude >= self.south
            && coordinate.longitude <= self.east
            && coordinate.longitude >= self.west
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_stop_tables() -> NetworkTables {
        NetworkTables {
            stops: vec![
                StopRecord {
                    id: "A".into(),
                    name: "Alpha".into(),
                    lat: 37.5000,
                    lon: 127.0000,
                    kind: StopKind::Metro,
                    zone_tag: None,
                },
                StopRecord {
                    id: "B".into(),
                    name: "Beta".into(),
                    lat: 37.5100,
                    lon: 127.0100,
                    kind: StopKind::Metro,
                    zone_tag: None,
                },
            ],
            routes: vec![RouteRecord {
                id: "L1".into(),
                short_name: "1".into(),
                long_name: "Line One".into(),
                mode: crate::shared::Mode::Metro,
                stop_ids: vec!["A".into(), "B".into()],
                departures: vec![vec![500, 510, 505], vec![508, 518, 513]],
                arrivals: vec![vec![500, 510, 505], vec![508, 518, 513]],
            }],
            transfers: vec![TransferRecord {
                from_stop_id: "A".into(),
                to_stop_id: "B".into(),
                duration_min: 18,
                distance_m: Some(1450.0),
            }],
        }
    }

    #[test]
    fn builds_and_indexes() {
        let network = Network::from_tables(two_stop_tables()).unwrap();
        assert_eq!(network.stop_count(), 2);
        let a = network.stop_by_id("A").unwrap();
        assert_eq!(&*a.name, "Alpha");
        assert_eq!(network.routes_through(a.index), &[0]);
        // Transfers are symmetric.
        assert_eq!(network.transfers_from(0).count(), 1);
        assert_eq!(network.transfers_from(1).count(), 1);
    }

    #[test]
    fn trips_are_sorted_by_departure() {
        let network = Network::from_tables(two_stop_tables()).unwrap();
        let timetable = network.timetable(0);
        let first_row = timetable.departures_at(0);
        assert!(first_row.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(first_row[0].as_minutes(), 500);
        assert_eq!(first_row[2].as_minutes(), 510);
    }

    #[test]
    fn inconsistent_entries_are_counted() {
        let mut tables = two_stop_tables();
        // One backwards trip column, one transfer to nowhere.
        tables.routes[0].departures = vec![vec![500, 510], vec![495, 518]];
        tables.routes[0].arrivals = vec![vec![500, 510], vec![495, 518]];
        tables.transfers.push(TransferRecord {
            from_stop_id: "A".into(),
            to_stop_id: "GHOST".into(),
            duration_min: 3,
            distance_m: None,
        });
        let network = Network::from_tables(tables).unwrap();
        let report = network.build_report();
        assert_eq!(report.skipped_trips, 1);
        assert_eq!(report.skipped_transfers, 1);
        assert_eq!(network.timetable(0).trip_count, 1);
    }

    #[test]
    fn empty_network_is_a_config_error() {
        assert!(matches!(
            Network::from_tables(NetworkTables::default()),
            Err(Error::EmptyNetwork)
        ));
    }

    #[test]
    fn spatial_query_sorts_by_distance() {
        let network = Network::from_tables(two_stop_tables()).unwrap();
        let near_a = Coordinate::new(37.5001, 127.0001);
        let found = network.stops_by_coordinate(&near_a, Distance::from_kilometers(3.0));
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, 0);
    }

    #[test]
    fn bounding_box_contains_padded_area() {
        let network = Network::from_tables(two_stop_tables()).unwrap();
        assert!(network.bounds().contains(&Coordinate::new(37.505, 127.005)));
        assert!(!network.bounds().contains(&Coordinate::new(38.0, 127.005)));
    }
}
