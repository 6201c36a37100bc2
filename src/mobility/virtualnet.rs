use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::debug;

use crate::{
    mobility::MobilitySnapshot,
    network::{NetworkTables, RouteRecord, StopKind, StopRecord, walk_transfer_record},
    roadgraph::GeoKernel,
    shared::{Cell, Coordinate, Distance, Mode, Time},
};

/// Knobs of the virtual-network synthesis. Defaults follow the shipped
/// service profile.
#[derive(Debug, Clone, Copy)]
pub struct VirtualNetworkConfig {
    /// Longest pedal-bike virtual edge.
    pub bike_cutoff: Distance,
    /// Longest kickboard virtual edge.
    pub kickboard_cutoff: Distance,
    /// Longest e-bike virtual edge.
    pub ebike_cutoff: Distance,
    /// Virtual edges kept per origin stop, nearest first.
    pub neighbor_cap: usize,
    /// Synthetic headway in minutes.
    pub headway: u32,
    pub service_start: Time,
    pub service_end: Time,
    /// Radius for walk transfers between virtual and transit stops.
    pub intermodal_walk_radius: Distance,
}

impl Default for VirtualNetworkConfig {
    fn default() -> Self {
        Self {
            bike_cutoff: Distance::from_kilometers(3.0),
            kickboard_cutoff: Distance::from_kilometers(2.0),
            ebike_cutoff: Distance::from_kilometers(3.0),
            neighbor_cap: 5,
            headway: 5,
            service_start: Time::from_hm_pair(6, 0),
            service_end: Time::from_hm_pair(23, 0),
            intermodal_walk_radius: Distance::from_meters(300.0),
        }
    }
}

impl VirtualNetworkConfig {
    fn cutoff(&self, mode: Mode) -> Distance {
        match mode {
            Mode::Bike => self.bike_cutoff,
            Mode::Kickboard => self.kickboard_cutoff,
            _ => self.ebike_cutoff,
        }
    }
}

/// Promotes every dock and free-floating cluster to a stop and wires them
/// with two-stop scheduled routes, so the solver sees micromobility as just
/// more timetabled service. Appends to `tables` in place; call before
/// building the [`crate::network::Network`].
pub fn synthesize_virtual_network(
    tables: &mut NetworkTables,
    snapshot: &MobilitySnapshot,
    geo: &GeoKernel,
    config: &VirtualNetworkConfig,
) {
    let transit_stops: Vec<(String, Coordinate)> = tables
        .stops
        .iter()
        .map(|stop| (stop.id.clone(), Coordinate::new(stop.lat, stop.lon)))
        .collect();

    // (stop, mode, can_originate): an empty dock still receives returned
    // bikes, but no virtual ride departs from it.
    let mut virtual_stops: Vec<(StopRecord, Mode, bool)> = Vec::new();

    for dock in snapshot.docks() {
        if !dock.active {
            continue;
        }
        virtual_stops.push((
            StopRecord {
                id: format!("BIKE_{}", dock.id),
                name: dock.name.to_string(),
                lat: dock.coordinate.latitude,
                lon: dock.coordinate.longitude,
                kind: StopKind::BikeDock,
                zone_tag: None,
            },
            Mode::Bike,
            dock.bikes_available > 0,
        ));
    }

    // Free-floating vehicles collapse into one virtual stop per occupied
    // spatial cell and mode, anchored at the cluster centroid. Vehicles too
    // drained to rent do not count.
    let mut clusters: BTreeMap<(Cell, Mode), Vec<Coordinate>> = BTreeMap::new();
    for vehicle in snapshot.vehicles() {
        if !vehicle.available || vehicle.battery_pct < crate::shared::MIN_PICKUP_BATTERY {
            continue;
        }
        clusters
            .entry((vehicle.coordinate.to_cell(), vehicle.mode))
            .or_default()
            .push(vehicle.coordinate);
    }
    for ((cell, mode), members) in clusters {
        let count = members.len() as f32;
        let centroid = Coordinate::new(
            members.iter().map(|c| c.latitude).sum::<f32>() / count,
            members.iter().map(|c| c.longitude).sum::<f32>() / count,
        );
        let prefix = match mode {
            Mode::Ebike => "EB",
            _ => "PM",
        };
        virtual_stops.push((
            StopRecord {
                id: format!("{prefix}_{}_{}", cell.0, cell.1),
                name: format!("{prefix} cluster {}/{}", cell.0, cell.1),
                lat: centroid.latitude,
                lon: centroid.longitude,
                kind: StopKind::KickboardZone,
                zone_tag: None,
            },
            mode,
            true,
        ));
    }

    if virtual_stops.is_empty() {
        return;
    }

    // Two-stop virtual routes between same-mode virtual stops within the
    // mode cutoff, capped per origin.
    let stops_slice = &virtual_stops[..];
    let routes: Vec<RouteRecord> = stops_slice
        .par_iter()
        .enumerate()
        .filter(|(_, (_, _, can_originate))| *can_originate)
        .flat_map_iter(|(i, (from, mode, _))| {
            let from_coordinate = Coordinate::new(from.lat, from.lon);
            let cutoff = config.cutoff(*mode);
            let mut neighbors: Vec<(usize, Distance)> = stops_slice
                .iter()
                .enumerate()
                .filter(|(j, (_, other_mode, _))| *j != i && other_mode == mode)
                .filter_map(|(j, (to, _, _))| {
                    let d = from_coordinate
                        .haversine_distance(&Coordinate::new(to.lat, to.lon));
                    (d <= cutoff).then_some((j, d))
                })
                .collect();
            neighbors.sort_by(|(a_j, a), (b_j, b)| {
                a.partial_cmp(b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a_j.cmp(b_j))
            });
            neighbors.truncate(config.neighbor_cap);

            let mode = *mode;
            let config = *config;
            neighbors.into_iter().map(move |(j, _)| {
                let (to, _, _) = &stops_slice[j];
                let to_coordinate = Coordinate::new(to.lat, to.lon);
                let ride_distance = geo.distance(&from_coordinate, &to_coordinate, mode);
                let travel = mode.ride_duration(ride_distance).as_minutes();
                let mut departures: Vec<u32> = Vec::new();
                let mut start = config.service_start.as_minutes();
                while start <= config.service_end.as_minutes() {
                    departures.push(start);
                    start += config.headway;
                }
                let arrivals_far: Vec<u32> = departures.iter().map(|t| t + travel).collect();
                let tag = match mode {
                    Mode::Bike => "BIKE",
                    Mode::Ebike => "EBIKE",
                    _ => "KICK",
                };
                RouteRecord {
                    id: format!("VR_{tag}_{}_{}", from.id, to.id),
                    short_name: format!("{tag} shuttle"),
                    long_name: format!("{} → {}", from.name, to.name),
                    mode,
                    stop_ids: vec![from.id.clone(), to.id.clone()],
                    departures: vec![departures.clone(), arrivals_far.clone()],
                    arrivals: vec![departures, arrivals_far],
                }
            })
        })
        .collect();

    // Walk transfers stitch each virtual stop into nearby transit stops.
    let mut transfer_count = 0usize;
    for (stop, _, _) in virtual_stops.iter() {
        let coordinate = Coordinate::new(stop.lat, stop.lon);
        for (transit_id, transit_coordinate) in transit_stops.iter() {
            let d = coordinate.haversine_distance(transit_coordinate);
            if d <= config.intermodal_walk_radius {
                tables
                    .transfers
                    .push(walk_transfer_record(&stop.id, transit_id, d));
                transfer_count += 1;
            }
        }
    }

    debug!(
        "Virtual network: {} stops, {} routes, {} intermodal transfers",
        virtual_stops.len(),
        routes.len(),
        transfer_count
    );
    tables
        .stops
        .extend(virtual_stops.into_iter().map(|(stop, _, _)| stop));
    tables.routes.extend(routes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mobility::{DockStation, FreeVehicle};

    fn seed_tables() -> NetworkTables {
        NetworkTables {
            stops: vec![StopRecord {
                id: "T1".into(),
                name: "Transit".into(),
                lat: 37.5001,
                lon: 127.0001,
                kind: StopKind::Bus,
                zone_tag: None,
            }],
            routes: vec![],
            transfers: vec![],
        }
    }

    fn seed_snapshot() -> MobilitySnapshot {
        MobilitySnapshot::new(
            vec![
                FreeVehicle {
                    id: "KB_1".into(),
                    coordinate: Coordinate::new(37.5000, 127.0000),
                    mode: Mode::Kickboard,
                    battery_pct: 90.0,
                    available: true,
                },
                FreeVehicle {
                    id: "KB_2".into(),
                    coordinate: Coordinate::new(37.5100, 127.0100),
                    mode: Mode::Kickboard,
                    battery_pct: 70.0,
                    available: true,
                },
            ],
            vec![
                DockStation {
                    id: "D1".into(),
                    name: "Dock one".into(),
                    coordinate: Coordinate::new(37.5020, 127.0020),
                    capacity: 10,
                    bikes_available: 4,
                    docks_available: 6,
                    active: true,
                },
                DockStation {
                    id: "D2".into(),
                    name: "Dock two".into(),
                    coordinate: Coordinate::new(37.5060, 127.0060),
                    capacity: 10,
                    bikes_available: 2,
                    docks_available: 8,
                    active: true,
                },
            ],
        )
    }

    #[test]
    fn synthesis_promotes_and_wires() {
        let mut tables = seed_tables();
        let geo = GeoKernel::new(None);
        synthesize_virtual_network(
            &mut tables,
            &seed_snapshot(),
            &geo,
            &VirtualNetworkConfig::default(),
        );
        // 1 transit + 2 docks + 2 kickboard clusters.
        assert_eq!(tables.stops.len(), 5);
        // Dock pair within 3 km gives two directed bike routes; kickboard
        // clusters about 1.4 km apart give two directed kickboard routes.
        let bike_routes = tables.routes.iter().filter(|r| r.mode == Mode::Bike).count();
        let kick_routes = tables
            .routes
            .iter()
            .filter(|r| r.mode == Mode::Kickboard)
            .count();
        assert_eq!(bike_routes, 2);
        assert_eq!(kick_routes, 2);
        // The near kickboard cluster and the transit stop are walk-linked.
        assert!(!tables.transfers.is_empty());
    }

    #[test]
    fn virtual_routes_ride_a_regular_headway() {
        let mut tables = seed_tables();
        let geo = GeoKernel::new(None);
        synthesize_virtual_network(
            &mut tables,
            &seed_snapshot(),
            &geo,
            &VirtualNetworkConfig::default(),
        );
        let route = tables.routes.first().unwrap();
        let first = &route.departures[0];
        assert_eq!(first[0], 6 * 60);
        assert!(first.windows(2).all(|pair| pair[1] - pair[0] == 5));
        assert_eq!(*first.last().unwrap(), 23 * 60);
        // Far-end times are first-end times shifted by the ride.
        let shift = route.departures[1][0] - route.departures[0][0];
        assert!(shift > 0);
        assert!(
            route.departures[0]
                .iter()
                .zip(route.departures[1].iter())
                .all(|(a, b)| b - a == shift)
        );
    }

    #[test]
    fn inactive_inventory_is_ignored() {
        let mut tables = seed_tables();
        let geo = GeoKernel::new(None);
        let snapshot = MobilitySnapshot::new(
            vec![FreeVehicle {
                id: "KB_X".into(),
                coordinate: Coordinate::new(37.5000, 127.0000),
                mode: Mode::Kickboard,
                battery_pct: 90.0,
                available: false,
            }],
            vec![DockStation {
                id: "DX".into(),
                name: "Closed".into(),
                coordinate: Coordinate::new(37.5020, 127.0020),
                capacity: 10,
                bikes_available: 4,
                docks_available: 6,
                active: false,
            }],
        );
        synthesize_virtual_network(&mut tables, &snapshot, &geo, &VirtualNetworkConfig::default());
        assert_eq!(tables.stops.len(), 1);
        assert!(tables.routes.is_empty());
    }
}
