use std::sync::Arc;

use crate::{
    mobility::{CarriedVehicle, DockFilter, MobilityRouter, MobilitySnapshot},
    network::Network,
    roadgraph::GeoKernel,
    shared::{Coordinate, Distance, Duration, Mode, time_to_walk},
};

/// At most this many options seed the solver, best access time first.
const ACCESS_CAP: usize = 30;
/// Renting at a dock costs one extra minute of fiddling.
const DOCK_RENTAL_OVERHEAD: Duration = Duration::from_minutes(1);

/// How the traveler is allowed to reach the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    WalkOnly,
    Multimodal,
}

/// Caller-set bounds on the first/last mile.
#[derive(Debug, Clone, Copy)]
pub struct AccessLimits {
    pub max_walk_distance: Distance,
    pub max_pickup_radius: Distance,
}

impl Default for AccessLimits {
    fn default() -> Self {
        Self {
            max_walk_distance: Distance::from_meters(800.0),
            max_pickup_radius: Distance::from_meters(300.0),
        }
    }
}

/// One way of getting from the query point onto (or off) the network.
#[derive(Debug, Clone)]
pub struct AccessOption {
    pub stop_idx: u32,
    pub minutes: Duration,
    pub mode: Mode,
    pub cost: u32,
    /// Walking portion of the option, for the walk-distance tally.
    pub walk_distance: Distance,
    /// Ride portion, when a vehicle is involved.
    pub ride_distance: Distance,
    /// Vehicle still in hand after the option plays out.
    pub vehicle: Option<CarriedVehicle>,
}

/// Enumerates candidate boarding stops for an origin (or, run symmetric from
/// the destination, alighting stops). Three branches: plain walking,
/// free-floating pickup, dock rental.
pub fn plan_access(
    network: &Network,
    geo: &GeoKernel,
    snapshot: &MobilitySnapshot,
    mobility: &MobilityRouter,
    point: &Coordinate,
    policy: AccessPolicy,
    limits: &AccessLimits,
) -> Vec<AccessOption> {
    let mut options: Vec<AccessOption> = Vec::new();

    // Walk access.
    for (stop_idx, _) in network.stops_by_coordinate(point, limits.max_walk_distance) {
        let stop = &network.stops[stop_idx as usize];
        let walk = geo.walk_distance(point, &stop.coordinate);
        if walk > limits.max_walk_distance {
            continue;
        }
        options.push(AccessOption {
            stop_idx,
            minutes: time_to_walk(walk),
            mode: Mode::Walk,
            cost: 0,
            walk_distance: walk,
            ride_distance: Distance::default(),
            vehicle: None,
        });
    }

    if policy == AccessPolicy::Multimodal {
        plan_vehicle_access(network, geo, snapshot, mobility, point, limits, &mut options);
        plan_dock_access(network, geo, snapshot, mobility, point, limits, &mut options);
    }

    options.sort_by(|a, b| {
        a.minutes
            .cmp(&b.minutes)
            .then_with(|| a.stop_idx.cmp(&b.stop_idx))
    });
    options.truncate(ACCESS_CAP);
    options
}

/// Free-floating branch: walk to a nearby vehicle, then ride it to any stop
/// its battery reaches. The vehicle stays in hand.
fn plan_vehicle_access(
    network: &Network,
    geo: &GeoKernel,
    snapshot: &MobilitySnapshot,
    mobility: &MobilityRouter,
    point: &Coordinate,
    limits: &AccessLimits,
    options: &mut Vec<AccessOption>,
) {
    for (vehicle, _) in snapshot.vehicles_near(point, limits.max_pickup_radius, None) {
        let walk = geo.walk_distance(point, &vehicle.coordinate);
        if walk > limits.max_pickup_radius {
            continue;
        }
        let walk_minutes = time_to_walk(walk);
        let reachable =
            mobility.reachable_stops(network, geo, &vehicle.coordinate, vehicle.mode, vehicle.battery_pct);
        for target in reachable.iter() {
            let battery_left = vehicle.mode.battery_after(vehicle.battery_pct, target.distance);
            options.push(AccessOption {
                stop_idx: target.stop_idx,
                minutes: walk_minutes + target.ride,
                mode: vehicle.mode,
                cost: target.cost,
                walk_distance: walk,
                ride_distance: target.distance,
                vehicle: Some(CarriedVehicle {
                    mode: vehicle.mode,
                    id: vehicle.id.clone(),
                    battery_pct: battery_left,
                    must_return: false,
                }),
            });
        }
    }
}

/// Dock branch: walk to a station with a bike, pay the rental minute, ride.
/// The bike carries a return-to-station obligation.
fn plan_dock_access(
    network: &Network,
    geo: &GeoKernel,
    snapshot: &MobilitySnapshot,
    mobility: &MobilityRouter,
    point: &Coordinate,
    limits: &AccessLimits,
    options: &mut Vec<AccessOption>,
) {
    for (dock, _) in snapshot.docks_near(point, limits.max_pickup_radius, DockFilter::Pickup) {
        let walk = geo.walk_distance(point, &dock.coordinate);
        if walk > limits.max_pickup_radius {
            continue;
        }
        let lead_minutes = time_to_walk(walk) + DOCK_RENTAL_OVERHEAD;
        let reachable =
            mobility.reachable_stops(network, geo, &dock.coordinate, Mode::Bike, 100.0);
        for target in reachable.iter() {
            options.push(AccessOption {
                stop_idx: target.stop_idx,
                minutes: lead_minutes + target.ride,
                mode: Mode::Bike,
                cost: target.cost,
                walk_distance: walk,
                ride_distance: target.distance,
                vehicle: Some(CarriedVehicle {
                    mode: Mode::Bike,
                    id: dock_bike_id(&dock.id),
                    battery_pct: 100.0,
                    must_return: true,
                }),
            });
        }
    }
}

fn dock_bike_id(dock_id: &str) -> Arc<str> {
    format!("bike@{dock_id}").into()
}
