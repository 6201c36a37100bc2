use std::sync::Arc;

use crate::{
    network::Network,
    roadgraph::{BoundedCache, GeoKernel},
    shared::{Coordinate, Distance, Duration, Mode, QuantizedPoint},
};

/// Fan-out cap: only the closest candidates survive, so one origin never
/// floods the solver.
const REACHABLE_CAP: usize = 50;
/// Share of candidates (closest first) that get an exact road measurement;
/// the outer tail settles for haversine times the detour factor.
const ROAD_MEASURED_SHARE: f32 = 0.7;
const MEMO_CAPACITY: usize = 5_000;

/// A stop a vehicle can reach from some origin point, with the ride time and
/// the independent fare of that ride.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReachableStop {
    pub stop_idx: u32,
    pub ride: Duration,
    pub distance: Distance,
    pub cost: u32,
}

/// Answers "where can this vehicle take me" queries, memoized on the
/// quantized origin, mode, and battery decile. The memo is independent of
/// the mobility snapshot, so snapshot swaps do not invalidate it.
#[derive(Debug)]
pub struct MobilityRouter {
    memo: BoundedCache<(QuantizedPoint, Mode, u8), Arc<Vec<ReachableStop>>>,
}

impl Default for MobilityRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl MobilityRouter {
    pub fn new() -> Self {
        Self {
            memo: BoundedCache::new(MEMO_CAPACITY),
        }
    }

    /// Stops reachable by riding `mode` from `origin` with the given charge.
    /// Candidates come from the great-circle radius; the inner
    /// [`ROAD_MEASURED_SHARE`] is re-measured on the road graph. Capped at
    /// [`REACHABLE_CAP`] by distance.
    pub fn reachable_stops(
        &self,
        network: &Network,
        geo: &GeoKernel,
        origin: &Coordinate,
        mode: Mode,
        battery_pct: f32,
    ) -> Arc<Vec<ReachableStop>> {
        let battery_bucket = (battery_pct.clamp(0.0, 100.0) / 10.0) as u8;
        let key = (origin.quantized(), mode, battery_bucket);
        self.memo.get_or_insert_with(key, || {
            Arc::new(compute_reachable(network, geo, origin, mode, battery_pct))
        })
    }
}

fn compute_reachable(
    network: &Network,
    geo: &GeoKernel,
    origin: &Coordinate,
    mode: Mode,
    battery_pct: f32,
) -> Vec<ReachableStop> {
    let radius = mode.range_with_battery(battery_pct);
    if radius.as_meters() <= 0.0 {
        return Vec::new();
    }

    let candidates = network.stops_by_coordinate(origin, radius);
    let measured_cutoff = ((candidates.len() as f32) * ROAD_MEASURED_SHARE).ceil() as usize;
    let detour = mode.params().detour_factor;

    let mut reachable: Vec<ReachableStop> = candidates
        .into_iter()
        .enumerate()
        .filter_map(|(rank, (stop_idx, straight))| {
            let stop = &network.stops[stop_idx as usize];
            let distance = if rank < measured_cutoff {
                geo.distance(origin, &stop.coordinate, mode)
            } else {
                straight * detour
            };
            if distance > radius {
                return None;
            }
            let ride = mode.ride_duration(distance);
            Some(ReachableStop {
                stop_idx,
                ride,
                distance,
                cost: mode.ride_fare(ride),
            })
        })
        .collect();

    reachable.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.stop_idx.cmp(&b.stop_idx))
    });
    reachable.truncate(REACHABLE_CAP);
    reachable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{NetworkTables, RouteRecord, StopKind, StopRecord};

    fn grid_network() -> Network {
        // A line of stops 500 m apart running east from the origin.
        let stops: Vec<StopRecord> = (0..12)
            .map(|i| StopRecord {
                id: format!("S{i}"),
                name: format!("Stop {i}"),
                lat: 37.5000,
                lon: 127.0000 + i as f32 * 0.00565,
                kind: StopKind::Bus,
                zone_tag: None,
            })
            .collect();
        let routes = vec![RouteRecord {
            id: "R".into(),
            short_name: "r".into(),
            long_name: "line".into(),
            mode: Mode::Bus,
            stop_ids: (0..12).map(|i| format!("S{i}")).collect(),
            departures: (0..12u32).map(|i| vec![480 + i]).collect(),
            arrivals: (0..12u32).map(|i| vec![480 + i]).collect(),
        }];
        Network::from_tables(NetworkTables {
            stops,
            routes,
            transfers: vec![],
        })
        .unwrap()
    }

    #[test]
    fn battery_shrinks_the_radius() {
        let network = grid_network();
        let geo = GeoKernel::new(None);
        let router = MobilityRouter::new();
        let origin = Coordinate::new(37.5000, 127.0000);

        let full = router.reachable_stops(&network, &geo, &origin, Mode::Kickboard, 100.0);
        // 10% battery on a 15 km range leaves 1.5 km; with the 1.3 detour
        // factor only the nearest stops survive.
        let low = router.reachable_stops(&network, &geo, &origin, Mode::Kickboard, 10.0);
        assert!(low.len() < full.len());
        assert!(!low.is_empty());
    }

    #[test]
    fn results_sorted_and_memoized() {
        let network = grid_network();
        let geo = GeoKernel::new(None);
        let router = MobilityRouter::new();
        let origin = Coordinate::new(37.5000, 127.0000);
        let first = router.reachable_stops(&network, &geo, &origin, Mode::Bike, 100.0);
        assert!(
            first
                .windows(2)
                .all(|pair| pair[0].distance <= pair[1].distance)
        );
        let jittered = Coordinate::new(37.500_001, 127.000_001);
        let second = router.reachable_stops(&network, &geo, &jittered, Mode::Bike, 100.0);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn kickboard_rides_carry_per_minute_fares() {
        let network = grid_network();
        let geo = GeoKernel::new(None);
        let router = MobilityRouter::new();
        let origin = Coordinate::new(37.5000, 127.0000);
        let reachable = router.reachable_stops(&network, &geo, &origin, Mode::Kickboard, 100.0);
        let far = reachable.last().unwrap();
        assert_eq!(far.cost, 1000 + 150 * far.ride.as_minutes());
    }
}
