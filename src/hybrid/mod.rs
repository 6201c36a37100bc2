use std::sync::Arc;

use tracing::debug;

use crate::{
    access::{AccessLimits, AccessOption, AccessPolicy, plan_access},
    journey::{self, Journey, Leg, LegKind, TOP_K},
    mobility::DockFilter,
    network::Network,
    planner::{EmptyReason, Planner, Policy, RouteRequest, SearchResult},
    roadgraph::BoundedCache,
    shared::{Coordinate, Distance, Mode, QuantizedPoint, Time, time_to_walk},
};

/// Direct kickboard rides are only offered under this crow-fly distance.
const DIRECT_KICKBOARD_CUTOFF: Distance = Distance::from_meters(3_000.0);
/// Walk radius for finding a dock to start a direct bike ride.
const DIRECT_BIKE_DOCK_RADIUS: Distance = Distance::from_meters(500.0);
/// A kickboard must be parked within this radius of the origin for a direct
/// ride to exist.
const DIRECT_PICKUP_RADIUS: Distance = Distance::from_meters(300.0);
/// Zones denser than this offer mobility access points.
const MOBILITY_DENSITY_THRESHOLD: f32 = 0.5;
/// Access points memoized per zone and quantized location.
const ACCESS_POINT_CAP: usize = 5;
const ACCESS_CACHE_CAPACITY: usize = 2_000;
/// Extra score for journeys matching the zone strategy.
const STRATEGY_BONUS: f32 = 0.1;

/// Rounds used when the hybrid variant falls through to the solver.
const HYBRID_MULTIMODAL_ROUNDS: usize = 3;
const HYBRID_TRANSIT_ROUNDS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneKind {
    Residential,
    Mixed,
    Commercial,
}

/// One tile of the grid: its transit stops and a density tag derived from
/// them.
#[derive(Debug, Clone)]
pub struct Zone {
    pub index: usize,
    pub id: Arc<str>,
    pub row: usize,
    pub col: usize,
    pub transit_stops: Vec<u32>,
    pub density: f32,
    pub kind: ZoneKind,
}

/// A fixed tiling of the service area. The Chebyshev distance between two
/// tiles drives strategy selection.
#[derive(Debug)]
pub struct ZoneGrid {
    rows: usize,
    cols: usize,
    north: f32,
    south: f32,
    east: f32,
    west: f32,
    zones: Box<[Zone]>,
}

impl ZoneGrid {
    pub fn build(network: &Network, rows: usize, cols: usize) -> Self {
        let bounds = network.bounds();
        let mut zones: Vec<Zone> = (0..rows * cols)
            .map(|index| {
                let row = index / cols;
                let col = index % cols;
                Zone {
                    index,
                    id: format!("Z_{row:02}_{col:02}").into(),
                    row,
                    col,
                    transit_stops: Vec::new(),
                    density: 0.3,
                    kind: ZoneKind::Residential,
                }
            })
            .collect();

        let lat_step = (bounds.north - bounds.south) / rows as f32;
        let lon_step = (bounds.east - bounds.west) / cols as f32;
        for stop in network.stops.iter().filter(|stop| stop.kind.is_transit()) {
            let row = ((bounds.north - stop.coordinate.latitude) / lat_step) as usize;
            let col = ((stop.coordinate.longitude - bounds.west) / lon_step) as usize;
            if row < rows && col < cols {
                zones[row * cols + col].transit_stops.push(stop.index);
            }
        }
        for zone in zones.iter_mut() {
            (zone.kind, zone.density) = match zone.transit_stops.len() {
                n if n > 10 => (ZoneKind::Commercial, 0.8),
                n if n > 5 => (ZoneKind::Mixed, 0.5),
                _ => (ZoneKind::Residential, 0.3),
            };
        }

        debug!("Zone grid {rows}x{cols} over the service area");
        Self {
            rows,
            cols,
            north: bounds.north,
            south: bounds.south,
            east: bounds.east,
            west: bounds.west,
            zones: zones.into(),
        }
    }

    pub fn zone_at(&self, coordinate: &Coordinate) -> Option<&Zone> {
        if coordinate.latitude > self.north
            || coordinate.latitude < self.south
            || coordinate.longitude > self.east
            || coordinate.longitude < self.west
        {
            return None;
        }
        let lat_step = (self.north - self.south) / self.rows as f32;
        let lon_step = (self.east - self.west) / self.cols as f32;
        let row = (((self.north - coordinate.latitude) / lat_step) as usize).min(self.rows - 1);
        let col = (((coordinate.longitude - self.west) / lon_step) as usize).min(self.cols - 1);
        Some(&self.zones[row * self.cols + col])
    }

    /// Chessboard distance between two tiles.
    pub fn chebyshev(a: &Zone, b: &Zone) -> u32 {
        let rows = a.row.abs_diff(b.row);
        let cols = a.col.abs_diff(b.col);
        rows.max(cols) as u32
    }
}

/// What the zone distance says about how to route.
#[derive(Debug, Clone, Copy)]
pub struct RoutingStrategy {
    pub zone_distance: u32,
    pub name: &'static str,
    pub mobility_weight: f32,
    pub transit_weight: f32,
    pub allow_direct_mobility: bool,
    pub check_direct_transit: bool,
    pub max_transfers: u32,
}

/// Tunables of the hybrid variant. A caller may replace the whole config
/// between queries.
#[derive(Debug, Clone, Copy)]
pub struct ZoneConfig {
    pub grid: (usize, usize),
    pub mobility_only_threshold: u32,
    pub mobility_preferred_threshold: u32,
    pub rush_hour_penalty: f32,
    pub late_night_bonus: f32,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            grid: (30, 30),
            mobility_only_threshold: 2,
            mobility_preferred_threshold: 4,
            rush_hour_penalty: 0.7,
            late_night_bonus: 1.3,
        }
    }
}

fn base_strategy(zone_distance: u32) -> (&'static str, f32, f32) {
    match zone_distance {
        0 => ("mobility_only", 1.0, 0.0),
        1 => ("mobility_first", 0.8, 0.2),
        2 => ("mobility_preferred", 0.7, 0.3),
        3 => ("balanced", 0.5, 0.5),
        4 => ("transit_preferred", 0.3, 0.7),
        5 => ("transit_first", 0.2, 0.8),
        _ => ("transit_only", 0.1, 0.9),
    }
}

/// Pluggable strategy policy: `(zone_distance, hour) -> strategy`.
pub type StrategySelector = Arc<dyn Fn(u32, u32) -> RoutingStrategy + Send + Sync>;

impl ZoneConfig {
    /// The table-driven default with the rush-hour and late-night
    /// adjustments applied to the mobility weight.
    pub fn strategy(&self, zone_distance: u32, hour: u32) -> RoutingStrategy {
        let (name, mut mobility_weight, mut transit_weight) = base_strategy(zone_distance);
        if (7..=9).contains(&hour) || (18..=20).contains(&hour) {
            mobility_weight *= self.rush_hour_penalty;
            transit_weight = 1.0 - mobility_weight;
        } else if hour >= 22 || hour <= 5 {
            mobility_weight = (mobility_weight * self.late_night_bonus).min(1.0);
            transit_weight = 1.0 - mobility_weight;
        }
        RoutingStrategy {
            zone_distance,
            name,
            mobility_weight,
            transit_weight,
            allow_direct_mobility: zone_distance <= self.mobility_only_threshold,
            check_direct_transit: zone_distance >= 2,
            max_transfers: zone_distance.saturating_sub(2).min(2),
        }
    }
}

/// The zone-based composition: a pre-query strategy selector that may
/// short-circuit with direct mobility, and otherwise drives the same
/// round-based solver with zone-tuned weights.
pub struct HybridPlanner {
    planner: Planner,
    grid: ZoneGrid,
    config: ZoneConfig,
    selector: Option<StrategySelector>,
    access_cache: BoundedCache<(usize, QuantizedPoint), Arc<Vec<AccessOption>>>,
}

impl HybridPlanner {
    pub fn new(planner: Planner, config: ZoneConfig) -> Self {
        let grid = ZoneGrid::build(planner.network(), config.grid.0, config.grid.1);
        Self {
            planner,
            grid,
            config,
            selector: None,
            access_cache: BoundedCache::new(ACCESS_CACHE_CAPACITY),
        }
    }

    /// Swaps in a custom strategy policy.
    pub fn with_selector(mut self, selector: StrategySelector) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Replaces the zone tunables between queries.
    pub fn update_config(&mut self, config: ZoneConfig) {
        if config.grid != self.config.grid {
            self.grid = ZoneGrid::build(self.planner.network(), config.grid.0, config.grid.1);
        }
        self.config = config;
        self.access_cache.clear();
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub fn grid(&self) -> &ZoneGrid {
        &self.grid
    }

    pub fn strategy_for(&self, zone_distance: u32, hour: u32) -> RoutingStrategy {
        match &self.selector {
            Some(selector) => selector(zone_distance, hour),
            None => self.config.strategy(zone_distance, hour),
        }
    }

    pub fn find_routes(&self, request: &RouteRequest) -> SearchResult {
        let Some(departure) = Time::from_hm(&request.departure_time) else {
            return SearchResult::empty(EmptyReason::InvalidDepartureTime);
        };
        let Some(origin_zone) = self.grid.zone_at(&request.origin) else {
            return SearchResult::empty(EmptyReason::OriginOutsideArea);
        };
        let Some(dest_zone) = self.grid.zone_at(&request.destination) else {
            return SearchResult::empty(EmptyReason::DestinationOutsideArea);
        };

        let zone_distance = ZoneGrid::chebyshev(origin_zone, dest_zone);
        let strategy = self.strategy_for(zone_distance, departure.hour());
        debug!(
            "Zones {} -> {} distance {} strategy {}",
            origin_zone.id, dest_zone.id, zone_distance, strategy.name
        );

        let mut journeys: Vec<Journey> = Vec::new();
        let mut sub_reason: Option<EmptyReason> = None;

        if strategy.allow_direct_mobility {
            journeys.extend(self.direct_mobility_journeys(request, departure));
        }

        if strategy.transit_weight > 0.0 {
            let policy = if strategy.mobility_weight >= 0.3 {
                Policy::Multimodal
            } else {
                Policy::TransitOnly
            };
            let rounds = match policy {
                Policy::Multimodal => HYBRID_MULTIMODAL_ROUNDS,
                Policy::TransitOnly => HYBRID_TRANSIT_ROUNDS,
            };
            let mut sub_request = request.clone().policy(policy);
            sub_request.preference.max_transfers = sub_request
                .preference
                .max_transfers
                .min(strategy.max_transfers.max(1));
            let result = self.planner.find_routes_with_rounds(&sub_request, rounds);
            sub_reason = result.reason;
            journeys.extend(result.journeys);
        }

        if journeys.is_empty() {
            return SearchResult::empty(sub_reason.unwrap_or(EmptyReason::NoJourneyFound));
        }

        let journeys = journey::dedup(journeys);
        let mut journeys = journey::pareto_filter(journeys);
        journey::score_journeys(
            &mut journeys,
            &request.preference.weights,
            &request.preference.mobility,
            |journey| strategy_bonus(journey, &strategy),
        );
        journey::sort_by_score(&mut journeys);
        journeys.truncate(TOP_K);
        SearchResult {
            journeys,
            reason: None,
        }
    }

    /// Top access points of a zone for a given location, memoized on the
    /// zone and the quantized coordinate. Dense zones also offer mobility
    /// options; quiet ones only walking.
    pub fn access_points(&self, location: &Coordinate) -> Arc<Vec<AccessOption>> {
        let Some(zone) = self.grid.zone_at(location) else {
            return Arc::new(Vec::new());
        };
        let key = (zone.index, location.quantized());
        let policy = if zone.density > MOBILITY_DENSITY_THRESHOLD {
            AccessPolicy::Multimodal
        } else {
            AccessPolicy::WalkOnly
        };
        self.access_cache.get_or_insert_with(key, || {
            let snapshot = self.planner.current_snapshot();
            let mut options = plan_access(
                self.planner.network(),
                self.planner.geo(),
                &snapshot.snapshot,
                self.planner.mobility(),
                location,
                policy,
                &AccessLimits::default(),
            );
            options.truncate(ACCESS_POINT_CAP);
            Arc::new(options)
        })
    }

    /// Door-to-door mobility without touching the solver: a kickboard ride
    /// for short hops, and a walk-then-dock-bike ride when a station is
    /// close.
    fn direct_mobility_journeys(&self, request: &RouteRequest, departure: Time) -> Vec<Journey> {
        let mut journeys: Vec<Journey> = Vec::new();
        let snapshot = self.planner.current_snapshot();
        let geo = self.planner.geo();
        let straight = request.origin.haversine_distance(&request.destination);

        if straight <= DIRECT_KICKBOARD_CUTOFF {
            let nearby = snapshot.snapshot.vehicles_near(
                &request.origin,
                DIRECT_PICKUP_RADIUS,
                Some(Mode::Kickboard),
            );
            if let Some((vehicle, _)) = nearby.first() {
                let ride_distance =
                    geo.distance(&request.origin, &request.destination, Mode::Kickboard);
                let ride = Mode::Kickboard.ride_duration(ride_distance);
                let fare = Mode::Kickboard.ride_fare(ride);
                let pickup_walk = geo.walk_distance(&request.origin, &vehicle.coordinate);
                let start = departure + time_to_walk(pickup_walk);
                let arrival = start + ride;
                journeys.push(Journey {
                    departure,
                    arrival,
                    total_time: arrival - departure,
                    total_cost: fare,
                    transfers: 0,
                    walk_distance: pickup_walk,
                    used_mobility: vec![Mode::Kickboard],
                    legs: vec![Leg {
                        kind: LegKind::Mobility,
                        mode: Mode::Kickboard,
                        from: "Origin".into(),
                        to: "Destination".into(),
                        route_name: None,
                        vehicle_id: Some(vehicle.id.clone()),
                        departure: start,
                        arrival,
                        distance: Some(ride_distance),
                        cost: fare,
                    }],
                    score: 0.0,
                });
            }
        }

        let docks = snapshot.snapshot.docks_near(
            &request.origin,
            DIRECT_BIKE_DOCK_RADIUS,
            DockFilter::Pickup,
        );
        if let Some((dock, _)) = docks.first() {
            let walk = geo.walk_distance(&request.origin, &dock.coordinate);
            let walk_minutes = time_to_walk(walk);
            let ride_distance = geo.distance(&dock.coordinate, &request.destination, Mode::Bike);
            let ride = Mode::Bike.ride_duration(ride_distance);
            let fare = Mode::Bike.ride_fare(ride);
            let at_dock = departure + walk_minutes;
            let arrival = at_dock + ride;
            journeys.push(Journey {
                departure,
                arrival,
                total_time: arrival - departure,
                total_cost: fare,
                transfers: 0,
                walk_distance: walk,
                used_mobility: vec![Mode::Bike],
                legs: vec![
                    Leg {
                        kind: LegKind::Access,
                        mode: Mode::Walk,
                        from: "Origin".into(),
                        to: dock.name.clone(),
                        route_name: None,
                        vehicle_id: None,
                        departure,
                        arrival: at_dock,
                        distance: Some(walk),
                        cost: 0,
                    },
                    Leg {
                        kind: LegKind::Mobility,
                        mode: Mode::Bike,
                        from: dock.name.clone(),
                        to: "Destination".into(),
                        route_name: None,
                        vehicle_id: Some(format!("bike@{}", dock.id).into()),
                        departure: at_dock,
                        arrival,
                        distance: Some(ride_distance),
                        cost: fare,
                    },
                ],
                score: 0.0,
            });
        }

        journeys
    }
}

/// Journeys that fit the zone strategy get a nudge: pure mobility when the
/// strategy leans mobility, mixed journeys when it sits in the middle.
fn strategy_bonus(journey: &Journey, strategy: &RoutingStrategy) -> f32 {
    if journey.is_mobility_only() && strategy.mobility_weight > 0.7 {
        STRATEGY_BONUS
    } else if !journey.is_mobility_only()
        && strategy.mobility_weight > 0.3
        && strategy.mobility_weight < 0.7
    {
        STRATEGY_BONUS
    } else {
        0.0
    }
}
