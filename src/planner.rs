use std::sync::{Arc, RwLock};

use bitvec::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    access::{AccessLimits, AccessPolicy, plan_access},
    journey::{self, Journey},
    mobility::{MobilityRouter, MobilitySnapshot},
    network::Network,
    raptor::{self, Allocator, SolverContext, dock_drop_map},
    roadgraph::GeoKernel,
    shared::{Coordinate, Distance, Duration, Time},
};

pub use crate::raptor::Deadline;

/// How the traveler is willing to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    TransitOnly,
    Multimodal,
}

/// Relative importance of the four journey metrics; roughly sums to one.
#[derive(Debug, Clone, Copy)]
pub struct Weights {
    pub time: f32,
    pub transfers: f32,
    pub walk: f32,
    pub cost: f32,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            time: 0.4,
            transfers: 0.3,
            walk: 0.2,
            cost: 0.1,
        }
    }
}

/// How much the traveler likes each mobility mode, in `[0, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct MobilityPreference {
    pub bike: f32,
    pub kickboard: f32,
    pub ebike: f32,
}

impl Default for MobilityPreference {
    fn default() -> Self {
        Self {
            bike: 0.8,
            kickboard: 0.6,
            ebike: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Preference {
    pub weights: Weights,
    pub mobility: MobilityPreference,
    pub max_walk_distance: Distance,
    pub max_total_time: Duration,
    pub max_transfers: u32,
}

impl Default for Preference {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            mobility: MobilityPreference::default(),
            max_walk_distance: Distance::from_meters(800.0),
            max_total_time: Duration::from_hours(3),
            max_transfers: 3,
        }
    }
}

/// One routing query. Built with the defaults and narrowed with the
/// builder methods.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub departure_time: String,
    pub policy: Policy,
    pub preference: Preference,
    pub deadline: Deadline,
}

impl RouteRequest {
    pub fn new(
        origin: impl Into<Coordinate>,
        destination: impl Into<Coordinate>,
        departure_time: &str,
    ) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            departure_time: departure_time.to_owned(),
            policy: Policy::Multimodal,
            preference: Preference::default(),
            deadline: Deadline::none(),
        }
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn preference(mut self, preference: Preference) -> Self {
        self.preference = preference;
        self
    }

    pub fn deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }
}

/// Why a query produced no journeys. Bad input is an answer, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    OriginOutsideArea,
    DestinationOutsideArea,
    InvalidDepartureTime,
    NoStopsNearOrigin,
    NoStopsNearDestination,
    NoJourneyFound,
    Cancelled,
    InternalInvariant,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub journeys: Vec<Journey>,
    pub reason: Option<EmptyReason>,
}

impl SearchResult {
    pub fn empty(reason: EmptyReason) -> Self {
        Self {
            journeys: Vec::new(),
            reason: Some(reason),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.journeys.is_empty()
    }
}

/// A mobility snapshot plus what the solver precomputes from it.
pub(crate) struct SnapshotContext {
    pub snapshot: MobilitySnapshot,
    pub dock_drop: BitVec<usize, Lsb0>,
}

/// The integrated journey planner: one round-based search over the unified
/// network (scheduled transit plus virtual mobility routes). Shareable
/// across threads; queries only read, except for the bounded caches.
pub struct Planner {
    network: Arc<Network>,
    geo: Arc<GeoKernel>,
    mobility: MobilityRouter,
    snapshot: RwLock<Arc<SnapshotContext>>,
}

impl Planner {
    pub fn new(network: Network, geo: GeoKernel) -> Self {
        let network = Arc::new(network);
        let dock_drop = bitvec!(usize, Lsb0; 0; network.stop_count());
        Self {
            network,
            geo: Arc::new(geo),
            mobility: MobilityRouter::new(),
            snapshot: RwLock::new(Arc::new(SnapshotContext {
                snapshot: MobilitySnapshot::empty(),
                dock_drop,
            })),
        }
    }

    pub fn with_snapshot(self, snapshot: MobilitySnapshot) -> Self {
        self.replace_snapshot(snapshot);
        self
    }

    /// Swaps in a fresh inventory snapshot. In-flight queries keep the one
    /// they started with.
    pub fn replace_snapshot(&self, snapshot: MobilitySnapshot) {
        let dock_drop = dock_drop_map(&self.network, &snapshot);
        let context = Arc::new(SnapshotContext {
            snapshot,
            dock_drop,
        });
        *self.snapshot.write().expect("snapshot lock poisoned") = context;
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub(crate) fn geo(&self) -> &GeoKernel {
        &self.geo
    }

    pub(crate) fn mobility(&self) -> &MobilityRouter {
        &self.mobility
    }

    pub(crate) fn current_snapshot(&self) -> Arc<SnapshotContext> {
        self.snapshot.read().expect("snapshot lock poisoned").clone()
    }

    /// Runs one query. `K = max_transfers + 1` rounds.
    pub fn find_routes(&self, request: &RouteRequest) -> SearchResult {
        let rounds = request.preference.max_transfers as usize + 1;
        self.find_routes_with_rounds(request, rounds)
    }

    pub(crate) fn find_routes_with_rounds(
        &self,
        request: &RouteRequest,
        rounds: usize,
    ) -> SearchResult {
        let Some(departure) = Time::from_hm(&request.departure_time) else {
            return SearchResult::empty(EmptyReason::InvalidDepartureTime);
        };
        if !self.network.bounds().contains(&request.origin) {
            return SearchResult::empty(EmptyReason::OriginOutsideArea);
        }
        if !self.network.bounds().contains(&request.destination) {
            return SearchResult::empty(EmptyReason::DestinationOutsideArea);
        }

        let snapshot = self.current_snapshot();
        let access_policy = match request.policy {
            Policy::TransitOnly => AccessPolicy::WalkOnly,
            Policy::Multimodal => AccessPolicy::Multimodal,
        };
        let limits = AccessLimits {
            max_walk_distance: request.preference.max_walk_distance,
            ..AccessLimits::default()
        };

        let access = plan_access(
            &self.network,
            &self.geo,
            &snapshot.snapshot,
            &self.mobility,
            &request.origin,
            access_policy,
            &limits,
        );
        if access.is_empty() {
            return SearchResult::empty(EmptyReason::NoStopsNearOrigin);
        }
        let egress = plan_access(
            &self.network,
            &self.geo,
            &snapshot.snapshot,
            &self.mobility,
            &request.destination,
            access_policy,
            &limits,
        );
        if egress.is_empty() {
            return SearchResult::empty(EmptyReason::NoStopsNearDestination);
        }

        let ctx = SolverContext {
            network: &self.network,
            geo: &self.geo,
            snapshot: &snapshot.snapshot,
            mobility: &self.mobility,
            multimodal: request.policy == Policy::Multimodal,
            deadline: request.deadline,
            dock_drop: &snapshot.dock_drop,
        };

        let mut allocator = Allocator::new(&self.network, rounds);
        if let Err(error) = raptor::solve(&ctx, &mut allocator, &access, departure, rounds) {
            warn!("Query aborted: {error}");
            return SearchResult::empty(EmptyReason::InternalInvariant);
        }

        let candidates = journey::collect_candidates(&ctx, &allocator, &egress, departure, rounds);
        let mut journeys: Vec<Journey> = Vec::with_capacity(candidates.len());
        for candidate in candidates.iter() {
            match journey::build_journey(&ctx, &allocator, candidate, departure) {
                Ok(journey) => journeys.push(journey),
                Err(error) => {
                    warn!("Query aborted during reconstruction: {error}");
                    return SearchResult::empty(EmptyReason::InternalInvariant);
                }
            }
        }
        journeys.retain(|journey| {
            journey.total_time <= request.preference.max_total_time
                && journey.transfers <= request.preference.max_transfers
        });
        debug!("{} candidate journeys before selection", journeys.len());

        let journeys = journey::select(
            journeys,
            &request.preference.weights,
            &request.preference.mobility,
        );
        if journeys.is_empty() {
            let reason = if request.deadline.expired() {
                EmptyReason::Cancelled
            } else {
                EmptyReason::NoJourneyFound
            };
            return SearchResult::empty(reason);
        }
        SearchResult {
            journeys,
            reason: None,
        }
    }
}
