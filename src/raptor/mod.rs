mod allocator;
mod discovery;
mod explorer;
pub(crate) mod state;

pub use allocator::Allocator;
pub(crate) use discovery::collect_active_routes;

use std::time::Instant;

use bitvec::prelude::*;
use thiserror::Error;
use tracing::warn;

use crate::{
    access::AccessOption,
    mobility::{MobilityRouter, MobilitySnapshot},
    network::Network,
    raptor::state::{LabelState, Parent, ParentKind, QUERY_POINT, Update},
    roadgraph::GeoKernel,
    shared::{DOCK_DROP_RADIUS, Time},
};

/// Mobility propagation is disabled past this round to bound fan-out.
pub const MOBILITY_MAX_ROUND: usize = 2;
/// Minutes added per mobility round above the first, discouraging chains of
/// micromobility rides over genuine transit.
pub const MOBILITY_CHAIN_PENALTY: u32 = 3;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Arrival label worsened between rounds at stop index {stop}")]
    MonotonicityBroken { stop: u32 },
    #[error("Parent chain did not reach an access label")]
    CyclicParents,
}

/// A caller-provided cut-off. The solver checks it per route in the scan
/// phase and per origin in the mobility phase, and stops expanding once it
/// passes; whatever was proven by then still comes out.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn none() -> Self {
        Self { at: None }
    }

    pub fn within(budget: std::time::Duration) -> Self {
        Self {
            at: Some(Instant::now() + budget),
        }
    }

    pub fn at(instant: Instant) -> Self {
        Self { at: Some(instant) }
    }

    pub fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Everything a single query's solver run reads. All of it is shared and
/// immutable; the allocator is the only thing written.
pub(crate) struct SolverContext<'a> {
    pub network: &'a Network,
    pub geo: &'a GeoKernel,
    pub snapshot: &'a MobilitySnapshot,
    pub mobility: &'a MobilityRouter,
    pub multimodal: bool,
    pub deadline: Deadline,
    /// Per-stop flag: a dock with a free slot lies within the drop radius.
    pub dock_drop: &'a BitVec<usize, Lsb0>,
}

/// Stops with a dropoff-capable dock within [`DOCK_DROP_RADIUS`]. Computed
/// once per snapshot and reused by every query.
pub(crate) fn dock_drop_map(network: &Network, snapshot: &MobilitySnapshot) -> BitVec<usize, Lsb0> {
    let mut map = bitvec!(usize, Lsb0; 0; network.stop_count());
    if snapshot.docks().is_empty() {
        return map;
    }
    for stop in network.stops.iter() {
        if snapshot.has_dropoff_dock_near(&stop.coordinate, DOCK_DROP_RADIUS) {
            map.set(stop.index as usize, true);
        }
    }
    map
}

/// Runs the round-based search: seeds round 0 from the access options, then
/// per round a route scan, a mobility propagation, and a transfer closure,
/// each relaxing the `(round, stop)` label table under strict improvement.
pub(crate) fn solve(
    ctx: &SolverContext,
    allocator: &mut Allocator,
    access: &[AccessOption],
    departure: Time,
    rounds: usize,
) -> Result<(), Error> {
    debug_assert!(rounds + 1 <= allocator.rows());

    for option in access {
        let arrival = departure + option.minutes;
        allocator.seed(Update {
            stop_idx: option.stop_idx,
            arrival,
            state: LabelState {
                cost: option.cost,
                vehicle: option.vehicle.clone(),
                stretch_route: None,
            },
            parent: Parent {
                kind: ParentKind::Access {
                    mode: option.mode,
                    walk_distance: option.walk_distance,
                    ride_distance: option.ride_distance,
                    cost: option.cost,
                    vehicle_id: option.vehicle.as_ref().map(|vehicle| vehicle.id.clone()),
                },
                from_round: 0,
                from_stop: QUERY_POINT,
                departure,
                arrival,
            },
        });
    }

    for round in 1..=rounds {
        if ctx.deadline.expired() {
            break;
        }
        allocator.begin_round(round);
        if !allocator.prev_marked.any() {
            break;
        }
        collect_active_routes(ctx.network, allocator);
        explorer::explore_routes(ctx, allocator, round);
        explorer::explore_mobility(ctx, allocator, round);
        explorer::explore_transfers(ctx, allocator, round);
        verify_monotone(allocator, round)?;
        if !allocator.marked.any() {
            break;
        }
    }
    Ok(())
}

/// Labels may only get better as rounds add options. A violation means the
/// relaxation logic is broken; the query is aborted rather than returning
/// journeys built on bad labels.
fn verify_monotone(allocator: &Allocator, round: usize) -> Result<(), Error> {
    for stop_idx in allocator.marked.iter_ones() {
        let current = allocator.arrival(round, stop_idx as u32);
        let previous = allocator.arrival(round - 1, stop_idx as u32);
        if let (Some(current), Some(previous)) = (current, previous)
            && current > previous
        {
            warn!("Round monotonicity broken at stop {stop_idx}");
            return Err(Error::MonotonicityBroken {
                stop: stop_idx as u32,
            });
        }
    }
    Ok(())
}
