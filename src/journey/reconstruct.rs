use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    access::AccessOption,
    journey::{Journey, Leg, LegKind},
    raptor::{
        self, Allocator, SolverContext,
        state::{ParentKind, QUERY_POINT},
    },
    shared::{Distance, Mode, Time},
};

/// A destination label worth turning into a journey: a stop near the
/// destination, the round whose label to unwind, and the egress to append.
pub(crate) struct Candidate {
    pub round: usize,
    pub stop_idx: u32,
    pub egress: AccessOption,
}

/// Every `(round, stop)` label that can finish the trip. Only rounds that
/// actually improved the stop are emitted, so the same physical journey is
/// not reported once per later round.
pub(crate) fn collect_candidates(
    ctx: &SolverContext,
    allocator: &Allocator,
    egress_options: &[AccessOption],
    departure: Time,
    rounds: usize,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = Vec::new();
    for option in egress_options {
        for round in 0..=rounds.min(allocator.rows() - 1) {
            if allocator.parent(round, option.stop_idx).is_none() {
                continue;
            }
            let Some(arrival) = allocator.arrival(round, option.stop_idx) else {
                continue;
            };
            if arrival < departure {
                continue;
            }
            // A dock bike still in hand can only end near a dock.
            let state = allocator.state(round, option.stop_idx);
            if state
                .vehicle
                .as_ref()
                .is_some_and(|vehicle| vehicle.must_return)
                && !ctx.dock_drop[option.stop_idx as usize]
            {
                continue;
            }
            candidates.push(Candidate {
                round,
                stop_idx: option.stop_idx,
                egress: option.clone(),
            });
        }
    }
    candidates
}

/// Unwinds the parent chain of a candidate into an ordered journey:
/// access leg, the recorded legs, egress leg, then merging of same-route
/// rides and consecutive walks.
pub(crate) fn build_journey(
    ctx: &SolverContext,
    allocator: &Allocator,
    candidate: &Candidate,
    departure: Time,
) -> Result<Journey, raptor::Error> {
    let mut chain = Vec::new();
    let mut seen: HashSet<(usize, u32)> = HashSet::new();
    let mut cursor = (candidate.round, candidate.stop_idx);
    let step_limit = allocator.rows() * allocator.stop_count() + 1;

    loop {
        // Labels copy forward between rounds without their parents, so the
        // record lives at the round the label was actually created: the
        // nearest round at or below the cursor that has one.
        let Some((created_round, parent)) = effective_parent(allocator, cursor.0, cursor.1) else {
            return Err(raptor::Error::CyclicParents);
        };
        if !seen.insert((created_round, cursor.1)) || chain.len() > step_limit {
            return Err(raptor::Error::CyclicParents);
        }
        let parent = parent.clone();
        let is_access = parent.kind.is_access();
        let next = (parent.from_round as usize, parent.from_stop);
        chain.push((cursor.1, parent));
        if is_access {
            break;
        }
        cursor = next;
    }
    chain.reverse();

    let mut legs: Vec<Leg> = Vec::new();
    let mut walk_distance = Distance::default();

    for (at_stop, parent) in chain.iter() {
        let to_name = ctx.network.stops[*at_stop as usize].name.clone();
        match &parent.kind {
            ParentKind::Access {
                mode,
                walk_distance: walk,
                ride_distance,
                cost,
                vehicle_id,
            } => {
                debug_assert_eq!(parent.from_stop, QUERY_POINT);
                walk_distance = walk_distance + *walk;
                legs.push(Leg {
                    kind: LegKind::Access,
                    mode: *mode,
                    from: origin_name(),
                    to: to_name,
                    route_name: None,
                    vehicle_id: vehicle_id.clone(),
                    departure: parent.departure,
                    arrival: parent.arrival,
                    distance: Some(*walk + *ride_distance),
                    cost: *cost,
                });
            }
            ParentKind::Ride {
                route_idx, fare, ..
            } => {
                let route = &ctx.network.routes[*route_idx as usize];
                let from_name = ctx.network.stops[parent.from_stop as usize].name.clone();
                legs.push(Leg {
                    kind: if route.mode.is_transit() {
                        LegKind::Transit
                    } else {
                        LegKind::Mobility
                    },
                    mode: route.mode,
                    from: from_name,
                    to: to_name,
                    route_name: Some(route.short_name.clone()),
                    vehicle_id: None,
                    departure: parent.departure,
                    arrival: parent.arrival,
                    distance: None,
                    cost: *fare,
                });
            }
            ParentKind::MobilityRide {
                mode,
                vehicle_id,
                distance,
                pickup_walk,
                cost,
            } => {
                let from_name = ctx.network.stops[parent.from_stop as usize].name.clone();
                walk_distance = walk_distance + *pickup_walk;
                legs.push(Leg {
                    kind: LegKind::Mobility,
                    mode: *mode,
                    from: from_name,
                    to: to_name,
                    route_name: None,
                    vehicle_id: Some(vehicle_id.clone()),
                    departure: parent.departure,
                    arrival: parent.arrival,
                    distance: Some(*distance),
                    cost: *cost,
                });
            }
            ParentKind::WalkTransfer { distance } => {
                let from_name = ctx.network.stops[parent.from_stop as usize].name.clone();
                walk_distance = walk_distance + *distance;
                legs.push(Leg {
                    kind: LegKind::Transfer,
                    mode: Mode::Walk,
                    from: from_name,
                    to: to_name,
                    route_name: None,
                    vehicle_id: None,
                    departure: parent.departure,
                    arrival: parent.arrival,
                    distance: Some(*distance),
                    cost: 0,
                });
            }
        }
    }

    // Egress off the network.
    let arrival_at_stop = allocator
        .arrival(candidate.round, candidate.stop_idx)
        .ok_or(raptor::Error::CyclicParents)?;
    let final_arrival = arrival_at_stop + candidate.egress.minutes;
    walk_distance = walk_distance + candidate.egress.walk_distance;
    legs.push(Leg {
        kind: LegKind::Egress,
        mode: candidate.egress.mode,
        from: ctx.network.stops[candidate.stop_idx as usize].name.clone(),
        to: destination_name(),
        route_name: None,
        vehicle_id: candidate
            .egress
            .vehicle
            .as_ref()
            .map(|vehicle| vehicle.id.clone()),
        departure: arrival_at_stop,
        arrival: final_arrival,
        distance: Some(candidate.egress.walk_distance + candidate.egress.ride_distance),
        cost: candidate.egress.cost,
    });

    let legs = merge_legs(legs);

    let rides = legs
        .iter()
        .filter(|leg| matches!(leg.kind, LegKind::Transit | LegKind::Mobility))
        .count() as u32;
    let mut used_mobility: Vec<Mode> = legs
        .iter()
        .filter(|leg| leg.mode.is_mobility())
        .map(|leg| leg.mode)
        .collect();
    used_mobility.sort();
    used_mobility.dedup();

    let total_cost =
        allocator.state(candidate.round, candidate.stop_idx).cost + candidate.egress.cost;

    Ok(Journey {
        departure,
        arrival: final_arrival,
        total_time: final_arrival - departure,
        total_cost,
        transfers: rides.saturating_sub(1),
        walk_distance,
        used_mobility,
        legs,
        score: 0.0,
    })
}

/// Fuses consecutive same-route transit legs into one board-to-alight leg
/// and consecutive walking legs into one stretch.
fn merge_legs(legs: Vec<Leg>) -> Vec<Leg> {
    let mut merged: Vec<Leg> = Vec::with_capacity(legs.len());
    for leg in legs {
        if let Some(last) = merged.last_mut() {
            let same_ride = last.kind == LegKind::Transit
                && leg.kind == LegKind::Transit
                && last.route_name == leg.route_name;
            let both_walks = last.kind == LegKind::Transfer && leg.kind == LegKind::Transfer;
            if same_ride || both_walks {
                last.to = leg.to.clone();
                last.arrival = leg.arrival;
                last.cost += leg.cost;
                last.distance = match (last.distance, leg.distance) {
                    (Some(a), Some(b)) => Some(a + b),
                    (a, b) => a.or(b),
                };
                continue;
            }
        }
        merged.push(leg);
    }
    merged
}

/// The parent record governing a label at `(round, stop)`: the one written
/// at the nearest round at or below `round`, since later rounds inherit the
/// label without rewriting its provenance.
fn effective_parent(
    allocator: &Allocator,
    round: usize,
    stop_idx: u32,
) -> Option<(usize, &crate::raptor::state::Parent)> {
    (0..=round)
        .rev()
        .find_map(|r| allocator.parent(r, stop_idx).map(|parent| (r, parent)))
}

fn origin_name() -> Arc<str> {
    "Origin".into()
}

fn destination_name() -> Arc<str> {
    "Destination".into()
}
