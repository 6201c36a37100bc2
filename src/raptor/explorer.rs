use std::{collections::VecDeque, sync::Arc};

use crate::{
    mobility::{CarriedVehicle, DockFilter},
    network::{Route, Timetable},
    raptor::{
        Allocator, MOBILITY_CHAIN_PENALTY, MOBILITY_MAX_ROUND, SolverContext,
        discovery::earliest_trip,
        state::{LabelState, Parent, ParentKind, Update},
    },
    shared::{Coordinate, Distance, Duration, Mode, Time, time_to_walk},
};

/// Pickup radius used when chaining onto mobility mid-journey.
const PROPAGATION_PICKUP_RADIUS: Distance = Distance::from_meters(300.0);
/// Short mobility hops in the transfer phase stay under this range.
const SHORT_HOP_RADIUS: Distance = Distance::from_meters(800.0);
/// Targets kept per mobility option.
const MOBILITY_TARGET_CAP: usize = 5;
/// Vehicles and docks considered per origin stop in the mobility phase.
const VEHICLE_FAN_CAP: usize = 4;
const DOCK_FAN_CAP: usize = 2;
const DOCK_RENTAL_OVERHEAD: Duration = Duration::from_minutes(1);

/// Route-scan phase: one cursor pass over every route serving a stop marked
/// in the previous round. Cancellation granularity is per route.
pub(crate) fn explore_routes(ctx: &SolverContext, allocator: &mut Allocator, round: usize) {
    for route_idx in 0..ctx.network.routes.len() {
        if !allocator.active_mask[route_idx] {
            continue;
        }
        if ctx.deadline.expired() {
            break;
        }
        let route = &ctx.network.routes[route_idx];
        // Transit-only queries never ride the virtual mobility layer.
        if !ctx.multimodal && !route.mode.is_transit() {
            continue;
        }
        let timetable = ctx.network.timetable(route_idx as u32);
        let start = allocator.active[route_idx] as usize;
        scan_route(ctx, allocator, round, route, timetable, start);
    }
    allocator.run_updates(round);
}

/// The classic one-cursor scan: ride the current best trip forward, alight
/// wherever it improves a label, and hop to an earlier trip whenever a stop
/// marked in round `k-1` allows catching one.
fn scan_route(
    ctx: &SolverContext,
    allocator: &mut Allocator,
    round: usize,
    route: &Route,
    timetable: &Timetable,
    start: usize,
) {
    let mut trip: Option<usize> = None;
    let mut board_pos = 0usize;
    let mut board_stop = 0u32;

    for position in start..route.stops.len() {
        let stop_idx = route.stops[position];

        // Alighting. Rows where the trip arrives before it departed are
        // timetable corruption and are skipped, not ridden.
        if let Some(t) = trip {
            let alight = timetable.arrival(position, t);
            let board_departure = timetable.departure(board_pos, t);
            if alight >= board_departure
                && allocator
                    .arrival(round, stop_idx)
                    .is_none_or(|best| alight < best)
            {
                let board_state = allocator.state(round - 1, board_stop);
                let (state, fare) = state_after_ride(route, board_state, board_departure, alight);
                allocator.updates.push(Update {
                    stop_idx,
                    arrival: alight,
                    state,
                    parent: Parent {
                        kind: ParentKind::Ride {
                            route_idx: route.index,
                            trip: t as u32,
                            board_pos: board_pos as u16,
                            alight_pos: position as u16,
                            fare,
                        },
                        from_round: (round - 1) as u8,
                        from_stop: board_stop,
                        departure: board_departure,
                        arrival: alight,
                    },
                });
            }
        }

        // Boarding, from the previous round's labels only.
        if allocator.prev_marked[stop_idx as usize]
            && let Some(label) = allocator.arrival(round - 1, stop_idx)
        {
            let current_departure = trip
                .map(|t| timetable.departure(position, t))
                .unwrap_or(crate::shared::time::MAX);
            if label <= current_departure
                && can_board(ctx, allocator.state(round - 1, stop_idx), stop_idx)
                && let Some(candidate) = earliest_trip(timetable, position, label)
            {
                trip = Some(candidate);
                board_pos = position;
                board_stop = stop_idx;
            }
        }
    }
}

/// A traveler holding a dock bike cannot abandon it at a stop with no dock;
/// everything else boards freely (free-floating vehicles park anywhere).
fn can_board(ctx: &SolverContext, state: &LabelState, stop_idx: u32) -> bool {
    match &state.vehicle {
        Some(vehicle) if vehicle.must_return => ctx.dock_drop[stop_idx as usize],
        _ => true,
    }
}

/// State transition for riding a scheduled leg: any carried vehicle is left
/// at the boarding stop, transit charges once per stretch, virtual mobility
/// edges each charge a full independent fare.
fn state_after_ride(
    route: &Route,
    board_state: &LabelState,
    board_departure: Time,
    alight: Time,
) -> (LabelState, u32) {
    let mut state = board_state.clone();
    state.vehicle = None;
    let fare = if route.mode.is_transit() {
        let fare = if state.stretch_route.is_some() {
            0
        } else {
            route.mode.params().base_fare
        };
        state.stretch_route = Some(route.index);
        fare
    } else {
        state.stretch_route = None;
        route.mode.ride_fare(alight - board_departure)
    };
    state.cost += fare;
    (state, fare)
}

/// One way of leaving a stop on a mobility vehicle: where the ride starts,
/// what is ridden, and the lead time spent reaching and unlocking it.
struct MobilityOption {
    ride_origin: Coordinate,
    mode: Mode,
    battery_pct: f32,
    vehicle_id: Arc<str>,
    must_return: bool,
    lead: Duration,
    pickup_walk: Distance,
}

/// Mobility-propagation phase: from every stop marked in round `k-1`,
/// continue a carried vehicle, pick up a free-floating one, or rent a dock
/// bike, relaxing the top few reachable stops. Only runs in the first
/// couple of rounds and charges a chain penalty past round one, so
/// micromobility chains never drown genuine transit. Cancellation
/// granularity is per origin stop.
pub(crate) fn explore_mobility(ctx: &SolverContext, allocator: &mut Allocator, round: usize) {
    if !ctx.multimodal || round > MOBILITY_MAX_ROUND {
        return;
    }
    let penalty = Duration::from_minutes(MOBILITY_CHAIN_PENALTY * (round as u32 - 1));
    let origins: Vec<u32> = allocator.prev_marked.iter_ones().map(|s| s as u32).collect();

    for stop_idx in origins {
        if ctx.deadline.expired() {
            break;
        }
        let Some(label) = allocator.arrival(round - 1, stop_idx) else {
            continue;
        };
        let state = allocator.state(round - 1, stop_idx).clone();
        let origin = ctx.network.stops[stop_idx as usize].coordinate;

        for option in mobility_options(ctx, &origin, &state) {
            push_mobility_rides(
                ctx,
                allocator,
                round - 1,
                stop_idx,
                label,
                &state,
                &option,
                penalty,
                None,
            );
        }
    }
    allocator.run_updates(round);
}

/// Enumerates the mobility options available at a stop: the carried vehicle
/// first, then nearby free-floating pickups, then dock rentals.
fn mobility_options(
    ctx: &SolverContext,
    origin: &Coordinate,
    state: &LabelState,
) -> Vec<MobilityOption> {
    let mut options: Vec<MobilityOption> = Vec::new();

    if let Some(vehicle) = &state.vehicle {
        options.push(MobilityOption {
            ride_origin: *origin,
            mode: vehicle.mode,
            battery_pct: vehicle.battery_pct,
            vehicle_id: vehicle.id.clone(),
            must_return: vehicle.must_return,
            lead: Duration::default(),
            pickup_walk: Distance::default(),
        });
    }

    for (vehicle, _) in ctx
        .snapshot
        .vehicles_near(origin, PROPAGATION_PICKUP_RADIUS, None)
        .into_iter()
        .take(VEHICLE_FAN_CAP)
    {
        let walk = ctx.geo.walk_distance(origin, &vehicle.coordinate);
        if walk > PROPAGATION_PICKUP_RADIUS {
            continue;
        }
        options.push(MobilityOption {
            ride_origin: vehicle.coordinate,
            mode: vehicle.mode,
            battery_pct: vehicle.battery_pct,
            vehicle_id: vehicle.id.clone(),
            must_return: false,
            lead: time_to_walk(walk),
            pickup_walk: walk,
        });
    }

    for (dock, _) in ctx
        .snapshot
        .docks_near(origin, PROPAGATION_PICKUP_RADIUS, DockFilter::Pickup)
        .into_iter()
        .take(DOCK_FAN_CAP)
    {
        let walk = ctx.geo.walk_distance(origin, &dock.coordinate);
        if walk > PROPAGATION_PICKUP_RADIUS {
            continue;
        }
        options.push(MobilityOption {
            ride_origin: dock.coordinate,
            mode: Mode::Bike,
            battery_pct: 100.0,
            vehicle_id: format!("bike@{}", dock.id).into(),
            must_return: true,
            lead: time_to_walk(walk) + DOCK_RENTAL_OVERHEAD,
            pickup_walk: walk,
        });
    }

    options
}

/// Stages rides from one mobility option to its best few targets. The
/// parent points at `(from_round, stop_idx)`, where the source label lives:
/// the previous round for the propagation phase, the current one for short
/// hops inside the transfer phase.
fn push_mobility_rides(
    ctx: &SolverContext,
    allocator: &mut Allocator,
    from_round: usize,
    stop_idx: u32,
    label: Time,
    state: &LabelState,
    option: &MobilityOption,
    penalty: Duration,
    max_range: Option<Distance>,
) {
    let reachable = ctx.mobility.reachable_stops(
        ctx.network,
        ctx.geo,
        &option.ride_origin,
        option.mode,
        option.battery_pct,
    );
    let mut taken = 0usize;
    for target in reachable.iter() {
        if taken >= MOBILITY_TARGET_CAP {
            break;
        }
        if target.stop_idx == stop_idx {
            continue;
        }
        if max_range.is_some_and(|range| target.distance > range) {
            break;
        }
        // Dock bikes end their rides only where a dock can take them back.
        if option.must_return && !ctx.dock_drop[target.stop_idx as usize] {
            continue;
        }
        taken += 1;

        let arrival = label + option.lead + target.ride + penalty;
        let mut next_state = state.clone();
        next_state.cost += target.cost;
        next_state.stretch_route = None;
        next_state.vehicle = Some(CarriedVehicle {
            mode: option.mode,
            id: option.vehicle_id.clone(),
            battery_pct: option.mode.battery_after(option.battery_pct, target.distance),
            must_return: option.must_return,
        });
        allocator.updates.push(Update {
            stop_idx: target.stop_idx,
            arrival,
            state: next_state,
            parent: Parent {
                kind: ParentKind::MobilityRide {
                    mode: option.mode,
                    vehicle_id: option.vehicle_id.clone(),
                    distance: target.distance,
                    pickup_walk: option.pickup_walk,
                    cost: target.cost,
                },
                from_round: from_round as u8,
                from_stop: stop_idx,
                departure: label,
                arrival,
            },
        });
    }
}

/// Transfer-closure phase. Multimodal policies first take short carried-
/// vehicle hops from every stop this round improved, then walking
/// relaxations run to saturation: after this returns, no walk transfer can
/// improve any label of the round.
pub(crate) fn explore_transfers(ctx: &SolverContext, allocator: &mut Allocator, round: usize) {
    if ctx.multimodal {
        let improved: Vec<u32> = allocator.marked.iter_ones().map(|s| s as u32).collect();
        for stop_idx in improved {
            let Some(label) = allocator.arrival(round, stop_idx) else {
                continue;
            };
            let state = allocator.state(round, stop_idx).clone();
            let Some(vehicle) = state.vehicle.clone() else {
                continue;
            };
            let origin = ctx.network.stops[stop_idx as usize].coordinate;
            let option = MobilityOption {
                ride_origin: origin,
                mode: vehicle.mode,
                battery_pct: vehicle.battery_pct,
                vehicle_id: vehicle.id.clone(),
                must_return: vehicle.must_return,
                lead: Duration::default(),
                pickup_walk: Distance::default(),
            };
            push_mobility_rides(
                ctx,
                allocator,
                round,
                stop_idx,
                label,
                &state,
                &option,
                Duration::default(),
                Some(SHORT_HOP_RADIUS),
            );
        }
        allocator.run_updates(round);
    }

    // Walking closure as a worklist: chained footpaths keep relaxing until
    // nothing improves.
    let mut queue: VecDeque<u32> = allocator.marked.iter_ones().map(|s| s as u32).collect();
    while let Some(stop_idx) = queue.pop_front() {
        let Some(label) = allocator.arrival(round, stop_idx) else {
            continue;
        };
        let state = allocator.state(round, stop_idx).clone();
        let transfers: Vec<_> = ctx.network.transfers_from(stop_idx).copied().collect();
        for transfer in transfers {
            let arrival = label + transfer.duration;
            let improved = allocator.relax_now(
                round,
                Update {
                    stop_idx: transfer.to_stop_idx,
                    arrival,
                    state: state.clone(),
                    parent: Parent {
                        kind: ParentKind::WalkTransfer {
                            distance: transfer.distance,
                        },
                        from_round: round as u8,
                        from_stop: stop_idx,
                        departure: label,
                        arrival,
                    },
                },
            );
            if improved {
                queue.push_back(transfer.to_stop_idx);
            }
        }
    }
}
