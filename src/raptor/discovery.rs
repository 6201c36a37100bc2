use crate::{
    network::{Network, Route, Timetable},
    raptor::Allocator,
    shared::Time,
};

/// Position of a stop within a route's sequence.
pub(crate) fn index_in_route(route: &Route, stop_idx: u32) -> Option<usize> {
    route.stops.iter().position(|s| *s == stop_idx)
}

/// Fills the allocator's active-route table: every route serving a stop
/// marked in the previous round, keyed to the earliest marked position so
/// each route is scanned once from the right place. Reads the
/// routes-through-stop index built at load.
pub(crate) fn collect_active_routes(network: &Network, allocator: &mut Allocator) {
    for stop_idx in allocator.prev_marked.iter_ones() {
        for route_idx in network.routes_through(stop_idx as u32) {
            let route = &network.routes[*route_idx as usize];
            let Some(position) = index_in_route(route, stop_idx as u32) else {
                continue;
            };
            let position = position as u32;
            let current = if allocator.active_mask[*route_idx as usize] {
                allocator.active[*route_idx as usize]
            } else {
                u32::MAX
            };
            if position < current {
                allocator.active[*route_idx as usize] = position;
                allocator.active_mask.set(*route_idx as usize, true);
            }
        }
    }
}

/// Earliest trip departing from `position` at or after `bound`. Trips are
/// sorted by departure, so this is a binary search over the trip axis.
pub(crate) fn earliest_trip(timetable: &Timetable, position: usize, bound: Time) -> Option<usize> {
    let departures = timetable.departures_at(position);
    let trip = departures.partition_point(|departure| *departure < bound);
    (trip < departures.len()).then_some(trip)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timetable() -> Timetable {
        // Two positions, four trips departing 500/510/520/530.
        let departures: Vec<Time> = [500u32, 510, 520, 530, 505, 515, 525, 535]
            .iter()
            .map(|m| Time::from_minutes(*m))
            .collect();
        let arrivals = departures.clone();
        Timetable::new(4, departures.into(), arrivals.into())
    }

    #[test]
    fn earliest_trip_binary_search() {
        let timetable = timetable();
        assert_eq!(earliest_trip(&timetable, 0, Time::from_minutes(499)), Some(0));
        assert_eq!(earliest_trip(&timetable, 0, Time::from_minutes(500)), Some(0));
        assert_eq!(earliest_trip(&timetable, 0, Time::from_minutes(501)), Some(1));
        assert_eq!(earliest_trip(&timetable, 0, Time::from_minutes(530)), Some(3));
        assert_eq!(earliest_trip(&timetable, 0, Time::from_minutes(531)), None);
    }

    #[test]
    fn earliest_trip_uses_the_position_row() {
        let timetable = timetable();
        assert_eq!(earliest_trip(&timetable, 1, Time::from_minutes(506)), Some(1));
    }
}
