use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::shared::{Coordinate, Distance, Duration, Mode, Time};

/// What kind of place a stop is. Virtual mobility stops are first-class so
/// the solver never has to special-case them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    #[default]
    Bus,
    Metro,
    BikeDock,
    KickboardZone,
}

impl StopKind {
    pub const fn is_transit(&self) -> bool {
        matches!(self, StopKind::Bus | StopKind::Metro)
    }
}

/// A boarding point. `index` is the dense solver index assigned at load.
#[derive(Debug, Default, Clone)]
pub struct Stop {
    pub index: u32,
    pub id: Arc<str>,
    pub name: Arc<str>,
    pub coordinate: Coordinate,
    pub kind: StopKind,
    pub zone_tag: Option<Arc<str>>,
}

/// A scheduled route: its ordered stop sequence plus a handle to the
/// timetable stored alongside it in the network. Virtual mobility routes are
/// synthesized into this exact shape, so the route scan treats a kickboard
/// hop and a metro line identically.
#[derive(Debug, Default, Clone)]
pub struct Route {
    pub index: u32,
    pub id: Arc<str>,
    pub short_name: Arc<str>,
    pub long_name: Arc<str>,
    pub mode: Mode,
    /// Stop indices in travel order.
    pub stops: Arc<[u32]>,
    pub trip_count: u32,
}

/// Departure and arrival minutes for one route, stored as two parallel
/// `stop_positions x trips` matrices flattened row-major. Trips are sorted
/// by their first departure, so the trip axis of every row is ordered and
/// binary-searchable.
#[derive(Debug, Default, Clone)]
pub struct Timetable {
    pub trip_count: u32,
    departures: Box<[Time]>,
    arrivals: Box<[Time]>,
}

impl Timetable {
    pub(crate) fn new(trip_count: u32, departures: Box<[Time]>, arrivals: Box<[Time]>) -> Self {
        debug_assert_eq!(departures.len(), arrivals.len());
        Self {
            trip_count,
            departures,
            arrivals,
        }
    }

    pub fn departure(&self, position: usize, trip: usize) -> Time {
        self.departures[flat_matrix(position, trip, self.trip_count as usize)]
    }

    pub fn arrival(&self, position: usize, trip: usize) -> Time {
        self.arrivals[flat_matrix(position, trip, self.trip_count as usize)]
    }

    /// All departures at a stop position, ordered over the trip axis.
    pub fn departures_at(&self, position: usize) -> &[Time] {
        let start = position * self.trip_count as usize;
        &self.departures[start..start + self.trip_count as usize]
    }

    pub fn stop_positions(&self) -> usize {
        if self.trip_count == 0 {
            0
        } else {
            self.departures.len() / self.trip_count as usize
        }
    }
}

/// A symmetric walking connection between two nearby stops.
#[derive(Debug, Default, Clone, Copy)]
pub struct WalkTransfer {
    pub from_stop_idx: u32,
    pub to_stop_idx: u32,
    pub duration: Duration,
    pub distance: Distance,
}

/// Converts a (row, column) coordinate into a flat index for the
/// row-major matrices.
#[inline(always)]
pub(crate) fn flat_matrix(outer: usize, inner: usize, count: usize) -> usize {
    (outer * count) + inner
}

#[test]
fn flat_matrix_layout() {
    let a = flat_matrix(0, 0, 10);
    let b = flat_matrix(0, 1, 10);
    assert_eq!(a + 1, b);

    let a = flat_matrix(1, 0, 10);
    let b = flat_matrix(1, 1, 10);
    assert_eq!(a + 1, b);

    let a = flat_matrix(0, 0, 10);
    let b = flat_matrix(1, 0, 10);
    assert_eq!(a + 10, b);
}

#[test]
fn timetable_rows() {
    let departures: Vec<Time> = [510u32, 520, 530, 515, 525, 535]
        .iter()
        .map(|m| Time::from_minutes(*m))
        .collect();
    let arrivals: Vec<Time> = [512u32, 522, 532, 517, 527, 537]
        .iter()
        .map(|m| Time::from_minutes(*m))
        .collect();
    let timetable = Timetable::new(3, departures.into(), arrivals.into());
    assert_eq!(timetable.stop_positions(), 2);
    assert_eq!(timetable.departure(0, 1).as_minutes(), 520);
    assert_eq!(timetable.arrival(1, 2).as_minutes(), 537);
    assert_eq!(timetable.departures_at(1)[0].as_minutes(), 515);
}
