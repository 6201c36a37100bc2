use std::{collections::HashMap, sync::Arc};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    network::{
        BuildReport, Network,
        entities::{Route, Stop, StopKind, Timetable, WalkTransfer},
    },
    shared::{Cell, Coordinate, Distance, Duration, Mode, Time, time_to_walk},
};

/// Stop row of the preprocessed network blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopRecord {
    pub id: String,
    pub name: String,
    pub lat: f32,
    pub lon: f32,
    #[serde(default)]
    pub kind: StopKind,
    #[serde(default)]
    pub zone_tag: Option<String>,
}

/// Route row: ordered stop ids plus the two parallel `positions x trips`
/// minute matrices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRecord {
    pub id: String,
    pub short_name: String,
    pub long_name: String,
    pub mode: Mode,
    pub stop_ids: Vec<String>,
    /// `departures[position][trip]`, minutes since midnight.
    pub departures: Vec<Vec<u32>>,
    /// `arrivals[position][trip]`, minutes since midnight.
    pub arrivals: Vec<Vec<u32>>,
}

/// One direction of a stop-to-stop walking connection. Loading inserts the
/// mirror direction, keeping the table symmetric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    pub from_stop_id: String,
    pub to_stop_id: String,
    pub duration_min: i32,
    #[serde(default)]
    pub distance_m: Option<f32>,
}

/// The whole preprocessed network as handed over by the ingestion
/// collaborator. The encoding it travels in is the caller's business; these
/// are plain serde-able tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkTables {
    pub stops: Vec<StopRecord>,
    pub routes: Vec<RouteRecord>,
    pub transfers: Vec<TransferRecord>,
}

impl NetworkTables {
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty() || self.routes.is_empty()
    }
}

impl Network {
    pub(super) fn load_stops(&mut self, records: Vec<StopRecord>) {
        debug!("Loading stops...");
        let mut stop_lookup: HashMap<Arc<str>, u32> = HashMap::with_capacity(records.len());
        let mut stops: Vec<Stop> = Vec::with_capacity(records.len());
        records.into_iter().for_each(|record| {
            let index = stops.len() as u32;
            let stop = Stop {
                index,
                id: record.id.into(),
                name: record.name.into(),
                coordinate: Coordinate::new(record.lat, record.lon),
                kind: record.kind,
                zone_tag: record.zone_tag.map(|tag| tag.into()),
            };
            stop_lookup.insert(stop.id.clone(), index);
            stops.push(stop);
        });
        self.stops = stops.into();
        self.stop_lookup = stop_lookup;
        debug!("Loaded {} stops", self.stops.len());
    }

    pub(super) fn load_routes(&mut self, records: Vec<RouteRecord>, report: &mut BuildReport) {
        debug!("Loading routes...");
        let store: &Network = self;
        let prepared: Vec<Option<(Arc<str>, Arc<str>, Arc<str>, Mode, Vec<u32>, Timetable, usize)>> =
            records
                .into_par_iter()
                .map(|record| store.prepare_route(record))
                .collect();

        let mut routes: Vec<Route> = Vec::with_capacity(prepared.len());
        let mut timetables: Vec<Timetable> = Vec::with_capacity(prepared.len());
        let mut route_lookup: HashMap<Arc<str>, u32> = HashMap::with_capacity(prepared.len());
        prepared.into_iter().for_each(|prepared| {
            let Some((id, short_name, long_name, mode, stops, timetable, dropped_trips)) = prepared
            else {
                report.skipped_routes += 1;
                return;
            };
            report.skipped_trips += dropped_trips;
            let index = routes.len() as u32;
            let route = Route {
                index,
                id,
                short_name,
                long_name,
                mode,
                stops: stops.into(),
                trip_count: timetable.trip_count,
            };
            route_lookup.insert(route.id.clone(), index);
            routes.push(route);
            timetables.push(timetable);
        });
        self.routes = routes.into();
        self.timetables = timetables.into();
        self.route_lookup = route_lookup;
        debug!("Loaded {} routes", self.routes.len());
    }

    /// Resolves a route record to dense indices and a validated, trip-sorted
    /// timetable. Unknown stop positions are dropped with their matrix rows;
    /// inconsistent trips are dropped column-wise. Returns `None` when too
    /// little survives to ride.
    fn prepare_route(
        &self,
        record: RouteRecord,
    ) -> Option<(Arc<str>, Arc<str>, Arc<str>, Mode, Vec<u32>, Timetable, usize)> {
        if record.stop_ids.len() != record.departures.len()
            || record.stop_ids.len() != record.arrivals.len()
        {
            warn!("Route {} has mismatched matrix shapes", record.id);
            return None;
        }

        let mut stops: Vec<u32> = Vec::with_capacity(record.stop_ids.len());
        let mut departure_rows: Vec<Vec<u32>> = Vec::with_capacity(record.departures.len());
        let mut arrival_rows: Vec<Vec<u32>> = Vec::with_capacity(record.arrivals.len());
        record
            .stop_ids
            .iter()
            .zip(record.departures.into_iter().zip(record.arrivals))
            .for_each(|(stop_id, (departures, arrivals))| {
                if let Some(stop_idx) = self.stop_lookup.get(stop_id.as_str()) {
                    stops.push(*stop_idx);
                    departure_rows.push(departures);
                    arrival_rows.push(arrivals);
                } else {
                    warn!("Route {} references unknown stop {stop_id}", record.id);
                }
            });

        if stops.len() < 2 {
            return None;
        }
        let trip_count = departure_rows[0].len();
        if trip_count == 0
            || departure_rows.iter().any(|row| row.len() != trip_count)
            || arrival_rows.iter().any(|row| row.len() != trip_count)
        {
            warn!("Route {} has ragged trip columns", record.id);
            return None;
        }

        // Validate and keep trips column-wise, then order them by first
        // departure so the trip axis stays binary-searchable.
        let mut trips: Vec<(Vec<Time>, Vec<Time>)> = Vec::with_capacity(trip_count);
        let mut dropped_trips = 0usize;
        for trip in 0..trip_count {
            let departures: Vec<Time> = departure_rows
                .iter()
                .map(|row| Time::from_minutes(row[trip]))
                .collect();
            let arrivals: Vec<Time> = arrival_rows
                .iter()
                .map(|row| Time::from_minutes(row[trip]))
                .collect();
            if trip_is_consistent(&departures, &arrivals) {
                trips.push((departures, arrivals));
            } else {
                dropped_trips += 1;
            }
        }
        if trips.is_empty() {
            return None;
        }
        trips.sort_by_key(|(departures, _)| departures[0]);

        let kept = trips.len();
        let mut departures: Vec<Time> = Vec::with_capacity(stops.len() * kept);
        let mut arrivals: Vec<Time> = Vec::with_capacity(stops.len() * kept);
        for position in 0..stops.len() {
            for (trip_departures, trip_arrivals) in trips.iter() {
                departures.push(trip_departures[position]);
                arrivals.push(trip_arrivals[position]);
            }
        }

        Some((
            record.id.into(),
            record.short_name.into(),
            record.long_name.into(),
            record.mode,
            stops,
            Timetable::new(kept as u32, departures.into(), arrivals.into()),
            dropped_trips,
        ))
    }

    pub(super) fn load_transfers(&mut self, records: Vec<TransferRecord>, report: &mut BuildReport) {
        debug!("Loading transfers...");
        let mut transfers: Vec<WalkTransfer> = Vec::with_capacity(records.len() * 2);
        let mut stop_to_transfers: Vec<Vec<u32>> = vec![Vec::new(); self.stops.len()];
        records.into_iter().for_each(|record| {
            let (Some(from), Some(to)) = (
                self.stop_lookup.get(record.from_stop_id.as_str()).copied(),
                self.stop_lookup.get(record.to_stop_id.as_str()).copied(),
            ) else {
                report.skipped_transfers += 1;
                return;
            };
            if record.duration_min < 0 || from == to {
                report.skipped_transfers += 1;
                return;
            }
            let duration = Duration::from_minutes(record.duration_min as u32);
            let distance = record.distance_m.map(Distance::from_meters).unwrap_or_else(|| {
                self.stops[from as usize]
                    .coordinate
                    .detour_distance(&self.stops[to as usize].coordinate, 1.2)
            });
            for (a, b) in [(from, to), (to, from)] {
                stop_to_transfers[a as usize].push(transfers.len() as u32);
                transfers.push(WalkTransfer {
                    from_stop_idx: a,
                    to_stop_idx: b,
                    duration,
                    distance,
                });
            }
        });
        self.transfers = transfers.into();
        self.stop_to_transfers = stop_to_transfers
            .into_iter()
            .map(|val| val.into())
            .collect();
        debug!("Loaded {} transfer directions", self.transfers.len());
    }

    pub(super) fn generate_stop_adjacency(&mut self) {
        debug!("Generating routes-through-stop index...");
        let mut routes_through_stop: Vec<Vec<u32>> = vec![Vec::new(); self.stops.len()];
        self.routes.iter().for_each(|route| {
            route.stops.iter().for_each(|stop_idx| {
                let serving = &mut routes_through_stop[*stop_idx as usize];
                if serving.last() != Some(&route.index) {
                    serving.push(route.index);
                }
            });
        });
        self.routes_through_stop = routes_through_stop
            .into_iter()
            .map(|val| val.into())
            .collect();
    }

    pub(super) fn generate_geo_hash(&mut self) {
        debug!("Generating geo spatial hash...");
        let mut stop_cells: HashMap<Cell, Vec<u32>> = HashMap::new();
        self.stops.iter().for_each(|stop| {
            stop_cells
                .entry(stop.coordinate.to_cell())
                .or_default()
                .push(stop.index);
        });
        self.stop_cells = stop_cells
            .into_iter()
            .map(|(cell, stops)| (cell, stops.into()))
            .collect();
    }
}

/// A trip column is usable when its times run forward along the sequence
/// and no stop departs before it arrives.
fn trip_is_consistent(departures: &[Time], arrivals: &[Time]) -> bool {
    for position in 0..departures.len() {
        if arrivals[position] > departures[position] {
            return false;
        }
        if position > 0
            && (departures[position] < departures[position - 1]
                || arrivals[position] < arrivals[position - 1]
                || arrivals[position] < departures[position - 1])
        {
            return false;
        }
    }
    true
}

/// Convenience for synthesis code: a walk transfer record between two
/// coordinates at walking pace.
pub(crate) fn walk_transfer_record(
    from_stop_id: &str,
    to_stop_id: &str,
    distance: Distance,
) -> TransferRecord {
    TransferRecord {
        from_stop_id: from_stop_id.to_owned(),
        to_stop_id: to_stop_id.to_owned(),
        duration_min: time_to_walk(distance).as_minutes() as i32,
        distance_m: Some(distance.as_meters()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistent_trip_passes() {
        let departures: Vec<Time> = [510u32, 515, 520].map(Time::from_minutes).to_vec();
        let arrivals: Vec<Time> = [510u32, 514, 519].map(Time::from_minutes).to_vec();
        assert!(trip_is_consistent(&departures, &arrivals));
    }

    #[test]
    fn backwards_trip_fails() {
        let departures: Vec<Time> = [510u32, 505].map(Time::from_minutes).to_vec();
        let arrivals: Vec<Time> = [510u32, 505].map(Time::from_minutes).to_vec();
        assert!(!trip_is_consistent(&departures, &arrivals));
    }

    #[test]
    fn arrive_before_previous_departure_fails() {
        let departures: Vec<Time> = [510u32, 520].map(Time::from_minutes).to_vec();
        let arrivals: Vec<Time> = [510u32, 508].map(Time::from_minutes).to_vec();
        assert!(!trip_is_consistent(&departures, &arrivals));
    }
}
