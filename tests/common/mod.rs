#![allow(dead_code)]

use hangil::mobility::{
    DockStation, FreeVehicle, VirtualNetworkConfig, synthesize_virtual_network,
};
use hangil::network::{NetworkTables, RouteRecord, StopKind, StopRecord, TransferRecord};
use hangil::prelude::*;

pub const SINSA: (f32, f32) = (37.5164, 127.0201);
pub const APGUJEONG: (f32, f32) = (37.5270, 127.0286);
pub const YANGJAE: (f32, f32) = (37.4846, 127.0342);
pub const GANGNAM: (f32, f32) = (37.4979, 127.0276);
pub const YEOKSAM: (f32, f32) = (37.5006, 127.0367);
pub const SEOLLEUNG: (f32, f32) = (37.5045, 127.0486);
pub const SUSEO: (f32, f32) = (37.4871, 127.1006);

fn stop(id: &str, name: &str, at: (f32, f32), kind: StopKind) -> StopRecord {
    StopRecord {
        id: id.to_owned(),
        name: name.to_owned(),
        lat: at.0,
        lon: at.1,
        kind,
        zone_tag: None,
    }
}

/// Minute rows for a route: departures every `headway` minutes over the
/// service day, shifted per stop by the cumulative run times.
fn schedule(first: u32, last: u32, headway: u32, offsets: &[u32]) -> (Vec<Vec<u32>>, Vec<Vec<u32>>) {
    let starts: Vec<u32> = (first..=last).step_by(headway as usize).collect();
    let rows: Vec<Vec<u32>> = offsets
        .iter()
        .map(|offset| starts.iter().map(|t| t + offset).collect())
        .collect();
    (rows.clone(), rows)
}

/// A miniature Gangnam: metro line 3 (Yangjae - Sinsa - Apgujeong), metro
/// line 2 (Gangnam - Yeoksam - Seolleung), and bus 4432 out to Suseo.
pub fn transit_tables() -> NetworkTables {
    let stops = vec![
        stop("M_SN", "Sinsa", SINSA, StopKind::Metro),
        stop("M_AP", "Apgujeong", APGUJEONG, StopKind::Metro),
        stop("M_YJ", "Yangjae", YANGJAE, StopKind::Metro),
        stop("M_GN", "Gangnam", GANGNAM, StopKind::Metro),
        stop("M_YS", "Yeoksam", YEOKSAM, StopKind::Metro),
        stop("M_SL", "Seolleung", SEOLLEUNG, StopKind::Metro),
        stop("B_YJ", "Yangjae Stn (bus)", (37.4848, 127.0344), StopKind::Bus),
        stop("B_DG", "Dogok (bus)", (37.4910, 127.0555), StopKind::Bus),
        stop("B_DC", "Daechi (bus)", (37.4947, 127.0722), StopKind::Bus),
        stop("B_SS", "Suseo (bus)", SUSEO, StopKind::Bus),
    ];

    let (line3_dep, line3_arr) = schedule(330, 1410, 6, &[0, 6, 9]);
    let (line2_dep, line2_arr) = schedule(337, 1405, 12, &[0, 6, 10]);
    let (bus_dep, bus_arr) = schedule(300, 1380, 10, &[0, 7, 13, 25]);

    let routes = vec![
        RouteRecord {
            id: "LINE3".into(),
            short_name: "Line 3".into(),
            long_name: "Line 3 (Yangjae - Apgujeong)".into(),
            mode: Mode::Metro,
            stop_ids: vec!["M_YJ".into(), "M_SN".into(), "M_AP".into()],
            departures: line3_dep,
            arrivals: line3_arr,
        },
        RouteRecord {
            id: "LINE2".into(),
            short_name: "Line 2".into(),
            long_name: "Line 2 (Gangnam - Seolleung)".into(),
            mode: Mode::Metro,
            stop_ids: vec!["M_GN".into(), "M_YS".into(), "M_SL".into()],
            departures: line2_dep,
            arrivals: line2_arr,
        },
        RouteRecord {
            id: "B4432".into(),
            short_name: "4432".into(),
            long_name: "Bus 4432 (Yangjae - Suseo)".into(),
            mode: Mode::Bus,
            stop_ids: vec!["B_YJ".into(), "B_DG".into(), "B_DC".into(), "B_SS".into()],
            departures: bus_dep,
            arrivals: bus_arr,
        },
    ];

    let transfers = vec![TransferRecord {
        from_stop_id: "M_YJ".into(),
        to_stop_id: "B_YJ".into(),
        duration_min: 2,
        distance_m: Some(120.0),
    }];

    NetworkTables {
        stops,
        routes,
        transfers,
    }
}

/// A healthy inventory: one charged kickboard a few steps from Gangnam
/// station and docks at Gangnam and Seolleung.
pub fn healthy_snapshot() -> MobilitySnapshot {
    MobilitySnapshot::new(
        vec![FreeVehicle {
            id: "KB_A".into(),
            coordinate: Coordinate::new(GANGNAM.0 + 0.00018, GANGNAM.1),
            mode: Mode::Kickboard,
            battery_pct: 95.0,
            available: true,
        }],
        vec![
            DockStation {
                id: "D_GN".into(),
                name: "Gangnam dock".into(),
                coordinate: Coordinate::new(GANGNAM.0, GANGNAM.1 - 0.0003),
                capacity: 20,
                bikes_available: 5,
                docks_available: 15,
                active: true,
            },
            DockStation {
                id: "D_SL".into(),
                name: "Seolleung dock".into(),
                coordinate: Coordinate::new(SEOLLEUNG.0 + 0.0001, SEOLLEUNG.1 + 0.0001),
                capacity: 15,
                bikes_available: 3,
                docks_available: 10,
                active: true,
            },
        ],
    )
}

/// Every dock empty, every kickboard nearly drained.
pub fn degraded_snapshot() -> MobilitySnapshot {
    MobilitySnapshot::new(
        vec![FreeVehicle {
            id: "KB_A".into(),
            coordinate: Coordinate::new(GANGNAM.0 + 0.00018, GANGNAM.1),
            mode: Mode::Kickboard,
            battery_pct: 15.0,
            available: true,
        }],
        vec![
            DockStation {
                id: "D_GN".into(),
                name: "Gangnam dock".into(),
                coordinate: Coordinate::new(GANGNAM.0, GANGNAM.1 - 0.0003),
                capacity: 20,
                bikes_available: 0,
                docks_available: 20,
                active: true,
            },
            DockStation {
                id: "D_SL".into(),
                name: "Seolleung dock".into(),
                coordinate: Coordinate::new(SEOLLEUNG.0 + 0.0001, SEOLLEUNG.1 + 0.0001),
                capacity: 15,
                bikes_available: 0,
                docks_available: 15,
                active: true,
            },
        ],
    )
}

/// Integrated planner over the fixture network plus the virtual mobility
/// layer synthesized from the given snapshot.
pub fn planner_with(snapshot: MobilitySnapshot, geo: GeoKernel) -> Planner {
    let mut tables = transit_tables();
    synthesize_virtual_network(&mut tables, &snapshot, &geo, &VirtualNetworkConfig::default());
    let network = Network::from_tables(tables).expect("fixture network builds");
    Planner::new(network, geo).with_snapshot(snapshot)
}

pub fn planner() -> Planner {
    planner_with(healthy_snapshot(), GeoKernel::new(None))
}

/// Planner over the bare transit network, no virtual mobility layer.
pub fn planner_plain(snapshot: MobilitySnapshot) -> Planner {
    let network = Network::from_tables(transit_tables()).expect("fixture network builds");
    Planner::new(network, GeoKernel::new(None)).with_snapshot(snapshot)
}

/// A request with the fixture defaults.
pub fn request(origin: (f32, f32), destination: (f32, f32), at: &str) -> RouteRequest {
    RouteRequest::new(origin, destination, at)
}

/// Asserts that no returned journey strictly dominates another on
/// `(time, transfers, walk, cost)`.
pub fn assert_pareto(journeys: &[Journey]) {
    for a in journeys {
        for b in journeys {
            if std::ptr::eq(a, b) {
                continue;
            }
            let no_worse = a.total_time <= b.total_time
                && a.transfers <= b.transfers
                && a.walk_distance <= b.walk_distance
                && a.total_cost <= b.total_cost;
            let strictly = a.total_time < b.total_time
                || a.transfers < b.transfers
                || a.walk_distance < b.walk_distance
                || a.total_cost < b.total_cost;
            assert!(
                !(no_worse && strictly),
                "{} min/{} won dominates {} min/{} won",
                a.total_time.as_minutes(),
                a.total_cost,
                b.total_time.as_minutes(),
                b.total_cost
            );
        }
    }
}

/// Shape of a journey for structural comparisons: kinds, modes, routes,
/// endpoints per leg.
pub fn leg_shape(journey: &Journey) -> Vec<(String, String, String, String)> {
    journey
        .legs
        .iter()
        .map(|leg| {
            (
                format!("{:?}", leg.kind),
                format!("{:?}", leg.mode),
                leg.route_name.as_deref().unwrap_or("").to_owned(),
                format!("{}>{}", leg.from, leg.to),
            )
        })
        .collect()
}
