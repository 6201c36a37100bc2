use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use hangil::mobility::{
    DockStation, FreeVehicle, VirtualNetworkConfig, synthesize_virtual_network,
};
use hangil::network::{NetworkTables, RouteRecord, StopKind, StopRecord, TransferRecord};
use hangil::planner::Policy;
use hangil::prelude::*;

/// A synthetic district: a grid of metro lines plus scattered mobility.
fn build_planner() -> Planner {
    let mut stops: Vec<StopRecord> = Vec::new();
    let mut routes: Vec<RouteRecord> = Vec::new();

    for line in 0..6 {
        let mut stop_ids: Vec<String> = Vec::new();
        for position in 0..10 {
            let id = format!("S_{line}_{position}");
            stops.push(StopRecord {
                id: id.clone(),
                name: id.clone(),
                lat: 37.48 + line as f32 * 0.008,
                lon: 127.00 + position as f32 * 0.009,
                kind: StopKind::Metro,
                zone_tag: None,
            });
            stop_ids.push(id);
        }
        let starts: Vec<u32> = (300u32..=1400).step_by(8).collect();
        let rows: Vec<Vec<u32>> = (0..10u32)
            .map(|position| starts.iter().map(|t| t + position * 3).collect())
            .collect();
        routes.push(RouteRecord {
            id: format!("L{line}"),
            short_name: format!("Line {line}"),
            long_name: format!("Grid line {line}"),
            mode: Mode::Metro,
            stop_ids,
            departures: rows.clone(),
            arrivals: rows,
        });
    }

    let vehicles: Vec<FreeVehicle> = (0..40)
        .map(|i| FreeVehicle {
            id: format!("KB_{i}").into(),
            coordinate: Coordinate::new(
                37.48 + (i % 8) as f32 * 0.006,
                127.00 + (i / 8) as f32 * 0.015,
            ),
            mode: Mode::Kickboard,
            battery_pct: 40.0 + (i % 6) as f32 * 10.0,
            available: true,
        })
        .collect();
    let docks: Vec<DockStation> = (0..12)
        .map(|i| DockStation {
            id: format!("D_{i}").into(),
            name: format!("Dock {i}").into(),
            coordinate: Coordinate::new(
                37.482 + (i % 4) as f32 * 0.011,
                127.002 + (i / 4) as f32 * 0.024,
            ),
            capacity: 20,
            bikes_available: 6,
            docks_available: 10,
            active: true,
        })
        .collect();
    let snapshot = MobilitySnapshot::new(vehicles, docks);

    // Footpaths between vertically adjacent stops let journeys change lines.
    let mut transfers: Vec<TransferRecord> = Vec::new();
    for line in 0..5 {
        for position in 0..10 {
            transfers.push(TransferRecord {
                from_stop_id: format!("S_{line}_{position}"),
                to_stop_id: format!("S_{}_{position}", line + 1),
                duration_min: 11,
                distance_m: Some(890.0),
            });
        }
    }

    let geo = GeoKernel::new(None);
    let mut tables = NetworkTables {
        stops,
        routes,
        transfers,
    };
    synthesize_virtual_network(&mut tables, &snapshot, &geo, &VirtualNetworkConfig::default());
    let network = Network::from_tables(tables).expect("bench network");
    Planner::new(network, geo).with_snapshot(snapshot)
}

fn criterion_benchmark(c: &mut Criterion) {
    let planner = build_planner();
    let origin = (37.481, 127.001);
    let destination = (37.519, 127.078);

    c.bench_function("transit_only_solve", |b| {
        b.iter(|| {
            let request = RouteRequest::new(origin, destination, "08:30")
                .policy(Policy::TransitOnly);
            black_box(planner.find_routes(&request))
        })
    });

    c.bench_function("multimodal_solve", |b| {
        b.iter(|| {
            let request = RouteRequest::new(origin, destination, "08:30");
            black_box(planner.find_routes(&request))
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
