mod common;

use common::*;
use hangil::journey::LegKind;
use hangil::planner::EmptyReason;
use hangil::prelude::*;
use std::sync::Arc;

fn hybrid() -> HybridPlanner {
    HybridPlanner::new(planner(), ZoneConfig::default())
}

#[test]
fn short_hops_short_circuit_to_direct_mobility() {
    let hybrid = hybrid();
    // A few hundred meters from Gangnam station, same or adjacent zone.
    let destination = (GANGNAM.0 + 0.0016, GANGNAM.1 + 0.0014);
    let result = hybrid.find_routes(&request(GANGNAM, destination, "10:15"));
    assert!(result.reason.is_none(), "{:?}", result.reason);

    let best = result.journeys.first().expect("a journey");
    assert!(
        best.legs
            .iter()
            .any(|leg| matches!(leg.mode, Mode::Kickboard | Mode::Bike)),
        "best hybrid journey used no mobility: {best}"
    );
    assert!(best.total_time.as_minutes() <= 15);
}

#[test]
fn long_hops_ride_transit() {
    let hybrid = hybrid();
    let result = hybrid.find_routes(&request(YANGJAE, SUSEO, "14:00"));
    assert!(result.reason.is_none(), "{:?}", result.reason);
    assert!(
        result
            .journeys
            .iter()
            .any(|journey| journey.legs.iter().any(|leg| leg.kind == LegKind::Transit)),
        "no transit journey for a cross-district trip"
    );
}

#[test]
fn outside_the_grid_is_reported() {
    let hybrid = hybrid();
    let result = hybrid.find_routes(&request((38.2, 127.02), SUSEO, "14:00"));
    assert_eq!(result.reason, Some(EmptyReason::OriginOutsideArea));
}

#[test]
fn strategies_follow_zone_distance_and_hour() {
    let hybrid = hybrid();
    let near = hybrid.strategy_for(0, 12);
    assert!(near.allow_direct_mobility);
    assert_eq!(near.transit_weight, 0.0);

    let far = hybrid.strategy_for(12, 12);
    assert!(!far.allow_direct_mobility);
    assert!(far.transit_weight > far.mobility_weight);

    // Rush hour shifts weight toward transit for the same distance.
    let midday = hybrid.strategy_for(3, 12);
    let rush = hybrid.strategy_for(3, 8);
    assert!(rush.mobility_weight < midday.mobility_weight);
}

#[test]
fn a_custom_selector_overrides_the_table() {
    let hybrid = hybrid().with_selector(Arc::new(|zone_distance, _| RoutingStrategy {
        zone_distance,
        name: "always_transit",
        mobility_weight: 0.0,
        transit_weight: 1.0,
        allow_direct_mobility: false,
        check_direct_transit: true,
        max_transfers: 2,
    }));
    let strategy = hybrid.strategy_for(0, 12);
    assert_eq!(strategy.name, "always_transit");

    // Even a same-zone trip now refuses direct mobility.
    let destination = (GANGNAM.0 + 0.0016, GANGNAM.1 + 0.0014);
    let result = hybrid.find_routes(&request(GANGNAM, destination, "10:15"));
    for journey in result.journeys.iter() {
        assert!(journey.legs.iter().all(|leg| leg.kind != LegKind::Mobility || leg.route_name.is_some()));
    }
}

#[test]
fn config_update_reshapes_strategies() {
    let mut hybrid = hybrid();
    assert!(hybrid.strategy_for(2, 12).allow_direct_mobility);
    hybrid.update_config(ZoneConfig {
        mobility_only_threshold: 0,
        ..ZoneConfig::default()
    });
    assert!(!hybrid.strategy_for(2, 12).allow_direct_mobility);
}

#[test]
fn zone_grid_maps_stops_and_distances() {
    let hybrid = hybrid();
    let grid = hybrid.grid();
    let gangnam_zone = grid.zone_at(&Coordinate::new(GANGNAM.0, GANGNAM.1)).unwrap();
    let suseo_zone = grid.zone_at(&Coordinate::new(SUSEO.0, SUSEO.1)).unwrap();
    assert!(ZoneGrid::chebyshev(gangnam_zone, suseo_zone) > 2);
    assert_eq!(ZoneGrid::chebyshev(gangnam_zone, gangnam_zone), 0);
    assert!(grid.zone_at(&Coordinate::new(40.0, 127.0)).is_none());

    // Access points are memoized and bounded.
    let points = hybrid.access_points(&Coordinate::new(GANGNAM.0, GANGNAM.1));
    assert!(!points.is_empty());
    assert!(points.len() <= 5);
    let again = hybrid.access_points(&Coordinate::new(GANGNAM.0, GANGNAM.1));
    assert_eq!(points.len(), again.len());
}

#[test]
fn hybrid_results_stay_pareto_optimal() {
    let hybrid = hybrid();
    for (origin, destination, at) in [
        (GANGNAM, SEOLLEUNG, "08:30"),
        (YANGJAE, SUSEO, "14:00"),
        (SINSA, APGUJEONG, "08:30"),
    ] {
        let result = hybrid.find_routes(&request(origin, destination, at));
        assert_pareto(&result.journeys);
        assert!(result.journeys.len() <= 5);
    }
}
