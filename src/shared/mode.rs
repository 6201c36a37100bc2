use serde::{Deserialize, Serialize};

use crate::shared::{Distance, Duration};

/// Walking speed used for every on-foot time estimate, in meters per minute.
pub const WALK_SPEED: f32 = 80.0;

/// Minimum charge a free-floating vehicle needs before it is offered for
/// pickup.
pub const MIN_PICKUP_BATTERY: f32 = 20.0;

/// A carried dock bike may only be dropped when a dock with a free slot lies
/// within this radius of the stop.
pub const DOCK_DROP_RADIUS: Distance = Distance::from_meters(150.0);

/// The closed set of travel modes. Everything mode-specific is a lookup in
/// [`ModeParams`]; no trait objects, no per-mode types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Walk,
    Bus,
    Metro,
    Bike,
    Kickboard,
    Ebike,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Walk
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ModeParams {
    /// Cruise speed in km/h. Scheduled modes ride the timetable instead.
    pub speed_kmh: f32,
    /// Flag-fall in won.
    pub base_fare: u32,
    /// Per-minute surcharge in won.
    pub fare_per_minute: u32,
    /// Maximum ride range on a full charge, in km.
    pub range_km: f32,
    /// Battery drained per km, in percent points.
    pub battery_per_km: f32,
    /// Multiplier applied to haversine when the road graph cannot answer.
    pub detour_factor: f32,
}

const WALK_PARAMS: ModeParams = ModeParams {
    speed_kmh: 4.8,
    base_fare: 0,
    fare_per_minute: 0,
    range_km: f32::INFINITY,
    battery_per_km: 0.0,
    detour_factor: 1.2,
};

const BUS_PARAMS: ModeParams = ModeParams {
    speed_kmh: 0.0,
    base_fare: 1370,
    fare_per_minute: 0,
    range_km: f32::INFINITY,
    battery_per_km: 0.0,
    detour_factor: 1.3,
};

const METRO_PARAMS: ModeParams = ModeParams {
    speed_kmh: 0.0,
    base_fare: 1370,
    fare_per_minute: 0,
    range_km: f32::INFINITY,
    battery_per_km: 0.0,
    detour_factor: 1.3,
};

const BIKE_PARAMS: ModeParams = ModeParams {
    speed_kmh: 15.0,
    base_fare: 1000,
    fare_per_minute: 0,
    range_km: 10.0,
    battery_per_km: 0.0,
    detour_factor: 1.3,
};

const KICKBOARD_PARAMS: ModeParams = ModeParams {
    speed_kmh: 20.0,
    base_fare: 1000,
    fare_per_minute: 150,
    range_km: 15.0,
    battery_per_km: 8.0,
    detour_factor: 1.3,
};

const EBIKE_PARAMS: ModeParams = ModeParams {
    speed_kmh: 25.0,
    base_fare: 490,
    fare_per_minute: 0,
    range_km: 20.0,
    battery_per_km: 5.0,
    detour_factor: 1.3,
};

impl Mode {
    pub const fn params(&self) -> &'static ModeParams {
        match self {
            Mode::Walk => &WALK_PARAMS,
            Mode::Bus => &BUS_PARAMS,
            Mode::Metro => &METRO_PARAMS,
            Mode::Bike => &BIKE_PARAMS,
            Mode::Kickboard => &KICKBOARD_PARAMS,
            Mode::Ebike => &EBIKE_PARAMS,
        }
    }

    pub const fn is_transit(&self) -> bool {
        matches!(self, Mode::Bus | Mode::Metro)
    }

    pub const fn is_mobility(&self) -> bool {
        matches!(self, Mode::Bike | Mode::Kickboard | Mode::Ebike)
    }

    /// Dock bikes carry a return-to-station obligation; free-floating modes
    /// park anywhere.
    pub const fn must_return_to_station(&self) -> bool {
        matches!(self, Mode::Bike)
    }

    pub fn speed_m_per_min(&self) -> f32 {
        self.params().speed_kmh * 1000.0 / 60.0
    }

    /// Ride time over `distance` at this mode's cruise speed, rounded up to
    /// whole minutes.
    pub fn ride_duration(&self, distance: Distance) -> Duration {
        let minutes = (distance.as_meters() / self.speed_m_per_min()).ceil() as u32;
        Duration::from_minutes(minutes.max(1))
    }

    /// Fare of a single ride of the given length. Each mobility ride is an
    /// independent charge.
    pub fn ride_fare(&self, duration: Duration) -> u32 {
        let params = self.params();
        params.base_fare + params.fare_per_minute * duration.as_minutes()
    }

    /// Usable range given the remaining battery, in meters.
    pub fn range_with_battery(&self, battery_pct: f32) -> Distance {
        let params = self.params();
        let full = Distance::from_kilometers(params.range_km);
        if params.battery_per_km == 0.0 {
            return full;
        }
        let fraction = (battery_pct / 100.0).clamp(0.0, 1.0);
        Distance::from_meters(full.as_meters() * fraction.min(1.0))
    }

    /// Battery left after riding `distance`, clamped at zero.
    pub fn battery_after(&self, battery_pct: f32, distance: Distance) -> f32 {
        (battery_pct - self.params().battery_per_km * distance.as_kilometers()).max(0.0)
    }
}

/// Walking time over `distance`, rounded up to whole minutes.
pub fn time_to_walk(distance: Distance) -> Duration {
    Duration::from_minutes((distance.as_meters() / WALK_SPEED).ceil() as u32)
}

#[test]
fn walk_pace_is_80_meters_per_minute() {
    assert_eq!(time_to_walk(Distance::from_meters(400.0)).as_minutes(), 5);
    assert_eq!(time_to_walk(Distance::from_meters(401.0)).as_minutes(), 6);
}

#[test]
fn kickboard_fare_charges_per_minute() {
    let ride = Mode::Kickboard.ride_duration(Distance::from_kilometers(2.0));
    assert_eq!(ride.as_minutes(), 6);
    assert_eq!(Mode::Kickboard.ride_fare(ride), 1000 + 6 * 150);
}

#[test]
fn bike_fare_is_flat() {
    let ride = Mode::Bike.ride_duration(Distance::from_kilometers(3.0));
    assert_eq!(Mode::Bike.ride_fare(ride), 1000);
}

#[test]
fn battery_limits_range() {
    let half = Mode::Kickboard.range_with_battery(50.0);
    assert!((half.as_kilometers() - 7.5).abs() < 0.01);
    let full = Mode::Bike.range_with_battery(0.0);
    assert!((full.as_kilometers() - 10.0).abs() < 0.01);
}

#[test]
fn battery_drain() {
    let left = Mode::Ebike.battery_after(60.0, Distance::from_kilometers(4.0));
    assert!((left - 40.0).abs() < 0.01);
    assert_eq!(
        Mode::Kickboard.battery_after(5.0, Distance::from_kilometers(10.0)),
        0.0
    );
}
