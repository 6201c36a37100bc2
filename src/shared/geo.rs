use serde::{Deserialize, Serialize};
use std::{
    cmp,
    fmt::Display,
    ops::{Add, Div, Mul, Sub},
    str::FromStr,
};
use thiserror::Error;

pub(crate) const SPATIAL_CELL_SIZE: Distance = Distance::from_meters(500.0);
pub(crate) const LONGITUDE_DISTANCE: Distance = Distance::from_meters(111_320.0);
pub(crate) const LATITUDE_DISTANCE: Distance = Distance::from_meters(110_540.0);

/// Grid cell of the coarse spatial hash used by every radius query.
pub type Cell = (i32, i32);

/// Cache key for a coordinate, quantized to 5 decimal places of degrees
/// (roughly one meter) so nearby query points share cache entries.
pub type QuantizedPoint = (i32, i32);

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Distance(f32);

impl PartialEq for Distance {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl PartialOrd for Distance {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        self.0.partial_cmp(&other.0)
    }
}

impl Add for Distance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Distance {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<f32> for Distance {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div for Distance {
    type Output = Self;
    fn div(self, rhs: Self) -> Self::Output {
        Self(self.0 / rhs.0)
    }
}

impl From<f32> for Distance {
    fn from(value: f32) -> Self {
        Distance(value)
    }
}

impl Distance {
    pub const fn from_meters(distance: f32) -> Self {
        Self(distance)
    }

    pub const fn from_kilometers(distance: f32) -> Self {
        Self(distance * 1000.0)
    }

    pub const fn as_meters(&self) -> f32 {
        self.0
    }

    pub const fn as_kilometers(&self) -> f32 {
        self.0 / 1000.0
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f32,
    pub longitude: f32,
}

impl From<(f32, f32)> for Coordinate {
    fn from(value: (f32, f32)) -> Self {
        Self {
            latitude: value.0,
            longitude: value.1,
        }
    }
}

impl Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}, {}", self.latitude, self.longitude))
    }
}

#[derive(Error, Debug)]
pub enum ParseCoordinateError {
    #[error("Invalid latitude")]
    InvalidLatitude,
    #[error("Invalid longitude")]
    InvalidLongitude,
    #[error("Invalid format")]
    InvalidFormat,
}

impl FromStr for Coordinate {
    type Err = ParseCoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.contains(',') {
            return Err(ParseCoordinateError::InvalidFormat);
        }
        let s: String = s.split_whitespace().collect();
        let split: Vec<_> = s.split(',').collect();
        let latitude: f32 = split
            .first()
            .ok_or(ParseCoordinateError::InvalidLatitude)?
            .parse()
            .map_err(|_| ParseCoordinateError::InvalidLatitude)?;
        let longitude: f32 = split
            .last()
            .ok_or(ParseCoordinateError::InvalidLongitude)?
            .parse()
            .map_err(|_| ParseCoordinateError::InvalidLongitude)?;
        Ok(Coordinate {
            latitude,
            longitude,
        })
    }
}

impl Coordinate {
    pub const fn new(latitude: f32, longitude: f32) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance in meters.
    pub fn haversine_distance(&self, coord: &Self) -> Distance {
        const R: f32 = 6_371_000.0;
        let dist_lat = f32::to_radians(coord.latitude - self.latitude);
        let dist_lon = f32::to_radians(coord.longitude - self.longitude);
        let a = f32::powi(f32::sin(dist_lat / 2.0), 2)
            + f32::cos(f32::to_radians(self.latitude))
                * f32::cos(f32::to_radians(coord.latitude))
                * f32::sin(dist_lon / 2.0)
                * f32::sin(dist_lon / 2.0);
        let c = 2.0 * f32::atan2(f32::sqrt(a), f32::sqrt(1.0 - a));
        Distance::from_meters(R * c)
    }

    /// Haversine scaled by a detour factor; the estimate used whenever the
    /// road graph cannot answer.
    pub fn detour_distance(&self, coord: &Self, detour_factor: f32) -> Distance {
        self.haversine_distance(coord) * detour_factor
    }

    pub fn to_cell(&self) -> Cell {
        let x =
            (self.longitude * LONGITUDE_DISTANCE.as_meters() / SPATIAL_CELL_SIZE.as_meters()) as i32;
        let y =
            (self.latitude * LATITUDE_DISTANCE.as_meters() / SPATIAL_CELL_SIZE.as_meters()) as i32;
        (x, y)
    }

    pub fn quantized(&self) -> QuantizedPoint {
        (
            (self.latitude * 100_000.0).round() as i32,
            (self.longitude * 100_000.0).round() as i32,
        )
    }
}

#[test]
fn haversine_known_pair() {
    // Sinsa and Apgujeong stations, about 1.3 km apart.
    let sinsa = Coordinate::new(37.5164, 127.0201);
    let apgujeong = Coordinate::new(37.5270, 127.0286);
    let d = sinsa.haversine_distance(&apgujeong);
    assert!(d.as_meters() > 1_200.0 && d.as_meters() < 1_600.0);
}

#[test]
fn haversine_zero() {
    let a = Coordinate::new(37.5, 127.0);
    assert!(a.haversine_distance(&a).as_meters() < 0.001);
}

#[test]
fn distance_eq() {
    let dist_a = Distance::from_meters(1000.0);
    let dist_b = Distance::from_kilometers(1.0);
    assert_eq!(dist_a, dist_b)
}

#[test]
fn distance_cmp() {
    let dist_a = Distance::from_meters(1000.0);
    let dist_b = Distance::from_kilometers(0.5);
    assert!(dist_a > dist_b)
}

#[test]
fn quantization_is_stable_within_a_meter() {
    let a = Coordinate::new(37.516_400, 127.020_100);
    let b = Coordinate::new(37.516_402, 127.020_102);
    assert_eq!(a.quantized(), b.quantized());
}

#[test]
fn parse_coordinate() {
    let parsed: Coordinate = "37.5164, 127.0201".parse().unwrap();
    assert!((parsed.latitude - 37.5164).abs() < 1e-4);
    assert!((parsed.longitude - 127.0201).abs() < 1e-4);
}
