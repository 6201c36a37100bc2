use std::{
    fmt::Display,
    ops::{Add, AddAssign, Sub, SubAssign},
};

use chrono::{Local, Timelike};
use serde::{Deserialize, Serialize};

pub const MIN: Time = Time(0);
pub const MAX: Time = Time(u32::MAX);

/// Minutes since midnight. Every timetable in the system is minute-resolution,
/// so a `u32` of minutes is the label currency of the whole solver.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Time(u32);

impl From<u32> for Time {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl Sub<Time> for Time {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        Duration(self.0.saturating_sub(rhs.0))
    }
}

impl Add<Duration> for Time {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign<Duration> for Time {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Time {
    pub fn now() -> Self {
        let now = Local::now();
        Self(now.hour() * 60 + now.minute())
    }

    pub const fn from_minutes(minutes: u32) -> Self {
        Self(minutes)
    }

    pub const fn from_hm_pair(hours: u32, minutes: u32) -> Self {
        Self(hours * 60 + minutes)
    }

    pub const fn as_minutes(&self) -> u32 {
        self.0
    }

    pub const fn hour(&self) -> u32 {
        self.0 / 60
    }

    /// Parses a `HH:MM` clock string. Seconds are not part of the model.
    pub fn from_hm(time: &str) -> Option<Self> {
        let mut split = time.split(':');
        let hours: u32 = split.next()?.parse().ok()?;
        let minutes: u32 = split.next()?.parse().ok()?;
        if split.next().is_some() || minutes >= 60 {
            return None;
        }
        Some(Self(hours * 60 + minutes))
    }
}

impl Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{:02}:{:02}", self.0 / 60, self.0 % 60))
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Duration(u32);

impl From<u32> for Duration {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl Duration {
    pub const fn from_minutes(minutes: u32) -> Self {
        Self(minutes)
    }

    pub const fn from_hours(hours: u32) -> Self {
        Self(hours * 60)
    }

    pub const fn as_minutes(&self) -> u32 {
        self.0
    }
}

impl Sub for Duration {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Duration {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_sub(rhs.0);
    }
}

impl Add for Duration {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

#[test]
fn parse_unparse_midnight() {
    let time = "00:00";
    let parsed = Time::from_hm(time).unwrap();
    assert_eq!(time, parsed.to_string());
}

#[test]
fn parse_unparse_morning() {
    let time = "08:30";
    let parsed = Time::from_hm(time).unwrap();
    assert_eq!(time, parsed.to_string());
    assert_eq!(parsed.as_minutes(), 510);
}

#[test]
fn parse_unparse_evening() {
    let time = "23:59";
    let parsed = Time::from_hm(time).unwrap();
    assert_eq!(time, parsed.to_string());
}

#[test]
fn invalid_time_letters() {
    assert!(Time::from_hm("0a:00").is_none());
}

#[test]
fn invalid_time_with_seconds() {
    assert!(Time::from_hm("08:30:00").is_none());
}

#[test]
fn invalid_time_minutes_overflow() {
    assert!(Time::from_hm("08:75").is_none());
}

#[test]
fn time_arithmetic() {
    let depart = Time::from_hm("08:30").unwrap();
    let arrive = depart + Duration::from_minutes(42);
    assert_eq!(arrive.as_minutes(), 552);
    assert_eq!((arrive - depart).as_minutes(), 42);
}
