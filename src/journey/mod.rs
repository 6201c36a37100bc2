mod pareto;
mod reconstruct;

pub(crate) use pareto::{dedup, pareto_filter, score_journeys, select, sort_by_score};
pub(crate) use reconstruct::{build_journey, collect_candidates};

use std::{fmt::Display, sync::Arc};

use serde::Serialize;

use crate::shared::{Distance, Duration, Mode, Time};

/// Journeys returned per query.
pub const TOP_K: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LegKind {
    Access,
    Transit,
    Mobility,
    Transfer,
    Egress,
}

/// One hop of a journey. Which fields are filled depends on the kind:
/// transit legs name their route, walking legs carry a distance, mobility
/// legs carry the vehicle and ride distance.
#[derive(Debug, Clone, Serialize)]
pub struct Leg {
    pub kind: LegKind,
    pub mode: Mode,
    pub from: Arc<str>,
    pub to: Arc<str>,
    pub route_name: Option<Arc<str>>,
    pub vehicle_id: Option<Arc<str>>,
    pub departure: Time,
    pub arrival: Time,
    pub distance: Option<Distance>,
    pub cost: u32,
}

impl Leg {
    pub fn duration(&self) -> Duration {
        self.arrival - self.departure
    }
}

/// A complete door-to-door journey. `transfers` counts boarded rides
/// (scheduled and mobility alike) beyond the first.
#[derive(Debug, Clone, Serialize)]
pub struct Journey {
    pub departure: Time,
    pub arrival: Time,
    pub total_time: Duration,
    pub total_cost: u32,
    pub transfers: u32,
    pub walk_distance: Distance,
    pub used_mobility: Vec<Mode>,
    pub legs: Vec<Leg>,
    /// Weighted preference score; filled by the selection stage.
    pub score: f32,
}

impl Journey {
    /// True when the journey never touches scheduled transit.
    pub fn is_mobility_only(&self) -> bool {
        !self.legs.iter().any(|leg| leg.kind == LegKind::Transit)
    }
}

impl Display for Journey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} → {} | {} min | {} won | {} transfers | {:.0} m on foot",
            self.departure,
            self.arrival,
            self.total_time.as_minutes(),
            self.total_cost,
            self.transfers,
            self.walk_distance.as_meters(),
        )?;
        for (i, leg) in self.legs.iter().enumerate() {
            let label = match (&leg.kind, &leg.route_name) {
                (LegKind::Transit, Some(route)) => format!("ride {route}"),
                (LegKind::Mobility, _) => format!("{:?}", leg.mode).to_lowercase(),
                _ => "walk".to_owned(),
            };
            write!(
                f,
                "  {}. {} {} → {} ({} min",
                i + 1,
                label,
                leg.from,
                leg.to,
                leg.duration().as_minutes(),
            )?;
            if let Some(distance) = leg.distance {
                write!(f, ", {:.0} m", distance.as_meters())?;
            }
            writeln!(f, ")")?;
        }
        Ok(())
    }
}
