use std::collections::HashMap;

use crate::{
    journey::{Journey, TOP_K},
    planner::{MobilityPreference, Weights},
    shared::Mode,
};

/// Bonus scale for each preferred mobility mode a journey actually uses.
const MOBILITY_BONUS: f32 = 0.1;

/// Full selection stage: dedup, Pareto filter, weighted scoring, top-K.
pub(crate) fn select(
    journeys: Vec<Journey>,
    weights: &Weights,
    mobility: &MobilityPreference,
) -> Vec<Journey> {
    let deduped = dedup(journeys);
    let mut surviving = pareto_filter(deduped);
    score_journeys(&mut surviving, weights, mobility, |_| 0.0);
    sort_by_score(&mut surviving);
    surviving.truncate(TOP_K);
    surviving
}

/// Candidates with the same transit sequence and the same whole-minute
/// departure and arrival collapse to the one with the least walking.
pub(crate) fn dedup(journeys: Vec<Journey>) -> Vec<Journey> {
    let mut best: HashMap<String, Journey> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for journey in journeys {
        let key = dedup_key(&journey);
        match best.get(&key) {
            Some(kept) if kept.walk_distance <= journey.walk_distance => {}
            Some(_) => {
                best.insert(key, journey);
            }
            None => {
                order.push(key.clone());
                best.insert(key, journey);
            }
        }
    }
    order
        .into_iter()
        .filter_map(|key| best.remove(&key))
        .collect()
}

fn dedup_key(journey: &Journey) -> String {
    use std::fmt::Write;
    let mut key = format!(
        "{}|{}",
        journey.departure.as_minutes(),
        journey.arrival.as_minutes()
    );
    for leg in journey
        .legs
        .iter()
        .filter(|leg| leg.kind == crate::journey::LegKind::Transit)
    {
        let _ = write!(
            key,
            "|{}>{}@{}",
            leg.from,
            leg.to,
            leg.route_name.as_deref().unwrap_or("")
        );
    }
    key
}

/// Drops every journey strictly dominated component-wise on
/// `(total_time, transfers, walk, cost)`.
pub(crate) fn pareto_filter(journeys: Vec<Journey>) -> Vec<Journey> {
    let mut kept: Vec<Journey> = Vec::with_capacity(journeys.len());
    for journey in journeys.iter() {
        let dominated = journeys
            .iter()
            .any(|other| !std::ptr::eq(other, journey) && dominates(other, journey));
        if !dominated {
            kept.push(journey.clone());
        }
    }
    kept
}

/// `a` dominates `b` when it is at least as good everywhere and strictly
/// better somewhere.
fn dominates(a: &Journey, b: &Journey) -> bool {
    let no_worse = a.total_time <= b.total_time
        && a.transfers <= b.transfers
        && a.walk_distance <= b.walk_distance
        && a.total_cost <= b.total_cost;
    let strictly_better = a.total_time < b.total_time
        || a.transfers < b.transfers
        || a.walk_distance < b.walk_distance
        || a.total_cost < b.total_cost;
    no_worse && strictly_better
}

/// Min-max normalizes the four metrics over the set and writes the weighted
/// score onto each journey, plus a bonus per used mobility mode scaled by
/// the user's preference for it, plus whatever `extra` adds (the hybrid
/// planner feeds its strategy bonus through here).
pub(crate) fn score_journeys(
    journeys: &mut [Journey],
    weights: &Weights,
    mobility: &MobilityPreference,
    extra: impl Fn(&Journey) -> f32,
) {
    if journeys.is_empty() {
        return;
    }
    let times: Vec<f32> = journeys
        .iter()
        .map(|j| j.total_time.as_minutes() as f32)
        .collect();
    let transfers: Vec<f32> = journeys.iter().map(|j| j.transfers as f32).collect();
    let walks: Vec<f32> = journeys
        .iter()
        .map(|j| j.walk_distance.as_meters())
        .collect();
    let costs: Vec<f32> = journeys.iter().map(|j| j.total_cost as f32).collect();

    for (i, journey) in journeys.iter_mut().enumerate() {
        let mobility_bonus: f32 = journey
            .used_mobility
            .iter()
            .map(|mode| MOBILITY_BONUS * mobility.preference_for(*mode))
            .sum();
        journey.score = weights.time * normalized(&times, i)
            + weights.transfers * normalized(&transfers, i)
            + weights.walk * normalized(&walks, i)
            + weights.cost * normalized(&costs, i)
            + mobility_bonus
            + extra(journey);
    }
}

/// 1.0 for the best (smallest) value in the set, 0.0 for the worst.
fn normalized(values: &[f32], index: usize) -> f32 {
    let min = values.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if max <= min {
        return 1.0;
    }
    1.0 - (values[index] - min) / (max - min)
}

/// Descending by score with a deterministic tie-break, so identical inputs
/// always rank identically.
pub(crate) fn sort_by_score(journeys: &mut [Journey]) {
    journeys.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.total_time.cmp(&b.total_time))
            .then_with(|| a.total_cost.cmp(&b.total_cost))
            .then_with(|| a.arrival.cmp(&b.arrival))
    });
}

impl MobilityPreference {
    pub(crate) fn preference_for(&self, mode: Mode) -> f32 {
        match mode {
            Mode::Bike => self.bike,
            Mode::Kickboard => self.kickboard,
            Mode::Ebike => self.ebike,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{Distance, Duration, Time};

    fn journey(total_min: u32, transfers: u32, walk_m: f32, cost: u32) -> Journey {
        Journey {
            departure: Time::from_minutes(510),
            arrival: Time::from_minutes(510 + total_min),
            total_time: Duration::from_minutes(total_min),
            total_cost: cost,
            transfers,
            walk_distance: Distance::from_meters(walk_m),
            used_mobility: vec![],
            legs: vec![],
            score: 0.0,
        }
    }

    #[test]
    fn dominated_journeys_are_dropped() {
        let a = journey(30, 0, 200.0, 1370);
        let b = journey(35, 1, 300.0, 1370); // dominated by a
        let c = journey(25, 2, 500.0, 2370); // faster but worse elsewhere
        let kept = pareto_filter(vec![a, b, c]);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|j| j.total_time.as_minutes() != 35));
    }

    #[test]
    fn no_returned_journey_dominates_another() {
        let journeys = vec![
            journey(30, 0, 200.0, 1370),
            journey(28, 1, 100.0, 1370),
            journey(40, 0, 50.0, 1000),
            journey(45, 3, 600.0, 3000),
        ];
        let kept = pareto_filter(journeys);
        for a in kept.iter() {
            for b in kept.iter() {
                if !std::ptr::eq(a, b) {
                    assert!(!dominates(a, b));
                }
            }
        }
    }

    #[test]
    fn scoring_prefers_the_weighted_best() {
        let mut journeys = vec![journey(30, 0, 200.0, 1370), journey(60, 2, 800.0, 3000)];
        score_journeys(
            &mut journeys,
            &Weights::default(),
            &MobilityPreference::default(),
            |_| 0.0,
        );
        assert!(journeys[0].score > journeys[1].score);
    }

    #[test]
    fn equal_metrics_score_full() {
        let mut journeys = vec![journey(30, 0, 200.0, 1370), journey(30, 0, 200.0, 1370)];
        score_journeys(
            &mut journeys,
            &Weights::default(),
            &MobilityPreference::default(),
            |_| 0.0,
        );
        assert!((journeys[0].score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn mobility_bonus_rewards_preferred_modes() {
        let mut with_bike = journey(30, 0, 200.0, 1370);
        with_bike.used_mobility = vec![crate::shared::Mode::Bike];
        let plain = journey(30, 0, 200.0, 1370);
        let mut journeys = vec![with_bike, plain];
        score_journeys(
            &mut journeys,
            &Weights::default(),
            &MobilityPreference::default(),
            |_| 0.0,
        );
        assert!(journeys[0].score > journeys[1].score);
    }

    #[test]
    fn dedup_keeps_the_shorter_walk() {
        let mut a = journey(30, 0, 400.0, 1370);
        let mut b = journey(30, 0, 150.0, 1370);
        a.legs.push(transit_leg());
        b.legs.push(transit_leg());
        let kept = dedup(vec![a, b]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].walk_distance.as_meters().round() as i32, 150);
    }

    fn transit_leg() -> crate::journey::Leg {
        crate::journey::Leg {
            kind: crate::journey::LegKind::Transit,
            mode: crate::shared::Mode::Metro,
            from: "A".into(),
            to: "B".into(),
            route_name: Some("L3".into()),
            vehicle_id: None,
            departure: Time::from_minutes(512),
            arrival: Time::from_minutes(520),
            distance: None,
            cost: 1370,
        }
    }
}
