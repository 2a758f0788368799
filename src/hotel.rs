//! Hotel impact evaluation against a baseline plan.
//!
//! A hotel constraint may only narrow its own city's visit. Flights, gateways
//! and the set of visited cities are never changed here.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::model::{city_key, Flexibility, HotelConstraint, ImpactCard, ImpactKind, Visit};
use crate::visits::{rebuild_route_from_all_visits, visits_are_ordered, PlannedRoute};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    /// New plan when compatible; the unchanged baseline otherwise.
    pub candidate: PlannedRoute,
    pub impact_cards: Vec<ImpactCard>,
}

impl Evaluation {
    pub fn is_compatible(&self) -> bool {
        !self.impact_cards.iter().any(ImpactCard::is_blocking)
    }
}

/// Index of the visit that should host `constraint`.
///
/// Prefers a visit of the same city whose window contains the stay, then one
/// that overlaps it, then the first visit of that city.
fn host_visit(visits: &[Visit], constraint: &HotelConstraint) -> Option<usize> {
    let key = city_key(&constraint.city);
    let same_city: Vec<usize> = visits
        .iter()
        .enumerate()
        .filter(|(_, visit)| city_key(&visit.city) == key)
        .map(|(i, _)| i)
        .collect();

    same_city
        .iter()
        .copied()
        .find(|&i| visits[i].contains(constraint.check_in, constraint.check_out))
        .or_else(|| {
            same_city.iter().copied().find(|&i| {
                constraint.check_in < visits[i].departure && constraint.check_out > visits[i].arrival
            })
        })
        .or_else(|| same_city.first().copied())
}

/// Check one constraint against the baseline.
///
/// All hard invariants hold: a new route id with no impact cards. Otherwise
/// the baseline is returned as-is alongside the blocking cards.
pub fn evaluate(baseline: &PlannedRoute, constraint: &HotelConstraint) -> Evaluation {
    let blocked = |impact_cards| Evaluation {
        candidate: baseline.clone(),
        impact_cards,
    };

    let Some(index) = host_visit(baseline.visits(), constraint) else {
        return blocked(vec![ImpactCard::blocking(
            ImpactKind::CityNotInBaseline,
            format!("{} is not part of this itinerary", constraint.city),
        )]);
    };
    let visit = &baseline.visits()[index];

    let mut cards = Vec::new();
    if constraint.check_in >= constraint.check_out {
        cards.push(ImpactCard::blocking(
            ImpactKind::InvertedDates,
            format!(
                "check-in {} is not before check-out {}",
                constraint.check_in, constraint.check_out
            ),
        ));
    }
    if !visit.contains(constraint.check_in, constraint.check_out) {
        let mut summary = format!(
            "{} stay {} to {} falls outside your time there ({} to {})",
            constraint.city, constraint.check_in, constraint.check_out, visit.arrival, visit.departure
        );
        if constraint.check_in < constraint.check_out && flexibility_would_fit(constraint, visit) {
            summary.push_str("; the booking's date flexibility would allow a fitting stay");
        }
        cards.push(ImpactCard::blocking(ImpactKind::OutsideStayWindow, summary));
    }

    if !cards.is_empty() {
        debug!(hotel = %constraint.hotel_id, cards = cards.len(), "hotel constraint blocked");
        return blocked(cards);
    }

    Evaluation {
        candidate: baseline.shallow_clone(),
        impact_cards: Vec::new(),
    }
}

fn shift(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    if days >= 0 {
        date.checked_add_days(Days::new(days as u64))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

/// Advice only: whether the constraint's own flexibility admits a stay of the
/// same length inside `visit`.
fn flexibility_would_fit(constraint: &HotelConstraint, visit: &Visit) -> bool {
    let nights = (constraint.check_out - constraint.check_in).num_days();
    match &constraint.flexibility {
        Flexibility::Fixed => false,
        Flexibility::PlusMinusOneDay => [-1, 1].into_iter().any(|days| {
            match (shift(constraint.check_in, days), shift(constraint.check_out, days)) {
                (Some(check_in), Some(check_out)) => visit.contains(check_in, check_out),
                _ => false,
            }
        }),
        Flexibility::DateRange {
            earliest_check_in,
            latest_check_out,
        } => {
            let from = (*earliest_check_in).max(visit.arrival);
            let until = (*latest_check_out).min(visit.departure);
            (until - from).num_days() >= nights
        }
    }
}

/// Apply every constraint to its own visit, or nothing at all.
///
/// Each constraint is checked against the baseline visit that hosts it, so
/// the order of `constraints` does not matter. Several hotels may split one
/// visit as long as their stays do not overlap; the visit narrows to their
/// combined span. Returns `None` if any constraint fails a hard invariant or
/// the narrowed visits stop being ordered. Otherwise only legs next to a
/// narrowed visit move and the plan is re-derived from the new route.
pub fn evaluate_all(baseline: &PlannedRoute, constraints: &[HotelConstraint]) -> Option<PlannedRoute> {
    let mut hosted: BTreeMap<usize, Vec<&HotelConstraint>> = BTreeMap::new();

    for constraint in constraints {
        if constraint.check_in >= constraint.check_out {
            debug!(hotel = %constraint.hotel_id, "inverted hotel dates");
            return None;
        }
        let index = host_visit(baseline.visits(), constraint)?;
        let visit = &baseline.visits()[index];
        if !visit.contains(constraint.check_in, constraint.check_out) {
            debug!(hotel = %constraint.hotel_id, city = %visit.city, "hotel outside stay window");
            return None;
        }
        hosted.entry(index).or_default().push(constraint);
    }

    let mut visits = baseline.visits().to_vec();
    for (&index, stays) in hosted.iter_mut() {
        stays.sort_by_key(|stay| (stay.check_in, stay.check_out));
        if let Some(pair) = stays.windows(2).find(|pair| pair[1].check_in < pair[0].check_out) {
            debug!(
                first = %pair[0].hotel_id,
                second = %pair[1].hotel_id,
                "hotel stays overlap"
            );
            return None;
        }
        let (Some(first), Some(last)) = (stays.first(), stays.iter().map(|stay| stay.check_out).max()) else {
            continue;
        };
        let visit = &mut visits[index];
        visit.arrival = first.check_in;
        visit.departure = last;
    }

    if !visits_are_ordered(&visits) {
        return None;
    }
    if hosted.is_empty() {
        return Some(baseline.shallow_clone());
    }

    let modified: BTreeSet<usize> = hosted.keys().copied().collect();
    rebuild_route_from_all_visits(baseline, &visits, &modified)
}
