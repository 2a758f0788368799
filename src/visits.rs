//! Visit derivation: the single mapping from a structural route to per-city
//! stay windows, plus regeneration of derived dates and rebuilt variants.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{city_key, Derived, GroundLeg, StructuralRoute, Visit};

/// A route together with the visits and dates derived for it.
///
/// Visits and derived dates are always computed from the route, including
/// when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PlannedRouteRepr")]
pub struct PlannedRoute {
    route: StructuralRoute,
    visits: Vec<Visit>,
    derived: Derived,
}

impl PlannedRoute {
    pub fn new(route: StructuralRoute) -> Self {
        let visits = derive_visits(&route);
        let derived = derive_from_visits(&route, &visits);
        Self {
            route,
            visits,
            derived,
        }
    }

    pub fn route(&self) -> &StructuralRoute {
        &self.route
    }

    pub fn visits(&self) -> &[Visit] {
        &self.visits
    }

    pub fn derived(&self) -> &Derived {
        &self.derived
    }

    /// Same plan under a new route id.
    pub fn shallow_clone(&self) -> Self {
        Self {
            route: self.route.shallow_clone(),
            visits: self.visits.clone(),
            derived: self.derived.clone(),
        }
    }
}

#[derive(Deserialize)]
struct PlannedRouteRepr {
    route: StructuralRoute,
}

impl From<PlannedRouteRepr> for PlannedRoute {
    fn from(repr: PlannedRouteRepr) -> Self {
        Self::new(repr.route)
    }
}

fn day(anchor: NaiveDate, offset: u32) -> NaiveDate {
    anchor
        .checked_add_days(Days::new(u64::from(offset)))
        .unwrap_or(NaiveDate::MAX)
}

/// One visit per city segment, walking base legs from the outbound arrival.
///
/// A leg departs on `outbound date + departure_day_offset` and arrives the
/// same day. The last visit ends on the inbound flight's date.
pub fn derive_visits(route: &StructuralRoute) -> Vec<Visit> {
    let start = route.outbound_flight().date;
    let mut visits = Vec::new();
    let mut city = route.outbound_flight().city.clone();
    let mut arrival = start;

    for leg in route.base_legs() {
        let departure = day(start, leg.departure_day_offset);
        visits.push(Visit::new(leg.from_city.clone(), arrival, departure));
        city = leg.to_city.clone();
        arrival = departure;
    }
    visits.push(Visit::new(city, arrival, route.inbound_flight().date));

    visits
}

pub fn derive(route: &StructuralRoute) -> Derived {
    derive_from_visits(route, &derive_visits(route))
}

/// Regenerate every derived field from a full visit list.
pub fn derive_from_visits(route: &StructuralRoute, visits: &[Visit]) -> Derived {
    let outbound = route.outbound_flight().date;
    let inbound = route.inbound_flight().date;

    let mut arrival_dates = BTreeMap::new();
    let mut departure_dates = BTreeMap::new();
    let mut draft_stay_cities: Vec<String> = Vec::new();
    for visit in visits {
        arrival_dates.entry(visit.city.clone()).or_insert(visit.arrival);
        departure_dates.insert(visit.city.clone(), visit.departure);
        let key = city_key(&visit.city);
        if visit.nights() > 0 && !draft_stay_cities.iter().any(|city| city_key(city) == key) {
            draft_stay_cities.push(visit.city.clone());
        }
    }

    let final_arrival = visits.last().map_or(outbound, |visit| visit.arrival);

    Derived {
        arrival_dates,
        departure_dates,
        total_trip_days: (inbound - outbound).num_days() + 1,
        inbound_slack_days: (inbound - final_arrival).num_days(),
        draft_stay_cities,
    }
}

/// Adjacent visits do not overlap and each window is forward in time.
pub fn visits_are_ordered(visits: &[Visit]) -> bool {
    visits.iter().all(|visit| visit.arrival <= visit.departure)
        && visits.windows(2).all(|pair| pair[1].arrival >= pair[0].departure)
}

/// Replace one visit and rebuild. See [`rebuild_route_from_all_visits`].
pub fn rebuild_route_from_visits(plan: &PlannedRoute, index: usize, visit: Visit) -> Option<PlannedRoute> {
    let mut visits = plan.visits().to_vec();
    let slot = visits.get_mut(index)?;
    *slot = visit;
    rebuild_route_from_all_visits(plan, &visits, &BTreeSet::from([index]))
}

/// Build a new route whose stay windows fit `visits`.
///
/// `visits` must keep the plan's city sequence, stay inside the flight
/// anchors, and be ordered. Only legs adjacent to a visit in `modified` get
/// new offsets: a leg departs on its modified predecessor's departure day,
/// else on its modified successor's arrival day. The returned plan's visits
/// are re-derived from the new legs, so a neighbour of a moved leg absorbs
/// the freed days and a modified first or last visit still spans to its
/// flight anchor. Returns `None` when the result would not be a valid
/// timeline.
pub fn rebuild_route_from_all_visits(
    plan: &PlannedRoute,
    visits: &[Visit],
    modified: &BTreeSet<usize>,
) -> Option<PlannedRoute> {
    let route = plan.route();
    if visits.len() != plan.visits().len() {
        debug!(expected = plan.visits().len(), got = visits.len(), "visit count changed");
        return None;
    }
    let same_cities = visits
        .iter()
        .zip(plan.visits())
        .all(|(new, old)| city_key(&new.city) == city_key(&old.city));
    if !same_cities || !visits_are_ordered(visits) {
        return None;
    }

    let start = route.outbound_flight().date;
    let first = visits.first()?;
    let last = visits.last()?;
    if first.arrival < start || last.departure > route.inbound_flight().date {
        return None;
    }

    let mut base_index = 0;
    let mut previous_offset: Option<u32> = None;
    let mut ground_route: Vec<GroundLeg> = Vec::with_capacity(route.ground_route().len());
    for leg in route.ground_route() {
        if !leg.is_base() {
            ground_route.push(leg.clone());
            continue;
        }

        let offset = if modified.contains(&base_index) {
            offset_of(start, visits.get(base_index)?.departure)?
        } else if modified.contains(&(base_index + 1)) {
            offset_of(start, visits.get(base_index + 1)?.arrival)?
        } else {
            leg.departure_day_offset
        };
        if previous_offset.is_some_and(|previous| offset <= previous) {
            debug!(leg = base_index, offset, "rebuilt offsets are not increasing");
            return None;
        }
        previous_offset = Some(offset);

        ground_route.push(GroundLeg {
            departure_day_offset: offset,
            ..leg.clone()
        });
        base_index += 1;
    }

    Some(PlannedRoute::new(route.with_ground_route(ground_route)))
}

fn offset_of(start: NaiveDate, date: NaiveDate) -> Option<u32> {
    u32::try_from((date - start).num_days()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FlightAnchor;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
    }

    fn route() -> StructuralRoute {
        StructuralRoute::new(
            FlightAnchor::new("Prague", date(1)),
            FlightAnchor::new("Munich", date(9)),
            vec![
                GroundLeg::base("Prague", "Vienna", 2),
                GroundLeg::base("Vienna", "Munich", 5),
            ],
        )
    }

    #[test]
    fn test_derive_visits_walks_legs() {
        let visits = derive_visits(&route());
        assert_eq!(
            visits,
            vec![
                Visit::new("Prague", date(1), date(3)),
                Visit::new("Vienna", date(3), date(6)),
                Visit::new("Munich", date(6), date(9)),
            ]
        );
    }

    #[test]
    fn test_empty_ground_route_is_one_visit() {
        let route = StructuralRoute::new(
            FlightAnchor::new("Vienna", date(1)),
            FlightAnchor::new("Vienna", date(4)),
            Vec::new(),
        );
        assert_eq!(derive_visits(&route), vec![Visit::new("Vienna", date(1), date(4))]);
    }

    #[test]
    fn test_derived_fields() {
        let derived = derive(&route());
        assert_eq!(derived.total_trip_days(), 9);
        assert_eq!(derived.inbound_slack_days(), 3);
        assert_eq!(derived.arrival_dates()["Vienna"], date(3));
        assert_eq!(derived.departure_dates()["Vienna"], date(6));
        assert_eq!(derived.draft_stay_cities(), ["Prague", "Vienna", "Munich"]);
    }

    #[test]
    fn test_excursions_do_not_create_visits() {
        let route = StructuralRoute::new(
            FlightAnchor::new("Prague", date(1)),
            FlightAnchor::new("Vienna", date(6)),
            vec![
                GroundLeg::base("Prague", "Vienna", 2),
                GroundLeg::excursion("Vienna", "Bratislava", 3),
            ],
        );
        let cities: Vec<String> = derive_visits(&route).into_iter().map(|v| v.city).collect();
        assert_eq!(cities, vec!["Prague", "Vienna"]);
    }

    #[test]
    fn test_rebuild_touches_only_adjacent_legs() {
        let plan = PlannedRoute::new(route());
        // Leave Vienna a day early.
        let rebuilt = rebuild_route_from_visits(&plan, 1, Visit::new("Vienna", date(3), date(5)))
            .expect("valid rebuild");
        let offsets: Vec<u32> = rebuilt
            .route()
            .ground_route()
            .iter()
            .map(|leg| leg.departure_day_offset)
            .collect();
        assert_eq!(offsets, vec![2, 4]);
        assert_ne!(rebuilt.route().id(), plan.route().id());
        assert_eq!(rebuilt.route().parent(), Some(plan.route().id()));
        assert_eq!(rebuilt.derived().departure_dates()["Vienna"], date(5));
        assert_eq!(rebuilt.derived(), &derive(rebuilt.route()));
        assert_eq!(rebuilt.visits(), derive_visits(rebuilt.route()).as_slice());
    }

    #[test]
    fn test_rebuild_hands_freed_days_to_neighbours() {
        let plan = PlannedRoute::new(route());
        let rebuilt = rebuild_route_from_visits(&plan, 1, Visit::new("Vienna", date(4), date(5)))
            .expect("valid rebuild");

        assert_eq!(
            rebuilt.visits(),
            [
                Visit::new("Prague", date(1), date(4)),
                Visit::new("Vienna", date(4), date(5)),
                Visit::new("Munich", date(5), date(9)),
            ]
        );
        assert_eq!(rebuilt.derived().arrival_dates()["Munich"], date(5));
        assert_eq!(rebuilt.derived().inbound_slack_days(), 4);
        assert_eq!(rebuilt.derived(), &derive(rebuilt.route()));
    }

    #[test]
    fn test_rebuild_ignores_out_of_range_modified_index() {
        let plan = PlannedRoute::new(route());
        let rebuilt = rebuild_route_from_all_visits(&plan, plan.visits(), &BTreeSet::from([9]))
            .expect("unknown index moves nothing");
        assert_eq!(rebuilt.route().ground_route(), plan.route().ground_route());
    }

    #[test]
    fn test_deserialize_rederives_visits() {
        let plan = PlannedRoute::new(route());
        let mut json = serde_json::to_value(&plan).unwrap();
        json["visits"] = serde_json::json!([]);
        json["derived"]["total_trip_days"] = serde_json::json!(42);

        let restored: PlannedRoute = serde_json::from_value(json).unwrap();

        assert_eq!(restored, plan);
    }

    #[test]
    fn test_rebuild_rejects_overlap() {
        let plan = PlannedRoute::new(route());
        let overlapping = Visit::new("Vienna", date(2), date(6));
        assert!(rebuild_route_from_visits(&plan, 1, overlapping).is_none());
    }

    #[test]
    fn test_rebuild_rejects_city_swap() {
        let plan = PlannedRoute::new(route());
        let elsewhere = Visit::new("Linz", date(3), date(6));
        assert!(rebuild_route_from_visits(&plan, 1, elsewhere).is_none());
        assert!(rebuild_route_from_visits(&plan, 7, Visit::new("Vienna", date(3), date(6))).is_none());
    }
}
