//! Shared trip model: stops, legs, anchors, routes, visits, and hotel constraints.
//!
//! Routes are never mutated in place. Every derived or candidate variant is a
//! new [`StructuralRoute`] with a fresh [`RouteId`] pointing at its parent.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Normalised lookup key for a city name.
///
/// Case and surrounding/inner whitespace are not significant.
pub fn city_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// ISO-3166 alpha-2 country code, stored upper case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    pub fn new(code: &str) -> Self {
        Self(code.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CountryCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for CountryCode {
    fn from(code: String) -> Self {
        Self::new(&code)
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A place the traveler wants to visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stop {
    pub city: String,
    #[serde(default)]
    pub country: Option<CountryCode>,
}

impl Stop {
    pub fn new(city: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            country: None,
        }
    }

    pub fn in_country(city: impl Into<String>, country: &str) -> Self {
        Self {
            city: city.into(),
            country: Some(CountryCode::new(country)),
        }
    }
}

/// Long-haul trips require strictly eligible gateways; short-haul accepts any city.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TripScope {
    LongHaul,
    ShortHaul,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Train,
    Bus,
    Ferry,
    Car,
    #[default]
    Any,
}

/// Base legs form the itinerary backbone; excursions are side trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LegRole {
    #[default]
    Base,
    Excursion,
}

/// One ground-transport segment between two cities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundLeg {
    pub from_city: String,
    pub to_city: String,
    /// Days after the outbound arrival date on which this leg departs.
    pub departure_day_offset: u32,
    #[serde(default)]
    pub mode_hint: TransportMode,
    #[serde(default)]
    pub role: LegRole,
}

impl GroundLeg {
    pub fn base(from_city: impl Into<String>, to_city: impl Into<String>, offset: u32) -> Self {
        Self {
            from_city: from_city.into(),
            to_city: to_city.into(),
            departure_day_offset: offset,
            mode_hint: TransportMode::Any,
            role: LegRole::Base,
        }
    }

    pub fn excursion(from_city: impl Into<String>, to_city: impl Into<String>, offset: u32) -> Self {
        Self {
            role: LegRole::Excursion,
            ..Self::base(from_city, to_city, offset)
        }
    }

    pub fn with_mode(mut self, mode: TransportMode) -> Self {
        self.mode_hint = mode;
        self
    }

    pub fn is_base(&self) -> bool {
        self.role == LegRole::Base
    }
}

/// Fixed flight endpoint: outbound arrival or inbound departure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightAnchor {
    pub city: String,
    pub date: NaiveDate,
}

impl FlightAnchor {
    pub fn new(city: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            city: city.into(),
            date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteId(Uuid);

impl RouteId {
    pub fn mint() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Flights plus ground legs. Immutable; variants get a new id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralRoute {
    id: RouteId,
    parent: Option<RouteId>,
    outbound_flight: FlightAnchor,
    inbound_flight: FlightAnchor,
    ground_route: Vec<GroundLeg>,
}

impl StructuralRoute {
    pub fn new(outbound_flight: FlightAnchor, inbound_flight: FlightAnchor, ground_route: Vec<GroundLeg>) -> Self {
        Self {
            id: RouteId::mint(),
            parent: None,
            outbound_flight,
            inbound_flight,
            ground_route,
        }
    }

    pub fn id(&self) -> RouteId {
        self.id
    }

    /// Route this one was derived from, if any.
    pub fn parent(&self) -> Option<RouteId> {
        self.parent
    }

    pub fn outbound_flight(&self) -> &FlightAnchor {
        &self.outbound_flight
    }

    pub fn inbound_flight(&self) -> &FlightAnchor {
        &self.inbound_flight
    }

    pub fn ground_route(&self) -> &[GroundLeg] {
        &self.ground_route
    }

    pub fn base_legs(&self) -> impl Iterator<Item = &GroundLeg> {
        self.ground_route.iter().filter(|leg| leg.is_base())
    }

    /// Same anchors and legs under a new id.
    pub fn shallow_clone(&self) -> Self {
        Self {
            id: RouteId::mint(),
            parent: Some(self.id),
            ..self.clone()
        }
    }

    /// Same anchors with replacement ground legs, under a new id.
    pub fn with_ground_route(&self, ground_route: Vec<GroundLeg>) -> Self {
        Self {
            id: RouteId::mint(),
            parent: Some(self.id),
            outbound_flight: self.outbound_flight.clone(),
            inbound_flight: self.inbound_flight.clone(),
            ground_route,
        }
    }
}

/// One contiguous stay in a city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub city: String,
    pub arrival: NaiveDate,
    pub departure: NaiveDate,
}

impl Visit {
    pub fn new(city: impl Into<String>, arrival: NaiveDate, departure: NaiveDate) -> Self {
        Self {
            city: city.into(),
            arrival,
            departure,
        }
    }

    pub fn nights(&self) -> i64 {
        (self.departure - self.arrival).num_days()
    }

    pub fn contains(&self, check_in: NaiveDate, check_out: NaiveDate) -> bool {
        check_in >= self.arrival && check_out <= self.departure
    }
}

/// Date fields computed from a route. Only built by [`crate::visits`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Derived {
    pub(crate) arrival_dates: BTreeMap<String, NaiveDate>,
    pub(crate) departure_dates: BTreeMap<String, NaiveDate>,
    pub(crate) total_trip_days: i64,
    pub(crate) inbound_slack_days: i64,
    pub(crate) draft_stay_cities: Vec<String>,
}

impl Derived {
    /// First arrival per city.
    pub fn arrival_dates(&self) -> &BTreeMap<String, NaiveDate> {
        &self.arrival_dates
    }

    /// Last departure per city.
    pub fn departure_dates(&self) -> &BTreeMap<String, NaiveDate> {
        &self.departure_dates
    }

    pub fn total_trip_days(&self) -> i64 {
        self.total_trip_days
    }

    pub fn inbound_slack_days(&self) -> i64 {
        self.inbound_slack_days
    }

    /// Cities with at least one overnight stay, in visiting order.
    pub fn draft_stay_cities(&self) -> &[String] {
        &self.draft_stay_cities
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Flexibility {
    Fixed,
    #[serde(rename = "PLUS_MINUS_1_DAY")]
    PlusMinusOneDay,
    DateRange {
        earliest_check_in: NaiveDate,
        latest_check_out: NaiveDate,
    },
}

/// A desired booking. Constrains the route, never mutates it directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotelConstraint {
    pub hotel_id: String,
    pub city: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: u32,
    pub flexibility: Flexibility,
}

impl HotelConstraint {
    pub fn new(
        hotel_id: impl Into<String>,
        city: impl Into<String>,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Self {
        let nights = (check_out - check_in).num_days().max(0) as u32;
        Self {
            hotel_id: hotel_id.into(),
            city: city.into(),
            check_in,
            check_out,
            nights,
            flexibility: Flexibility::Fixed,
        }
    }

    pub fn with_flexibility(mut self, flexibility: Flexibility) -> Self {
        self.flexibility = flexibility;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImpactKind {
    CityNotInBaseline,
    OutsideStayWindow,
    InvertedDates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Blocking,
}

/// Output-only explanation of a constraint's compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactCard {
    pub kind: ImpactKind,
    pub severity: Severity,
    pub summary: String,
}

impl ImpactCard {
    pub fn blocking(kind: ImpactKind, summary: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Blocking,
            summary: summary.into(),
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}
