//! A Central-European itinerary plus option builders.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;

use trip_route_engine::gate::{
    AvailabilityStatus, Confidence, Dimension, DimensionValue, OptionFlag, OptionKind, ScoredOption,
};
use trip_route_engine::gazetteer::Gazetteer;
use trip_route_engine::model::{
    CountryCode, Flexibility, FlightAnchor, GroundLeg, HotelConstraint, Stop, StructuralRoute,
};
use trip_route_engine::oracle::OracleError;

pub fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, month, day).expect("valid fixture date")
}

pub fn codes(list: &[&str]) -> BTreeSet<CountryCode> {
    list.iter().map(|code| CountryCode::new(code)).collect()
}

// ============================================================================
// Itinerary
// ============================================================================

pub const BASE_CITIES: &[&str] = &["Prague", "Vienna", "Munich"];

pub fn base_cities() -> BTreeSet<String> {
    BASE_CITIES.iter().map(|city| city.to_string()).collect()
}

pub fn classic_legs() -> Vec<GroundLeg> {
    vec![
        GroundLeg::base("Prague", "Vienna", 2),
        GroundLeg::base("Vienna", "Munich", 5),
    ]
}

/// Land in Prague on June 1st, fly home from Munich on June 9th.
///
/// Visits: Prague 1-3, Vienna 3-6, Munich 6-9.
pub fn classic_route() -> StructuralRoute {
    StructuralRoute::new(
        FlightAnchor::new("Prague", date(6, 1)),
        FlightAnchor::new("Munich", date(6, 9)),
        classic_legs(),
    )
}

pub fn classic_stops() -> Vec<Stop> {
    vec![
        Stop::in_country("Prague", "CZ"),
        Stop::in_country("Vienna", "AT"),
        Stop::in_country("Munich", "DE"),
    ]
}

// ============================================================================
// Alpine gazetteer
// ============================================================================

/// Made-up places at known distances from Alpdorf (47.0, 13.0):
/// Nullort ~13 km (no country), Kleinfeld ~27 km (no airport),
/// Grenzburg ~33 km (DE), Talstadt ~38 km (AT), Fernheim ~111 km (AT).
const ALPINE_GAZETTEER: &str = r#"{
  "visa_zones": [{"zone": "schengen", "countries": ["AT", "DE", "CZ"]}],
  "cities": [
    {"name": "Alpdorf", "country": "AT", "lat": 47.0, "lon": 13.0},
    {"name": "Nullort", "lat": 47.1, "lon": 13.1,
     "airport": {"iata": "NUL", "lat": 47.1, "lon": 13.1}},
    {"name": "Kleinfeld", "country": "AT", "lat": 47.2, "lon": 13.2},
    {"name": "Grenzburg", "country": "DE", "lat": 47.3, "lon": 13.0,
     "airport": {"iata": "GRB", "lat": 47.3, "lon": 13.0}},
    {"name": "Talstadt", "country": "AT", "lat": 47.0, "lon": 13.5,
     "airport": {"iata": "TLS", "lat": 47.0, "lon": 13.5}},
    {"name": "Fernheim", "country": "AT", "lat": 48.0, "lon": 13.0, "capital": true,
     "airport": {"iata": "FRH", "lat": 48.0, "lon": 13.0}}
  ]
}"#;

pub fn alpine_gazetteer() -> Gazetteer {
    Gazetteer::from_json(ALPINE_GAZETTEER).expect("alpine fixture parses")
}

// ============================================================================
// Oracles
// ============================================================================

/// Fake gateway oracle that always answers `answer` and counts calls.
pub fn counting_oracle<'a>(
    calls: &'a AtomicUsize,
    answer: &'a [&'a str],
) -> impl Fn(&str) -> Result<Vec<String>, OracleError> + 'a {
    move |_prompt: &str| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(answer.iter().map(|city| city.to_string()).collect())
    }
}

pub fn failing_oracle(error: fn() -> OracleError) -> impl Fn(&str) -> Result<Vec<String>, OracleError> {
    move |_prompt: &str| Err(error())
}

// ============================================================================
// Hotel constraint builder
// ============================================================================

#[derive(Clone, Debug)]
pub struct TestHotel {
    id: String,
    city: String,
    check_in: NaiveDate,
    check_out: NaiveDate,
    flexibility: Flexibility,
}

impl TestHotel {
    pub fn new(id: &str, city: &str) -> Self {
        Self {
            id: id.to_string(),
            city: city.to_string(),
            check_in: date(6, 1),
            check_out: date(6, 2),
            flexibility: Flexibility::Fixed,
        }
    }

    pub fn stay(mut self, check_in: NaiveDate, check_out: NaiveDate) -> Self {
        self.check_in = check_in;
        self.check_out = check_out;
        self
    }

    pub fn flexible(mut self, flexibility: Flexibility) -> Self {
        self.flexibility = flexibility;
        self
    }

    pub fn build(self) -> HotelConstraint {
        HotelConstraint::new(self.id, self.city, self.check_in, self.check_out)
            .with_flexibility(self.flexibility)
    }
}

// ============================================================================
// Option builders
// ============================================================================

#[derive(Clone, Debug)]
pub struct TestFlight {
    option: ScoredOption,
}

impl TestFlight {
    pub fn new(id: &str) -> Self {
        Self {
            option: ScoredOption::new(id, OptionKind::Flight),
        }
    }

    pub fn price(mut self, price: f64) -> Self {
        self.option = self.option.with(Dimension::Price, DimensionValue::Quantity(price));
        self
    }

    pub fn duration(mut self, minutes: f64) -> Self {
        self.option = self.option.with(Dimension::Duration, DimensionValue::Quantity(minutes));
        self
    }

    pub fn stops(mut self, stops: u32) -> Self {
        self.option = self.option.with(Dimension::Stops, DimensionValue::Quantity(f64::from(stops)));
        self
    }

    pub fn comfort(mut self, score: f64) -> Self {
        self.option = self.option.with(Dimension::Comfort, DimensionValue::Score(score));
        self
    }

    pub fn flag(mut self, flag: OptionFlag) -> Self {
        self.option = self.option.flagged(flag);
        self
    }

    pub fn build(self) -> ScoredOption {
        self.option
    }
}

#[derive(Clone, Debug)]
pub struct TestHotelOption {
    option: ScoredOption,
}

impl TestHotelOption {
    pub fn new(id: &str) -> Self {
        Self {
            option: ScoredOption::new(id, OptionKind::Hotel)
                .with(
                    Dimension::Availability,
                    DimensionValue::Availability(AvailabilityStatus::Available, Confidence::High),
                )
                .with(Dimension::RoomType, DimensionValue::labels(["double", "twin"])),
        }
    }

    pub fn price(mut self, price: f64) -> Self {
        self.option = self.option.with(Dimension::Price, DimensionValue::Quantity(price));
        self
    }

    pub fn availability(mut self, status: AvailabilityStatus, confidence: Confidence) -> Self {
        self.option = self
            .option
            .with(Dimension::Availability, DimensionValue::Availability(status, confidence));
        self
    }

    pub fn room_types(mut self, rooms: &[&str]) -> Self {
        self.option = self
            .option
            .with(Dimension::RoomType, DimensionValue::labels(rooms.iter().copied()));
        self
    }

    pub fn fit(mut self, score: f64) -> Self {
        self.option = self.option.with(Dimension::Fit, DimensionValue::Score(score));
        self
    }

    pub fn flag(mut self, flag: OptionFlag) -> Self {
        self.option = self.option.flagged(flag);
        self
    }

    pub fn build(self) -> ScoredOption {
        self.option
    }
}
