//! Trip scope classification from an injected country -> region table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::gazetteer::Gazetteer;
use crate::model::{CountryCode, Stop, TripScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Europe,
    NorthAmerica,
    SouthAmerica,
    MiddleEast,
    SouthAsia,
    SoutheastAsia,
    EastAsia,
    Oceania,
    Africa,
}

const BUILTIN_REGIONS: &[(&str, Region)] = &[
    ("AT", Region::Europe),
    ("BE", Region::Europe),
    ("BG", Region::Europe),
    ("CH", Region::Europe),
    ("CY", Region::Europe),
    ("CZ", Region::Europe),
    ("DE", Region::Europe),
    ("DK", Region::Europe),
    ("EE", Region::Europe),
    ("ES", Region::Europe),
    ("FI", Region::Europe),
    ("FR", Region::Europe),
    ("GB", Region::Europe),
    ("GR", Region::Europe),
    ("HR", Region::Europe),
    ("HU", Region::Europe),
    ("IE", Region::Europe),
    ("IS", Region::Europe),
    ("IT", Region::Europe),
    ("LI", Region::Europe),
    ("LT", Region::Europe),
    ("LU", Region::Europe),
    ("LV", Region::Europe),
    ("MT", Region::Europe),
    ("NL", Region::Europe),
    ("NO", Region::Europe),
    ("PL", Region::Europe),
    ("PT", Region::Europe),
    ("RO", Region::Europe),
    ("SE", Region::Europe),
    ("SI", Region::Europe),
    ("SK", Region::Europe),
    ("TR", Region::Europe),
    ("US", Region::NorthAmerica),
    ("CA", Region::NorthAmerica),
    ("MX", Region::NorthAmerica),
    ("BR", Region::SouthAmerica),
    ("AR", Region::SouthAmerica),
    ("AE", Region::MiddleEast),
    ("QA", Region::MiddleEast),
    ("IN", Region::SouthAsia),
    ("LK", Region::SouthAsia),
    ("NP", Region::SouthAsia),
    ("SG", Region::SoutheastAsia),
    ("TH", Region::SoutheastAsia),
    ("VN", Region::SoutheastAsia),
    ("JP", Region::EastAsia),
    ("CN", Region::EastAsia),
    ("KR", Region::EastAsia),
    ("AU", Region::Oceania),
    ("NZ", Region::Oceania),
    ("ZA", Region::Africa),
    ("MA", Region::Africa),
    ("EG", Region::Africa),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionTable {
    regions: HashMap<CountryCode, Region>,
}

impl Default for RegionTable {
    fn default() -> Self {
        Self {
            regions: BUILTIN_REGIONS
                .iter()
                .map(|&(code, region)| (CountryCode::new(code), region))
                .collect(),
        }
    }
}

impl RegionTable {
    /// Empty table; every country is unclassified.
    pub fn new() -> Self {
        Self {
            regions: HashMap::new(),
        }
    }

    pub fn with(mut self, country: &str, region: Region) -> Self {
        self.regions.insert(CountryCode::new(country), region);
        self
    }

    pub fn region_of(&self, country: &CountryCode) -> Option<Region> {
        self.regions.get(country).copied()
    }
}

/// Country of a city looked up by name alone.
///
/// Only used when a stop carries no country code.
#[deprecated(note = "stops should carry a country code")]
pub fn country_from_city_name(gazetteer: &Gazetteer, city: &str) -> Option<CountryCode> {
    gazetteer.country_of(city).cloned()
}

fn region_of_stop(stop: &Stop, table: &RegionTable, gazetteer: &Gazetteer) -> Option<Region> {
    let country = match &stop.country {
        Some(country) => country.clone(),
        None => {
            warn!(city = %stop.city, "stop has no country code; falling back to name lookup");
            #[allow(deprecated)]
            let country = country_from_city_name(gazetteer, &stop.city)?;
            country
        }
    };
    table.region_of(&country)
}

/// `LongHaul` when any stop lies outside the origin's region.
///
/// A place that cannot be placed in a region makes the trip `LongHaul`.
pub fn classify_scope(origin: &Stop, stops: &[Stop], table: &RegionTable, gazetteer: &Gazetteer) -> TripScope {
    if stops.is_empty() {
        return TripScope::ShortHaul;
    }
    let Some(home) = region_of_stop(origin, table, gazetteer) else {
        debug!(origin = %origin.city, "origin region unknown");
        return TripScope::LongHaul;
    };

    for stop in stops {
        match region_of_stop(stop, table, gazetteer) {
            Some(region) if region == home => {}
            region => {
                debug!(city = %stop.city, ?region, ?home, "stop outside home region");
                return TripScope::LongHaul;
            }
        }
    }
    TripScope::ShortHaul
}
