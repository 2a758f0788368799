//! City/airport gazetteer: coordinates, airport codes, capital and hub
//! classification, the static hub table, and visa-zone membership.
//!
//! The built-in table is an embedded JSON document parsed once per process.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::haversine::great_circle_km;
use crate::model::{city_key, CountryCode};

/// Maximum distance between a city centre and an airport serving it.
pub const AIRPORT_PROXIMITY_KM: f64 = 100.0;

static BUILTIN: OnceLock<Gazetteer> = OnceLock::new();

#[derive(Debug, Error)]
pub enum GazetteerError {
    #[error("gazetteer document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("city {0:?} is listed more than once")]
    DuplicateCity(String),
    #[error("city {city:?} maps to unknown hub {hub:?}")]
    UnknownHub { city: String, hub: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub iata: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityEntry {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub country: Option<CountryCode>,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub capital: bool,
    #[serde(default)]
    pub tier1_hub: bool,
    #[serde(default)]
    pub airport: Option<Airport>,
    /// Primary hub of the same country serving this city.
    #[serde(default)]
    pub hub: Option<String>,
}

impl CityEntry {
    pub fn coordinates(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisaZone {
    Schengen,
}

#[derive(Debug, Deserialize)]
struct ZoneMembership {
    zone: VisaZone,
    countries: Vec<CountryCode>,
}

#[derive(Debug, Deserialize)]
struct GazetteerDocument {
    #[serde(default)]
    visa_zones: Vec<ZoneMembership>,
    cities: Vec<CityEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    cities: Vec<CityEntry>,
    index: HashMap<String, usize>,
    zones: HashMap<CountryCode, VisaZone>,
}

impl Gazetteer {
    /// Process-wide built-in table.
    pub fn builtin() -> &'static Gazetteer {
        BUILTIN.get_or_init(|| {
            Self::from_json(include_str!("data/gazetteer.json"))
                .expect("embedded gazetteer document is valid")
        })
    }

    pub fn from_json(document: &str) -> Result<Self, GazetteerError> {
        let document: GazetteerDocument = serde_json::from_str(document)?;
        let zones = document
            .visa_zones
            .into_iter()
            .flat_map(|membership| {
                let zone = membership.zone;
                membership.countries.into_iter().map(move |code| (code, zone))
            })
            .collect();
        Self::from_entries(document.cities, zones)
    }

    pub fn from_entries(
        cities: Vec<CityEntry>,
        zones: HashMap<CountryCode, VisaZone>,
    ) -> Result<Self, GazetteerError> {
        let mut index = HashMap::new();
        for (i, entry) in cities.iter().enumerate() {
            if index.insert(city_key(&entry.name), i).is_some() {
                return Err(GazetteerError::DuplicateCity(entry.name.clone()));
            }
        }
        // Aliases never shadow a primary name.
        for (i, entry) in cities.iter().enumerate() {
            for alias in &entry.aliases {
                index.entry(city_key(alias)).or_insert(i);
            }
        }
        for entry in &cities {
            if let Some(hub) = &entry.hub {
                if !index.contains_key(&city_key(hub)) {
                    return Err(GazetteerError::UnknownHub {
                        city: entry.name.clone(),
                        hub: hub.clone(),
                    });
                }
            }
        }

        Ok(Self {
            cities,
            index,
            zones,
        })
    }

    pub fn city(&self, name: &str) -> Option<&CityEntry> {
        self.index.get(&city_key(name)).map(|&i| &self.cities[i])
    }

    pub fn cities(&self) -> &[CityEntry] {
        &self.cities
    }

    /// Canonical name for a city or one of its aliases.
    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        self.city(name).map(|entry| entry.name.as_str())
    }

    pub fn coordinates(&self, name: &str) -> Option<(f64, f64)> {
        self.city(name).map(CityEntry::coordinates)
    }

    pub fn country_of(&self, name: &str) -> Option<&CountryCode> {
        self.city(name).and_then(|entry| entry.country.as_ref())
    }

    /// IATA code of an airport within [`AIRPORT_PROXIMITY_KM`] of the city.
    pub fn airport_code(&self, name: &str) -> Option<&str> {
        self.airport_within(name, AIRPORT_PROXIMITY_KM)
    }

    pub fn airport_within(&self, name: &str, radius_km: f64) -> Option<&str> {
        let entry = self.city(name)?;
        let airport = entry.airport.as_ref()?;
        let distance = great_circle_km(entry.coordinates(), (airport.lat, airport.lon));
        (distance <= radius_km).then_some(airport.iata.as_str())
    }

    pub fn is_capital(&self, name: &str) -> bool {
        self.city(name).is_some_and(|entry| entry.capital)
    }

    pub fn is_tier1_hub(&self, name: &str) -> bool {
        self.city(name).is_some_and(|entry| entry.tier1_hub)
    }

    /// Static hub table lookup.
    ///
    /// Regional cities map to their country's primary hub; capitals and
    /// tier-1 hubs with their own airport map to themselves.
    pub fn hub_for(&self, name: &str) -> Option<&str> {
        let entry = self.city(name)?;
        if let Some(hub) = &entry.hub {
            return self.canonical_name(hub);
        }
        if (entry.capital || entry.tier1_hub) && entry.airport.is_some() {
            return Some(entry.name.as_str());
        }
        None
    }

    pub fn visa_zone(&self, country: &CountryCode) -> Option<VisaZone> {
        self.zones.get(country).copied()
    }

    pub fn zone_members(&self, zone: VisaZone) -> impl Iterator<Item = &CountryCode> {
        self.zones
            .iter()
            .filter(move |(_, member_of)| **member_of == zone)
            .map(|(code, _)| code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_loads() {
        let gazetteer = Gazetteer::builtin();
        assert!(!gazetteer.cities().is_empty(), "Gazetteer should not be empty");

        let vienna = gazetteer.city("Vienna").expect("Vienna missing");
        assert_eq!(vienna.country, Some(CountryCode::new("AT")));
        assert!(vienna.capital);
        assert!(gazetteer.city("Atlantis").is_none());
    }

    #[test]
    fn test_alias_lookup() {
        let gazetteer = Gazetteer::builtin();
        assert_eq!(gazetteer.canonical_name("wien"), Some("Vienna"));
        assert_eq!(gazetteer.canonical_name("München"), Some("Munich"));
        assert_eq!(gazetteer.canonical_name("  PRAHA "), Some("Prague"));
    }

    #[test]
    fn test_airport_codes() {
        let gazetteer = Gazetteer::builtin();
        assert_eq!(gazetteer.airport_code("Vienna"), Some("VIE"));
        assert_eq!(gazetteer.airport_code("Hallstatt"), None);
        assert_eq!(gazetteer.airport_within("Vienna", 5.0), None, "VIE is ~18km out");
    }

    #[test]
    fn test_hub_table() {
        let gazetteer = Gazetteer::builtin();
        assert_eq!(gazetteer.hub_for("Salzburg"), Some("Vienna"));
        assert_eq!(gazetteer.hub_for("Cesky Krumlov"), Some("Prague"));
        assert_eq!(gazetteer.hub_for("Vienna"), Some("Vienna"));
        assert_eq!(gazetteer.hub_for("Atlantis"), None);
    }

    #[test]
    fn test_schengen_membership() {
        let gazetteer = Gazetteer::builtin();
        assert_eq!(gazetteer.visa_zone(&CountryCode::new("AT")), Some(VisaZone::Schengen));
        assert_eq!(gazetteer.visa_zone(&CountryCode::new("GB")), None);
        assert!(gazetteer.zone_members(VisaZone::Schengen).count() >= 25);
    }

    #[test]
    fn test_every_hub_has_an_airport() {
        let gazetteer = Gazetteer::builtin();
        for entry in gazetteer.cities() {
            if let Some(hub) = gazetteer.hub_for(&entry.name) {
                assert!(
                    gazetteer.airport_code(hub).is_some(),
                    "hub {} for {} has no airport",
                    hub,
                    entry.name
                );
                assert_eq!(
                    gazetteer.country_of(hub),
                    entry.country.as_ref(),
                    "hub {} for {} is in another country",
                    hub,
                    entry.name
                );
            }
        }
    }

    #[test]
    fn test_rejects_unknown_hub() {
        let result = Gazetteer::from_json(
            r#"{"cities":[{"name":"Nowhere","lat":0.0,"lon":0.0,"hub":"Elsewhere"}]}"#,
        );
        assert!(matches!(result, Err(GazetteerError::UnknownHub { .. })));
    }

    #[test]
    fn test_rejects_duplicate_city() {
        let result = Gazetteer::from_json(
            r#"{"cities":[{"name":"Twin","lat":0.0,"lon":0.0},{"name":"twin","lat":1.0,"lon":1.0}]}"#,
        );
        assert!(matches!(result, Err(GazetteerError::DuplicateCity(_))));
    }
}
