//! Structural validation of a ground itinerary.
//!
//! Only base legs are considered; excursions are side trips. The validator
//! reports, it never repairs.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

use crate::model::{city_key, GroundLeg};

/// Most times any city may appear across base legs (arrive once, leave once).
const MAX_CITY_OCCURRENCES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "kebab-case")]
pub enum Violation {
    MissingUserStop {
        city: String,
    },
    DuplicateUserStop {
        city: String,
        occurrences: usize,
    },
    DuplicateCity {
        city: String,
        occurrences: usize,
    },
    InvalidCity {
        city: String,
        leg_index: usize,
    },
    NonIncreasingOffsets {
        leg_index: usize,
        previous_offset: u32,
        offset: u32,
    },
}

impl Violation {
    pub fn code(&self) -> &'static str {
        match self {
            Violation::MissingUserStop { .. } => "missing-user-stop",
            Violation::DuplicateUserStop { .. } => "duplicate-user-stop",
            Violation::DuplicateCity { .. } => "duplicate-city",
            Violation::InvalidCity { .. } => "invalid-city",
            Violation::NonIncreasingOffsets { .. } => "non-increasing-offsets",
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MissingUserStop { city } => {
                write!(f, "{} is not visited by any leg", city)
            }
            Violation::DuplicateUserStop { city, occurrences } => {
                write!(f, "{} is visited {} times", city, occurrences)
            }
            Violation::DuplicateCity { city, occurrences } => {
                write!(f, "{} appears in {} leg endpoints", city, occurrences)
            }
            Violation::InvalidCity { city, leg_index } => {
                write!(f, "leg {} uses {}, which is not a planned stop", leg_index, city)
            }
            Violation::NonIncreasingOffsets {
                leg_index,
                previous_offset,
                offset,
            } => write!(
                f,
                "leg {} departs on day {} but the previous leg departs on day {}",
                leg_index, offset, previous_offset
            ),
        }
    }
}

#[derive(Debug)]
struct Occurrence<'a> {
    display: &'a str,
    count: usize,
    first_leg: usize,
}

/// Report every structural violation; empty means valid.
pub fn validate(legs: &[GroundLeg], base_cities: &BTreeSet<String>) -> Vec<Violation> {
    let base_legs: Vec<(usize, &GroundLeg)> = legs
        .iter()
        .enumerate()
        .filter(|(_, leg)| leg.is_base())
        .collect();
    if base_legs.is_empty() {
        return Vec::new();
    }

    let base_keys: HashMap<String, &str> = base_cities
        .iter()
        .map(|city| (city_key(city), city.as_str()))
        .collect();

    // Endpoint occurrences in traversal order.
    let mut order: Vec<String> = Vec::new();
    let mut occurrences: HashMap<String, Occurrence<'_>> = HashMap::new();
    for &(index, leg) in &base_legs {
        for city in [&leg.from_city, &leg.to_city] {
            let key = city_key(city);
            let entry = occurrences.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                Occurrence {
                    display: city,
                    count: 0,
                    first_leg: index,
                }
            });
            entry.count += 1;
        }
    }

    let mut violations = Vec::new();

    for city in base_cities {
        if !occurrences.contains_key(&city_key(city)) {
            violations.push(Violation::MissingUserStop { city: city.clone() });
        }
    }

    for key in &order {
        let occurrence = &occurrences[key];
        if occurrence.count <= MAX_CITY_OCCURRENCES {
            continue;
        }
        if let Some(base_name) = base_keys.get(key) {
            violations.push(Violation::DuplicateUserStop {
                city: base_name.to_string(),
                occurrences: occurrence.count,
            });
        }
        violations.push(Violation::DuplicateCity {
            city: occurrence.display.to_string(),
            occurrences: occurrence.count,
        });
    }

    for key in &order {
        if !base_keys.contains_key(key) {
            let occurrence = &occurrences[key];
            violations.push(Violation::InvalidCity {
                city: occurrence.display.to_string(),
                leg_index: occurrence.first_leg,
            });
        }
    }

    for pair in base_legs.windows(2) {
        let (_, previous) = pair[0];
        let (index, leg) = pair[1];
        if leg.departure_day_offset <= previous.departure_day_offset {
            violations.push(Violation::NonIncreasingOffsets {
                leg_index: index,
                previous_offset: previous.departure_day_offset,
                offset: leg.departure_day_offset,
            });
        }
    }

    violations
}
