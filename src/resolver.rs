//! Gateway airport resolution.
//!
//! Sources are tried in order: cache, static hub table, oracle. Every
//! candidate from every source passes the same legality and airport checks,
//! and a failed resolution is `None`, never the original city.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::gazetteer::{Gazetteer, VisaZone, AIRPORT_PROXIMITY_KM};
use crate::haversine::great_circle_km;
use crate::model::{city_key, CountryCode, Stop, TripScope};
use crate::oracle::{gateway_prompt, sanitize_candidates, MAX_GATEWAY_CANDIDATES};
use crate::traits::{GatewayCache, GatewayOracle};

/// Oracle candidates farther than this multiple of the closest one are dropped.
pub const DISTANCE_RATIO_LIMIT: f64 = 1.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverOptions {
    pub airport_proximity_km: f64,
    pub distance_ratio_limit: f64,
    pub max_oracle_candidates: usize,
    /// Gateways accepted for long-haul trips besides capitals and tier-1 hubs.
    pub long_haul_whitelist: BTreeSet<String>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            airport_proximity_km: AIRPORT_PROXIMITY_KM,
            distance_ratio_limit: DISTANCE_RATIO_LIMIT,
            max_oracle_candidates: MAX_GATEWAY_CANDIDATES,
            long_haul_whitelist: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateSource {
    Cache,
    HubTable,
    Oracle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayCandidate {
    pub city: String,
    pub source: CandidateSource,
}

/// Gateways for the two ends of a trip plus the traveler's home airport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripGateways {
    pub origin: Option<String>,
    pub entry: Option<String>,
    pub exit: Option<String>,
}

/// Process-local gateway cache.
#[derive(Debug, Default)]
pub struct InMemoryGatewayCache {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryGatewayCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl GatewayCache for InMemoryGatewayCache {
    fn get(&self, city_key: &str) -> Option<String> {
        self.entries.read().ok()?.get(city_key).cloned()
    }

    fn put(&self, city_key: &str, gateway: &str) {
        match self.entries.write() {
            Ok(mut entries) => {
                entries.insert(city_key.to_string(), gateway.to_string());
            }
            Err(_) => warn!(city = city_key, "gateway cache lock poisoned; entry dropped"),
        }
    }
}

/// Countries a stop's gateway may legally be in.
///
/// A Schengen stop may use any Schengen gateway; other stops only their own
/// country. A stop whose country is unknown gets the empty set, which the
/// resolver treats as unconstrained.
pub fn allowed_gateway_countries(stop: &Stop, gazetteer: &Gazetteer) -> BTreeSet<CountryCode> {
    let country = stop
        .country
        .clone()
        .or_else(|| gazetteer.country_of(&stop.city).cloned());
    let Some(country) = country else {
        return BTreeSet::new();
    };
    match gazetteer.visa_zone(&country) {
        Some(zone @ VisaZone::Schengen) => gazetteer.zone_members(zone).cloned().collect(),
        None => BTreeSet::from([country]),
    }
}

/// Unknown country, or no constraint, always passes.
pub fn is_legal(country: Option<&CountryCode>, allowed: &BTreeSet<CountryCode>) -> bool {
    match country {
        Some(country) if !allowed.is_empty() => allowed.contains(country),
        _ => true,
    }
}

/// Keep candidates within `ratio` times the closest candidate's distance.
///
/// Input is `(city, distance_km)`; output is sorted nearest first.
pub fn distance_filter(mut candidates: Vec<(String, f64)>, ratio: f64) -> Vec<(String, f64)> {
    candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
    let Some(&(_, closest)) = candidates.first() else {
        return candidates;
    };
    let limit = closest * ratio;
    candidates.retain(|(_, distance)| *distance <= limit);
    candidates
}

pub struct GatewayResolver<'g, O, C = InMemoryGatewayCache> {
    gazetteer: &'g Gazetteer,
    oracle: O,
    cache: C,
    options: ResolverOptions,
}

impl<'g, O> GatewayResolver<'g, O, InMemoryGatewayCache>
where
    O: GatewayOracle,
{
    /// Resolver with its own empty in-memory cache.
    pub fn new(gazetteer: &'g Gazetteer, oracle: O) -> Self {
        Self::with_cache(gazetteer, oracle, InMemoryGatewayCache::new())
    }
}

impl<'g, O, C> GatewayResolver<'g, O, C>
where
    O: GatewayOracle,
    C: GatewayCache,
{
    pub fn with_cache(gazetteer: &'g Gazetteer, oracle: O, cache: C) -> Self {
        Self {
            gazetteer,
            oracle,
            cache,
            options: ResolverOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn gazetteer(&self) -> &'g Gazetteer {
        self.gazetteer
    }

    /// Gateway city for `city`, or `None` when no source yields one.
    pub fn resolve(&self, city: &str, allowed: &BTreeSet<CountryCode>) -> Option<String> {
        self.resolve_candidate(city, allowed).map(|candidate| candidate.city)
    }

    /// As [`Self::resolve`], also reporting which source produced the gateway.
    pub fn resolve_candidate(&self, city: &str, allowed: &BTreeSet<CountryCode>) -> Option<GatewayCandidate> {
        let key = city_key(city);

        if let Some(cached) = self.cache.get(&key) {
            if let Some(gateway) = self.accept(&cached, allowed) {
                debug!(city = %city, gateway = %gateway, "gateway from cache");
                return Some(GatewayCandidate {
                    city: gateway,
                    source: CandidateSource::Cache,
                });
            }
            debug!(city = %city, cached = %cached, "cached gateway no longer valid");
        }

        if let Some(hub) = self.gazetteer.hub_for(city) {
            if let Some(gateway) = self.accept(hub, allowed) {
                debug!(city = %city, gateway = %gateway, "gateway from hub table");
                self.cache.put(&key, &gateway);
                return Some(GatewayCandidate {
                    city: gateway,
                    source: CandidateSource::HubTable,
                });
            }
        }

        let gateway = self.discover(city, allowed)?;
        debug!(city = %city, gateway = %gateway, "gateway from oracle");
        self.cache.put(&key, &gateway);
        Some(GatewayCandidate {
            city: gateway,
            source: CandidateSource::Oracle,
        })
    }

    /// Canonical gateway name if `candidate` is legal and has an airport.
    fn accept(&self, candidate: &str, allowed: &BTreeSet<CountryCode>) -> Option<String> {
        let entry = self.gazetteer.city(candidate)?;
        if !is_legal(entry.country.as_ref(), allowed) {
            return None;
        }
        self.gazetteer
            .airport_within(&entry.name, self.options.airport_proximity_km)?;
        Some(entry.name.clone())
    }

    fn discover(&self, city: &str, allowed: &BTreeSet<CountryCode>) -> Option<String> {
        let max = self.options.max_oracle_candidates;
        let prompt = gateway_prompt(city, allowed, max);
        let suggested = match self.oracle.suggest(&prompt) {
            Ok(suggested) => suggested,
            Err(err) => {
                warn!(city = %city, error = %err, "gateway oracle failed");
                Vec::new()
            }
        };
        let candidates = sanitize_candidates(suggested, max);
        if candidates.is_empty() {
            debug!(city = %city, "no oracle candidates");
            return None;
        }

        let ordered: Vec<String> = match self.gazetteer.coordinates(city) {
            Some(source) => {
                let measured = candidates
                    .into_iter()
                    .filter_map(|candidate| {
                        let target = self.gazetteer.coordinates(&candidate)?;
                        Some((candidate, great_circle_km(source, target)))
                    })
                    .collect();
                distance_filter(measured, self.options.distance_ratio_limit)
                    .into_iter()
                    .map(|(candidate, _)| candidate)
                    .collect()
            }
            // Nothing to measure from.
            None => candidates,
        };

        ordered
            .iter()
            .find_map(|candidate| self.accept(candidate, allowed))
    }

    pub fn is_long_haul_eligible(&self, gateway: &str) -> bool {
        let key = city_key(gateway);
        self.gazetteer.is_capital(gateway)
            || self.gazetteer.is_tier1_hub(gateway)
            || self
                .options
                .long_haul_whitelist
                .iter()
                .any(|city| city_key(city) == key)
    }

    /// Resolve, then for long-haul trips swap an ineligible gateway for its hub.
    pub fn resolve_for_scope(
        &self,
        city: &str,
        allowed: &BTreeSet<CountryCode>,
        scope: TripScope,
    ) -> Option<String> {
        let gateway = self.resolve(city, allowed)?;
        if scope == TripScope::ShortHaul || self.is_long_haul_eligible(&gateway) {
            return Some(gateway);
        }

        let replacement = [gateway.as_str(), city]
            .into_iter()
            .filter_map(|name| self.gazetteer.hub_for(name))
            .filter_map(|hub| self.accept(hub, allowed))
            .find(|hub| self.is_long_haul_eligible(hub));
        if replacement.is_none() {
            debug!(city = %city, gateway = %gateway, "no long-haul eligible gateway");
        }
        replacement
    }

    /// Resolve a stop with the visa-zone legality rule applied.
    pub fn resolve_stop(&self, stop: &Stop, scope: TripScope) -> Option<String> {
        let allowed = allowed_gateway_countries(stop, self.gazetteer);
        self.resolve_for_scope(&stop.city, &allowed, scope)
    }

    /// Entry gateway for the first stop, exit gateway for the last, and the
    /// origin's own gateway with no legal constraint.
    pub fn resolve_trip_gateways(&self, origin: &str, stops: &[Stop], scope: TripScope) -> TripGateways {
        TripGateways {
            origin: self.resolve_for_scope(origin, &BTreeSet::new(), scope),
            entry: stops.first().and_then(|stop| self.resolve_stop(stop, scope)),
            exit: stops.last().and_then(|stop| self.resolve_stop(stop, scope)),
        }
    }
}

impl<O, C> GatewayResolver<'_, O, C>
where
    O: GatewayOracle + Sync,
    C: GatewayCache + Sync,
{
    /// Resolve several stops in parallel against the shared cache.
    pub fn resolve_many(&self, stops: &[Stop]) -> Vec<(String, Option<String>)> {
        stops
            .par_iter()
            .map(|stop| {
                let allowed = allowed_gateway_countries(stop, self.gazetteer);
                (stop.city.clone(), self.resolve(&stop.city, &allowed))
            })
            .collect()
    }
}
