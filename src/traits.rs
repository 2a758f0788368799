//! Collaborator seams for the engine.
//!
//! The engine never constructs its collaborators. Hosts inject an oracle, a
//! cache, and a guidance source; tests inject closures and in-memory stores.

use crate::gate::{Guidance, GuidanceRequest};
use crate::oracle::OracleError;

/// Fallback source of gateway candidate names.
///
/// Output is untrusted: every name must still pass legality, distance and
/// airport checks before it is accepted.
pub trait GatewayOracle {
    fn suggest(&self, prompt: &str) -> Result<Vec<String>, OracleError>;
}

impl<F> GatewayOracle for F
where
    F: Fn(&str) -> Result<Vec<String>, OracleError>,
{
    fn suggest(&self, prompt: &str) -> Result<Vec<String>, OracleError> {
        self(prompt)
    }
}

/// Oracle that never has anything to say.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOracle;

impl GatewayOracle for NoOracle {
    fn suggest(&self, _prompt: &str) -> Result<Vec<String>, OracleError> {
        Ok(Vec::new())
    }
}

/// Store of previously accepted `(source city -> gateway)` pairs.
///
/// Keys are normalised with [`crate::model::city_key`]. Entries are hints
/// only; the resolver re-validates them on every read.
pub trait GatewayCache {
    fn get(&self, city_key: &str) -> Option<String>;
    fn put(&self, city_key: &str, gateway: &str);
}

/// Source of short explanations and priority pills for a choice.
pub trait GuidanceOracle {
    fn guidance(&self, request: &GuidanceRequest) -> Result<Guidance, OracleError>;
}

impl<F> GuidanceOracle for F
where
    F: Fn(&GuidanceRequest) -> Result<Guidance, OracleError>,
{
    fn guidance(&self, request: &GuidanceRequest) -> Result<Guidance, OracleError> {
        self(request)
    }
}
