//! trip-route-engine core
//!
//! Deterministic route and constraint resolution for multi-city trips:
//! gateway airports, ground-route validation, per-city visit windows, hotel
//! impact checks, and a gate that decides when options differ enough to ask.

pub mod traits;
pub mod model;
pub mod haversine;
pub mod gazetteer;
pub mod oracle;
pub mod resolver;
pub mod scope;
pub mod validator;
pub mod visits;
pub mod hotel;
pub mod gate;
pub mod priority;
