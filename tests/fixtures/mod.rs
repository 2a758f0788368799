//! Test fixtures for trip-route-engine.
//!
//! Provides realistic test data including:
//! - A Prague / Vienna / Munich itinerary and its stops
//! - A small synthetic alpine gazetteer for oracle edge cases
//! - Builders for hotel constraints and flight/hotel options
#![allow(dead_code)]

pub mod central_europe;

pub use central_europe::*;
