//! Meaningful-difference gate.
//!
//! Decides, from a set of scored options, whether the options differ enough
//! to justify asking the traveler to choose. The same policy applies to
//! flights and hotels.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::traits::GuidanceOracle;

/// Minimum number of differing dimensions before a choice is surfaced.
pub const ASK_USER_THRESHOLD: usize = 2;

/// Maximum number of priority options offered at once.
pub const MAX_PRIORITY_OPTIONS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionId(String);

impl OptionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    Flight,
    Hotel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Price,
    Duration,
    Stops,
    Reliability,
    Availability,
    RoomType,
    Fit,
    Comfort,
}

impl Dimension {
    pub const ALL: [Dimension; 8] = [
        Dimension::Price,
        Dimension::Duration,
        Dimension::Stops,
        Dimension::Reliability,
        Dimension::Availability,
        Dimension::RoomType,
        Dimension::Fit,
        Dimension::Comfort,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Price => "price",
            Dimension::Duration => "duration",
            Dimension::Stops => "stops",
            Dimension::Reliability => "reliability",
            Dimension::Availability => "availability",
            Dimension::RoomType => "room_type",
            Dimension::Fit => "fit",
            Dimension::Comfort => "comfort",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase().replace([' ', '-'], "_");
        match name.as_str() {
            "time" => Some(Dimension::Duration),
            "room_types" | "rooms" => Some(Dimension::RoomType),
            other => Self::ALL.into_iter().find(|dimension| dimension.as_str() == other),
        }
    }
}

/// Availability status as reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    Available,
    Limited,
    OnRequest,
    SoldOut,
}

/// Provider confidence in its availability status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionValue {
    /// Money, minutes or counts.
    Quantity(f64),
    /// Normalised score in `0.0..=1.0`, higher is better.
    Score(f64),
    /// Availability status paired with provider confidence.
    Availability(AvailabilityStatus, Confidence),
    /// Label set such as room types.
    Labels(BTreeSet<String>),
}

impl DimensionValue {
    pub fn labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DimensionValue::Labels(labels.into_iter().map(Into::into).collect())
    }

    /// Numeric view used for ranking. Label sets rank by size.
    pub fn magnitude(&self) -> f64 {
        match self {
            DimensionValue::Quantity(value) | DimensionValue::Score(value) => *value,
            DimensionValue::Availability(status, confidence) => {
                (*status as u8 * 3 + *confidence as u8) as f64
            }
            DimensionValue::Labels(labels) => labels.len() as f64,
        }
    }
}

/// Attribute markers consumed by the priority resolver's rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionFlag {
    RedEye,
    OvernightLayover,
    SelfTransfer,
    Refundable,
    CentralLocation,
}

/// A rankable flight or hotel candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredOption {
    pub id: OptionId,
    pub kind: OptionKind,
    #[serde(default)]
    pub dimensions: BTreeMap<Dimension, DimensionValue>,
    #[serde(default)]
    pub flags: BTreeSet<OptionFlag>,
}

impl ScoredOption {
    pub fn new(id: impl Into<String>, kind: OptionKind) -> Self {
        Self {
            id: OptionId::new(id),
            kind,
            dimensions: BTreeMap::new(),
            flags: BTreeSet::new(),
        }
    }

    pub fn with(mut self, dimension: Dimension, value: DimensionValue) -> Self {
        self.dimensions.insert(dimension, value);
        self
    }

    pub fn flagged(mut self, flag: OptionFlag) -> Self {
        self.flags.insert(flag);
        self
    }

    pub fn value(&self, dimension: Dimension) -> Option<&DimensionValue> {
        self.dimensions.get(&dimension)
    }

    pub fn has_flag(&self, flag: OptionFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(
            self.value(Dimension::Availability),
            Some(DimensionValue::Availability(AvailabilityStatus::SoldOut, _))
        )
    }
}

/// Noise thresholds below which numeric spreads are not meaningful.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DifferenceThresholds {
    /// Relative price spread, as a fraction of the cheapest option.
    pub price_relative: f64,
    /// Absolute price spread in the option currency.
    pub price_absolute: f64,
    pub duration_minutes: f64,
    pub stops: f64,
    /// Spread on `0.0..=1.0` scores.
    pub score: f64,
}

impl Default for DifferenceThresholds {
    fn default() -> Self {
        Self {
            price_relative: 0.10,
            price_absolute: 15.0,
            duration_minutes: 60.0,
            stops: 0.0,
            score: 0.15,
        }
    }
}

impl DifferenceThresholds {
    fn noise(&self, dimension: Dimension, smallest: f64) -> f64 {
        match dimension {
            Dimension::Price => self.price_absolute.max(self.price_relative * smallest.abs()),
            Dimension::Duration => self.duration_minutes,
            Dimension::Stops => self.stops,
            _ => self.score,
        }
    }
}

/// Per-dimension "do the options meaningfully differ" map.
pub fn differs(
    options: &[ScoredOption],
    dimensions: &[Dimension],
    thresholds: &DifferenceThresholds,
) -> BTreeMap<Dimension, bool> {
    dimensions
        .iter()
        .map(|&dimension| (dimension, dimension_differs(options, dimension, thresholds)))
        .collect()
}

fn dimension_differs(
    options: &[ScoredOption],
    dimension: Dimension,
    thresholds: &DifferenceThresholds,
) -> bool {
    let values: Vec<&DimensionValue> = options
        .iter()
        .filter_map(|option| option.value(dimension))
        .collect();
    let Some((first, rest)) = values.split_first() else {
        return false;
    };

    match first {
        DimensionValue::Quantity(_) | DimensionValue::Score(_) => {
            let mut numbers = Vec::with_capacity(values.len());
            for value in &values {
                match value {
                    DimensionValue::Quantity(n) | DimensionValue::Score(n) => numbers.push(*n),
                    // Mixed representations are a qualitative difference.
                    _ => return true,
                }
            }
            let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
            let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            max - min > thresholds.noise(dimension, min)
        }
        // Status and confidence buckets, and label sets, differ on any change.
        DimensionValue::Availability(..) | DimensionValue::Labels(_) => {
            rest.iter().any(|value| value != first)
        }
    }
}

pub fn differing_dimensions(differences: &BTreeMap<Dimension, bool>) -> Vec<Dimension> {
    differences
        .iter()
        .filter(|(_, differs)| **differs)
        .map(|(dimension, _)| *dimension)
        .collect()
}

/// True iff at least [`ASK_USER_THRESHOLD`] dimensions differ.
pub fn should_ask_user(differences: &BTreeMap<Dimension, bool>) -> bool {
    differing_dimensions(differences).len() >= ASK_USER_THRESHOLD
}

/// What the guidance collaborator may produce for a given difference map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GuidancePolicy {
    /// Nothing meaningful to ask; do not consult guidance at all.
    Silent,
    /// Short explanation only, no selectable priorities.
    ExplainOnly,
    /// Up to `max` mutually exclusive priorities.
    OfferChoices { max: usize },
}

impl GuidancePolicy {
    pub fn for_differences(differences: &BTreeMap<Dimension, bool>) -> Self {
        match differing_dimensions(differences).len() {
            0 => GuidancePolicy::Silent,
            1 => GuidancePolicy::ExplainOnly,
            _ => GuidancePolicy::OfferChoices {
                max: MAX_PRIORITY_OPTIONS,
            },
        }
    }

    pub fn max_priorities(self) -> usize {
        match self {
            GuidancePolicy::OfferChoices { max } => max,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityOption {
    pub dimension: Dimension,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guidance {
    pub explanation: Option<String>,
    pub priorities: Vec<PriorityOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuidanceRequest {
    pub kind: OptionKind,
    pub option_count: usize,
    pub differing: Vec<Dimension>,
    pub max_priorities: usize,
}

/// Ask the guidance collaborator, then hold its answer to the policy.
///
/// Returns `None` when the policy is [`GuidancePolicy::Silent`]; the oracle is
/// not called in that case. Oracle failures degrade to empty guidance.
pub fn consult_guidance<G: GuidanceOracle>(
    kind: OptionKind,
    options: &[ScoredOption],
    differences: &BTreeMap<Dimension, bool>,
    oracle: &G,
) -> Option<Guidance> {
    let policy = GuidancePolicy::for_differences(differences);
    if policy == GuidancePolicy::Silent {
        debug!(?kind, "options are interchangeable, skipping guidance");
        return None;
    }

    let differing = differing_dimensions(differences);
    let request = GuidanceRequest {
        kind,
        option_count: options.len(),
        differing: differing.clone(),
        max_priorities: policy.max_priorities(),
    };

    let proposed = match oracle.guidance(&request) {
        Ok(guidance) => guidance,
        Err(err) => {
            warn!(error = %err, ?kind, "guidance oracle failed");
            Guidance::default()
        }
    };

    Some(enforce_policy(policy, &differing, proposed))
}

/// Trim proposed guidance to what the policy allows.
pub fn enforce_policy(policy: GuidancePolicy, differing: &[Dimension], proposed: Guidance) -> Guidance {
    let mut seen = BTreeSet::new();
    let mut priorities: Vec<PriorityOption> = proposed
        .priorities
        .into_iter()
        .filter(|priority| differing.contains(&priority.dimension))
        .filter(|priority| seen.insert(priority.dimension))
        .take(policy.max_priorities())
        .collect();

    // One selectable option is not a choice.
    if priorities.len() < 2 {
        priorities.clear();
    }

    Guidance {
        explanation: proposed.explanation,
        priorities,
    }
}
