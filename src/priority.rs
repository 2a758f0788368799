//! Deterministic priority resolver.
//!
//! Narrows a set of scored options to one option per requested priority.
//! Each option gets a base priority-match score plus additive context rule
//! adjustments; the highest total wins and ties keep input order.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::gate::{AvailabilityStatus, Dimension, DimensionValue, OptionFlag, OptionId, ScoredOption};

/// Score given to the best option on the priority's dimension.
pub const BASE_MATCH_SCORE: i32 = 100;
pub const SELF_TRANSFER_PENALTY: i32 = 50;
pub const ROOM_TYPE_MISMATCH_PENALTY: i32 = 50;
pub const OVERNIGHT_LAYOVER_PENALTY: i32 = 40;
pub const LIMITED_AVAILABILITY_PENALTY: i32 = 30;
pub const RED_EYE_PENALTY: i32 = 25;
pub const PRICE_OUTLIER_PENALTY: i32 = 15;
pub const CENTRAL_LOCATION_BONUS: i32 = 15;
pub const ROOM_TYPE_MATCH_BONUS: i32 = 10;
pub const REFUNDABLE_BONUS: i32 = 10;
/// Price above this multiple of the cheapest candidate counts as an outlier.
pub const PRICE_OUTLIER_RATIO: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Cheapest,
    Fastest,
    FewestStops,
    MostReliable,
    BestFit,
    MostComfortable,
    BestAvailability,
}

impl Priority {
    pub fn dimension(self) -> Dimension {
        match self {
            Priority::Cheapest => Dimension::Price,
            Priority::Fastest => Dimension::Duration,
            Priority::FewestStops => Dimension::Stops,
            Priority::MostReliable => Dimension::Reliability,
            Priority::BestFit => Dimension::Fit,
            Priority::MostComfortable => Dimension::Comfort,
            Priority::BestAvailability => Dimension::Availability,
        }
    }

    fn lower_is_better(self) -> bool {
        matches!(
            self,
            Priority::Cheapest | Priority::Fastest | Priority::FewestStops | Priority::BestAvailability
        )
    }
}

/// Tunable rule constants. Defaults mirror the module constants.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringRules {
    pub base_match: i32,
    pub self_transfer_penalty: i32,
    pub room_type_mismatch_penalty: i32,
    pub overnight_layover_penalty: i32,
    pub limited_availability_penalty: i32,
    pub red_eye_penalty: i32,
    pub price_outlier_penalty: i32,
    pub central_location_bonus: i32,
    pub room_type_match_bonus: i32,
    pub refundable_bonus: i32,
    pub price_outlier_ratio: f64,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            base_match: BASE_MATCH_SCORE,
            self_transfer_penalty: SELF_TRANSFER_PENALTY,
            room_type_mismatch_penalty: ROOM_TYPE_MISMATCH_PENALTY,
            overnight_layover_penalty: OVERNIGHT_LAYOVER_PENALTY,
            limited_availability_penalty: LIMITED_AVAILABILITY_PENALTY,
            red_eye_penalty: RED_EYE_PENALTY,
            price_outlier_penalty: PRICE_OUTLIER_PENALTY,
            central_location_bonus: CENTRAL_LOCATION_BONUS,
            room_type_match_bonus: ROOM_TYPE_MATCH_BONUS,
            refundable_bonus: REFUNDABLE_BONUS,
            price_outlier_ratio: PRICE_OUTLIER_RATIO,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    /// Options already taken by an earlier priority or another slot.
    pub assigned: BTreeSet<OptionId>,
    /// Room type the traveler asked for, if any.
    pub requested_room_type: Option<String>,
    pub rules: ScoringRules,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    SelfTransfer,
    OvernightLayover,
    RedEye,
    PriceOutlier,
    LimitedAvailability,
    RoomTypeMatch,
    RoomTypeMismatch,
    Refundable,
    CentralLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Adjustment {
    pub rule: Rule,
    pub delta: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionScore {
    pub id: OptionId,
    pub base: i32,
    pub adjustments: Vec<Adjustment>,
    pub total: i32,
}

/// Score every option that is not hard-excluded, in input order.
pub fn score_options(priority: Priority, options: &[ScoredOption], context: &ResolveContext) -> Vec<OptionScore> {
    let eligible: Vec<&ScoredOption> = options
        .iter()
        .filter(|option| !context.assigned.contains(&option.id) && !option.is_unavailable())
        .collect();

    let dimension = priority.dimension();
    let magnitudes: Vec<f64> = eligible
        .iter()
        .filter_map(|option| option.value(dimension).map(DimensionValue::magnitude))
        .collect();
    let best = extreme(&magnitudes, priority.lower_is_better());
    let worst = extreme(&magnitudes, !priority.lower_is_better());
    let cheapest = eligible
        .iter()
        .filter_map(|option| match option.value(Dimension::Price) {
            Some(DimensionValue::Quantity(price)) => Some(*price),
            _ => None,
        })
        .fold(None, |acc: Option<f64>, price| Some(acc.map_or(price, |low| low.min(price))));

    eligible
        .into_iter()
        .map(|option| {
            let base = match (option.value(dimension), best, worst) {
                (Some(value), Some(best), Some(worst)) => {
                    base_match(value.magnitude(), best, worst, context.rules.base_match)
                }
                _ => 0,
            };
            let adjustments = adjustments(priority, option, cheapest, context);
            let total = base + adjustments.iter().map(|adj| adj.delta).sum::<i32>();
            OptionScore {
                id: option.id.clone(),
                base,
                adjustments,
                total,
            }
        })
        .collect()
}

fn extreme(values: &[f64], lowest: bool) -> Option<f64> {
    values.iter().copied().reduce(|a, b| if lowest { a.min(b) } else { a.max(b) })
}

/// Linear position between worst (0) and best (`full`).
fn base_match(value: f64, best: f64, worst: f64, full: i32) -> i32 {
    let span = worst - best;
    if span == 0.0 {
        return full;
    }
    ((worst - value) / span * full as f64).round() as i32
}

fn adjustments(
    priority: Priority,
    option: &ScoredOption,
    cheapest: Option<f64>,
    context: &ResolveContext,
) -> Vec<Adjustment> {
    let rules = &context.rules;
    let mut hits = Vec::new();
    let mut hit = |rule, delta| hits.push(Adjustment { rule, delta });

    if option.has_flag(OptionFlag::SelfTransfer) {
        hit(Rule::SelfTransfer, -rules.self_transfer_penalty);
    }
    if option.has_flag(OptionFlag::OvernightLayover) && priority != Priority::Cheapest {
        hit(Rule::OvernightLayover, -rules.overnight_layover_penalty);
    }
    if option.has_flag(OptionFlag::RedEye)
        && matches!(priority, Priority::Fastest | Priority::MostComfortable)
    {
        hit(Rule::RedEye, -rules.red_eye_penalty);
    }
    if priority != Priority::Cheapest {
        if let (Some(DimensionValue::Quantity(price)), Some(cheapest)) =
            (option.value(Dimension::Price), cheapest)
        {
            if *price > cheapest * rules.price_outlier_ratio {
                hit(Rule::PriceOutlier, -rules.price_outlier_penalty);
            }
        }
    }
    if let Some(DimensionValue::Availability(status, _)) = option.value(Dimension::Availability) {
        if matches!(status, AvailabilityStatus::Limited | AvailabilityStatus::OnRequest) {
            hit(Rule::LimitedAvailability, -rules.limited_availability_penalty);
        }
    }
    if let (Some(requested), Some(DimensionValue::Labels(room_types))) =
        (&context.requested_room_type, option.value(Dimension::RoomType))
    {
        let wanted = requested.to_lowercase();
        if room_types.iter().any(|room| room.to_lowercase() == wanted) {
            hit(Rule::RoomTypeMatch, rules.room_type_match_bonus);
        } else {
            hit(Rule::RoomTypeMismatch, -rules.room_type_mismatch_penalty);
        }
    }
    if option.has_flag(OptionFlag::Refundable) {
        hit(Rule::Refundable, rules.refundable_bonus);
    }
    if option.has_flag(OptionFlag::CentralLocation)
        && matches!(priority, Priority::BestFit | Priority::MostComfortable)
    {
        hit(Rule::CentralLocation, rules.central_location_bonus);
    }

    hits
}

/// Best option for one priority, or `None` when every option is excluded.
pub fn resolve_by_priority(priority: Priority, options: &[ScoredOption], context: &ResolveContext) -> Option<OptionId> {
    let mut best: Option<OptionScore> = None;
    for score in score_options(priority, options, context) {
        // Strictly greater keeps the earliest option on ties.
        if best.as_ref().is_none_or(|current| score.total > current.total) {
            best = Some(score);
        }
    }
    best.map(|score| {
        debug!(?priority, option = %score.id, total = score.total, "resolved priority");
        score.id
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriorityPick {
    pub priority: Priority,
    pub option: OptionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PriorityResolution {
    /// Pairwise distinct options, one per resolvable priority.
    Choices(Vec<PriorityPick>),
    /// Fewer than two distinct options: show one explanation, no choices.
    Collapsed { option: Option<OptionId> },
}

/// Resolve several priorities in order, never reusing an option.
pub fn resolve_priorities(
    priorities: &[Priority],
    options: &[ScoredOption],
    context: &ResolveContext,
) -> PriorityResolution {
    let mut context = context.clone();
    let mut picks = Vec::new();
    for &priority in priorities {
        if let Some(option) = resolve_by_priority(priority, options, &context) {
            context.assigned.insert(option.clone());
            picks.push(PriorityPick { priority, option });
        }
    }

    if picks.len() < 2 {
        PriorityResolution::Collapsed {
            option: picks.into_iter().next().map(|pick| pick.option),
        }
    } else {
        PriorityResolution::Choices(picks)
    }
}
