use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::models::{Dimension, ResponseMap};

pub const SCALE_MIN: f64 = 1.0;
pub const SCALE_MAX: f64 = 5.0;

const MIN_RATING: i32 = 1;
const MAX_RATING: i32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub dimension_id: String,
    pub answered: usize,
    pub total: usize,
    pub percentage: f64,
}

impl Progress {
    fn new(dimension_id: &str, answered: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0.0
        } else {
            round2(answered as f64 / total as f64 * 100.0)
        };
        Self {
            dimension_id: dimension_id.to_string(),
            answered,
            total,
            percentage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionResult {
    pub dimension_id: String,
    pub name: String,
    pub weight: f64,
    pub average: f64,
    pub contribution: f64,
    pub answered: usize,
}

// Postgres rounds a float8 by casting it to numeric at 15 significant digits.
// Snapping to the same decimal first keeps both paths on the same side of a half.
fn to_significant_digits(value: f64) -> f64 {
    format!("{value:.14e}").parse().unwrap_or(value)
}

/// Half-away-from-zero rounding to two decimals of the 15-digit decimal value,
/// so 3.875 (stored as 3.8749999999999996) rounds to 3.88.
pub fn round2(value: f64) -> f64 {
    to_significant_digits(to_significant_digits(value) * 100.0).round() / 100.0
}

fn is_valid_rating(value: i32) -> bool {
    (MIN_RATING..=MAX_RATING).contains(&value)
}

pub fn validate_responses(responses: &ResponseMap) -> Result<()> {
    match responses.iter().find(|(_, value)| !is_valid_rating(**value)) {
        Some((item, value)) => Err(EngineError::ResponseOutOfRange {
            item: item.clone(),
            value: *value,
        }),
        None => Ok(()),
    }
}

fn answered_values<'a>(
    responses: &'a ResponseMap,
    dimension: &'a Dimension,
) -> impl Iterator<Item = i32> + 'a {
    dimension
        .items
        .iter()
        .filter_map(|item| responses.get(&item.id).copied())
}

pub fn dimension_average(responses: &ResponseMap, dimension: &Dimension) -> f64 {
    let (sum, count) = answered_values(responses, dimension)
        .fold((0i64, 0usize), |(sum, count), value| (sum + i64::from(value), count + 1));

    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

pub fn dimension_contribution(responses: &ResponseMap, dimension: &Dimension) -> f64 {
    dimension_average(responses, dimension) * dimension.weight
}

/// An unanswered dimension contributes 0 rather than `weight * SCALE_MIN`.
pub fn performance_score(responses: &ResponseMap, dimensions: &[Dimension]) -> f64 {
    let total: f64 = dimensions
        .iter()
        .map(|dimension| dimension_contribution(responses, dimension))
        .sum();
    round2(total)
}

pub fn dimension_breakdown(
    responses: &ResponseMap,
    dimensions: &[Dimension],
) -> Vec<DimensionResult> {
    dimensions
        .iter()
        .map(|dimension| {
            let average = dimension_average(responses, dimension);
            DimensionResult {
                dimension_id: dimension.id.clone(),
                name: dimension.name.clone(),
                weight: dimension.weight,
                average: round2(average),
                contribution: round2(average * dimension.weight),
                answered: answered_values(responses, dimension).count(),
            }
        })
        .collect()
}

pub fn is_complete(responses: &ResponseMap, dimensions: &[Dimension]) -> bool {
    dimensions.iter().all(|dimension| {
        dimension.items.iter().all(|item| {
            responses
                .get(&item.id)
                .is_some_and(|value| is_valid_rating(*value))
        })
    })
}

pub fn incomplete_dimensions<'a>(
    responses: &ResponseMap,
    dimensions: &'a [Dimension],
) -> Vec<&'a Dimension> {
    dimensions
        .iter()
        .filter(|dimension| {
            dimension
                .items
                .iter()
                .any(|item| !responses.contains_key(&item.id))
        })
        .collect()
}

pub fn progress(responses: &ResponseMap, dimensions: &[Dimension]) -> Vec<Progress> {
    dimensions
        .iter()
        .map(|dimension| {
            Progress::new(
                &dimension.id,
                answered_values(responses, dimension).count(),
                dimension.items.len(),
            )
        })
        .collect()
}

pub fn overall_progress(responses: &ResponseMap, dimensions: &[Dimension]) -> Progress {
    let (answered, total) = progress(responses, dimensions)
        .iter()
        .fold((0, 0), |(answered, total), row| (answered + row.answered, total + row.total));
    Progress::new("total", answered, total)
}

pub fn to_percentage(score: f64) -> f64 {
    to_significant_digits(((score - SCALE_MIN) / (SCALE_MAX - SCALE_MIN)) * 100.0).round()
}
