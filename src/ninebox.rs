use std::collections::BTreeMap;

use crate::models::{NineBoxLevel, NineBoxPosition};
use crate::scoring::to_percentage;

const MEDIUM_FLOOR: f64 = 50.0;
const MEDIUM_CEILING: f64 = 75.0;

pub fn level_for_percentage(percentage: f64) -> NineBoxLevel {
    if percentage < MEDIUM_FLOOR {
        NineBoxLevel::Low
    } else if percentage <= MEDIUM_CEILING {
        NineBoxLevel::Medium
    } else {
        NineBoxLevel::High
    }
}

/// Without a potential score the potential axis is pinned to `medium`.
pub fn classify(performance_final: f64, potential: Option<f64>) -> NineBoxPosition {
    let performance = level_for_percentage(to_percentage(performance_final));
    let potential = potential
        .map(|value| level_for_percentage(to_percentage(value)))
        .unwrap_or(NineBoxLevel::Medium);
    NineBoxPosition::new(performance, potential)
}

pub fn distribution<'a, I>(positions: I) -> BTreeMap<NineBoxPosition, usize>
where
    I: IntoIterator<Item = &'a NineBoxPosition>,
{
    let mut counts = BTreeMap::new();
    for position in positions {
        *counts.entry(*position).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_inclusive_for_medium() {
        assert_eq!(level_for_percentage(49.99), NineBoxLevel::Low);
        assert_eq!(level_for_percentage(50.0), NineBoxLevel::Medium);
        assert_eq!(level_for_percentage(75.0), NineBoxLevel::Medium);
        assert_eq!(level_for_percentage(75.01), NineBoxLevel::High);
    }

    #[test]
    fn classifies_both_axes() {
        assert_eq!(classify(4.5, Some(4.5)).to_string(), "high-high");
        assert_eq!(classify(3.0, Some(1.5)).to_string(), "medium-low");
        assert_eq!(classify(4.0, Some(4.0)).to_string(), "medium-medium");
        assert_eq!(classify(2.9, Some(4.1)).to_string(), "low-high");
    }

    #[test]
    fn missing_potential_pins_medium() {
        assert_eq!(classify(4.8, None).to_string(), "high-medium");
        assert_eq!(classify(3.5, None).to_string(), "medium-medium");
        assert_eq!(classify(1.2, None).to_string(), "low-medium");
    }

    #[test]
    fn distribution_counts_cells() {
        let cells = vec![classify(4.8, None), classify(4.9, None), classify(1.0, Some(1.0))];
        let counts = distribution(&cells);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&classify(4.8, None)], 2);
    }
}
