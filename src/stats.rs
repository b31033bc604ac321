use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptiveStats {
    pub n: usize,
    pub mean: f64,
    pub median: f64,
    pub standard_deviation: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q3: f64,
    pub coefficient_of_variation: f64,
}

impl DescriptiveStats {
    pub fn from_sample(xs: &[f64]) -> Result<Self> {
        let mean = mean(xs)?;
        let standard_deviation = standard_deviation(xs)?;
        let sorted = sorted(xs);
        Ok(Self {
            n: xs.len(),
            mean,
            median: median(xs)?,
            standard_deviation,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            q1: percentile_sorted(&sorted, 25.0),
            q3: percentile_sorted(&sorted, 75.0),
            coefficient_of_variation: coefficient_of_variation(xs)?,
        })
    }
}

fn non_empty(xs: &[f64]) -> Result<()> {
    if xs.is_empty() {
        Err(EngineError::EmptySample)
    } else {
        Ok(())
    }
}

fn sorted(xs: &[f64]) -> Vec<f64> {
    let mut values = xs.to_vec();
    values.sort_by(f64::total_cmp);
    values
}

pub fn mean(xs: &[f64]) -> Result<f64> {
    non_empty(xs)?;
    Ok(xs.iter().sum::<f64>() / xs.len() as f64)
}

pub fn median(xs: &[f64]) -> Result<f64> {
    non_empty(xs)?;
    let values = sorted(xs);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Ok((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Ok(values[mid])
    }
}

pub fn mode(xs: &[f64]) -> Result<Vec<f64>> {
    non_empty(xs)?;
    let mut counts: BTreeMap<u64, (f64, usize)> = BTreeMap::new();
    for value in sorted(xs) {
        counts
            .entry(order_key(value))
            .or_insert((value, 0))
            .1 += 1;
    }
    let top = counts.values().map(|(_, count)| *count).max().unwrap_or(0);
    let mut modes: Vec<f64> = counts
        .into_values()
        .filter(|(_, count)| *count == top)
        .map(|(value, _)| value)
        .collect();
    modes.sort_by(f64::total_cmp);
    Ok(modes)
}

fn order_key(value: f64) -> u64 {
    // Normalizes -0.0 so it groups with 0.0.
    (value + 0.0).to_bits()
}

pub fn standard_deviation(xs: &[f64]) -> Result<f64> {
    let m = mean(xs)?;
    let variance = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64;
    Ok(variance.sqrt())
}

fn percentile_sorted(values: &[f64], p: f64) -> f64 {
    let rank = p / 100.0 * (values.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    values[lower] + (values[upper] - values[lower]) * fraction
}

/// Linear interpolation at rank `p/100 * (n-1)`.
pub fn percentile(xs: &[f64], p: f64) -> Result<f64> {
    non_empty(xs)?;
    if !(0.0..=100.0).contains(&p) {
        return Err(EngineError::InvalidPercentile(p));
    }
    Ok(percentile_sorted(&sorted(xs), p))
}

pub fn coefficient_of_variation(xs: &[f64]) -> Result<f64> {
    let m = mean(xs)?;
    if m == 0.0 {
        return Ok(0.0);
    }
    Ok(standard_deviation(xs)? / m)
}

pub fn z_score(value: f64, mean: f64, standard_deviation: f64) -> f64 {
    if standard_deviation == 0.0 {
        0.0
    } else {
        (value - mean) / standard_deviation
    }
}

/// Product-moment correlation. A constant series yields 0.
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> Result<f64> {
    if xs.len() != ys.len() {
        return Err(EngineError::LengthMismatch {
            left: xs.len(),
            right: ys.len(),
        });
    }
    if xs.len() < 2 {
        return Err(EngineError::InsufficientSample {
            needed: 2,
            got: xs.len(),
        });
    }

    let mean_x = mean(xs)?;
    let mean_y = mean(ys)?;
    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denominator = (var_x * var_y).sqrt();
    if denominator == 0.0 {
        return Ok(0.0);
    }
    Ok((covariance / denominator).clamp(-1.0, 1.0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    Negligible,
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationDirection {
    Positive,
    Negative,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CorrelationInterpretation {
    pub strength: CorrelationStrength,
    pub direction: CorrelationDirection,
}

impl fmt::Display for CorrelationInterpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strength = match self.strength {
            CorrelationStrength::Negligible => "despreciable",
            CorrelationStrength::Weak => "débil",
            CorrelationStrength::Moderate => "moderada",
            CorrelationStrength::Strong => "fuerte",
            CorrelationStrength::VeryStrong => "muy fuerte",
        };
        match self.direction {
            CorrelationDirection::Positive => write!(f, "{strength} positiva"),
            CorrelationDirection::Negative => write!(f, "{strength} negativa"),
            CorrelationDirection::None => write!(f, "{strength}"),
        }
    }
}

pub fn correlation_interpretation(r: f64) -> CorrelationInterpretation {
    let magnitude = r.abs();
    let strength = if magnitude < 0.1 {
        CorrelationStrength::Negligible
    } else if magnitude < 0.3 {
        CorrelationStrength::Weak
    } else if magnitude < 0.5 {
        CorrelationStrength::Moderate
    } else if magnitude < 0.7 {
        CorrelationStrength::Strong
    } else {
        CorrelationStrength::VeryStrong
    };
    let direction = if r > 0.0 {
        CorrelationDirection::Positive
    } else if r < 0.0 {
        CorrelationDirection::Negative
    } else {
        CorrelationDirection::None
    };
    CorrelationInterpretation {
        strength,
        direction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: [f64; 5] = [1.0, 2.0, 3.0, 4.0, 5.0];

    #[test]
    fn percentile_interpolates_order_statistics() {
        assert_eq!(percentile(&SAMPLE, 50.0).unwrap(), 3.0);
        assert_eq!(percentile(&SAMPLE, 25.0).unwrap(), 2.0);
        assert_eq!(percentile(&SAMPLE, 0.0).unwrap(), 1.0);
        assert_eq!(percentile(&SAMPLE, 100.0).unwrap(), 5.0);
        assert_eq!(percentile(&[10.0, 20.0], 50.0).unwrap(), 15.0);
        assert!(percentile(&SAMPLE, 101.0).is_err());
        assert!(matches!(percentile(&[], 50.0), Err(EngineError::EmptySample)));
    }

    #[test]
    fn central_tendency() {
        assert_eq!(mean(&SAMPLE).unwrap(), 3.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]).unwrap(), 2.5);
        assert_eq!(median(&[9.0, 1.0, 5.0]).unwrap(), 5.0);
        assert_eq!(mode(&[3.0, 1.0, 3.0, 1.0, 2.0]).unwrap(), vec![1.0, 3.0]);
        assert_eq!(mode(&[4.0, 4.0, 2.0]).unwrap(), vec![4.0]);
    }

    #[test]
    fn dispersion_uses_population_denominator() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(standard_deviation(&xs).unwrap(), 2.0);
        assert_eq!(coefficient_of_variation(&xs).unwrap(), 0.4);
        assert_eq!(coefficient_of_variation(&[0.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn descriptive_stats_bundle() {
        let stats = DescriptiveStats::from_sample(&[5.0, 1.0, 4.0, 2.0, 3.0]).unwrap();
        assert_eq!(stats.n, 5);
        assert_eq!((stats.min, stats.max), (1.0, 5.0));
        assert_eq!((stats.q1, stats.median, stats.q3), (2.0, 3.0, 4.0));
        assert!(DescriptiveStats::from_sample(&[]).is_err());
    }

    #[test]
    fn pearson_self_and_negation() {
        let xs = [1.0, 3.0, 2.0, 5.0, 4.0];
        let neg: Vec<f64> = xs.iter().map(|x| -x).collect();
        assert!((pearson_correlation(&xs, &xs).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson_correlation(&xs, &neg).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_preconditions() {
        assert!(matches!(
            pearson_correlation(&[1.0, 2.0], &[1.0]),
            Err(EngineError::LengthMismatch { left: 2, right: 1 })
        ));
        assert!(matches!(
            pearson_correlation(&[1.0], &[1.0]),
            Err(EngineError::InsufficientSample { .. })
        ));
        assert_eq!(pearson_correlation(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]).unwrap(), 0.0);
    }

    #[test]
    fn interpretation_buckets_are_sign_independent() {
        let strong = correlation_interpretation(0.65);
        let strong_neg = correlation_interpretation(-0.65);
        assert_eq!(strong.strength, CorrelationStrength::Strong);
        assert_eq!(strong_neg.strength, CorrelationStrength::Strong);
        assert_eq!(strong_neg.direction, CorrelationDirection::Negative);
        assert_eq!(correlation_interpretation(0.05).strength, CorrelationStrength::Negligible);
        assert_eq!(correlation_interpretation(0.3).strength, CorrelationStrength::Moderate);
        assert_eq!(correlation_interpretation(0.7).strength, CorrelationStrength::VeryStrong);
        assert_eq!(strong_neg.to_string(), "fuerte negativa");
    }

    #[test]
    fn z_score_handles_flat_distribution() {
        assert_eq!(z_score(3.0, 3.0, 0.0), 0.0);
        assert_eq!(z_score(5.0, 3.0, 1.0), 2.0);
    }
}
