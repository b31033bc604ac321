use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::models::{Dimension, EmployeeProfile, ResponseMap, ScoredEmployee};
use crate::scoring::{self, round2};
use crate::stats::{self, CorrelationInterpretation, DescriptiveStats};

const MISSING: &str = "Sin dato";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakdownAxis {
    Area,
    AgeBracket,
    TenureBracket,
    Gender,
    JobType,
}

impl BreakdownAxis {
    pub const ALL: [BreakdownAxis; 5] = [
        BreakdownAxis::Area,
        BreakdownAxis::AgeBracket,
        BreakdownAxis::TenureBracket,
        BreakdownAxis::Gender,
        BreakdownAxis::JobType,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            BreakdownAxis::Area => "Área",
            BreakdownAxis::AgeBracket => "Tramo de edad",
            BreakdownAxis::TenureBracket => "Antigüedad",
            BreakdownAxis::Gender => "Género",
            BreakdownAxis::JobType => "Tipo de contrato",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow {
    pub group: String,
    pub stats: DescriptiveStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationRow {
    pub label: &'static str,
    pub r: f64,
    pub interpretation: CorrelationInterpretation,
}

pub fn years_between(from: NaiveDate, on: NaiveDate) -> i32 {
    let mut years = on.year() - from.year();
    if (on.month(), on.day()) < (from.month(), from.day()) {
        years -= 1;
    }
    years
}

pub fn age_bracket(age: i32) -> &'static str {
    match age {
        i32::MIN..=25 => "<26",
        26..=35 => "26-35",
        36..=45 => "36-45",
        46..=55 => "46-55",
        _ => ">55",
    }
}

pub fn tenure_bracket(years: i32) -> &'static str {
    match years {
        i32::MIN..=0 => "<1",
        1..=5 => "1-5",
        6..=10 => "6-10",
        11..=20 => "11-20",
        _ => ">20",
    }
}

fn text_group(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => MISSING.to_string(),
    }
}

fn group_key(axis: BreakdownAxis, profile: &EmployeeProfile, on: NaiveDate) -> String {
    match axis {
        BreakdownAxis::Area => text_group(profile.area.as_deref()),
        BreakdownAxis::Gender => text_group(profile.gender.as_deref()),
        BreakdownAxis::JobType => text_group(profile.job_type.as_deref()),
        BreakdownAxis::AgeBracket => profile
            .birth_date
            .map(|date| age_bracket(years_between(date, on)).to_string())
            .unwrap_or_else(|| MISSING.to_string()),
        BreakdownAxis::TenureBracket => profile
            .hire_date
            .map(|date| tenure_bracket(years_between(date, on)).to_string())
            .unwrap_or_else(|| MISSING.to_string()),
    }
}

pub fn breakdown(
    axis: BreakdownAxis,
    employees: &[ScoredEmployee],
    on: NaiveDate,
) -> Vec<BreakdownRow> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for employee in employees {
        groups
            .entry(group_key(axis, &employee.profile, on))
            .or_default()
            .push(employee.score.performance_final);
    }

    groups
        .into_iter()
        .filter_map(|(group, scores)| {
            DescriptiveStats::from_sample(&scores)
                .ok()
                .map(|stats| BreakdownRow { group, stats })
        })
        .collect()
}

fn correlation_row(label: &'static str, pairs: &[(f64, f64)]) -> Option<CorrelationRow> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = pairs.iter().copied().unzip();
    match stats::pearson_correlation(&xs, &ys) {
        Ok(r) => Some(CorrelationRow {
            label,
            r,
            interpretation: stats::correlation_interpretation(r),
        }),
        Err(err) => {
            debug!(label, error = %err, "correlation omitted");
            None
        }
    }
}

pub fn dimension_means<'a, I>(evaluations: I) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = (&'a ResponseMap, &'a [Dimension])>,
{
    let mut samples: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (responses, dimensions) in evaluations {
        for row in scoring::dimension_breakdown(responses, dimensions) {
            if row.answered > 0 {
                samples.entry(row.dimension_id).or_default().push(row.average);
            }
        }
    }
    samples
        .into_iter()
        .filter_map(|(dimension, values)| {
            stats::mean(&values)
                .ok()
                .map(|mean| (dimension, round2(mean)))
        })
        .collect()
}

pub fn gap_by_dimension(means: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    means
        .iter()
        .map(|(dimension, mean)| (dimension.clone(), round2(scoring::SCALE_MAX - mean)))
        .collect()
}

pub fn correlations(employees: &[ScoredEmployee], on: NaiveDate) -> Vec<CorrelationRow> {
    let potential: Vec<(f64, f64)> = employees
        .iter()
        .filter_map(|e| e.score.potential.map(|p| (e.score.performance_final, p)))
        .collect();
    let tenure: Vec<(f64, f64)> = employees
        .iter()
        .filter_map(|e| {
            e.profile
                .hire_date
                .map(|date| (e.score.performance_final, f64::from(years_between(date, on))))
        })
        .collect();
    let age: Vec<(f64, f64)> = employees
        .iter()
        .filter_map(|e| {
            e.profile
                .birth_date
                .map(|date| (e.score.performance_final, f64::from(years_between(date, on))))
        })
        .collect();
    let self_vs_supervisor: Vec<(f64, f64)> = employees
        .iter()
        .map(|e| (e.score.performance_self, e.score.performance_supervisor))
        .collect();

    [
        correlation_row("Desempeño vs potencial", &potential),
        correlation_row("Desempeño vs antigüedad", &tenure),
        correlation_row("Desempeño vs edad", &age),
        correlation_row("Autoevaluación vs jefatura", &self_vs_supervisor),
    ]
    .into_iter()
    .flatten()
    .collect()
}
