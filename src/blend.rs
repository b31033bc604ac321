use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::instruments::ScoringStrategy;
use crate::models::{Dimension, EvaluationDraft, FinalScore, ResponseMap};
use crate::ninebox;
use crate::scoring::{self, round2};

const WEIGHT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    pub supervisor: f64,
    #[serde(rename = "self")]
    pub self_weight: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            supervisor: 0.7,
            self_weight: 0.3,
        }
    }
}

impl BlendWeights {
    pub fn new(supervisor: f64, self_weight: f64) -> Result<Self> {
        let valid = supervisor >= 0.0
            && self_weight >= 0.0
            && (supervisor + self_weight - 1.0).abs() <= WEIGHT_TOLERANCE;
        if !valid {
            return Err(EngineError::InvalidBlendWeights {
                supervisor,
                self_weight,
            });
        }
        Ok(Self {
            supervisor,
            self_weight,
        })
    }
}

pub fn blend(performance_self: f64, performance_supervisor: f64, weights: BlendWeights) -> f64 {
    round2(performance_supervisor * weights.supervisor + performance_self * weights.self_weight)
}

/// `None` means "not evaluated" and must not be read as 0.
pub fn potential_score(supervisor_potential: Option<&ResponseMap>) -> Option<f64> {
    let responses = supervisor_potential?;
    if responses.is_empty() {
        return None;
    }
    let sum: i64 = responses.values().map(|value| i64::from(*value)).sum();
    Some(round2(sum as f64 / responses.len() as f64))
}

pub fn compute_final_score(
    self_draft: &EvaluationDraft,
    supervisor_draft: &EvaluationDraft,
    dimensions: &[Dimension],
    strategy: &ScoringStrategy,
) -> Result<FinalScore> {
    scoring::validate_responses(&self_draft.responses)?;
    scoring::validate_responses(&supervisor_draft.responses)?;
    if let Some(potential) = &supervisor_draft.potential_responses {
        scoring::validate_responses(potential)?;
    }

    let performance_self = (strategy.performance)(&self_draft.responses, dimensions);
    let performance_supervisor = (strategy.performance)(&supervisor_draft.responses, dimensions);
    let performance_final = blend(performance_self, performance_supervisor, strategy.blend);
    let potential = potential_score(supervisor_draft.potential_responses.as_ref());

    Ok(FinalScore {
        performance_self,
        performance_supervisor,
        performance_final,
        potential,
        nine_box_position: Some(ninebox::classify(performance_final, potential)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::InstrumentRegistry;
    use crate::models::{EvaluatorRole, NineBoxLevel, NineBoxPosition};

    fn uniform(dimensions: &[Dimension], value: i32) -> ResponseMap {
        dimensions
            .iter()
            .flat_map(|d| d.items.iter().map(move |i| (i.id.clone(), value)))
            .collect()
    }

    #[test]
    fn default_blend_matches_reference_values() {
        let weights = BlendWeights::default();
        assert_eq!(blend(4.0, 4.0, weights), 4.0);
        assert_eq!(blend(2.0, 5.0, weights), 4.1);
    }

    #[test]
    fn half_cent_blend_rounds_up() {
        assert_eq!(blend(3.0, 4.25, BlendWeights::default()), 3.88);
    }

    #[test]
    fn blend_weights_must_sum_to_one() {
        assert!(BlendWeights::new(0.6, 0.4).is_ok());
        assert!(matches!(
            BlendWeights::new(0.6, 0.3),
            Err(EngineError::InvalidBlendWeights { .. })
        ));
        assert!(BlendWeights::new(1.2, -0.2).is_err());
    }

    #[test]
    fn potential_is_none_without_supervisor_answers() {
        assert_eq!(potential_score(None), None);
        assert_eq!(potential_score(Some(&ResponseMap::new())), None);
        let answers: ResponseMap = [("p1", 4), ("p2", 5), ("p3", 4)]
            .into_iter()
            .map(|(item, value)| (item.to_string(), value))
            .collect();
        assert_eq!(potential_score(Some(&answers)), Some(4.33));
    }

    #[test]
    fn final_score_ignores_self_potential() {
        let registry = InstrumentRegistry::builtin().unwrap();
        let instrument = registry.resolve("operativo").unwrap();
        let dims = &instrument.performance_dimensions;
        let self_draft = EvaluationDraft::new(EvaluatorRole::SelfEvaluation, uniform(dims, 2))
            .with_potential(uniform(&instrument.potential_dimensions, 5));
        let supervisor_draft = EvaluationDraft::new(EvaluatorRole::Supervisor, uniform(dims, 5));

        let score = compute_final_score(
            &self_draft,
            &supervisor_draft,
            dims,
            &registry.strategy_for(&instrument.id),
        )
        .unwrap();

        assert_eq!(score.performance_self, 2.0);
        assert_eq!(score.performance_supervisor, 5.0);
        assert_eq!(score.performance_final, 4.1);
        assert_eq!(score.potential, None);
        assert_eq!(
            score.nine_box_position,
            Some(NineBoxPosition::new(NineBoxLevel::High, NineBoxLevel::Medium))
        );
        assert!(!score.has_two_axis_placement());
    }

    #[test]
    fn final_score_rejects_out_of_range_answers() {
        let registry = InstrumentRegistry::builtin().unwrap();
        let instrument = registry.resolve("O1").unwrap();
        let dims = &instrument.performance_dimensions;
        let mut bad = uniform(dims, 3);
        if let Some(first) = dims[0].items.first() {
            bad.insert(first.id.clone(), 0);
        }
        let self_draft = EvaluationDraft::new(EvaluatorRole::SelfEvaluation, bad);
        let supervisor_draft = EvaluationDraft::new(EvaluatorRole::Supervisor, uniform(dims, 3));
        let result = compute_final_score(
            &self_draft,
            &supervisor_draft,
            dims,
            &registry.strategy_for(&instrument.id),
        );
        assert!(matches!(result, Err(EngineError::ResponseOutOfRange { value: 0, .. })));
    }
}
