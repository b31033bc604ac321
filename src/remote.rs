use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::blend::{self, BlendWeights};
use crate::error::Result;
use crate::instruments::ScoringStrategy;
use crate::models::{
    Dimension, EvaluationDraft, EvaluationPeriod, EvaluatorRole, FinalScore, Instrument,
    ResponseMap,
};
use crate::scoring;

#[async_trait]
pub trait ScoringBackend: Send + Sync {
    async fn calculate_final_score(
        &self,
        self_evaluation_id: Uuid,
        supervisor_evaluation_id: Uuid,
        instrument: &Instrument,
        blend: BlendWeights,
    ) -> Result<Option<FinalScore>>;

    async fn validate_complete(
        &self,
        responses: &ResponseMap,
        dimensions: &[Dimension],
    ) -> Result<bool>;

    async fn is_period_open(&self, period_id: Uuid, role: EvaluatorRole) -> Result<bool>;
}

/// Tries the remote service first and computes locally whenever it is
/// missing, fails, or returns nothing. Remote failures are logged only.
#[derive(Clone, Default)]
pub struct RemoteComputationClient {
    backend: Option<Arc<dyn ScoringBackend>>,
}

impl RemoteComputationClient {
    pub fn new(backend: Arc<dyn ScoringBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn local_only() -> Self {
        Self::default()
    }

    pub async fn final_score(
        &self,
        self_draft: &EvaluationDraft,
        supervisor_draft: &EvaluationDraft,
        instrument: &Instrument,
        strategy: &ScoringStrategy,
    ) -> Result<FinalScore> {
        match (&self.backend, self_draft.id, supervisor_draft.id) {
            (Some(backend), Some(self_id), Some(supervisor_id)) => {
                match backend
                    .calculate_final_score(self_id, supervisor_id, instrument, strategy.blend)
                    .await
                {
                    Ok(Some(score)) => {
                        debug!(%self_id, %supervisor_id, "final score computed remotely");
                        return Ok(score);
                    }
                    Ok(None) => {
                        warn!(
                            %self_id,
                            %supervisor_id,
                            "remote scoring returned no result, using local calculation"
                        );
                    }
                    Err(err) => {
                        warn!(
                            %self_id,
                            %supervisor_id,
                            error = %err,
                            "remote scoring failed, using local calculation"
                        );
                    }
                }
            }
            _ => debug!(instrument = %instrument.id, "remote scoring skipped, computing locally"),
        }

        blend::compute_final_score(
            self_draft,
            supervisor_draft,
            &instrument.performance_dimensions,
            strategy,
        )
    }

    pub async fn validate_complete(
        &self,
        responses: &ResponseMap,
        dimensions: &[Dimension],
    ) -> bool {
        if let Some(backend) = &self.backend {
            match backend.validate_complete(responses, dimensions).await {
                Ok(complete) => return complete,
                Err(err) => warn!(error = %err, "remote completeness check failed"),
            }
        }
        scoring::is_complete(responses, dimensions)
    }

    pub async fn is_period_open(
        &self,
        period: &EvaluationPeriod,
        role: EvaluatorRole,
        today: NaiveDate,
    ) -> bool {
        if let Some(backend) = &self.backend {
            match backend.is_period_open(period.id, role).await {
                Ok(open) => return open,
                Err(err) => warn!(period = %period.id, error = %err, "remote period check failed"),
            }
        }
        period.is_open_for(role, today)
    }
}
