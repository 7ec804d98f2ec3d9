// Analysis pipeline
//
// One request in flight at a time. Progress milestones are cosmetic: they mark the await
// points of the pipeline, not transport progress.

use log::{error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::requests::{AnalysisRequest, PatientSummary};
use crate::models::responses::ResultModel;
use crate::models::state::WizardSession;
use crate::persistence::PersistenceManager;
use crate::utils::logging::{describe_clinical_text, mask_sensitive};
use crate::utils::validation::ValidationError;
use crate::wizard::WizardStep;

use super::client::AnalysisClient;

pub type ProgressEmitter = Arc<dyn Fn(AnalysisProgress) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisProgress {
    pub correlation_id: String,
    pub percent: u8,
    pub message: String,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milestone {
    pub percent: u8,
    pub message: &'static str,
}

pub const MILESTONES: [Milestone; 5] = [
    Milestone { percent: 0, message: "Analyzing biomarker data..." },
    Milestone { percent: 20, message: "Processing patient information..." },
    Milestone { percent: 60, message: "Evaluating risk factors..." },
    Milestone { percent: 90, message: "Generating results..." },
    Milestone { percent: 100, message: "Complete!" },
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Transport failure, non-2xx status or unparsable body.
    #[error("{user_message}")]
    RequestFailed {
        user_message: String,
        internal_details: String,
    },

    #[error("An analysis is already running.")]
    AlreadyInFlight,
}

pub struct AnalysisPipeline {
    client: Arc<dyn AnalysisClient>,
    persistence: Arc<PersistenceManager>,
    settle_delay: Duration,
}

impl AnalysisPipeline {
    pub fn new(
        client: Arc<dyn AnalysisClient>,
        persistence: Arc<PersistenceManager>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            client,
            persistence,
            settle_delay,
        }
    }

    pub fn service_url(&self) -> String {
        self.client.service_url()
    }

    /// Validate, dispatch, publish and move the wizard to Results.
    ///
    /// On failure the session fields, wizard step and auto-save are left untouched.
    pub async fn run(
        &self,
        session: &WizardSession,
        emit: &ProgressEmitter,
    ) -> Result<Arc<ResultModel>, AnalysisError> {
        let Some(_in_flight) = session.try_begin_analysis() else {
            warn!("[PHASE: analysis] [STEP: start] Analyze ignored; a request is already running");
            return Err(AnalysisError::AlreadyInFlight);
        };

        let snapshot = session.snapshot();
        session
            .schema()
            .validate_step(WizardStep::Biomarkers, &snapshot)
            .map_err(|e| {
                info!("[PHASE: analysis] [STEP: validate] Blocked: {}", e);
                e
            })?;

        let started = Instant::now();
        let summary = PatientSummary::from_snapshot(&snapshot);
        let request = AnalysisRequest::from_snapshot(&snapshot);
        let correlation_id = request.correlation_id.to_string();
        let progress = |stage: usize| {
            let m = MILESTONES[stage];
            emit(AnalysisProgress {
                correlation_id: correlation_id.clone(),
                percent: m.percent,
                message: m.message.to_string(),
                elapsed_ms: started.elapsed().as_millis(),
            });
        };

        info!(
            "[PHASE: analysis] [STEP: start] Analyzing patient {} ({}) correlation_id={}",
            mask_sensitive(&summary.id),
            describe_clinical_text(&summary.clinical_text),
            correlation_id
        );
        progress(0);
        progress(1);

        let result = match self.client.analyze(&request).await {
            Ok(r) => r,
            Err(e) => {
                if let AnalysisError::RequestFailed {
                    internal_details, ..
                } = &e
                {
                    error!(
                        "[PHASE: analysis] [STEP: dispatch] Request failed correlation_id={}: {}",
                        correlation_id, internal_details
                    );
                }
                return Err(e);
            }
        };
        progress(2);

        progress(3);
        let published = session.publish(summary, result);
        progress(4);

        self.persistence.clear();
        info!(
            "[PHASE: analysis] [STEP: complete] risk_level={} in {} ms correlation_id={}",
            published.risk_level,
            started.elapsed().as_millis(),
            correlation_id
        );

        tokio::time::sleep(self.settle_delay).await;
        session.show_results();
        Ok(published)
    }
}
