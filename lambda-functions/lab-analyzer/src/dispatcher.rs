use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::agent::LanguageModel;
use crate::blob::BlobStore;
use crate::error::MedicalAgentError;
use crate::evaluator::{evaluate, CriticalAction, CriticalCheck, Specialist};
use crate::events::{CreateEventRequest, EventType, Urgency};
use crate::lab_data::{LabData, LabEvent, LabSource};
use crate::prompts::build_analysis_prompt;
use crate::tools::AgentTools;

/// What the analyzer Lambda returns. Always produced, never an `Err`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisResponse {
    CriticalHandled {
        patient_id: String,
        action: CriticalAction,
        reasoning: String,
    },
    Success {
        patient_id: String,
        agent_response: String,
        analysis_timestamp: Option<String>,
    },
    Error {
        message: String,
    },
}

impl AnalysisResponse {
    pub fn status(&self) -> &'static str {
        match self {
            Self::CriticalHandled { .. } => "critical_handled",
            Self::Success { .. } => "success",
            Self::Error { .. } => "error",
        }
    }
}

/// Entry point for lab events: resolve the payload, pre-screen it, then
/// either escalate directly or hand the exam to the agent.
pub struct LabEventDispatcher {
    blobs: Arc<dyn BlobStore>,
    tools: AgentTools,
    model: Arc<dyn LanguageModel>,
}

impl LabEventDispatcher {
    pub fn new(blobs: Arc<dyn BlobStore>, tools: AgentTools, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            blobs,
            tools,
            model,
        }
    }

    pub async fn handle(&self, event: LabEvent) -> AnalysisResponse {
        match self.process(event).await {
            Ok(response) => response,
            Err(e) => {
                error!("Error in medical analysis: {}", e);
                AnalysisResponse::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Same as [`handle`](Self::handle) for an undecoded invocation payload.
    /// A payload that is not a lab event comes back as an error response.
    pub async fn handle_raw(&self, payload: Value) -> AnalysisResponse {
        match serde_json::from_value::<LabEvent>(payload) {
            Ok(event) => self.handle(event).await,
            Err(e) => {
                let e = MedicalAgentError::from(e);
                error!("Error in medical analysis: {}", e);
                AnalysisResponse::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    async fn process(&self, event: LabEvent) -> Result<AnalysisResponse, MedicalAgentError> {
        let lab_data = self.resolve_lab_data(&event).await?;

        let patient_id = lab_data
            .patient_id()
            .ok_or_else(|| MedicalAgentError::data_missing("patient_id not found in lab data"))?
            .to_string();

        let check = evaluate(&lab_data);
        if check.is_critical {
            return self.escalate(&patient_id, check).await;
        }

        let prompt = build_analysis_prompt(&patient_id, &lab_data);
        info!("Processing lab analysis for patient {}", patient_id);

        let agent_response = self.model.generate(&prompt, &self.tools).await?;

        Ok(AnalysisResponse::Success {
            patient_id,
            agent_response,
            analysis_timestamp: lab_data.exam_date,
        })
    }

    async fn resolve_lab_data(&self, event: &LabEvent) -> Result<LabData, MedicalAgentError> {
        match event.source() {
            LabSource::Inline(lab_data) => Ok(lab_data),
            LabSource::Blob { bucket, key } => {
                let content = self.blobs.get_text(&bucket, &key).await?;
                serde_json::from_str::<LabData>(&content).map_err(|e| {
                    MedicalAgentError::data_missing(format!(
                        "s3://{}/{} is not valid lab data: {}",
                        bucket, key, e
                    ))
                })
            }
            LabSource::Missing => Err(MedicalAgentError::data_missing(
                "no lab data found in event",
            )),
        }
    }

    /// Critical path: store, then publish an urgent alert. Both are always
    /// attempted in that order; a failure in either turns the result into an
    /// error without undoing the other.
    async fn escalate(
        &self,
        patient_id: &str,
        check: CriticalCheck,
    ) -> Result<AnalysisResponse, MedicalAgentError> {
        warn!("Critical values detected for patient {}", patient_id);

        let action = check.action.unwrap_or(CriticalAction::EmergencyAppointment);
        let specialist = check.specialist.unwrap_or(Specialist::Endocrinology);
        let reasoning = check.reasoning.clone().unwrap_or_default();

        let record_id = critical_record_id(Utc::now().timestamp_millis());
        let stored = self
            .tools
            .memory
            .store(patient_id, &record_id, serde_json::to_value(&check)?)
            .await;

        let published = self
            .tools
            .events
            .create_event(CreateEventRequest {
                event_type: EventType::Alert,
                patient_id: patient_id.to_string(),
                specialist: specialist.to_string(),
                urgency: Urgency::Urgent,
                reasoning: reasoning.clone(),
            })
            .await;

        let mut failures = Vec::new();
        if !stored.success {
            failures.push(format!(
                "record store: {}",
                stored.error.unwrap_or(stored.message)
            ));
        }
        if !published.is_success() {
            failures.push(format!("event bus: {}", published.message));
        }
        if !failures.is_empty() {
            return Err(MedicalAgentError::tool_failure(failures.join("; ")));
        }

        Ok(AnalysisResponse::CriticalHandled {
            patient_id: patient_id.to_string(),
            action,
            reasoning,
        })
    }
}

pub fn critical_record_id(epoch_millis: i64) -> String {
    format!("critical_{}", epoch_millis)
}
