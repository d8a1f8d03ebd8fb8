use async_trait::async_trait;
use aws_sdk_eventbridge::{types::PutEventsRequestEntry, Client as EventBridgeClient};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::MedicalAgentError;

/// EventBridge `Source` for every published medical event.
pub const EVENT_SOURCE: &str = "medical.analysis";
/// `source` field stamped into the event detail.
pub const EVENT_ORIGIN: &str = "medical_agent";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Appointment,
    Alert,
    Review,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Appointment => "appointment",
            Self::Alert => "alert",
            Self::Review => "review",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "appointment" => Ok(Self::Appointment),
            "alert" => Ok(Self::Alert),
            "review" => Ok(Self::Review),
            other => Err(format!("unknown event type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Routine,
    Priority,
    Urgent,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Routine => "routine",
            Self::Priority => "priority",
            Self::Urgent => "urgent",
        }
    }

    /// EventBridge `DetailType` for events of this urgency.
    pub fn detail_type(&self) -> &'static str {
        match self {
            Self::Urgent => "Medical Emergency Alert",
            Self::Priority => "Medical Priority Appointment",
            Self::Routine => "Medical Routine Appointment",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "routine" => Ok(Self::Routine),
            "priority" => Ok(Self::Priority),
            "urgent" => Ok(Self::Urgent),
            other => Err(format!("unknown urgency: {}", other)),
        }
    }
}

/// Event detail as published to the bus. Immutable once published.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MedicalEvent {
    pub patient_id: String,
    pub event_type: EventType,
    pub specialist: String,
    pub urgency: Urgency,
    pub reasoning: String,
    pub created_at: String,
    pub source: String,
}

/// Arguments of the `createEvent` tool.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CreateEventRequest {
    pub event_type: EventType,
    pub patient_id: String,
    pub specialist: String,
    pub urgency: Urgency,
    pub reasoning: String,
}

impl CreateEventRequest {
    pub fn into_event(self, now: DateTime<Utc>) -> MedicalEvent {
        MedicalEvent {
            patient_id: self.patient_id,
            event_type: self.event_type,
            specialist: self.specialist,
            urgency: self.urgency,
            reasoning: self.reasoning,
            created_at: now.to_rfc3339(),
            source: EVENT_ORIGIN.to_string(),
        }
    }
}

/// Publish-only event channel.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publishes a single entry and returns the bus-assigned event id, if any.
    async fn put_event(
        &self,
        detail_type: &str,
        detail: String,
    ) -> Result<Option<String>, MedicalAgentError>;
}

pub struct EventBridgeBus {
    client: EventBridgeClient,
    bus_name: String,
}

impl EventBridgeBus {
    pub fn new(client: EventBridgeClient, bus_name: impl Into<String>) -> Self {
        Self {
            client,
            bus_name: bus_name.into(),
        }
    }
}

#[async_trait]
impl EventBus for EventBridgeBus {
    async fn put_event(
        &self,
        detail_type: &str,
        detail: String,
    ) -> Result<Option<String>, MedicalAgentError> {
        let entry = PutEventsRequestEntry::builder()
            .source(EVENT_SOURCE)
            .detail_type(detail_type)
            .detail(detail)
            .event_bus_name(&self.bus_name)
            .build();

        let output = self
            .client
            .put_events()
            .entries(entry)
            .send()
            .await
            .map_err(|e| {
                MedicalAgentError::tool_failure(format!(
                    "put_events on bus {} failed: {}",
                    self.bus_name,
                    aws_sdk_eventbridge::error::DisplayErrorContext(&e)
                ))
            })?;

        let result = output.entries().first();

        if output.failed_entry_count() > 0 {
            let code = result.and_then(|r| r.error_code()).unwrap_or("unknown");
            let message = result.and_then(|r| r.error_message()).unwrap_or("no message");
            return Err(MedicalAgentError::tool_failure(format!(
                "event rejected by bus {}: {} ({})",
                self.bus_name, message, code
            )));
        }

        Ok(result.and_then(|r| r.event_id()).map(str::to_string))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    Success,
    Error,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EventResponse {
    pub status: PublishStatus,
    pub message: String,
    pub event_type: EventType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialist: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
}

impl EventResponse {
    pub fn is_success(&self) -> bool {
        self.status == PublishStatus::Success
    }
}

/// Event publishing as exposed to the agent and the dispatcher. Fire and
/// forget: no retry, failures are reported in the response body.
#[derive(Clone)]
pub struct EventTool {
    bus: Arc<dyn EventBus>,
}

impl EventTool {
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self { bus }
    }

    pub async fn create_event(&self, request: CreateEventRequest) -> EventResponse {
        let event_type = request.event_type;
        let patient_id = request.patient_id.clone();

        if patient_id.trim().is_empty() {
            return Self::failure(event_type, patient_id, "patient_id is required".to_string());
        }

        let event = request.into_event(Utc::now());
        let detail = match serde_json::to_string(&event) {
            Ok(detail) => detail,
            Err(e) => return Self::failure(event_type, patient_id, e.to_string()),
        };

        match self.bus.put_event(event.urgency.detail_type(), detail).await {
            Ok(event_id) => {
                info!(
                    "Published {} event for patient {} ({})",
                    event.event_type, event.patient_id, event.urgency
                );
                EventResponse {
                    status: PublishStatus::Success,
                    message: format!(
                        "Event {} created for patient {}",
                        event.event_type, event.patient_id
                    ),
                    event_type: event.event_type,
                    event_id: Some(event_id.unwrap_or_else(|| "unknown".to_string())),
                    specialist: Some(event.specialist),
                    urgency: Some(event.urgency),
                    patient_id: None,
                }
            }
            Err(e) => {
                error!("Failed to publish {} event: {}", event_type, e);
                Self::failure(event_type, patient_id, e.to_string())
            }
        }
    }

    fn failure(event_type: EventType, patient_id: String, reason: String) -> EventResponse {
        EventResponse {
            status: PublishStatus::Error,
            message: format!("Failed to create event: {}", reason),
            event_type,
            event_id: None,
            specialist: None,
            urgency: None,
            patient_id: Some(patient_id),
        }
    }
}
