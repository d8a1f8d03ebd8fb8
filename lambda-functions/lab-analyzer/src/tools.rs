use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::events::{CreateEventRequest, EventTool};
use crate::memory::MemoryTool;

pub const MEMORY_TOOL: &str = "memory";
pub const CREATE_EVENT_TOOL: &str = "createEvent";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemoryAction {
    Store,
    Retrieve,
}

/// Arguments of the `memory` tool.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MemoryToolInput {
    pub action: MemoryAction,
    pub patient_id: String,
    #[serde(default)]
    pub record_id: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Name, description and JSON schema of a tool offered to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// Result of one tool call, handed back to the model verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub success: bool,
    pub output: Value,
}

impl ToolOutcome {
    fn rejected(message: String) -> Self {
        Self {
            success: false,
            output: json!({ "success": false, "error": message }),
        }
    }
}

/// The callable surface handed to the agent: the record store and the
/// event publisher.
#[derive(Clone)]
pub struct AgentTools {
    pub memory: MemoryTool,
    pub events: EventTool,
}

impl AgentTools {
    pub fn new(memory: MemoryTool, events: EventTool) -> Self {
        Self { memory, events }
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec {
                name: MEMORY_TOOL,
                description: "Store or retrieve medical patient records from memory",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "action": {
                            "type": "string",
                            "enum": ["store", "retrieve"],
                            "description": "Whether to store or retrieve a record"
                        },
                        "patient_id": {
                            "type": "string",
                            "description": "The patient identifier"
                        },
                        "record_id": {
                            "type": "string",
                            "description": "The record identifier (required for store, optional for retrieve)"
                        },
                        "data": {
                            "description": "The medical data to store (required for store action)"
                        }
                    },
                    "required": ["action", "patient_id"]
                }),
            },
            ToolSpec {
                name: CREATE_EVENT_TOOL,
                description: "Create medical events in EventBridge for appointments, alerts, and reviews",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "event_type": {
                            "type": "string",
                            "enum": ["appointment", "alert", "review"],
                            "description": "Type of medical event to create"
                        },
                        "patient_id": {
                            "type": "string",
                            "description": "Patient identifier"
                        },
                        "specialist": {
                            "type": "string",
                            "description": "Recommended specialist for the patient"
                        },
                        "urgency": {
                            "type": "string",
                            "enum": ["routine", "priority", "urgent"],
                            "description": "Urgency level of the event"
                        },
                        "reasoning": {
                            "type": "string",
                            "description": "Justification for the decision and recommendation"
                        }
                    },
                    "required": ["event_type", "patient_id", "specialist", "urgency", "reasoning"]
                }),
            },
        ]
    }

    /// Runs the named tool. Bad input and unknown tools come back as failed
    /// outcomes so the model can correct itself.
    pub async fn invoke(&self, name: &str, input: Value) -> ToolOutcome {
        info!("Agent invoked tool {}", name);

        match name {
            MEMORY_TOOL => {
                let input: MemoryToolInput = match serde_json::from_value(input) {
                    Ok(input) => input,
                    Err(e) => return ToolOutcome::rejected(format!("invalid memory input: {}", e)),
                };
                let response = match input.action {
                    MemoryAction::Store => {
                        self.memory
                            .store(
                                &input.patient_id,
                                input.record_id.as_deref().unwrap_or_default(),
                                input.data.unwrap_or(Value::Null),
                            )
                            .await
                    }
                    MemoryAction::Retrieve => {
                        self.memory
                            .retrieve(&input.patient_id, input.record_id.as_deref())
                            .await
                    }
                };
                ToolOutcome {
                    success: response.success,
                    output: serde_json::to_value(&response).unwrap_or(Value::Null),
                }
            }
            CREATE_EVENT_TOOL => {
                let request: CreateEventRequest = match serde_json::from_value(input) {
                    Ok(request) => request,
                    Err(e) => {
                        return ToolOutcome::rejected(format!("invalid createEvent input: {}", e))
                    }
                };
                let response = self.events.create_event(request).await;
                ToolOutcome {
                    success: response.is_success(),
                    output: serde_json::to_value(&response).unwrap_or(Value::Null),
                }
            }
            other => {
                warn!("Agent requested unknown tool {}", other);
                ToolOutcome::rejected(format!("unknown tool: {}", other))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MedicalAgentError;
    use crate::events::EventBus;
    use crate::memory::{MemoryRecord, RecordStore};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Calls {
        stores: Mutex<Vec<MemoryRecord>>,
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RecordStore for Calls {
        async fn put_record(&self, record: MemoryRecord) -> Result<(), MedicalAgentError> {
            self.stores.lock().unwrap().push(record);
            Ok(())
        }

        async fn query_records(
            &self,
            patient_id: &str,
            _record_id: Option<String>,
        ) -> Result<Vec<MemoryRecord>, MedicalAgentError> {
            Ok(self
                .stores
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.patient_id == patient_id)
                .cloned()
                .collect())
        }
    }

    #[async_trait]
    impl EventBus for Calls {
        async fn put_event(
            &self,
            detail_type: &str,
            _detail: String,
        ) -> Result<Option<String>, MedicalAgentError> {
            self.events.lock().unwrap().push(detail_type.to_string());
            Ok(None)
        }
    }

    fn tools() -> (Arc<Calls>, AgentTools) {
        let calls = Arc::new(Calls::default());
        let tools = AgentTools::new(MemoryTool::new(calls.clone()), EventTool::new(calls.clone()));
        (calls, tools)
    }

    #[test]
    fn test_specs_advertise_both_tools() {
        let (_, tools) = tools();
        let specs = tools.specs();
        let names: Vec<_> = specs.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["memory", "createEvent"]);
        assert_eq!(specs[1].input_schema["required"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_memory_store_then_retrieve() {
        let (calls, tools) = tools();

        let stored = tools
            .invoke(
                "memory",
                json!({"action": "store", "patient_id": "P-1", "record_id": "analysis_1", "data": {"summary": "stable"}}),
            )
            .await;
        assert!(stored.success);
        assert_eq!(calls.stores.lock().unwrap().len(), 1);

        let retrieved = tools
            .invoke("memory", json!({"action": "retrieve", "patient_id": "P-1"}))
            .await;
        assert!(retrieved.success);
        assert_eq!(retrieved.output["count"], 1);
        assert_eq!(retrieved.output["records"][0]["data"]["summary"], "stable");
    }

    #[tokio::test]
    async fn test_memory_store_without_data_fails() {
        let (calls, tools) = tools();
        let outcome = tools
            .invoke("memory", json!({"action": "store", "patient_id": "P-1", "record_id": "r"}))
            .await;
        assert!(!outcome.success);
        assert!(calls.stores.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_event_reports_unknown_event_id() {
        let (calls, tools) = tools();
        let outcome = tools
            .invoke(
                "createEvent",
                json!({
                    "event_type": "review",
                    "patient_id": "P-1",
                    "specialist": "nefrologista",
                    "urgency": "routine",
                    "reasoning": "medication review"
                }),
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.output["event_id"], "unknown");
        assert_eq!(*calls.events.lock().unwrap(), vec!["Medical Routine Appointment"]);
    }

    #[tokio::test]
    async fn test_invalid_enum_is_rejected() {
        let (calls, tools) = tools();
        let outcome = tools
            .invoke(
                "createEvent",
                json!({
                    "event_type": "consult",
                    "patient_id": "P-1",
                    "specialist": "generalist",
                    "urgency": "routine",
                    "reasoning": "x"
                }),
            )
            .await;

        assert!(!outcome.success);
        assert!(outcome.output["error"]
            .as_str()
            .unwrap()
            .starts_with("invalid createEvent input"));
        assert!(calls.events.lock().unwrap().is_empty());

        let bad_action = tools
            .invoke("memory", json!({"action": "delete", "patient_id": "P-1"}))
            .await;
        assert!(!bad_action.success);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (_, tools) = tools();
        let outcome = tools.invoke("deleteRecord", json!({})).await;
        assert!(!outcome.success);
        assert_eq!(outcome.output["error"], "unknown tool: deleteRecord");
    }
}
