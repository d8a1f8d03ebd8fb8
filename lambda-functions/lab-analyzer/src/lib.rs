pub mod agent;
pub mod blob;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod lab_data;
pub mod memory;
pub mod prompts;
pub mod tools;

pub use agent::{BedrockAgent, LanguageModel};
pub use blob::{BlobStore, S3BlobStore};
pub use config::AnalyzerConfig;
pub use dispatcher::{AnalysisResponse, LabEventDispatcher};
pub use error::MedicalAgentError;
pub use evaluator::{evaluate, CriticalAction, CriticalCheck, Specialist};
pub use events::{
    CreateEventRequest, EventBridgeBus, EventBus, EventResponse, EventTool, EventType,
    MedicalEvent, Urgency,
};
pub use lab_data::{LabData, LabEvent};
pub use memory::{DynamoRecordStore, MemoryRecord, MemoryResponse, MemoryTool, RecordStore};
pub use tools::{AgentTools, ToolOutcome};
