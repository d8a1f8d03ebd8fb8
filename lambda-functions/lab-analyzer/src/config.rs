use anyhow::{Context, Result};
use bon::Builder;

pub const DEFAULT_TABLE_NAME: &str = "medical-agent-memory";
pub const DEFAULT_MODEL_ID: &str = "amazon.nova-micro-v1:0";
pub const DEFAULT_BEDROCK_REGION: &str = "us-east-1";
pub const DEFAULT_EVENT_BUS: &str = "default";
pub const DEFAULT_MAX_TURNS: usize = 8;

/// Settings read once per cold start.
#[derive(Builder, Debug, Clone, PartialEq)]
#[builder(on(String, into))]
pub struct AnalyzerConfig {
    #[builder(default = DEFAULT_TABLE_NAME.to_string())]
    pub table_name: String,

    #[builder(default = DEFAULT_MODEL_ID.to_string())]
    pub model_id: String,

    #[builder(default = DEFAULT_BEDROCK_REGION.to_string())]
    pub bedrock_region: String,

    #[builder(default = DEFAULT_EVENT_BUS.to_string())]
    pub event_bus_name: String,

    #[builder(default = DEFAULT_MAX_TURNS)]
    pub max_agent_turns: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl AnalyzerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source so tests don't
    /// have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_agent_turns = match lookup("AGENT_MAX_TURNS") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("AGENT_MAX_TURNS must be a positive integer, got {:?}", raw))?,
            None => DEFAULT_MAX_TURNS,
        };
        anyhow::ensure!(max_agent_turns > 0, "AGENT_MAX_TURNS must be greater than zero");

        Ok(Self::builder()
            .table_name(lookup("TABLE_NAME").unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()))
            .model_id(lookup("MODEL_ID").unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()))
            .bedrock_region(
                lookup("BEDROCK_REGION").unwrap_or_else(|| DEFAULT_BEDROCK_REGION.to_string()),
            )
            .event_bus_name(lookup("EVENT_BUS_NAME").unwrap_or_else(|| DEFAULT_EVENT_BUS.to_string()))
            .max_agent_turns(max_agent_turns)
            .build())
    }
}
