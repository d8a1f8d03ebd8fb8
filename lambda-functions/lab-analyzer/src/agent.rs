use async_trait::async_trait;
use aws_sdk_bedrockruntime::{
    types::{
        ContentBlock, ConversationRole, Message, StopReason, SystemContentBlock, Tool,
        ToolConfiguration, ToolInputSchema, ToolResultBlock, ToolResultContentBlock,
        ToolResultStatus, ToolSpecification, ToolUseBlock,
    },
    Client as BedrockClient,
};
use aws_smithy_types::{Document, Number};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::error::MedicalAgentError;
use crate::prompts::MEDICAL_AGENT_INSTRUCTIONS;
use crate::tools::AgentTools;

/// A tool-using language model. Treated as opaque: given a prompt and the
/// callable tools, it returns free text and may call the tools any number of
/// times in any order.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str, tools: &AgentTools) -> Result<String, MedicalAgentError>;
}

/// Bedrock Converse API agent loop.
pub struct BedrockAgent {
    client: BedrockClient,
    model_id: String,
    instructions: String,
    max_turns: usize,
}

impl BedrockAgent {
    pub fn new(client: BedrockClient, model_id: impl Into<String>, max_turns: usize) -> Self {
        Self {
            client,
            model_id: model_id.into(),
            instructions: MEDICAL_AGENT_INSTRUCTIONS.to_string(),
            max_turns,
        }
    }

    fn tool_config(tools: &AgentTools) -> Result<ToolConfiguration, MedicalAgentError> {
        let mut builder = ToolConfiguration::builder();
        for spec in tools.specs() {
            let specification = ToolSpecification::builder()
                .name(spec.name)
                .description(spec.description)
                .input_schema(ToolInputSchema::Json(json_to_document(&spec.input_schema)))
                .build()
                .map_err(build_error)?;
            builder = builder.tools(Tool::ToolSpec(specification));
        }
        builder.build().map_err(build_error)
    }

    async fn run_tool(tools: &AgentTools, tool_use: &ToolUseBlock) -> Result<ContentBlock, MedicalAgentError> {
        let outcome = tools
            .invoke(tool_use.name(), document_to_json(tool_use.input()))
            .await;

        let status = if outcome.success {
            ToolResultStatus::Success
        } else {
            ToolResultStatus::Error
        };

        let result = ToolResultBlock::builder()
            .tool_use_id(tool_use.tool_use_id())
            .content(ToolResultContentBlock::Json(json_to_document(&outcome.output)))
            .status(status)
            .build()
            .map_err(build_error)?;

        Ok(ContentBlock::ToolResult(result))
    }
}

#[async_trait]
impl LanguageModel for BedrockAgent {
    async fn generate(&self, prompt: &str, tools: &AgentTools) -> Result<String, MedicalAgentError> {
        let tool_config = Self::tool_config(tools)?;

        let mut messages = vec![Message::builder()
            .role(ConversationRole::User)
            .content(ContentBlock::Text(prompt.to_string()))
            .build()
            .map_err(build_error)?];

        for turn in 1..=self.max_turns {
            let output = self
                .client
                .converse()
                .model_id(&self.model_id)
                .system(SystemContentBlock::Text(self.instructions.clone()))
                .set_messages(Some(messages.clone()))
                .tool_config(tool_config.clone())
                .send()
                .await
                .map_err(|e| {
                    MedicalAgentError::upstream(format!(
                        "converse with {} failed: {}",
                        self.model_id,
                        aws_sdk_bedrockruntime::error::DisplayErrorContext(&e)
                    ))
                })?;

            let stop_reason = output.stop_reason().clone();
            let reply = output
                .output()
                .and_then(|o| o.as_message().ok())
                .cloned()
                .ok_or_else(|| MedicalAgentError::upstream("model returned no message"))?;

            let tool_uses: Vec<ToolUseBlock> = reply
                .content()
                .iter()
                .filter_map(|block| block.as_tool_use().ok())
                .cloned()
                .collect();

            info!(
                "Agent turn {} finished with {:?}, {} tool call(s)",
                turn,
                stop_reason,
                tool_uses.len()
            );

            if stop_reason != StopReason::ToolUse || tool_uses.is_empty() {
                return Ok(final_text(&reply));
            }

            messages.push(reply);

            let mut results = Vec::with_capacity(tool_uses.len());
            for tool_use in &tool_uses {
                results.push(Self::run_tool(tools, tool_use).await?);
            }

            messages.push(
                Message::builder()
                    .role(ConversationRole::User)
                    .set_content(Some(results))
                    .build()
                    .map_err(build_error)?,
            );
        }

        warn!("Agent did not finish within {} turns", self.max_turns);
        Err(MedicalAgentError::upstream(format!(
            "agent did not finish within {} turns",
            self.max_turns
        )))
    }
}

fn build_error(e: aws_sdk_bedrockruntime::error::BuildError) -> MedicalAgentError {
    MedicalAgentError::upstream(format!("invalid model request: {}", e))
}

fn final_text(message: &Message) -> String {
    message
        .content()
        .iter()
        .filter_map(|block| block.as_text().ok())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn json_to_document(value: &Value) -> Document {
    match value {
        Value::Null => Document::Null,
        Value::Bool(b) => Document::Bool(*b),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Document::Number(Number::PosInt(u))
            } else if let Some(i) = n.as_i64() {
                Document::Number(Number::NegInt(i))
            } else {
                Document::Number(Number::Float(n.as_f64().unwrap_or_default()))
            }
        }
        Value::String(s) => Document::String(s.clone()),
        Value::Array(items) => Document::Array(items.iter().map(json_to_document).collect()),
        Value::Object(map) => Document::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_document(v)))
                .collect::<HashMap<_, _>>(),
        ),
    }
}

pub fn document_to_json(document: &Document) -> Value {
    match document {
        Document::Null => Value::Null,
        Document::Bool(b) => Value::Bool(*b),
        Document::Number(Number::PosInt(u)) => Value::from(*u),
        Document::Number(Number::NegInt(i)) => Value::from(*i),
        Document::Number(Number::Float(f)) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Document::String(s) => Value::String(s.clone()),
        Document::Array(items) => Value::Array(items.iter().map(document_to_json).collect()),
        Document::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), document_to_json(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_conversion_preserves_tool_input() {
        let input = json!({
            "action": "store",
            "patient_id": "P-5",
            "record_id": "analysis_1",
            "data": {"glucose": 118, "delta": -4, "hba1c": 6.9, "flags": [true, null]}
        });

        assert_eq!(document_to_json(&json_to_document(&input)), input);
    }

    #[test]
    fn test_number_variants() {
        assert!(matches!(json_to_document(&json!(7)), Document::Number(Number::PosInt(7))));
        assert!(matches!(json_to_document(&json!(-7)), Document::Number(Number::NegInt(-7))));
        assert!(matches!(json_to_document(&json!(1.5)), Document::Number(Number::Float(_))));
        assert_eq!(document_to_json(&Document::Number(Number::Float(f64::NAN))), Value::Null);
    }

    #[test]
    fn test_final_text_joins_text_blocks() {
        let message = Message::builder()
            .role(ConversationRole::Assistant)
            .content(ContentBlock::Text("Summary:".to_string()))
            .content(ContentBlock::Text("values stable".to_string()))
            .build()
            .unwrap();
        assert_eq!(final_text(&message), "Summary:\nvalues stable");
    }
}
