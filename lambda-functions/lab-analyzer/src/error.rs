use thiserror::Error;

/// Failures surfaced by the analyzer. None of these escape a handler: the
/// dispatcher and the consumer convert them into `status: "error"` responses.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MedicalAgentError {
    /// No resolvable lab payload, or a payload without a patient identifier.
    #[error("lab data missing: {0}")]
    DataMissing(String),

    /// Record store or event bus transport error.
    #[error("tool failure: {0}")]
    ToolFailure(String),

    /// Model provider or blob storage error.
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),
}

impl MedicalAgentError {
    pub fn data_missing(message: impl Into<String>) -> Self {
        Self::DataMissing(message.into())
    }

    pub fn tool_failure(message: impl Into<String>) -> Self {
        Self::ToolFailure(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamFailure(message.into())
    }
}

impl From<serde_json::Error> for MedicalAgentError {
    fn from(e: serde_json::Error) -> Self {
        Self::DataMissing(format!("malformed JSON payload: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            MedicalAgentError::data_missing("no patient_id").to_string(),
            "lab data missing: no patient_id"
        );
        assert_eq!(
            MedicalAgentError::tool_failure("throttled").to_string(),
            "tool failure: throttled"
        );
        assert_eq!(
            MedicalAgentError::upstream("timeout").to_string(),
            "upstream failure: timeout"
        );
    }

    #[test]
    fn test_json_error_is_data_missing() {
        let err: MedicalAgentError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, MedicalAgentError::DataMissing(_)));
    }
}
