use async_trait::async_trait;
use aws_sdk_dynamodb::{types::AttributeValue, Client as DynamoClient};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_dynamo::{from_items, to_item};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::MedicalAgentError;

/// Records expire 30 days after they are written.
pub const MEMORY_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

/// One row in the patient memory table, keyed by `(patient_id, record_id)`.
/// Rows written by other producers may lack the bookkeeping attributes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MemoryRecord {
    pub patient_id: String,
    pub record_id: String,
    #[serde(default)]
    pub data: Value,
    /// Epoch seconds; DynamoDB TTL attribute.
    #[serde(default)]
    pub ttl: i64,
    #[serde(default)]
    pub created_at: String,
}

impl MemoryRecord {
    pub fn new(
        patient_id: impl Into<String>,
        record_id: impl Into<String>,
        data: Value,
        now: DateTime<Utc>,
        ttl_seconds: i64,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            record_id: record_id.into(),
            data,
            ttl: now.timestamp() + ttl_seconds,
            created_at: now.to_rfc3339(),
        }
    }
}

/// Key-value persistence for patient records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Writes the record, replacing any existing one with the same key.
    async fn put_record(&self, record: MemoryRecord) -> Result<(), MedicalAgentError>;

    /// All records for `patient_id`, optionally narrowed to one `record_id`.
    async fn query_records(
        &self,
        patient_id: &str,
        record_id: Option<String>,
    ) -> Result<Vec<MemoryRecord>, MedicalAgentError>;
}

pub struct DynamoRecordStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoRecordStore {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }
}

#[async_trait]
impl RecordStore for DynamoRecordStore {
    async fn put_record(&self, record: MemoryRecord) -> Result<(), MedicalAgentError> {
        let item = to_item(&record).map_err(|e| {
            MedicalAgentError::tool_failure(format!("cannot encode record: {}", e))
        })?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| {
                MedicalAgentError::tool_failure(format!(
                    "put_item on {} failed: {}",
                    self.table_name,
                    aws_sdk_dynamodb::error::DisplayErrorContext(&e)
                ))
            })?;

        Ok(())
    }

    async fn query_records(
        &self,
        patient_id: &str,
        record_id: Option<String>,
    ) -> Result<Vec<MemoryRecord>, MedicalAgentError> {
        let key_condition = if record_id.is_some() {
            "patient_id = :patient_id AND record_id = :record_id"
        } else {
            "patient_id = :patient_id"
        };

        let mut records = Vec::new();
        let mut last_evaluated_key = None;

        loop {
            let mut query = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression(key_condition)
                .expression_attribute_values(
                    ":patient_id",
                    AttributeValue::S(patient_id.to_string()),
                );

            if let Some(record_id) = &record_id {
                query = query
                    .expression_attribute_values(":record_id", AttributeValue::S(record_id.clone()));
            }

            if let Some(key) = last_evaluated_key {
                query = query.set_exclusive_start_key(Some(key));
            }

            let result = query.send().await.map_err(|e| {
                MedicalAgentError::tool_failure(format!(
                    "query on {} failed: {}",
                    self.table_name,
                    aws_sdk_dynamodb::error::DisplayErrorContext(&e)
                ))
            })?;

            if let Some(items) = result.items {
                let page: Vec<MemoryRecord> = from_items(items).map_err(|e| {
                    MedicalAgentError::tool_failure(format!("cannot decode records: {}", e))
                })?;
                records.extend(page);
            }

            if result.last_evaluated_key.is_none() {
                break;
            }

            last_evaluated_key = result.last_evaluated_key;
        }

        Ok(records)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MemoryResponse {
    pub success: bool,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<MemoryRecord>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MemoryResponse {
    fn failure(message: String, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message,
            records: None,
            count: None,
            error: Some(error.into()),
        }
    }
}

/// Record store operations as exposed to the agent and the dispatcher.
/// Never returns an error: failures are reported in the response body.
#[derive(Clone)]
pub struct MemoryTool {
    store: Arc<dyn RecordStore>,
}

impl MemoryTool {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn store(&self, patient_id: &str, record_id: &str, data: Value) -> MemoryResponse {
        self.store_at(patient_id, record_id, data, Utc::now()).await
    }

    pub async fn store_at(
        &self,
        patient_id: &str,
        record_id: &str,
        data: Value,
        now: DateTime<Utc>,
    ) -> MemoryResponse {
        let failed = format!("Failed to store record for patient {}", patient_id);

        if patient_id.trim().is_empty() {
            return MemoryResponse::failure(failed, "patient_id is required");
        }
        if record_id.trim().is_empty() || data.is_null() {
            return MemoryResponse::failure(
                failed,
                "record_id and data are required for store action",
            );
        }

        let record = MemoryRecord::new(patient_id, record_id, data, now, MEMORY_TTL_SECONDS);

        match self.store.put_record(record).await {
            Ok(()) => {
                info!("Stored record {} for patient {}", record_id, patient_id);
                MemoryResponse {
                    success: true,
                    message: format!(
                        "Successfully stored record {} for patient {}",
                        record_id, patient_id
                    ),
                    records: None,
                    count: None,
                    error: None,
                }
            }
            Err(e) => {
                error!("Failed to store record {}: {}", record_id, e);
                MemoryResponse::failure(failed, e.to_string())
            }
        }
    }

    pub async fn retrieve(&self, patient_id: &str, record_id: Option<&str>) -> MemoryResponse {
        let failed = format!("Failed to retrieve record for patient {}", patient_id);

        if patient_id.trim().is_empty() {
            return MemoryResponse::failure(failed, "patient_id is required");
        }

        let record_id = record_id.filter(|id| !id.is_empty()).map(str::to_string);

        match self.store.query_records(patient_id, record_id).await {
            Ok(records) => {
                let count = records.len();
                info!("Found {} record(s) for patient {}", count, patient_id);
                MemoryResponse {
                    success: true,
                    message: format!("Found {} record(s) for patient {}", count, patient_id),
                    records: Some(records),
                    count: Some(count),
                    error: None,
                }
            }
            Err(e) => {
                error!("Failed to retrieve records for {}: {}", patient_id, e);
                MemoryResponse::failure(failed, e.to_string())
            }
        }
    }
}
