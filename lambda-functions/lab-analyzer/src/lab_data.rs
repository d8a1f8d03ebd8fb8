use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A patient's laboratory snapshot. Built per invocation, never persisted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct LabData {
    /// Numeric ids are accepted and kept in their decimal form.
    #[serde(default, deserialize_with = "scalar_text")]
    pub patient_id: Option<String>,

    #[serde(default, deserialize_with = "scalar_text")]
    pub exam_date: Option<String>,

    /// Analyte name to value object, e.g. `{"glucose": {"value": 95, "unit": "mg/dL"}}`.
    #[serde(default, deserialize_with = "object_or_empty")]
    pub lab_results: Map<String, Value>,

    #[serde(default, deserialize_with = "object_or_empty")]
    pub patient_info: Map<String, Value>,
}

fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// null or a non-object reads as no results
fn object_or_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    })
}

impl LabData {
    /// The patient identifier, if present and non-blank.
    pub fn patient_id(&self) -> Option<&str> {
        self.patient_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }
}

/// Inbound invocation for the analyzer. Either an EventBridge envelope
/// (`detail.lab_data` or an S3 notification in `detail`) or a direct
/// invocation carrying `lab_data` at the top level.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct LabEvent {
    #[serde(default)]
    pub detail: Option<LabEventDetail>,

    #[serde(default)]
    pub lab_data: Option<LabData>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct LabEventDetail {
    #[serde(default)]
    pub lab_data: Option<LabData>,

    #[serde(default)]
    pub bucket: Option<BucketRef>,

    #[serde(default)]
    pub object: Option<ObjectRef>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ObjectRef {
    pub key: String,
}

/// Where the lab payload for an event comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum LabSource {
    Inline(LabData),
    Blob { bucket: String, key: String },
    Missing,
}

impl LabEvent {
    pub fn source(&self) -> LabSource {
        if let Some(detail) = &self.detail {
            if let Some(lab_data) = &detail.lab_data {
                return LabSource::Inline(lab_data.clone());
            }
        }

        if let Some(lab_data) = &self.lab_data {
            return LabSource::Inline(lab_data.clone());
        }

        if let Some(LabEventDetail {
            bucket: Some(bucket),
            object: Some(object),
            ..
        }) = &self.detail
        {
            return LabSource::Blob {
                bucket: bucket.name.clone(),
                key: object.key.clone(),
            };
        }

        LabSource::Missing
    }
}
