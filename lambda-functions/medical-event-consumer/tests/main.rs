use async_trait::async_trait;
use chrono::TimeZone;
use lab_analyzer::{MedicalAgentError, MemoryRecord, RecordStore};
use lambda_runtime::{Context, LambdaEvent};
use medical_event_consumer::{EventNotice, MedicalEventConsumer, Request, APPOINTMENT_TTL_SECONDS};
use mockall::mock;
use serde_json::json;
use std::sync::Arc;

mock! {
    pub Store {}

    #[async_trait]
    impl RecordStore for Store {
        async fn put_record(&self, record: MemoryRecord) -> Result<(), MedicalAgentError>;
        async fn query_records(
            &self,
            patient_id: &str,
            record_id: Option<String>,
        ) -> Result<Vec<MemoryRecord>, MedicalAgentError>;
    }
}

fn request(event_type: &str, urgency: &str) -> Request {
    serde_json::from_value(json!({
        "source": "medical.analysis",
        "detail-type": "Medical Priority Appointment",
        "detail": {
            "patient_id": "P-700",
            "event_type": event_type,
            "specialist": "cardiologista",
            "urgency": urgency,
            "reasoning": "LDL 210mg/dL",
            "created_at": "2025-01-06T12:00:00+00:00",
            "source": "medical_agent"
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn test_appointment_event_returns_plan() {
    let response = MedicalEventConsumer::new()
        .handle(request("appointment", "priority"))
        .await;

    assert_eq!(response.status, "success");
    assert_eq!(
        response.message,
        "appointment processed successfully for patient P-700"
    );
    let plan = response.appointment.unwrap();
    assert_eq!(plan.priority, "HIGH - Within 1-7 days");
    assert!(plan.appointment_id.starts_with("APT-P-700-"));
}

#[tokio::test]
async fn test_alert_and_review_are_logging_only() {
    let mut store = MockStore::new();
    store.expect_put_record().never();
    let consumer = MedicalEventConsumer::with_appointment_store(Arc::new(store));

    for event_type in ["alert", "review"] {
        let response = consumer.handle(request(event_type, "urgent")).await;
        assert_eq!(response.status, "success");
        assert_eq!(response.event_type.as_deref(), Some(event_type));
        assert_eq!(response.urgency.as_deref(), Some("urgent"));
        assert_eq!(response.specialist.as_deref(), Some("cardiologista"));
        assert!(response.appointment.is_none());
    }
}

#[tokio::test]
async fn test_unknown_event_type_is_ignored() {
    let response = MedicalEventConsumer::new()
        .handle(request("discharge", "routine"))
        .await;

    assert_eq!(response.status, "success");
    assert!(response.appointment.is_none());
    assert_eq!(response.event_type.as_deref(), Some("discharge"));
}

#[tokio::test]
async fn test_alert_with_null_fields_is_processed() {
    let request: Request = serde_json::from_value(json!({
        "detail": {
            "patient_id": "P-701",
            "event_type": "alert",
            "specialist": null,
            "urgency": null
        }
    }))
    .unwrap();

    let response = MedicalEventConsumer::new().handle(request).await;

    assert_eq!(response.status, "success");
    assert_eq!(response.message, "alert processed successfully for patient P-701");
    assert_eq!(response.specialist.as_deref(), Some(""));
    assert!(response.appointment.is_none());
}

#[tokio::test]
async fn test_missing_detail_is_an_error() {
    let request: Request = serde_json::from_value(json!({"source": "medical.analysis"})).unwrap();
    let response = MedicalEventConsumer::new().handle(request).await;

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json, json!({"status": "error", "message": "Event data missing"}));
}

#[tokio::test]
async fn test_appointment_persisted_when_store_configured() {
    let now = chrono::Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();

    let mut store = MockStore::new();
    store
        .expect_put_record()
        .withf(move |record| {
            record.patient_id == "P-700"
                && record.record_id == format!("appointment_APT-P-700-{}", now.timestamp())
                && record.ttl == now.timestamp() + APPOINTMENT_TTL_SECONDS
                && record.data["status"] == json!("scheduled")
                && record.data["scheduled_date"] == json!("2025-03-01T10:00:00+00:00")
        })
        .times(1)
        .returning(|_| Ok(()));

    let consumer = MedicalEventConsumer::with_appointment_store(Arc::new(store));
    let notice: EventNotice = request("appointment", "urgent").detail.unwrap();
    let plan = consumer.handle_appointment(&notice, now).await;

    assert_eq!(plan.priority, "EMERGENCY - Within 24 hours");
}

#[tokio::test]
async fn test_persistence_failure_does_not_fail_event() {
    let mut store = MockStore::new();
    store
        .expect_put_record()
        .times(1)
        .returning(|_| Err(MedicalAgentError::tool_failure("ResourceNotFoundException")));

    let response = MedicalEventConsumer::with_appointment_store(Arc::new(store))
        .handle(request("appointment", "routine"))
        .await;

    assert_eq!(response.status, "success");
    assert!(response.appointment.is_some());
}

#[test]
fn test_lambda_event_parsing() {
    let event = LambdaEvent {
        payload: request("review", "routine"),
        context: Context::default(),
    };

    let notice = event.payload.detail.unwrap();
    assert_eq!(notice.patient_id, "P-700");
    assert_eq!(notice.source, "medical_agent");
}
