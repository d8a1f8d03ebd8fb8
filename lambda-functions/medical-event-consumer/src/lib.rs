use chrono::{DateTime, Duration, Utc};
use lab_analyzer::{config::DEFAULT_TABLE_NAME, EventType, MemoryRecord, RecordStore, Urgency};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Appointment records are kept for a year.
pub const APPOINTMENT_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

/// EventBridge envelope delivered to the consumer.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Request {
    #[serde(default)]
    pub detail: Option<EventNotice>,
}

/// Published medical event as received. Fields are lenient so an unknown
/// `event_type` or `urgency` is logged instead of failing deserialization.
/// Absent or null fields read as empty.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct EventNotice {
    #[serde(default, deserialize_with = "text_or_empty")]
    pub patient_id: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub event_type: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub specialist: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub urgency: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub reasoning: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub created_at: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub source: String,
}

fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AppointmentPlan {
    pub appointment_id: String,
    pub patient_id: String,
    pub specialist: String,
    pub urgency: String,
    pub priority: String,
    pub scheduled_date: String,
    pub reasoning: String,
    pub status: String,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Response {
    pub status: String,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialist: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment: Option<AppointmentPlan>,
}

impl Response {
    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            event_type: None,
            urgency: None,
            specialist: None,
            appointment: None,
        }
    }
}

/// Scheduling window label for an urgency value.
pub fn appointment_priority(urgency: &str) -> &'static str {
    match urgency.parse::<Urgency>() {
        Ok(Urgency::Urgent) => "EMERGENCY - Within 24 hours",
        Ok(Urgency::Priority) => "HIGH - Within 1-7 days",
        Ok(Urgency::Routine) => "NORMAL - Within 30-90 days",
        Err(_) => "NORMAL",
    }
}

/// Lead time before the appointment slot. Unknown urgencies are treated as routine.
pub fn appointment_lead_time(urgency: &str) -> Duration {
    match urgency.parse::<Urgency>() {
        Ok(Urgency::Urgent) => Duration::hours(2),
        Ok(Urgency::Priority) => Duration::days(3),
        _ => Duration::days(30),
    }
}

pub fn plan_appointment(notice: &EventNotice, now: DateTime<Utc>) -> AppointmentPlan {
    AppointmentPlan {
        appointment_id: format!("APT-{}-{}", notice.patient_id, now.timestamp()),
        patient_id: notice.patient_id.clone(),
        specialist: notice.specialist.clone(),
        urgency: notice.urgency.clone(),
        priority: appointment_priority(&notice.urgency).to_string(),
        scheduled_date: (now + appointment_lead_time(&notice.urgency)).to_rfc3339(),
        reasoning: notice.reasoning.clone(),
        status: "scheduled".to_string(),
        created_at: now.to_rfc3339(),
    }
}

pub struct MedicalEventConsumer {
    appointments: Option<Arc<dyn RecordStore>>,
}

impl MedicalEventConsumer {
    /// Logging only; nothing is persisted.
    pub fn new() -> Self {
        Self { appointments: None }
    }

    /// Also records planned appointments in the patient memory table.
    pub fn with_appointment_store(store: Arc<dyn RecordStore>) -> Self {
        Self {
            appointments: Some(store),
        }
    }

    pub async fn handle(&self, request: Request) -> Response {
        let Some(notice) = request.detail else {
            error!("No medical event data found in EventBridge event");
            return Response::error("Event data missing");
        };

        info!(
            "Processing {} for patient {}",
            notice.event_type, notice.patient_id
        );
        info!(
            "Specialist: {}, Urgency: {}",
            notice.specialist, notice.urgency
        );
        info!("Reasoning: {}", notice.reasoning);

        let mut appointment = None;

        match notice.event_type.parse::<EventType>() {
            Ok(EventType::Appointment) => {
                appointment = Some(self.handle_appointment(&notice, Utc::now()).await);
            }
            Ok(EventType::Alert) => self.handle_alert(&notice),
            Ok(EventType::Review) => self.handle_review(&notice),
            Err(_) => warn!("Unknown event type: {}", notice.event_type),
        }

        Response {
            status: "success".to_string(),
            message: format!(
                "{} processed successfully for patient {}",
                notice.event_type, notice.patient_id
            ),
            event_type: Some(notice.event_type),
            urgency: Some(notice.urgency),
            specialist: Some(notice.specialist),
            appointment,
        }
    }

    pub async fn handle_appointment(&self, notice: &EventNotice, now: DateTime<Utc>) -> AppointmentPlan {
        info!(
            "APPOINTMENT SCHEDULED patient={} specialist={} urgency={}",
            notice.patient_id, notice.specialist, notice.urgency
        );

        let plan = plan_appointment(notice, now);
        info!(
            "Appointment {} priority set to: {} (slot {})",
            plan.appointment_id, plan.priority, plan.scheduled_date
        );

        if let Some(store) = &self.appointments {
            self.save_appointment(store.as_ref(), &plan, now).await;
        }

        plan
    }

    // A failed save is logged; the event itself was still handled.
    async fn save_appointment(&self, store: &dyn RecordStore, plan: &AppointmentPlan, now: DateTime<Utc>) {
        let data = match serde_json::to_value(plan) {
            Ok(data) => data,
            Err(e) => {
                error!("Cannot encode appointment {}: {}", plan.appointment_id, e);
                return;
            }
        };

        let record = MemoryRecord::new(
            plan.patient_id.clone(),
            format!("appointment_{}", plan.appointment_id),
            data,
            now,
            APPOINTMENT_TTL_SECONDS,
        );

        match store.put_record(record).await {
            Ok(()) => info!("Appointment saved to database: {}", plan.appointment_id),
            Err(e) => error!("Error saving appointment {}: {}", plan.appointment_id, e),
        }
    }

    fn handle_alert(&self, notice: &EventNotice) {
        warn!(
            "MEDICAL ALERT: patient {} requires immediate attention",
            notice.patient_id
        );
        warn!("Specialist needed: {}", notice.specialist);
        warn!("Alert reason: {}", notice.reasoning);
    }

    fn handle_review(&self, notice: &EventNotice) {
        info!(
            "MEDICAL REVIEW: patient {} needs protocol/medication review",
            notice.patient_id
        );
        info!("Reviewing specialist: {}", notice.specialist);
        info!("Review reason: {}", notice.reasoning);
    }
}

impl Default for MedicalEventConsumer {
    fn default() -> Self {
        Self::new()
    }
}

/// `PERSIST_APPOINTMENTS` is on for `true`/`1` (case-insensitive).
pub fn persistence_enabled(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true") | Some("1")
    )
}

/// Table for appointment records, or `None` when persistence is off.
pub fn appointment_table<F>(lookup: F) -> anyhow::Result<Option<String>>
where
    F: Fn(&str) -> Option<String>,
{
    if !persistence_enabled(lookup("PERSIST_APPOINTMENTS").as_deref()) {
        return Ok(None);
    }

    let table_name = lookup("TABLE_NAME").unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string());
    anyhow::ensure!(
        !table_name.trim().is_empty(),
        "TABLE_NAME must not be blank when PERSIST_APPOINTMENTS is set"
    );
    Ok(Some(table_name))
}
