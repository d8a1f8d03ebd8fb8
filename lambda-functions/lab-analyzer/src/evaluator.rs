use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::lab_data::LabData;

pub const GLUCOSE_HIGH_MG_DL: f64 = 300.0;
pub const GLUCOSE_LOW_MG_DL: f64 = 50.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CriticalAction {
    EmergencyAppointment,
}

impl fmt::Display for CriticalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmergencyAppointment => write!(f, "emergency_appointment"),
        }
    }
}

/// Specialists the agent may route to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Specialist {
    #[serde(rename = "endocrinologista")]
    Endocrinology,
    #[serde(rename = "cardiologista")]
    Cardiology,
    #[serde(rename = "nefrologista")]
    Nephrology,
    #[serde(rename = "generalist")]
    Generalist,
}

impl Specialist {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Endocrinology => "endocrinologista",
            Self::Cardiology => "cardiologista",
            Self::Nephrology => "nefrologista",
            Self::Generalist => "generalist",
        }
    }
}

impl fmt::Display for Specialist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the deterministic pre-screen. The optional fields are only set
/// when `is_critical` is true.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CriticalCheck {
    pub is_critical: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<CriticalAction>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialist: Option<Specialist>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl CriticalCheck {
    pub fn not_critical() -> Self {
        Self {
            is_critical: false,
            action: None,
            specialist: None,
            reasoning: None,
        }
    }

    fn critical(specialist: Specialist, reasoning: String) -> Self {
        Self {
            is_critical: true,
            action: Some(CriticalAction::EmergencyAppointment),
            specialist: Some(specialist),
            reasoning: Some(reasoning),
        }
    }
}

/// Reads `lab_results.<analyte>.value` as a number. Numeric strings are
/// accepted. `None` when the analyte is absent or not numeric.
pub fn analyte_value(lab_data: &LabData, analyte: &str) -> Option<f64> {
    match lab_data.lab_results.get(analyte).and_then(|v| v.get("value")) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Glucose pre-screen. Pure; never fails.
///
/// A missing or unreadable glucose value counts as no reading and is never
/// critical; only an actual measurement outside the bounds escalates.
pub fn evaluate(lab_data: &LabData) -> CriticalCheck {
    let Some(glucose) = analyte_value(lab_data, "glucose") else {
        return CriticalCheck::not_critical();
    };

    if glucose > GLUCOSE_HIGH_MG_DL {
        return CriticalCheck::critical(
            Specialist::Endocrinology,
            format!(
                "Critical hyperglycemia: {}mg/dL (>300). Risk of ketoacidosis.",
                glucose
            ),
        );
    }

    if glucose < GLUCOSE_LOW_MG_DL {
        return CriticalCheck::critical(
            Specialist::Endocrinology,
            format!(
                "Severe hypoglycemia: {}mg/dL (<50). Risk of coma.",
                glucose
            ),
        );
    }

    CriticalCheck::not_critical()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_glucose(value: Value) -> LabData {
        serde_json::from_value(json!({
            "patient_id": "P-100",
            "lab_results": {"glucose": {"value": value, "unit": "mg/dL"}}
        }))
        .unwrap()
    }

    #[test]
    fn test_hyperglycemia_is_critical() {
        let check = evaluate(&with_glucose(json!(350)));
        assert!(check.is_critical);
        assert_eq!(check.action, Some(CriticalAction::EmergencyAppointment));
        assert_eq!(check.specialist, Some(Specialist::Endocrinology));
        let reasoning = check.reasoning.unwrap();
        assert!(reasoning.contains("350mg/dL"));
        assert!(reasoning.contains("ketoacidosis"));
    }

    #[test]
    fn test_hypoglycemia_is_critical() {
        let check = evaluate(&with_glucose(json!(42.5)));
        assert!(check.is_critical);
        assert_eq!(check.specialist, Some(Specialist::Endocrinology));
        let reasoning = check.reasoning.unwrap();
        assert!(reasoning.contains("42.5mg/dL"));
        assert!(reasoning.contains("coma"));
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        assert!(!evaluate(&with_glucose(json!(300))).is_critical);
        assert!(!evaluate(&with_glucose(json!(50))).is_critical);
        assert!(evaluate(&with_glucose(json!(300.1))).is_critical);
        assert!(evaluate(&with_glucose(json!(49.9))).is_critical);
    }

    #[test]
    fn test_sweep_matches_rule() {
        for g in -10..=400 {
            let check = evaluate(&with_glucose(json!(g)));
            assert_eq!(check.is_critical, g > 300 || g < 50, "glucose {}", g);
            if check.is_critical {
                assert_eq!(check.specialist.unwrap().as_str(), "endocrinologista");
            }
        }
    }

    #[test]
    fn test_missing_glucose_is_not_critical() {
        let empty = LabData::default();
        assert_eq!(analyte_value(&empty, "glucose"), None);
        assert_eq!(evaluate(&empty), CriticalCheck::not_critical());

        let other_analytes: LabData = serde_json::from_value(json!({
            "patient_id": "P-101",
            "lab_results": {"creatinine": {"value": 1.1}}
        }))
        .unwrap();
        assert!(!evaluate(&other_analytes).is_critical);
    }

    #[test]
    fn test_malformed_values_are_ignored() {
        assert_eq!(analyte_value(&with_glucose(json!("abc")), "glucose"), None);
        assert_eq!(analyte_value(&with_glucose(json!(null)), "glucose"), None);
        assert_eq!(analyte_value(&with_glucose(json!({"nested": 1})), "glucose"), None);
        assert!(!evaluate(&with_glucose(json!("abc"))).is_critical);
    }

    #[test]
    fn test_numeric_string_is_read() {
        assert_eq!(analyte_value(&with_glucose(json!("320")), "glucose"), Some(320.0));
        assert!(evaluate(&with_glucose(json!(" 320 "))).is_critical);
    }

    #[test]
    fn test_measured_zero_is_critical() {
        assert!(evaluate(&with_glucose(json!(0))).is_critical);
    }

    #[test]
    fn test_not_critical_serialization_is_minimal() {
        let json = serde_json::to_value(CriticalCheck::not_critical()).unwrap();
        assert_eq!(json, json!({"is_critical": false}));
    }

    #[test]
    fn test_critical_serialization() {
        let json = serde_json::to_value(evaluate(&with_glucose(json!(410)))).unwrap();
        assert_eq!(json["is_critical"], true);
        assert_eq!(json["action"], "emergency_appointment");
        assert_eq!(json["specialist"], "endocrinologista");
    }
}
