// Outbound request models and the patient projection captured at analyze time.

use serde::Serialize;
use uuid::Uuid;

use super::fields::{FieldSnapshot, CANCER_STAGE, CANCER_TYPE, CLINICAL_NOTES, PATIENT_AGE, PATIENT_ID};

/// Body of `POST /analyze_risk`. Built once per analyze and never mutated after dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisRequest {
    pub clinical_data: String,
    /// Log-only correlation id; not part of the wire body.
    #[serde(skip)]
    pub correlation_id: Uuid,
}

impl AnalysisRequest {
    pub fn from_snapshot(snapshot: &FieldSnapshot) -> Self {
        Self {
            clinical_data: snapshot.get(CLINICAL_NOTES).to_string(),
            correlation_id: Uuid::new_v4(),
        }
    }
}

/// Read-only patient projection. Immutable once captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientSummary {
    pub id: String,
    pub age: String,
    pub cancer_type: String,
    pub stage: String,
    pub clinical_text: String,
}

impl PatientSummary {
    pub fn from_snapshot(snapshot: &FieldSnapshot) -> Self {
        Self {
            id: snapshot.get(PATIENT_ID).trim().to_string(),
            age: snapshot.get(PATIENT_AGE).trim().to_string(),
            cancer_type: snapshot.get(CANCER_TYPE).trim().to_string(),
            stage: snapshot.get(CANCER_STAGE).trim().to_string(),
            clinical_text: snapshot.get(CLINICAL_NOTES).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fields::{FieldSchema, FieldStore};
    use chrono::Utc;
    use std::sync::Arc;

    #[test]
    fn wire_body_only_carries_clinical_data() {
        let mut fields = FieldStore::new(Arc::new(FieldSchema::oncopredict()));
        fields.set(CLINICAL_NOTES, "notes\nline two").unwrap();
        let req = AnalysisRequest::from_snapshot(&fields.snapshot(Utc::now()));

        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body, serde_json::json!({ "clinical_data": "notes\nline two" }));
    }

    #[test]
    fn summary_projects_intake_fields() {
        let mut fields = FieldStore::new(Arc::new(FieldSchema::oncopredict()));
        fields.load_demo();
        let s = PatientSummary::from_snapshot(&fields.snapshot(Utc::now()));
        assert_eq!(s.id, "DEMO_001");
        assert_eq!(s.age, "58");
        assert_eq!(s.cancer_type, "Oral Carcinoma");
        assert_eq!(s.stage, "III");
        assert!(s.clinical_text.starts_with("A 58-year-old male"));
    }
}
