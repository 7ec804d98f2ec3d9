// Intake field schema, snapshots and the field store.
//
// FieldStore is the only component that touches raw field identities; everything else works
// with snapshots or the typed projections in `models::requests`.

use crate::utils::validation::{validate_value, Constraint, ValidationError};
use crate::wizard::WizardStep;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const PATIENT_ID: &str = "patientId";
pub const PATIENT_AGE: &str = "patientAge";
pub const CANCER_TYPE: &str = "cancerType";
pub const CANCER_STAGE: &str = "cancerStage";
pub const BIO_TP53: &str = "bioTp53";
pub const BIO_EGFR: &str = "bioEgfr";
pub const BIO_P16: &str = "bioP16";
pub const BIO_KI67: &str = "bioKi67";
pub const BIO_CYCLIN: &str = "bioCyclin";
pub const BIO_MMP9: &str = "bioMmp9";
pub const BIO_VEGF: &str = "bioVegf";
pub const BIO_HER2: &str = "bioHer2";
pub const CLINICAL_NOTES: &str = "dataContent";

const CANCER_STAGES: &[&str] = &["I", "II", "III", "IV"];

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub key: &'static str,
    pub label: &'static str,
    pub step: WizardStep,
    pub constraints: Vec<Constraint>,
    /// Multi-line free text (rendered as a larger box in the TUI).
    pub multiline: bool,
}

impl FieldDef {
    fn new(key: &'static str, label: &'static str, step: WizardStep) -> Self {
        Self {
            key,
            label,
            step,
            constraints: Vec::new(),
            multiline: false,
        }
    }

    fn with(mut self, c: Constraint) -> Self {
        self.constraints.push(c);
        self
    }

    fn multiline(mut self) -> Self {
        self.multiline = true;
        self
    }

    pub fn validate(&self, value: &str) -> Result<(), ValidationError> {
        validate_value(self.key, self.label, value, &self.constraints)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    fields: Vec<FieldDef>,
}

impl FieldSchema {
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self { fields }
    }

    /// The OncoPredict intake schema.
    pub fn oncopredict() -> Self {
        use WizardStep::{Biomarkers, Intake};
        Self::new(vec![
            FieldDef::new(PATIENT_ID, "Patient ID", Intake).with(Constraint::Required),
            FieldDef::new(PATIENT_AGE, "Age", Intake)
                .with(Constraint::Required)
                .with(Constraint::Range {
                    min: 1.0,
                    max: 120.0,
                }),
            FieldDef::new(CANCER_TYPE, "Cancer Type", Intake).with(Constraint::Required),
            FieldDef::new(CANCER_STAGE, "Cancer Stage", Intake)
                .with(Constraint::Required)
                .with(Constraint::OneOf(CANCER_STAGES)),
            FieldDef::new(BIO_TP53, "TP53 Status", Biomarkers),
            FieldDef::new(BIO_EGFR, "EGFR Status", Biomarkers),
            FieldDef::new(BIO_P16, "p16 Status", Biomarkers),
            FieldDef::new(BIO_KI67, "Ki-67 Index", Biomarkers).with(Constraint::Range {
                min: 0.0,
                max: 100.0,
            }),
            FieldDef::new(BIO_CYCLIN, "Cyclin D1", Biomarkers),
            FieldDef::new(BIO_MMP9, "MMP-9", Biomarkers),
            FieldDef::new(BIO_VEGF, "VEGF Level", Biomarkers)
                .with(Constraint::AtLeast { min: 0.0 }),
            FieldDef::new(BIO_HER2, "HER2 Status", Biomarkers),
            FieldDef::new(CLINICAL_NOTES, "Clinical Notes", Biomarkers)
                .with(Constraint::Required)
                .multiline(),
        ])
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn fields_for(&self, step: WizardStep) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(move |f| f.step == step)
    }

    /// Step predicate: the first failing field (schema order) is reported.
    /// Steps without fields always pass.
    pub fn validate_step(
        &self,
        step: WizardStep,
        snapshot: &FieldSnapshot,
    ) -> Result<(), ValidationError> {
        for def in self.fields_for(step) {
            def.validate(snapshot.get(def.key))?;
        }
        Ok(())
    }
}

/// Point-in-time copy of all field values.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSnapshot {
    values: BTreeMap<String, String>,
    captured_at: DateTime<Utc>,
}

impl FieldSnapshot {
    pub fn new(values: BTreeMap<String, String>, captured_at: DateTime<Utc>) -> Self {
        Self {
            values,
            captured_at,
        }
    }

    /// Value for `key`; absent keys read as the empty string.
    pub fn get(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Restrict to the schema: every schema key present (missing ones as ""), unknown keys dropped.
    pub fn normalized(&self, schema: &FieldSchema) -> FieldSnapshot {
        let values = schema
            .fields()
            .iter()
            .map(|f| (f.key.to_string(), self.get(f.key).to_string()))
            .collect();
        FieldSnapshot::new(values, self.captured_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("unknown field: {0}")]
    UnknownField(String),
}

/// Typed accessor over the named input values.
#[derive(Debug, Clone)]
pub struct FieldStore {
    schema: Arc<FieldSchema>,
    values: BTreeMap<String, String>,
}

impl FieldStore {
    pub fn new(schema: Arc<FieldSchema>) -> Self {
        let values = empty_values(&schema);
        Self { schema, values }
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), FieldError> {
        match self.values.get_mut(key) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(FieldError::UnknownField(key.to_string())),
        }
    }

    pub fn snapshot(&self, captured_at: DateTime<Utc>) -> FieldSnapshot {
        FieldSnapshot::new(self.values.clone(), captured_at)
    }

    /// Replace all values from `snapshot`, normalized to the schema.
    pub fn apply(&mut self, snapshot: &FieldSnapshot) {
        let normalized = snapshot.normalized(&self.schema);
        self.values = normalized.values().clone();
    }

    pub fn clear(&mut self) {
        self.values = empty_values(&self.schema);
    }

    /// Live, non-blocking message for a single field (None when valid or unknown).
    pub fn field_error(&self, key: &str) -> Option<ValidationError> {
        let def = self.schema.field(key)?;
        def.validate(self.get(key).unwrap_or("")).err()
    }

    /// Populate the fixed illustrative patient.
    pub fn load_demo(&mut self) {
        for (key, value) in DEMO_PATIENT {
            // Demo keys are a subset of the schema; ignore any a custom schema lacks.
            let _ = self.set(key, *value);
        }
    }
}

fn empty_values(schema: &FieldSchema) -> BTreeMap<String, String> {
    schema
        .fields()
        .iter()
        .map(|f| (f.key.to_string(), String::new()))
        .collect()
}

pub const DEMO_PATIENT: &[(&str, &str)] = &[
    (PATIENT_ID, "DEMO_001"),
    (PATIENT_AGE, "58"),
    (CANCER_TYPE, "Oral Carcinoma"),
    (CANCER_STAGE, "III"),
    (BIO_TP53, "Mutated"),
    (BIO_EGFR, "Overexpression"),
    (BIO_P16, "Negative"),
    (BIO_KI67, "82"),
    (BIO_CYCLIN, "7.4"),
    (BIO_MMP9, "7.8"),
    (BIO_VEGF, "7.1"),
    (BIO_HER2, "Negative"),
    (
        CLINICAL_NOTES,
        "A 58-year-old male with a long history of tobacco smoking presented with a non-healing \
ulcerative lesion on the lateral border of the tongue for three months. Clinical examination \
revealed induration and ipsilateral cervical lymph node enlargement. Biopsy confirmed moderately \
differentiated oral squamous cell carcinoma, Stage III. Biomarker analysis showed elevated EGFR \
expression (8.9), TP53 mutation index (7.6), and a high Ki-67 proliferation index (8.2). Cyclin D1 \
was also overexpressed (7.4), along with increased MMP-9 (7.8) and VEGF (7.1) levels, indicating \
strong invasive and angiogenic activity. p16 expression was low (2.3), suggesting a \
non-HPV-associated tumor.",
    ),
];
