// Report export: a Markdown document with the patient summary and the rendered result.

use chrono::{DateTime, Utc};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::requests::PatientSummary;
use crate::models::responses::ResultModel;
use crate::render::{self, RenderPlan};
use crate::utils::clock::Clock;
use crate::utils::logging::mask_sensitive;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("There is no analysis result to export yet.")]
    NothingToExport,

    #[error("Could not write report to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct ReportExporter {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl ReportExporter {
    pub fn new(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            clock,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `OncoPredict_Report_<id>.md` and return its path. An existing file is replaced.
    pub fn export(
        &self,
        summary: Option<&PatientSummary>,
        result: Option<&ResultModel>,
    ) -> Result<PathBuf, ExportError> {
        let (Some(summary), Some(result)) = (summary, result) else {
            return Err(ExportError::NothingToExport);
        };

        let report_id = format!("REF-{:05}", Uuid::new_v4().as_u128() % 100_000);
        let body = compose(summary, &render::render(result), self.clock.now(), &report_id);
        let path = self.dir.join(report_file_name(&summary.id));

        std::fs::create_dir_all(&self.dir)
            .and_then(|_| std::fs::write(&path, body))
            .map_err(|source| ExportError::Write {
                path: path.clone(),
                source,
            })?;

        info!(
            "[PHASE: export] [STEP: write] Report {} for patient {} written to {:?}",
            report_id,
            mask_sensitive(&summary.id),
            path
        );
        Ok(path)
    }
}

pub fn report_file_name(patient_id: &str) -> String {
    let safe: String = patient_id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = if safe.is_empty() { "unknown".to_string() } else { safe };
    format!("OncoPredict_Report_{}.md", safe)
}

/// Render the report body.
pub fn compose(
    summary: &PatientSummary,
    plan: &RenderPlan,
    generated_at: DateTime<Utc>,
    report_id: &str,
) -> String {
    let mut out = String::new();
    out.push_str("# OncoPredict Risk Assessment Report\n\n");
    out.push_str(&format!("- Report ID: {}\n", report_id));
    out.push_str(&format!(
        "- Generated: {}\n\n",
        generated_at.format("%Y-%m-%d %H:%M UTC")
    ));

    out.push_str("## Patient\n\n");
    out.push_str(&format!("- Patient ID: {}\n", summary.id));
    out.push_str(&format!("- Age: {}\n", summary.age));
    out.push_str(&format!("- Cancer Type: {}\n", summary.cancer_type));
    out.push_str(&format!("- Stage: {}\n\n", summary.stage));

    out.push_str("## Assessment\n\n");
    out.push_str(&format!(
        "**Risk Level: {}** ({})\n\n",
        plan.badge.label.to_uppercase(),
        plan.score_text
    ));
    if !plan.analysis_text.is_empty() {
        out.push_str(&plan.analysis_text);
        out.push_str("\n\n");
    }

    out.push_str("## Biomarker Interpretation\n\n");
    for paragraph in &plan.valuation {
        for span in paragraph {
            if span.emphasis {
                out.push_str(&format!("**{}**", span.text));
            } else {
                out.push_str(&span.text);
            }
        }
        out.push('\n');
    }
    out.push('\n');

    out.push_str("## Suggested Therapies\n\n");
    if plan.drugs.is_empty() {
        out.push_str("- None indicated\n");
    }
    for drug in &plan.drugs {
        out.push_str(&format!("- {}\n", drug));
    }
    out.push('\n');

    out.push_str("## Recommendations\n\n");
    for item in &plan.implications {
        out.push_str(&format!("- {}\n", item));
    }

    if !plan.methodology.is_empty() || !plan.reference_databases.is_empty() {
        out.push_str("\n## Methodology\n\n");
        if !plan.methodology.is_empty() {
            out.push_str(&plan.methodology);
            out.push('\n');
        }
        if !plan.reference_databases.is_empty() {
            out.push_str(&format!(
                "\nReferences: {}\n",
                plan.reference_databases.join(", ")
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::FixedClock;
    use chrono::TimeZone;
    use serde_json::json;

    fn summary(id: &str) -> PatientSummary {
        PatientSummary {
            id: id.to_string(),
            age: "58".to_string(),
            cancer_type: "Oral Carcinoma".to_string(),
            stage: "III".to_string(),
            clinical_text: "notes".to_string(),
        }
    }

    fn result() -> ResultModel {
        serde_json::from_value(json!({
            "risk_level": "High",
            "risk_score": 82,
            "analysis_text": "Aggressive phenotype.",
            "biomarker_valuation": "**TP53** mutated\nKi-67 high",
            "major_points": ["TP53 loss"],
            "recommended_next_steps": ["Refer to tumor board"],
            "methodology": "Weighted biomarker scoring",
            "reference_databases": ["COSMIC", "TCGA"]
        }))
        .unwrap()
    }

    #[test]
    fn compose_includes_all_sections() {
        let at = Utc.with_ymd_and_hms(2026, 7, 1, 14, 5, 0).unwrap();
        let body = compose(&summary("DEMO_001"), &render::render(&result()), at, "REF-00042");

        assert!(body.contains("- Report ID: REF-00042"));
        assert!(body.contains("- Generated: 2026-07-01 14:05 UTC"));
        assert!(body.contains("- Patient ID: DEMO_001"));
        assert!(body.contains("**Risk Level: HIGH** (82%)"));
        assert!(body.contains("**TP53** mutated\nKi-67 high\n"));
        assert!(body.contains("- None indicated"));
        assert!(body.contains("- TP53 loss\n- Refer to tumor board\n"));
        assert!(body.contains("References: COSMIC, TCGA"));
    }

    #[test]
    fn file_name_is_sanitized() {
        assert_eq!(report_file_name("DEMO_001"), "OncoPredict_Report_DEMO_001.md");
        assert_eq!(report_file_name("../etc/x"), "OncoPredict_Report____etc_x.md");
        assert_eq!(report_file_name("  "), "OncoPredict_Report_unknown.md");
    }

    #[test]
    fn export_writes_into_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let clock = Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap()));
        let exporter = ReportExporter::new(tmp.path().join("reports"), clock);

        let path = exporter
            .export(Some(&summary("P-9")), Some(&result()))
            .unwrap();
        assert_eq!(path, tmp.path().join("reports").join("OncoPredict_Report_P-9.md"));
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("# OncoPredict Risk Assessment Report"));
    }

    #[test]
    fn export_without_result_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let exporter = ReportExporter::new(tmp.path(), Arc::new(FixedClock(Utc::now())));
        assert!(matches!(
            exporter.export(Some(&summary("P-1")), None),
            Err(ExportError::NothingToExport)
        ));
    }
}
