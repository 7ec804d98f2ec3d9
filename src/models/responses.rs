// Response model returned by the risk analysis service.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk level reported by the service. Unknown strings are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Unrecognized(String),
}

impl RiskLevel {
    pub fn as_str(&self) -> &str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
            RiskLevel::Unrecognized(raw) => raw,
        }
    }
}

impl From<String> for RiskLevel {
    // Case-sensitive on purpose: "high" is not "High".
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "Low" => RiskLevel::Low,
            "Moderate" => RiskLevel::Moderate,
            "High" => RiskLevel::High,
            _ => RiskLevel::Unrecognized(raw),
        }
    }
}

impl From<RiskLevel> for String {
    fn from(level: RiskLevel) -> Self {
        level.as_str().to_string()
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultModel {
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    #[serde(default)]
    pub risk_factors: IndexMap<String, f64>,
    #[serde(default)]
    pub drug_options: Vec<String>,
    #[serde(default)]
    pub explainability: IndexMap<String, String>,
    #[serde(default)]
    pub drug_sensitivity: IndexMap<String, String>,
    #[serde(default)]
    pub analysis_text: String,
    #[serde(default)]
    pub biomarker_valuation: String,
    #[serde(default)]
    pub major_points: Vec<String>,
    #[serde(default)]
    pub recommended_next_steps: Vec<String>,
    #[serde(default)]
    pub methodology: String,
    #[serde(default)]
    pub reference_databases: Vec<String>,
}
