// Result rendering: a pure projection of a ResultModel into display-ready pieces.
//
// The TUI draws a RenderPlan; the report exporter reads the same plan so both surfaces agree
// on tones, score text and ordering.

pub mod markup;

use crate::models::responses::{ResultModel, RiskLevel};
pub use markup::{Paragraph, Span};

/// Display tone of a badge or classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tone {
    HighAlert,
    Caution,
    Favorable,
    Neutral,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Badge {
    pub label: String,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactorBar {
    pub name: String,
    pub value: f64,
    /// e.g. "30 pts"
    pub value_text: String,
    /// Bar length relative to the largest factor, clamped to 0..=100.
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensitivityRow {
    pub drug: String,
    pub response: String,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    pub badge: Badge,
    pub score_text: String,
    pub factor_bars: Vec<FactorBar>,
    pub drugs: Vec<String>,
    pub explainability: Vec<(String, String)>,
    pub sensitivity: Vec<SensitivityRow>,
    pub analysis_text: String,
    pub valuation: Vec<Paragraph>,
    pub implications: Vec<String>,
    pub methodology: String,
    pub reference_databases: Vec<String>,
}

pub fn render(result: &ResultModel) -> RenderPlan {
    RenderPlan {
        badge: Badge {
            label: result.risk_level.to_string(),
            tone: badge_tone(&result.risk_level),
        },
        score_text: format!("{}%", result.risk_score),
        factor_bars: factor_bars(result),
        drugs: result.drug_options.clone(),
        explainability: result
            .explainability
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        sensitivity: result
            .drug_sensitivity
            .iter()
            .map(|(drug, response)| SensitivityRow {
                drug: drug.clone(),
                response: response.clone(),
                tone: sensitivity_tone(response),
            })
            .collect(),
        analysis_text: result.analysis_text.clone(),
        valuation: markup::parse(&result.biomarker_valuation),
        implications: result
            .major_points
            .iter()
            .chain(result.recommended_next_steps.iter())
            .cloned()
            .collect(),
        methodology: result.methodology.clone(),
        reference_databases: result.reference_databases.clone(),
    }
}

/// Anything other than High or Moderate renders as favorable, unrecognized levels included.
pub fn badge_tone(level: &RiskLevel) -> Tone {
    match level {
        RiskLevel::High => Tone::HighAlert,
        RiskLevel::Moderate => Tone::Caution,
        RiskLevel::Low | RiskLevel::Unrecognized(_) => Tone::Favorable,
    }
}

/// First match wins: "sensitive", then "resistant", then "moderate".
pub fn sensitivity_tone(response: &str) -> Tone {
    let r = response.to_lowercase();
    if r.contains("sensitive") {
        Tone::Favorable
    } else if r.contains("resistant") {
        Tone::HighAlert
    } else if r.contains("moderate") {
        Tone::Caution
    } else {
        Tone::Neutral
    }
}

fn factor_bars(result: &ResultModel) -> Vec<FactorBar> {
    let max = result
        .risk_factors
        .values()
        .copied()
        .fold(0.0_f64, f64::max);
    let scale = if max > 0.0 { max } else { 100.0 };

    result
        .risk_factors
        .iter()
        .map(|(name, &value)| FactorBar {
            name: name.clone(),
            value,
            value_text: format!("{} pts", value),
            percent: (value / scale * 100.0).clamp(0.0, 100.0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model(body: serde_json::Value) -> ResultModel {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn high_risk_plan() {
        let plan = render(&serde_json::from_str(
            r#"{
                "risk_level": "High",
                "risk_score": 82,
                "risk_factors": { "TP53": 30, "Ki-67": 25, "EGFR": 20 },
                "major_points": ["p1", "p2"],
                "recommended_next_steps": ["p2", "s1"]
            }"#,
        )
        .unwrap());

        assert_eq!(plan.badge.tone, Tone::HighAlert);
        assert_eq!(plan.badge.label, "High");
        assert_eq!(plan.score_text, "82%");

        let bars: Vec<(&str, f64, &str)> = plan
            .factor_bars
            .iter()
            .map(|b| (b.name.as_str(), b.percent, b.value_text.as_str()))
            .collect();
        assert_eq!(bars[0], ("TP53", 100.0, "30 pts"));
        assert_eq!(bars[1].0, "Ki-67");
        assert!((bars[1].1 - 83.333).abs() < 0.01);
        assert!((bars[2].1 - 66.666).abs() < 0.01);

        assert_eq!(plan.implications, ["p1", "p2", "p2", "s1"]);
    }

    #[test]
    fn fractional_score_keeps_decimals() {
        let plan = render(&model(json!({ "risk_level": "Low", "risk_score": 41.5 })));
        assert_eq!(plan.score_text, "41.5%");
        assert_eq!(plan.badge.tone, Tone::Favorable);
        assert!(plan.factor_bars.is_empty());
    }

    #[test]
    fn non_positive_factors_scale_against_hundred() {
        let plan = render(&model(json!({
            "risk_level": "Moderate",
            "risk_score": 50,
            "risk_factors": { "A": 0, "B": -5 }
        })));
        assert_eq!(plan.badge.tone, Tone::Caution);
        assert_eq!(plan.factor_bars[0].percent, 0.0);
        assert_eq!(plan.factor_bars[1].percent, 0.0);
        assert_eq!(plan.factor_bars[1].value_text, "-5 pts");
    }

    #[test]
    fn badge_is_case_sensitive_and_catches_unknown_levels() {
        assert_eq!(badge_tone(&RiskLevel::from("high".to_string())), Tone::Favorable);
        assert_eq!(badge_tone(&RiskLevel::from("Critical".to_string())), Tone::Favorable);
    }

    #[test]
    fn sensitivity_first_match_wins() {
        assert_eq!(sensitivity_tone("Highly Sensitive"), Tone::Favorable);
        assert_eq!(sensitivity_tone("Resistant"), Tone::HighAlert);
        assert_eq!(sensitivity_tone("Moderately responsive"), Tone::Caution);
        assert_eq!(sensitivity_tone("Insensitive / resistant"), Tone::Favorable);
        assert_eq!(sensitivity_tone("Unknown"), Tone::Neutral);
    }

    #[test]
    fn narrative_markup_and_extras_carry_through() {
        let plan = render(&model(json!({
            "risk_level": "Low",
            "risk_score": 10,
            "biomarker_valuation": "**EGFR** normal\nno action",
            "explainability": { "Ki-67": "low proliferation" },
            "drug_sensitivity": { "Cisplatin": "Sensitive" },
            "methodology": "Rule-based scoring",
            "reference_databases": ["COSMIC", "TCGA"]
        })));
        assert_eq!(plan.valuation.len(), 2);
        assert!(plan.valuation[0][0].emphasis);
        assert_eq!(plan.explainability[0].0, "Ki-67");
        assert_eq!(plan.sensitivity[0].tone, Tone::Favorable);
        assert_eq!(plan.methodology, "Rule-based scoring");
        assert_eq!(plan.reference_databases.len(), 2);
    }
}
