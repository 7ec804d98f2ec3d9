// Logging utilities
// Structured logging with JSON and human-readable formats

use log::Level;
use serde_json::json;

/// Mask identifying data (patient ids, names) in logs.
pub fn mask_sensitive(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }

    let visible = 4;
    let start: String = chars[..visible].iter().collect();
    let end: String = chars[chars.len() - visible..].iter().collect();

    format!("{}...{}", start, end)
}

/// Free-text clinical notes never go to the log; only their size does.
pub fn describe_clinical_text(text: &str) -> String {
    let n = text.chars().count();
    if n == 0 {
        return "<empty>".to_string();
    }
    format!("<{} chars redacted>", n)
}

/// Parse phase and step from log message
/// Extracts [PHASE: ...] and [STEP: ...] patterns
pub fn parse_log_metadata(message: &str) -> (Option<String>, Option<String>, String) {
    let mut phase = None;
    let mut step = None;
    let mut cleaned_message = message.to_string();

    if let Some((value, rest)) = extract_tag(&cleaned_message, "[PHASE:") {
        phase = Some(value);
        cleaned_message = rest;
    }

    if let Some((value, rest)) = extract_tag(&cleaned_message, "[STEP:") {
        step = Some(value);
        cleaned_message = rest;
    }

    (phase, step, cleaned_message)
}

fn extract_tag(message: &str, tag: &str) -> Option<(String, String)> {
    let start = message.find(tag)?;
    let end = message[start..].find(']')?;
    let value = message[start + tag.len()..start + end].trim().to_string();
    let rest = format!("{} {}", &message[..start], &message[start + end + 1..])
        .trim()
        .to_string();
    Some((value, rest))
}

/// Format log entry as JSON for structured logging
pub fn format_json_log(
    timestamp: &str,
    level: Level,
    target: &str,
    message: &str,
    phase: Option<&str>,
    step: Option<&str>,
) -> String {
    let mut log_entry = json!({
        "timestamp": timestamp,
        "level": level.as_str(),
        "target": target,
        "message": message,
    });

    if let Some(phase) = phase {
        log_entry["phase"] = json!(phase);
    }

    if let Some(step) = step {
        log_entry["step"] = json!(step);
    }

    serde_json::to_string(&log_entry).unwrap_or_else(|_| "{}".to_string())
}

/// Format log entry as human-readable text
pub fn format_human_readable_log(
    timestamp: &str,
    level: Level,
    target: &str,
    message: &str,
    phase: Option<&str>,
    step: Option<&str>,
) -> String {
    let mut log_line = format!("[{}] [{}]", timestamp, level.as_str());

    if let Some(phase) = phase {
        log_line.push_str(&format!(" [PHASE: {}]", phase));
    }

    if let Some(step) = step {
        log_line.push_str(&format!(" [STEP: {}]", step));
    }

    log_line.push_str(&format!(" [{}] {}", target, message));
    log_line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_sensitive_short_values_fully_masked() {
        assert_eq!(mask_sensitive("abc"), "***");
        assert_eq!(mask_sensitive("DEMO_001"), "***");
    }

    #[test]
    fn mask_sensitive_long_values_partially_masked() {
        let masked = mask_sensitive("PATIENT-000123-XYZ");
        assert_eq!(masked, "PATI...-XYZ");
    }

    #[test]
    fn mask_sensitive_handles_multibyte_input() {
        // Must not panic on non-ASCII boundaries.
        assert_eq!(mask_sensitive("ÄÖÜäöüßÄÖÜäöü"), "ÄÖÜä...Üäöü");
    }

    #[test]
    fn clinical_text_is_never_echoed() {
        let d = describe_clinical_text("58-year-old male with TP53 mutation");
        assert!(!d.contains("TP53"), "{}", d);
        assert!(d.contains("35 chars"), "{}", d);
        assert_eq!(describe_clinical_text(""), "<empty>");
    }

    #[test]
    fn parse_log_metadata_extracts_phase_and_step() {
        let (phase, step, msg) =
            parse_log_metadata("[PHASE: analysis] [STEP: dispatch] Sending request");
        assert_eq!(phase.as_deref(), Some("analysis"));
        assert_eq!(step.as_deref(), Some("dispatch"));
        assert_eq!(msg, "Sending request");
    }

    #[test]
    fn parse_log_metadata_without_tags_is_passthrough() {
        let (phase, step, msg) = parse_log_metadata("plain message");
        assert!(phase.is_none());
        assert!(step.is_none());
        assert_eq!(msg, "plain message");
    }

    #[test]
    fn json_log_includes_optional_fields_only_when_present() {
        let line = format_json_log(
            "2026-01-01T00:00:00Z",
            Level::Warn,
            "oncopredict_wizard::persistence",
            "auto-save skipped",
            Some("autosave"),
            None,
        );
        let v: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["level"], "WARN");
        assert_eq!(v["phase"], "autosave");
        assert!(v.get("step").is_none());
    }

    #[test]
    fn human_readable_log_layout() {
        let line = format_human_readable_log(
            "2026-01-01 00:00:00.000",
            Level::Info,
            "tui",
            "Starting",
            Some("tui"),
            Some("start"),
        );
        assert_eq!(
            line,
            "[2026-01-01 00:00:00.000] [INFO] [PHASE: tui] [STEP: start] [tui] Starting"
        );
    }
}
