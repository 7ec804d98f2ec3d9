// Input validation utilities
//
// Declarative per-field constraints. A failing field produces a stable message of the form
// "<label> must be <constraint>"; it only gates forward navigation, never typing.

/// A single declarative constraint over a raw field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Value must contain something other than whitespace.
    Required,
    /// Value must parse as a finite number inside `[min, max]`.
    /// Empty values pass (pair with `Required` to forbid them).
    Range { min: f64, max: f64 },
    /// Value must parse as a finite number `>= min`. Empty values pass.
    AtLeast { min: f64 },
    /// Value must be one of the listed options (exact match after trimming). Empty values pass.
    OneOf(&'static [&'static str]),
}

impl Constraint {
    /// Human-readable constraint text used after "<label> must be ".
    pub fn describe(&self) -> String {
        match self {
            Constraint::Required => "non-empty".to_string(),
            Constraint::Range { min, max } => format!("between {} and {}", min, max),
            Constraint::AtLeast { min } => format!("at least {}", min),
            Constraint::OneOf(options) => format!("one of {}", options.join(", ")),
        }
    }

    /// Check `value` against this constraint, returning the constraint text on failure.
    fn check(&self, value: &str) -> Result<(), String> {
        let v = value.trim();
        match self {
            Constraint::Required => {
                if v.is_empty() {
                    return Err(self.describe());
                }
                Ok(())
            }
            Constraint::Range { min, max } => {
                if v.is_empty() {
                    return Ok(());
                }
                let n = parse_number(v)?;
                if n < *min || n > *max {
                    return Err(self.describe());
                }
                Ok(())
            }
            Constraint::AtLeast { min } => {
                if v.is_empty() {
                    return Ok(());
                }
                let n = parse_number(v)?;
                if n < *min {
                    return Err(self.describe());
                }
                Ok(())
            }
            Constraint::OneOf(options) => {
                if v.is_empty() || options.iter().any(|o| *o == v) {
                    return Ok(());
                }
                Err(self.describe())
            }
        }
    }
}

fn parse_number(v: &str) -> Result<f64, String> {
    match v.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err("a number".to_string()),
    }
}

/// Field-scoped, user-correctable validation failure. Never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Schema key of the failing field (e.g. `patientId`).
    pub field: String,
    /// Display label of the failing field (e.g. `Patient ID`).
    pub label: String,
    pub message: String,
}

/// Validate one value against its constraints; the first failing constraint wins.
pub fn validate_value(
    key: &str,
    label: &str,
    value: &str,
    constraints: &[Constraint],
) -> Result<(), ValidationError> {
    for c in constraints {
        if let Err(what) = c.check(value) {
            return Err(ValidationError {
                field: key.to_string(),
                label: label.to_string(),
                message: format!("{} must be {}", label, what),
            });
        }
    }
    Ok(())
}
