// Wizard state machine: ordered steps, completion flags and validation gating.

pub mod step;

pub use step::WizardStep;

use crate::models::fields::{FieldSchema, FieldSnapshot};
use crate::utils::validation::ValidationError;
use std::sync::Arc;

pub const NAVIGATION_BLOCKED_MESSAGE: &str = "Please complete the current step first.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Please complete the current step first.")]
    NavigationBlocked {
        requested: WizardStep,
        highest_reached: WizardStep,
    },
}

#[derive(Debug, Clone)]
pub struct WizardController {
    schema: Arc<FieldSchema>,
    current: WizardStep,
    highest_reached: WizardStep,
    completed: [bool; WizardStep::ALL.len()],
}

impl WizardController {
    pub fn new(schema: Arc<FieldSchema>) -> Self {
        Self {
            schema,
            current: WizardStep::FIRST,
            highest_reached: WizardStep::FIRST,
            completed: [false; WizardStep::ALL.len()],
        }
    }

    pub fn current(&self) -> WizardStep {
        self.current
    }

    pub fn highest_reached(&self) -> WizardStep {
        self.highest_reached
    }

    pub fn is_completed(&self, step: WizardStep) -> bool {
        self.completed[step.index()]
    }

    /// Validate the current step and move forward one step.
    ///
    /// On failure the state is left untouched. At `Done` this is a no-op.
    pub fn advance(&mut self, snapshot: &FieldSnapshot) -> Result<WizardStep, WizardError> {
        let Some(next) = self.current.next() else {
            return Ok(self.current);
        };
        self.schema.validate_step(self.current, snapshot)?;
        self.completed[self.current.index()] = true;
        self.move_to(next);
        Ok(self.current)
    }

    /// Step back one page without validation.
    pub fn retreat(&mut self) -> WizardStep {
        if let Some(prev) = self.current.prev() {
            self.current = prev;
        }
        self.current
    }

    /// Jump to any step already reached.
    pub fn jump_to(&mut self, step: WizardStep) -> Result<WizardStep, WizardError> {
        if step > self.highest_reached {
            return Err(WizardError::NavigationBlocked {
                requested: step,
                highest_reached: self.highest_reached,
            });
        }
        self.current = step;
        Ok(self.current)
    }

    /// Show published results: every step before Results counts as completed.
    pub fn enter_results(&mut self) {
        for step in WizardStep::ALL {
            if step < WizardStep::Results {
                self.completed[step.index()] = true;
            }
        }
        self.move_to(WizardStep::Results);
    }

    pub fn reset(&mut self) {
        self.current = WizardStep::FIRST;
        self.highest_reached = WizardStep::FIRST;
        self.completed = [false; WizardStep::ALL.len()];
    }

    fn move_to(&mut self, step: WizardStep) {
        self.current = step;
        if step > self.highest_reached {
            self.highest_reached = step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fields::{FieldStore, CANCER_STAGE, CLINICAL_NOTES, PATIENT_ID};
    use chrono::Utc;

    fn setup() -> (WizardController, FieldStore) {
        let schema = Arc::new(FieldSchema::oncopredict());
        (
            WizardController::new(schema.clone()),
            FieldStore::new(schema),
        )
    }

    #[test]
    fn failing_predicate_leaves_state_unchanged() {
        let (mut wc, fields) = setup();
        let err = wc.advance(&fields.snapshot(Utc::now())).unwrap_err();
        match err {
            WizardError::Validation(v) => assert_eq!(v.label, "Patient ID"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(wc.current(), WizardStep::Intake);
        assert_eq!(wc.highest_reached(), WizardStep::Intake);
        assert!(!wc.is_completed(WizardStep::Intake));
    }

    #[test]
    fn stage_outside_enumeration_blocks_intake() {
        let (mut wc, mut fields) = setup();
        fields.load_demo();
        fields.set(CANCER_STAGE, "V").unwrap();
        let err = wc.advance(&fields.snapshot(Utc::now())).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cancer Stage must be one of I, II, III, IV"
        );
    }

    #[test]
    fn advance_marks_completion_and_tracks_highest() {
        let (mut wc, mut fields) = setup();
        fields.load_demo();
        let snap = fields.snapshot(Utc::now());

        assert_eq!(wc.advance(&snap).unwrap(), WizardStep::Biomarkers);
        assert!(wc.is_completed(WizardStep::Intake));
        assert_eq!(wc.highest_reached(), WizardStep::Biomarkers);

        assert_eq!(wc.retreat(), WizardStep::Intake);
        assert_eq!(wc.highest_reached(), WizardStep::Biomarkers);
        assert_eq!(wc.retreat(), WizardStep::Intake);
    }

    #[test]
    fn biomarkers_step_requires_clinical_notes() {
        let (mut wc, mut fields) = setup();
        fields.load_demo();
        fields.set(CLINICAL_NOTES, "  ").unwrap();
        let snap = fields.snapshot(Utc::now());
        wc.advance(&snap).unwrap();
        let err = wc.advance(&snap).unwrap_err();
        assert_eq!(err.to_string(), "Clinical Notes must be non-empty");
        assert_eq!(wc.current(), WizardStep::Biomarkers);
    }

    #[test]
    fn jump_beyond_highest_is_blocked() {
        let (mut wc, _) = setup();
        let err = wc.jump_to(WizardStep::Results).unwrap_err();
        assert_eq!(err.to_string(), NAVIGATION_BLOCKED_MESSAGE);
        assert_eq!(wc.current(), WizardStep::Intake);
    }

    #[test]
    fn jump_back_to_reached_step_is_allowed() {
        let (mut wc, mut fields) = setup();
        fields.load_demo();
        let snap = fields.snapshot(Utc::now());
        wc.advance(&snap).unwrap();
        wc.jump_to(WizardStep::Intake).unwrap();
        assert_eq!(wc.jump_to(WizardStep::Biomarkers).unwrap(), WizardStep::Biomarkers);
    }

    #[test]
    fn advance_at_done_is_noop() {
        let (mut wc, mut fields) = setup();
        fields.load_demo();
        let snap = fields.snapshot(Utc::now());
        for _ in 0..10 {
            wc.advance(&snap).unwrap();
        }
        assert_eq!(wc.current(), WizardStep::Done);
        assert_eq!(wc.advance(&snap).unwrap(), WizardStep::Done);
    }

    #[test]
    fn enter_results_and_reset() {
        let (mut wc, mut fields) = setup();
        fields.set(PATIENT_ID, "P-1").unwrap();
        wc.enter_results();
        assert_eq!(wc.current(), WizardStep::Results);
        assert!(wc.is_completed(WizardStep::Biomarkers));
        assert!(!wc.is_completed(WizardStep::Results));
        assert_eq!(wc.highest_reached(), WizardStep::Results);

        wc.reset();
        assert_eq!(wc.current(), WizardStep::Intake);
        assert_eq!(wc.highest_reached(), WizardStep::Intake);
        assert!(!wc.is_completed(WizardStep::Intake));
    }
}
