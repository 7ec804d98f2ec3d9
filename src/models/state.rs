// Session state (in-memory)
//
// One WizardSession per running wizard, shared via Arc between the TUI loop and spawned tasks.
// The inner mutex is a std mutex and is never held across an await.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::fields::{FieldError, FieldSchema, FieldSnapshot, FieldStore};
use super::requests::PatientSummary;
use super::responses::ResultModel;
use crate::utils::clock::Clock;
use crate::utils::validation::ValidationError;
use crate::wizard::{WizardController, WizardError, WizardStep};

pub struct WizardSession {
    schema: Arc<FieldSchema>,
    inner: Mutex<SessionInner>,
    in_flight: Arc<AtomicBool>,
    clock: Arc<dyn Clock>,
}

struct SessionInner {
    fields: FieldStore,
    controller: WizardController,
    summary: Option<Arc<PatientSummary>>,
    result: Option<Arc<ResultModel>>,
}

/// Held while an analysis is running; dropping it releases the in-flight flag.
#[derive(Debug)]
pub struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl WizardSession {
    pub fn new(schema: Arc<FieldSchema>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(SessionInner {
                fields: FieldStore::new(schema.clone()),
                controller: WizardController::new(schema.clone()),
                summary: None,
                result: None,
            }),
            schema,
            in_flight: Arc::new(AtomicBool::new(false)),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        // A panic while holding the lock cannot leave the data half-written in a way we care about.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Update one field and return the resulting snapshot (for auto-save).
    pub fn set_field(&self, key: &str, value: impl Into<String>) -> Result<FieldSnapshot, FieldError> {
        let now = self.clock.now();
        let mut inner = self.lock();
        inner.fields.set(key, value)?;
        Ok(inner.fields.snapshot(now))
    }

    pub fn field(&self, key: &str) -> String {
        self.lock().fields.get(key).unwrap_or("").to_string()
    }

    pub fn field_error(&self, key: &str) -> Option<ValidationError> {
        self.lock().fields.field_error(key)
    }

    pub fn snapshot(&self) -> FieldSnapshot {
        let now = self.clock.now();
        self.lock().fields.snapshot(now)
    }

    pub fn apply_snapshot(&self, snapshot: &FieldSnapshot) {
        self.lock().fields.apply(snapshot);
    }

    /// Fill the demo patient and return the resulting snapshot.
    pub fn load_demo(&self) -> FieldSnapshot {
        let now = self.clock.now();
        let mut inner = self.lock();
        inner.fields.load_demo();
        inner.fields.snapshot(now)
    }

    pub fn current_step(&self) -> WizardStep {
        self.lock().controller.current()
    }

    pub fn highest_reached(&self) -> WizardStep {
        self.lock().controller.highest_reached()
    }

    pub fn is_completed(&self, step: WizardStep) -> bool {
        self.lock().controller.is_completed(step)
    }

    pub fn advance(&self) -> Result<WizardStep, WizardError> {
        let now = self.clock.now();
        let mut inner = self.lock();
        let snapshot = inner.fields.snapshot(now);
        inner.controller.advance(&snapshot)
    }

    pub fn retreat(&self) -> WizardStep {
        self.lock().controller.retreat()
    }

    pub fn jump_to(&self, step: WizardStep) -> Result<WizardStep, WizardError> {
        self.lock().controller.jump_to(step)
    }

    /// Start over: empty fields, first step, no result.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.fields.clear();
        inner.controller.reset();
        inner.summary = None;
        inner.result = None;
    }

    pub fn publish(&self, summary: PatientSummary, result: ResultModel) -> Arc<ResultModel> {
        let result = Arc::new(result);
        let mut inner = self.lock();
        inner.summary = Some(Arc::new(summary));
        inner.result = Some(result.clone());
        result
    }

    pub fn result(&self) -> Option<Arc<ResultModel>> {
        self.lock().result.clone()
    }

    pub fn summary(&self) -> Option<Arc<PatientSummary>> {
        self.lock().summary.clone()
    }

    pub fn show_results(&self) {
        self.lock().controller.enter_results();
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Acquire the single-flight flag. Returns None when an analysis is already running.
    pub fn try_begin_analysis(&self) -> Option<InFlightGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlightGuard {
                flag: self.in_flight.clone(),
            })
    }
}
