//! The "new category" dialog.
//!
//! Typing in the name field re-validates after a pause ([`AdminConfig::validation_debounce`],
//! 300 ms by default) rather than on every keystroke. Enter validates immediately.
//!
//! [`AdminConfig::validation_debounce`]: crate::config::AdminConfig::validation_debounce

use crate::error::{AdminError, ValidationError};
use crate::events::{AdminEvent, AdminEvents};
use crate::model::{validate_create, Category, CategoryCreate, MAX_LEVEL};
use admin_runtime::lifecycle::ComponentLifecycle;
use admin_runtime::scheduler::Debouncer;
use admin_runtime::store::SelectionCoordinator;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// What the dialog opens with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreationPrefill {
    pub level: Option<u8>,
    pub parent: Option<String>,
}

impl CreationPrefill {
    /// Open the dialog for a child of `parent`.
    pub fn child_of(parent: &Category) -> Self {
        Self {
            level: Some(parent.level + 1),
            parent: Some(parent.id.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum CreationOutcome {
    #[default]
    Cancelled,
    Created(Category),
}

#[derive(Default)]
struct Form {
    draft: Mutex<CategoryCreate>,
    feedback: Mutex<Option<ValidationError>>,
    runs: AtomicUsize,
}

impl Form {
    fn check(&self, known: &[Category]) -> Result<CategoryCreate, ValidationError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let draft = lock(&self.draft).clone();
        let result = validate_create(&draft, known);
        *lock(&self.feedback) = result.as_ref().err().cloned();
        result.map(|_| draft)
    }
}

pub struct CreationModal {
    form: Arc<Form>,
    selection: SelectionCoordinator,
    debouncer: Debouncer,
    submitting: AtomicBool,
    events: AdminEvents,
}

impl CreationModal {
    pub fn new(selection: SelectionCoordinator, events: AdminEvents, debounce: Duration) -> Self {
        Self {
            form: Arc::new(Form::default()),
            selection,
            debouncer: Debouncer::new(debounce),
            submitting: AtomicBool::new(false),
            events,
        }
    }

    pub fn draft(&self) -> CategoryCreate {
        lock(&self.form.draft).clone()
    }

    /// Inline feedback from the last validation, if it failed.
    pub fn feedback(&self) -> Option<ValidationError> {
        lock(&self.form.feedback).clone()
    }

    /// How many times the form has been validated.
    pub fn validation_runs(&self) -> usize {
        self.form.runs.load(Ordering::SeqCst)
    }

    pub fn set_name(&self, name: &str) {
        lock(&self.form.draft).name = name.to_string();
        self.schedule_validation();
    }

    pub fn set_level(&self, level: u8) {
        lock(&self.form.draft).level = level;
        self.schedule_validation();
    }

    pub fn set_parent(&self, parent: Option<String>) {
        lock(&self.form.draft).parent = parent;
        self.schedule_validation();
    }

    /// Validate now, dropping any pending debounced run.
    pub fn validate(&self) -> Result<CategoryCreate, ValidationError> {
        self.debouncer.cancel();
        self.form.check(&self.selection.known_categories())
    }

    /// Mark a submission as started. Returns `false` if one is already running.
    pub(crate) fn begin_submit(&self) -> bool {
        self.submitting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn end_submit(&self) {
        self.submitting.store(false, Ordering::SeqCst);
    }

    fn schedule_validation(&self) {
        let form = self.form.clone();
        let selection = self.selection.clone();
        self.debouncer.call(async move {
            if let Err(e) = form.check(&selection.known_categories()) {
                debug!(field = e.field(), error = %e, "Creation form invalid");
            }
        });
    }
}

#[async_trait]
impl ComponentLifecycle for CreationModal {
    type Input = CreationPrefill;
    type Output = CreationOutcome;
    type Error = AdminError;

    async fn before_show(&self, prefill: &CreationPrefill) -> Result<(), AdminError> {
        let level = prefill.level.unwrap_or(1);
        if !(1..=MAX_LEVEL).contains(&level) {
            return Err(ValidationError::InvalidLevel(level).into());
        }
        *lock(&self.form.draft) = CategoryCreate {
            name: String::new(),
            level,
            parent: prefill.parent.clone(),
        };
        *lock(&self.form.feedback) = None;
        self.end_submit();
        Ok(())
    }

    async fn before_hide(&self, _result: &CreationOutcome) -> Result<(), AdminError> {
        self.debouncer.cancel();
        self.end_submit();
        Ok(())
    }

    async fn after_hide(&self, result: CreationOutcome) -> Result<(), AdminError> {
        if let CreationOutcome::Created(category) = result {
            self.events.publish(AdminEvent::CategoryCreated(category));
        }
        Ok(())
    }

    async fn handle_enter_key(&self) -> Result<bool, AdminError> {
        Ok(self.validate().is_ok())
    }

    fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
