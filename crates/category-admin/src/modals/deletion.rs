//! The "delete category" confirmation dialog.
//!
//! It opens with the category's server-side info (product count, children). A category that
//! still has children can be looked at but not confirmed: the check runs locally, before any
//! delete request is sent.

use crate::error::{AdminError, ValidationError};
use crate::events::{AdminEvent, AdminEvents};
use crate::model::{validate_delete, CategoryInfo, DeletionReport};
use admin_runtime::lifecycle::ComponentLifecycle;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionTarget {
    pub category: String,
    pub info: CategoryInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeletionOutcome {
    #[default]
    Cancelled,
    Deleted {
        name: String,
        report: DeletionReport,
    },
}

pub struct DeletionModal {
    target: Mutex<Option<DeletionTarget>>,
    feedback: Mutex<Option<ValidationError>>,
    submitting: AtomicBool,
    events: AdminEvents,
}

impl DeletionModal {
    pub fn new(events: AdminEvents) -> Self {
        Self {
            target: Mutex::new(None),
            feedback: Mutex::new(None),
            submitting: AtomicBool::new(false),
            events,
        }
    }

    pub fn target(&self) -> Option<DeletionTarget> {
        lock(&self.target).clone()
    }

    pub fn feedback(&self) -> Option<ValidationError> {
        lock(&self.feedback).clone()
    }

    /// Whether the open target may be deleted.
    pub fn can_confirm(&self) -> bool {
        lock(&self.target)
            .as_ref()
            .is_some_and(|t| validate_delete(&t.info).is_ok())
    }

    /// The name to delete, once the local checks pass.
    pub fn validate(&self) -> Result<String, AdminError> {
        let target = self.target().ok_or(AdminError::NotOpen("deletion"))?;
        let checked = validate_delete(&target.info);
        *lock(&self.feedback) = checked.as_ref().err().cloned();
        checked?;
        Ok(target.category)
    }

    pub(crate) fn begin_submit(&self) -> bool {
        self.submitting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn end_submit(&self) {
        self.submitting.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl ComponentLifecycle for DeletionModal {
    type Input = DeletionTarget;
    type Output = DeletionOutcome;
    type Error = AdminError;

    async fn before_show(&self, target: &DeletionTarget) -> Result<(), AdminError> {
        *lock(&self.feedback) = validate_delete(&target.info).err();
        *lock(&self.target) = Some(target.clone());
        self.end_submit();
        Ok(())
    }

    async fn before_hide(&self, _result: &DeletionOutcome) -> Result<(), AdminError> {
        self.end_submit();
        Ok(())
    }

    async fn after_hide(&self, result: DeletionOutcome) -> Result<(), AdminError> {
        lock(&self.target).take();
        lock(&self.feedback).take();
        if let DeletionOutcome::Deleted { name, report } = result {
            self.events.publish(AdminEvent::CategoryDeleted {
                name,
                removed_from_products: report.removed_from_products,
            });
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
