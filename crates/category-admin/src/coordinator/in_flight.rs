use crate::notify::Operation;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// Operations currently running. A second start of the same operation is refused.
#[derive(Debug, Default)]
pub struct InFlight {
    running: Mutex<HashSet<Operation>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `operation` as running until the returned guard is dropped.
    pub fn try_begin(&self, operation: Operation) -> Option<InFlightGuard<'_>> {
        if self.lock().insert(operation) {
            Some(InFlightGuard {
                owner: self,
                operation,
            })
        } else {
            None
        }
    }

    pub fn is_running(&self, operation: Operation) -> bool {
        self.lock().contains(&operation)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<Operation>> {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug)]
pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    operation: Operation,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.owner.lock().remove(&self.operation);
    }
}
