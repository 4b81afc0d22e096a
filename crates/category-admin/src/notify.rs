//! Transient user-facing notifications.
//!
//! Failed operations carry the [`Operation`] to retry, so the toast can offer a retry button
//! that calls straight back into the coordinator.

use std::fmt;
use std::sync::Mutex;
use tracing::{error, info, warn};

/// The user operations the coordinator runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateCategory,
    DeleteCategory,
    ExportCsv,
    RefreshStatistics,
    LoadCategories,
    LoadProductCategories,
    SaveProductCategories,
    BulkAssign,
    BulkRemove,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::CreateCategory => "create category",
            Operation::DeleteCategory => "delete category",
            Operation::ExportCsv => "export CSV",
            Operation::RefreshStatistics => "refresh statistics",
            Operation::LoadCategories => "load categories",
            Operation::LoadProductCategories => "load product categories",
            Operation::SaveProductCategories => "save product categories",
            Operation::BulkAssign => "bulk assign",
            Operation::BulkRemove => "bulk remove",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    /// Something the user should know about; nothing failed.
    Warning,
    Error { retry: Option<Operation> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>, retry: Option<Operation>) -> Self {
        Self {
            kind: NotificationKind::Error { retry },
            message: message.into(),
        }
    }

    pub fn retry(&self) -> Option<Operation> {
        match self.kind {
            NotificationKind::Error { retry } => retry,
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, NotificationKind::Error { .. })
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log. The default for headless runs.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success => info!(message = %notification.message, "Notification"),
            NotificationKind::Warning => warn!(message = %notification.message, "Notification"),
            NotificationKind::Error { retry } => {
                error!(message = %notification.message, retry = ?retry, "Notification")
            }
        }
    }
}

/// Keeps every notification for later inspection.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().map(|n| n.clone()).unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<Notification> {
        self.filtered(Notification::is_error)
    }

    pub fn successes(&self) -> Vec<Notification> {
        self.filtered(|n| n.kind == NotificationKind::Success)
    }

    pub fn warnings(&self) -> Vec<Notification> {
        self.filtered(|n| n.kind == NotificationKind::Warning)
    }

    pub fn clear(&self) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.clear();
        }
    }

    fn filtered(&self, keep: impl Fn(&Notification) -> bool) -> Vec<Notification> {
        self.notifications().into_iter().filter(|n| keep(n)).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(notification);
        }
    }
}
