//! # Runtime Errors
//!
//! This module defines the error types shared by the runtime components. Each component
//! owns one enum, so callers can pattern match on the failure class they care about
//! (configuration, resolution, transport, lifecycle hooks, persistence).
//!
//! Lifecycle misuse (hiding a hidden overlay, showing a visible one) has no variant here:
//! those calls return [`Transition::Ignored`](crate::lifecycle::Transition::Ignored).

/// Errors raised by the [`ModuleRegistry`](crate::registry::ModuleRegistry).
///
/// One failed resolution is delivered to every caller waiting on it, hence `Clone`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("Module not registered: {0}")]
    MissingModule(String),
    #[error("Module already resolved, cannot redefine: {0}")]
    AlreadyResolved(String),
    #[error("Module `{module}` failed to resolve: {reason}")]
    Resolution { module: String, reason: String },
    #[error("Module `{module}` sits on a dependency cycle: {}", path.join(" -> "))]
    DependencyCycle { module: String, path: Vec<String> },
    #[error("Module `{module}` is not a `{expected}`")]
    TypeMismatch { module: String, expected: &'static str },
}

impl RegistryError {
    /// Duplicate or missing registrations. Fatal to the feature that asked, never to the runtime.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RegistryError::MissingModule(_)
                | RegistryError::AlreadyResolved(_)
                | RegistryError::DependencyCycle { .. }
        )
    }
}

/// Errors raised by the [`ResilientClient`](crate::http::ResilientClient).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HttpError {
    /// The server rejected the request (4xx). Retrying cannot help.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    /// Server failure (5xx) or a transport-level failure (`status` is `None`).
    #[error("{message}")]
    Transient { status: Option<u16>, message: String },
    /// The response claimed to be JSON but could not be parsed.
    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl HttpError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, HttpError::Transient { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Rejected { status, .. } => Some(*status),
            HttpError::Transient { status, .. } => *status,
            HttpError::Decode(_) => None,
        }
    }
}

/// A lifecycle hook refused or failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("{component}: {hook} failed: {reason}")]
    HookFailed {
        component: String,
        hook: &'static str,
        reason: String,
    },
}

/// Errors raised while persisting the application state.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure reported by a store subscriber. Logged and isolated, never propagated.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct SubscriberError(pub String);

impl From<String> for SubscriberError {
    fn from(msg: String) -> Self {
        SubscriberError(msg)
    }
}

impl From<&str> for SubscriberError {
    fn from(msg: &str) -> Self {
        SubscriberError(msg.to_string())
    }
}

/// The request never produced a response: connection refused, DNS, timeout.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct NetworkError(pub String);
