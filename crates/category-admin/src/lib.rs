//! # Category Admin
//!
//! The category admin application, built on [`admin_runtime`].
//!
//! ## Module Tour
//!
//! ### 1. Domain ([`model`])
//! Categories, product statistics and the payloads the server sends, plus the local
//! validation rules that run before anything is sent.
//!
//! ### 2. Server boundary ([`api`])
//! [`CategoryApi`](api::CategoryApi) wraps the retrying client with one typed method per
//! endpoint.
//!
//! ### 3. Dialogs ([`modals`])
//! [`CreationModal`](modals::CreationModal) and [`DeletionModal`](modals::DeletionModal), the
//! two overlay variants.
//!
//! ### 4. Orchestration ([`coordinator`], [`system`])
//! The [`Coordinator`](coordinator::Coordinator) runs user operations: re-entrancy guard,
//! local checks, request, store update, notification. [`AdminSystem`](system::AdminSystem)
//! registers every service in a module registry and resolves the coordinator from it.
//!
//! ### 5. Surfaces ([`notify`], [`events`], [`views`], [`page`])
//! How results reach the user: toasts, broadcast domain events, store-driven views, and the
//! page handles the dialogs render into.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use category_admin::config::AdminConfig;
//! use category_admin::page::HeadlessPage;
//! use category_admin::system::AdminSystem;
//!
//! let page = HeadlessPage::new();
//! let system = AdminSystem::start(AdminConfig::from_env(), page.page()).await?;
//! let stats = system.coordinator.refresh_statistics().await?;
//! system.shutdown()?;
//! ```
//!
//! ## Testing
//!
//! Start the system with [`AdminSystem::start_with`](system::AdminSystem::start_with), an
//! [`admin_runtime::mock::MockTransport`] and a [`RecordingNotifier`](notify::RecordingNotifier).

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod modals;
pub mod model;
pub mod notify;
pub mod page;
pub mod system;
pub mod views;

pub use error::{AdminError, ValidationError};
