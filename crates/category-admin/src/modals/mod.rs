//! The two dialogs of the category admin, as [`ComponentLifecycle`] variants.
//!
//! Each is wrapped in an [`Overlay`] by the coordinator, which supplies the state machine,
//! scroll lock and listeners. The variants only hold form state and decide what Enter means.
//!
//! [`ComponentLifecycle`]: admin_runtime::lifecycle::ComponentLifecycle
//! [`Overlay`]: admin_runtime::lifecycle::Overlay

pub mod creation;
pub mod deletion;

pub use creation::{CreationModal, CreationOutcome, CreationPrefill};
pub use deletion::{DeletionModal, DeletionOutcome, DeletionTarget};

pub const CREATION_MODAL_ID: &str = "create-category-modal";
pub const DELETION_MODAL_ID: &str = "delete-category-modal";
