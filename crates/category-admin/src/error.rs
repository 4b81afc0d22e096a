//! Errors of the category admin.
//!
//! [`ValidationError`] is local: it becomes inline feedback next to a form field and never
//! reaches the network. Everything else is wrapped by [`AdminError`].

use admin_runtime::{HttpError, LifecycleError, RegistryError, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Category name is required")]
    EmptyName,
    #[error("Category name is {len} characters long, the limit is {max}")]
    NameTooLong { len: usize, max: usize },
    #[error("Category name cannot contain {0:?}")]
    ForbiddenCharacter(char),
    #[error("Category level must be 1, 2 or 3, got {0}")]
    InvalidLevel(u8),
    #[error("A level {level} category needs a parent")]
    MissingParent { level: u8 },
    #[error("A level 1 category cannot have a parent")]
    UnexpectedParent,
    #[error("{parent} is a level {parent_level} category and cannot hold a level {level} category")]
    ParentLevelMismatch {
        parent: String,
        parent_level: u8,
        level: u8,
    },
    #[error("Category name already exists: {0}")]
    DuplicateName(String),
    #[error("Select a product first")]
    NoProduct,
    #[error("Select at least one product")]
    NoProducts,
    #[error("Select at least one category")]
    NoCategories,
    #[error("Cannot delete {category}: delete its child categories first ({})", children.join(", "))]
    HasChildren {
        category: String,
        children: Vec<String>,
    },
}

impl ValidationError {
    /// Form field the feedback belongs next to.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::EmptyName
            | ValidationError::NameTooLong { .. }
            | ValidationError::ForbiddenCharacter(_)
            | ValidationError::DuplicateName(_) => "name",
            ValidationError::InvalidLevel(_) => "level",
            ValidationError::MissingParent { .. }
            | ValidationError::UnexpectedParent
            | ValidationError::ParentLevelMismatch { .. } => "parent",
            ValidationError::HasChildren { .. } | ValidationError::NoCategories => "category",
            ValidationError::NoProduct | ValidationError::NoProducts => "product",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("The {0} dialog is not open")]
    NotOpen(&'static str),
}

impl AdminError {
    /// Whether the user can usefully try again.
    pub fn is_retryable(&self) -> bool {
        match self {
            AdminError::Http(e) => e.is_retryable(),
            AdminError::Registry(RegistryError::Resolution { .. }) => true,
            _ => false,
        }
    }
}
