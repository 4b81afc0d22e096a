//! Domain types of the category admin.
//!
//! - [`category`]: categories and the payloads of the category endpoints
//! - [`product`]: product statistics and the CSV export
//! - [`validation`]: the rules a form must pass before it is sent

pub mod category;
pub mod product;
pub mod validation;

pub use category::*;
pub use product::*;
pub use validation::{validate_create, validate_delete, validate_name};
