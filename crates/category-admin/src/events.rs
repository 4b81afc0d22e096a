//! Domain events announced when an operation completes.

use crate::model::{Category, ProductStatistics};

#[derive(Debug, Clone, PartialEq)]
pub enum AdminEvent {
    CategoryCreated(Category),
    CategoryDeleted {
        name: String,
        removed_from_products: u64,
    },
    CsvExported {
        rows: usize,
    },
    StatisticsRefreshed(ProductStatistics),
    ProductCategoriesLoaded {
        product_id: String,
        categories: Vec<String>,
    },
    ProductCategoriesSaved {
        product_id: String,
        categories: Vec<String>,
    },
    BulkAssigned {
        category: String,
        products_updated: u64,
    },
    BulkRemoved {
        category: String,
        products_updated: u64,
    },
}

pub type AdminEvents = admin_runtime::EventBus<AdminEvent>;
