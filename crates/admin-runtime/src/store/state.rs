//! Application state held by the [`ReactiveStore`](super::ReactiveStore) and its persisted form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which top-level page the admin is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    #[default]
    ProductCategories,
    BulkAssign,
}

/// The category last picked in the bulk-assignment view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkCategorySelection {
    pub id: String,
    pub name: String,
    pub level: u8,
}

/// Product statistics as last fetched from the server. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductStatistics {
    pub total_products: u64,
    pub categorized_products: u64,
    pub uncategorized_products: u64,
    pub total_categories: u64,
}

/// Cross-component UI state.
///
/// `selected_categories` belongs to `current_product_id`; the store clears it whenever the
/// product changes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    pub current_product_id: Option<String>,
    pub selected_categories: BTreeSet<String>,
    pub hide_allocated_products: bool,
    pub last_selected_bulk_category: Option<BulkCategorySelection>,
    pub bulk_selected_products: BTreeSet<String>,
    pub current_page: Page,
    /// Bumped whenever the category tree changes on the server.
    pub category_revision: u64,
    pub statistics: Option<ProductStatistics>,
}

/// One mutation of the store. Each change is applied and announced as a single transition.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    /// Also clears `selected_categories` when the product differs from the current one.
    CurrentProduct(Option<String>),
    SelectedCategories(BTreeSet<String>),
    HideAllocatedProducts(bool),
    LastSelectedBulkCategory(Option<BulkCategorySelection>),
    BulkSelectedProducts(BTreeSet<String>),
    CurrentPage(Page),
    CategoryRevision(u64),
    Statistics(Option<ProductStatistics>),
}

impl StateChange {
    pub(crate) fn key(&self) -> &'static str {
        match self {
            StateChange::CurrentProduct(_) => "currentProductId",
            StateChange::SelectedCategories(_) => "selectedCategories",
            StateChange::HideAllocatedProducts(_) => "hideAllocatedProducts",
            StateChange::LastSelectedBulkCategory(_) => "lastSelectedBulkCategory",
            StateChange::BulkSelectedProducts(_) => "bulkSelectedProducts",
            StateChange::CurrentPage(_) => "currentPage",
            StateChange::CategoryRevision(_) => "categoryRevision",
            StateChange::Statistics(_) => "statistics",
        }
    }

    /// Changes to transient fields are not written to storage.
    pub(crate) fn is_persisted(&self) -> bool {
        !matches!(
            self,
            StateChange::CategoryRevision(_) | StateChange::Statistics(_)
        )
    }
}

impl AppState {
    /// Apply `change`. Returns `false` when the state did not change.
    pub(crate) fn apply(&mut self, change: StateChange) -> bool {
        let before = self.clone();
        match change {
            StateChange::CurrentProduct(product) => {
                if self.current_product_id != product {
                    self.selected_categories.clear();
                    self.current_product_id = product;
                }
            }
            StateChange::SelectedCategories(ids) => self.selected_categories = ids,
            StateChange::HideAllocatedProducts(hide) => self.hide_allocated_products = hide,
            StateChange::LastSelectedBulkCategory(category) => {
                self.last_selected_bulk_category = category
            }
            StateChange::BulkSelectedProducts(ids) => self.bulk_selected_products = ids,
            StateChange::CurrentPage(page) => self.current_page = page,
            StateChange::CategoryRevision(revision) => self.category_revision = revision,
            StateChange::Statistics(stats) => self.statistics = stats,
        }
        *self != before
    }

    pub(crate) fn to_snapshot(&self, timestamp: i64) -> Snapshot {
        Snapshot {
            current_product_id: self.current_product_id.clone(),
            selected_categories: self.selected_categories.iter().cloned().collect(),
            hide_allocated_products: self.hide_allocated_products,
            last_selected_bulk_category: self.last_selected_bulk_category.clone(),
            bulk_selected_products: self.bulk_selected_products.iter().cloned().collect(),
            current_page: self.current_page,
            timestamp,
        }
    }
}

/// The JSON document written to durable storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub current_product_id: Option<String>,
    #[serde(default)]
    pub selected_categories: Vec<String>,
    #[serde(default)]
    pub hide_allocated_products: bool,
    #[serde(default)]
    pub last_selected_bulk_category: Option<BulkCategorySelection>,
    #[serde(default)]
    pub bulk_selected_products: Vec<String>,
    #[serde(default)]
    pub current_page: Page,
    #[serde(default)]
    pub timestamp: i64,
}

impl From<Snapshot> for AppState {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            current_product_id: snapshot.current_product_id,
            selected_categories: snapshot.selected_categories.into_iter().collect(),
            hide_allocated_products: snapshot.hide_allocated_products,
            last_selected_bulk_category: snapshot.last_selected_bulk_category,
            bulk_selected_products: snapshot.bulk_selected_products.into_iter().collect(),
            current_page: snapshot.current_page,
            category_revision: 0,
            statistics: None,
        }
    }
}
