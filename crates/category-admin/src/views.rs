//! Read-only projections of the store, refreshed by subscription.

use admin_runtime::store::{AppState, Page, ProductStatistics, ReactiveStore, SubscriptionId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What the status bar shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub page: Page,
    pub product: Option<String>,
    pub selected_categories: usize,
    pub bulk_selected_products: usize,
    pub statistics: Option<ProductStatistics>,
    pub category_revision: u64,
}

impl Summary {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            page: state.current_page,
            product: state.current_product_id.clone(),
            selected_categories: state.selected_categories.len(),
            bulk_selected_products: state.bulk_selected_products.len(),
            statistics: state.statistics,
            category_revision: state.category_revision,
        }
    }

    pub fn status_line(&self) -> String {
        let stats = match &self.statistics {
            Some(s) => format!(
                "{}/{} products categorized, {} categories",
                s.categorized_products, s.total_products, s.total_categories
            ),
            None => "statistics not loaded".to_string(),
        };
        match (&self.page, &self.product) {
            (Page::BulkAssign, _) => format!(
                "Bulk assign: {} products selected | {stats}",
                self.bulk_selected_products
            ),
            (Page::ProductCategories, Some(product)) => format!(
                "{product}: {} categories selected | {stats}",
                self.selected_categories
            ),
            (Page::ProductCategories, None) => format!("No product selected | {stats}"),
        }
    }
}

/// Keeps a [`Summary`] current by subscribing to the store.
#[derive(Clone)]
pub struct SummaryView {
    current: Arc<Mutex<Summary>>,
    renders: Arc<AtomicUsize>,
    subscription: SubscriptionId,
}

impl SummaryView {
    pub fn attach(store: &ReactiveStore) -> Self {
        let current = Arc::new(Mutex::new(store.read(Summary::from_state)));
        let renders = Arc::new(AtomicUsize::new(0));

        let (target, count) = (current.clone(), renders.clone());
        let subscription = store.subscribe(move |state| {
            let mut summary = target
                .lock()
                .map_err(|_| "summary view poisoned".to_string())?;
            *summary = Summary::from_state(state);
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        Self {
            current,
            renders,
            subscription,
        }
    }

    pub fn current(&self) -> Summary {
        self.current
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// How many store changes the view has rendered.
    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn detach(&self, store: &ReactiveStore) -> bool {
        store.unsubscribe(self.subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_runtime::store::{MemoryStorage, DEFAULT_STATE_KEY};

    #[test]
    fn test_view_follows_store() {
        let store = ReactiveStore::load(Arc::new(MemoryStorage::new()), DEFAULT_STATE_KEY);
        let view = SummaryView::attach(&store);
        assert_eq!(view.current().status_line(), "No product selected | statistics not loaded");

        store.set_current_product(Some("SKU-1".into()));
        store.set_statistics(ProductStatistics {
            total_products: 10,
            categorized_products: 4,
            uncategorized_products: 6,
            total_categories: 3,
        });

        assert_eq!(view.renders(), 2);
        assert_eq!(
            view.current().status_line(),
            "SKU-1: 0 categories selected | 4/10 products categorized, 3 categories"
        );

        assert!(view.detach(&store));
        store.set_page(Page::BulkAssign);
        assert_eq!(view.renders(), 2);
    }
}
