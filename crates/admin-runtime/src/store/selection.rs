//! Hierarchy-aware category selection for the current product.
//!
//! Selecting categories from different levels is allowed. When the new category is more than
//! one level away from something already selected, the caller gets a [`HierarchyWarning`] to
//! show the user; the selection happens anyway.
//!
//! Levels come from the categories registered with the coordinator. A selection restored from
//! storage holds bare IDs, so until the tree is registered again those entries are reported
//! back as `unresolved` instead of being checked.

use super::{ReactiveStore, StateChange};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Largest level distance that does not produce a warning.
pub const MAX_LEVEL_DISTANCE: u8 = 1;

/// A node of the three-level category tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub level: u8,
    #[serde(default)]
    pub parent: Option<String>,
}

impl Category {
    pub fn new(id: impl Into<String>, name: impl Into<String>, level: u8, parent: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            level,
            parent: parent.map(str::to_string),
        }
    }
}

/// A selection spans more than one level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyWarning {
    pub category: String,
    pub level: u8,
    /// Already-selected categories too far from `level`, with their levels.
    pub conflicts: Vec<(String, u8)>,
}

impl HierarchyWarning {
    pub fn max_distance(&self) -> u8 {
        self.conflicts
            .iter()
            .map(|(_, level)| level.abs_diff(self.level))
            .max()
            .unwrap_or(0)
    }
}

impl fmt::Display for HierarchyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let others: Vec<String> = self
            .conflicts
            .iter()
            .map(|(id, level)| format!("{id} (level {level})"))
            .collect();
        write!(
            f,
            "{} (level {}) is selected together with {}; the selection spans {} levels",
            self.category,
            self.level,
            others.join(", "),
            self.max_distance() + 1
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionOutcome {
    /// `false` when the category was already selected.
    pub added: bool,
    pub warning: Option<HierarchyWarning>,
    /// Selected categories whose level is unknown, so they were not checked.
    pub unresolved: Vec<String>,
}

impl SelectionOutcome {
    fn unchanged() -> Self {
        Self {
            added: false,
            warning: None,
            unresolved: Vec::new(),
        }
    }
}

/// Mutates the store's category selection and checks it against the known hierarchy.
#[derive(Clone)]
pub struct SelectionCoordinator {
    store: ReactiveStore,
    known: Arc<Mutex<HashMap<String, Category>>>,
}

impl SelectionCoordinator {
    pub fn new(store: ReactiveStore) -> Self {
        Self {
            store,
            known: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &ReactiveStore {
        &self.store
    }

    /// Make categories known so their levels can be checked when selected.
    pub fn register<I: IntoIterator<Item = Category>>(&self, categories: I) {
        let mut known = self.known();
        for category in categories {
            known.insert(category.id.clone(), category);
        }
    }

    /// Replace the known categories with `categories`.
    pub fn replace_known<I: IntoIterator<Item = Category>>(&self, categories: I) {
        let mut known = self.known();
        known.clear();
        known.extend(categories.into_iter().map(|c| (c.id.clone(), c)));
    }

    pub fn forget(&self, category_id: &str) {
        self.known().remove(category_id);
    }

    pub fn category(&self, category_id: &str) -> Option<Category> {
        self.known().get(category_id).cloned()
    }

    pub fn known_categories(&self) -> Vec<Category> {
        self.known().values().cloned().collect()
    }

    pub fn selected(&self) -> Vec<String> {
        self.store
            .read(|s| s.selected_categories.iter().cloned().collect())
    }

    pub fn is_selected(&self, category_id: &str) -> bool {
        self.store.read(|s| s.selected_categories.contains(category_id))
    }

    /// Add `category` to the selection. Never refuses; may warn.
    pub fn select(&self, category: &Category) -> SelectionOutcome {
        self.register([category.clone()]);
        let mut selected = self.store.read(|s| s.selected_categories.clone());
        if selected.contains(&category.id) {
            return SelectionOutcome::unchanged();
        }

        let (warning, unresolved) = self.check_distance(category, selected.iter());
        if let Some(w) = &warning {
            info!(category = %category.id, conflicts = w.conflicts.len(), "Cross-level selection");
        }
        if !unresolved.is_empty() {
            warn!(category = %category.id, ?unresolved, "Selected categories with unknown level");
        }

        selected.insert(category.id.clone());
        self.store.set(StateChange::SelectedCategories(selected));
        debug!(category = %category.id, level = category.level, "Selected");
        SelectionOutcome {
            added: true,
            warning,
            unresolved,
        }
    }

    pub fn deselect(&self, category_id: &str) -> bool {
        let mut selected = self.store.read(|s| s.selected_categories.clone());
        if !selected.remove(category_id) {
            return false;
        }
        self.store.set(StateChange::SelectedCategories(selected));
        true
    }

    /// Select when not selected, deselect otherwise.
    pub fn toggle(&self, category: &Category) -> SelectionOutcome {
        if self.deselect(&category.id) {
            SelectionOutcome::unchanged()
        } else {
            self.select(category)
        }
    }

    /// Selected IDs that are not registered, typically after a session restore.
    pub fn unresolved(&self) -> Vec<String> {
        let known = self.known();
        self.store.read(|s| {
            s.selected_categories
                .iter()
                .filter(|id| !known.contains_key(*id))
                .cloned()
                .collect()
        })
    }

    pub fn clear(&self) {
        self.store
            .set(StateChange::SelectedCategories(Default::default()));
    }

    /// Switch product. The old selection is dropped in the same transition.
    pub fn change_product(&self, product_id: Option<String>) {
        self.store.set(StateChange::CurrentProduct(product_id));
    }

    fn check_distance<'a>(
        &self,
        category: &Category,
        selected: impl Iterator<Item = &'a String>,
    ) -> (Option<HierarchyWarning>, Vec<String>) {
        let known = self.known();
        let mut conflicts = Vec::new();
        let mut unresolved = Vec::new();
        for id in selected {
            match known.get(id) {
                Some(other) if other.level.abs_diff(category.level) > MAX_LEVEL_DISTANCE => {
                    conflicts.push((other.id.clone(), other.level));
                }
                Some(_) => {}
                None => unresolved.push(id.clone()),
            }
        }
        let warning = (!conflicts.is_empty()).then(|| HierarchyWarning {
            category: category.id.clone(),
            level: category.level,
            conflicts,
        });
        (warning, unresolved)
    }

    fn known(&self) -> MutexGuard<'_, HashMap<String, Category>> {
        self.known.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
